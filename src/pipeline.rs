//! End-to-end pattern pipeline: pixelate, reduce or cluster, remap, label.

use crate::buffer::{PaperSize, PixelBuffer};
use crate::color::ColorMetric;
use crate::error::PatternError;
use crate::kmeans::{cluster, ClusterConfig};
use crate::labels::annotate_with_legend;
use crate::pixelator::{pixelate_with, FlattenPolicy};
use crate::reduction::{reduce, ColorCount, ColorFrequencyMap, Palette, ThresholdMode};
use crate::remap::remap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Instant;

const FINGERPRINT_VERSION: u8 = 1;

/// How the pixelated color population is collapsed into a palette.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReductionMethod {
    Merge { threshold: ThresholdMode },
    Cluster(ClusterConfig),
}

impl Default for ReductionMethod {
    fn default() -> Self {
        ReductionMethod::Merge {
            threshold: ThresholdMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatternConfig {
    pub block_size: u32,
    /// Accepted for compatibility; only used under `FlattenPolicy::Round`.
    pub flatten_hint: u32,
    pub flatten_policy: FlattenPolicy,
    pub reduction: ReductionMethod,
    pub metric: ColorMetric,
    /// Draw alphabetic labels over the top-ranked colors.
    pub annotate: bool,
    /// Shrink the input to fit this page before pixelating.
    pub fit_page: Option<PaperSize>,
}

impl PatternConfig {
    /// Small blocks and a tight threshold: many colors, fine detail.
    pub fn fine() -> Self {
        Self {
            block_size: 4,
            reduction: ReductionMethod::Merge {
                threshold: ThresholdMode::Fixed(6.0),
            },
            ..Self::standard()
        }
    }

    /// 8px blocks merged at distance 10.
    pub fn standard() -> Self {
        Self {
            block_size: 8,
            flatten_hint: 16,
            flatten_policy: FlattenPolicy::PassThrough,
            reduction: ReductionMethod::default(),
            metric: ColorMetric::Redmean,
            annotate: false,
            fit_page: None,
        }
    }

    /// Large blocks and aggressive merging for quick, bold patterns.
    pub fn bold() -> Self {
        Self {
            block_size: 12,
            reduction: ReductionMethod::Merge {
                threshold: ThresholdMode::Fixed(40.0),
            },
            ..Self::standard()
        }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// A palette color as handed to display and print collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteSwatch {
    pub hex: String,
    pub rgb: [u8; 3],
    pub count: u64,
    pub coverage: f32,
    pub label: Option<char>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternResult {
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub image: Option<PixelBuffer>,
    pub palette: Vec<PaletteSwatch>,
    /// Distinct pixelated colors with their original counts.
    pub ranked_before: Vec<ColorCount>,
    /// Palette colors with their final weights.
    pub ranked_after: Vec<ColorCount>,
    /// Clustering scans, when clustering was used.
    pub scans: Option<usize>,
    pub fingerprint: String,
    pub processing_time_ms: u64,
}

impl PatternResult {
    pub fn to_json(&self) -> Result<String, PatternError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PatternError::Encode(format!("Failed to serialize pattern: {}", e)))
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Pixelate,
    Reduce,
    Remap,
    Annotate,
}

pub fn run_pipeline(
    buffer: PixelBuffer,
    config: &PatternConfig,
) -> Result<PatternResult, PatternError> {
    run_pipeline_with_progress(buffer, config, |_| {})
}

/// Same as [`run_pipeline`], calling `progress` as each stage starts.
pub fn run_pipeline_with_progress<F>(
    buffer: PixelBuffer,
    config: &PatternConfig,
    mut progress: F,
) -> Result<PatternResult, PatternError>
where
    F: FnMut(Stage),
{
    let timing_enabled = pipeline_timing_enabled();
    let t_total = Instant::now();

    let buffer = match config.fit_page {
        Some(paper) => buffer.resize_for_page(paper)?,
        None => buffer,
    };

    progress(Stage::Pixelate);
    let t_pixelate = Instant::now();
    let pixelated = pixelate_with(
        &buffer,
        config.block_size,
        config.flatten_hint,
        config.flatten_policy,
    )?;
    drop(buffer);
    let pixelate_ms = t_pixelate.elapsed().as_millis();

    progress(Stage::Reduce);
    let t_reduce = Instant::now();
    let (ranked_before, palette, scans, reduced) = match config.reduction {
        ReductionMethod::Merge { threshold } => {
            let map = ColorFrequencyMap::from_buffer(&pixelated);
            let threshold = threshold.resolve(&map);
            let reduction = reduce(&map, threshold, config.metric);
            (reduction.before, reduction.palette, None, pixelated)
        }
        ReductionMethod::Cluster(cluster_config) => {
            let ranked_before = ColorFrequencyMap::from_buffer(&pixelated).ranked();
            let clustering = cluster(&pixelated, &cluster_config)?;
            (
                ranked_before,
                clustering.palette,
                Some(clustering.scans),
                clustering.buffer,
            )
        }
    };
    let reduce_ms = t_reduce.elapsed().as_millis();

    progress(Stage::Remap);
    let t_remap = Instant::now();
    let remapped = remap(reduced, &palette, config.metric)?;
    let remap_ms = t_remap.elapsed().as_millis();

    let t_annotate = Instant::now();
    let (image, labels) = if config.annotate {
        progress(Stage::Annotate);
        let (annotated, assignment) = annotate_with_legend(&remapped, &palette.colors());
        (annotated, Some(assignment))
    } else {
        (remapped, None)
    };
    let annotate_ms = t_annotate.elapsed().as_millis();

    let total = palette.total_count().max(1) as f32;
    let swatches = palette
        .iter()
        .map(|entry| PaletteSwatch {
            hex: entry.color.to_hex(),
            rgb: entry.color.channels(),
            count: entry.count,
            coverage: entry.count as f32 / total,
            label: labels.as_ref().and_then(|l| l.label_for(entry.color)),
        })
        .collect();

    let total_ms = t_total.elapsed().as_millis();
    if timing_enabled {
        log::debug!(
            "Pipeline timing block={} colors={} pixelate={}ms reduce={}ms remap={}ms annotate={}ms total={}ms",
            config.block_size,
            palette.len(),
            pixelate_ms,
            reduce_ms,
            remap_ms,
            annotate_ms,
            total_ms
        );
    }

    Ok(PatternResult {
        width: image.width(),
        height: image.height(),
        fingerprint: build_fingerprint(&image, &palette),
        image: Some(image),
        palette: swatches,
        ranked_before,
        ranked_after: palette.entries,
        scans,
        processing_time_ms: total_ms as u64,
    })
}

fn pipeline_timing_enabled() -> bool {
    matches!(
        std::env::var("JEWELSTITCH_DEBUG_TIMING").as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes") | Ok("YES")
    )
}

/// SHA-256 over the output pixels and palette; equal inputs and configs give
/// equal fingerprints.
fn build_fingerprint(image: &PixelBuffer, palette: &Palette) -> String {
    let mut hasher = Sha256::new();
    hasher.update([FINGERPRINT_VERSION]);
    hasher.update(image.width().to_le_bytes());
    hasher.update(image.height().to_le_bytes());
    for pixel in image.pixels() {
        hasher.update([pixel.red, pixel.green, pixel.blue, pixel.alpha]);
    }
    for entry in palette.iter() {
        hasher.update(entry.color.channels());
        hasher.update(entry.count.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::kmeans::ClusterMode;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                pixels.push(Color::rgb(
                    (x * 255 / width) as u8,
                    (y * 255 / height) as u8,
                    128,
                ));
            }
        }
        PixelBuffer::new(width, height, pixels).unwrap()
    }

    #[test]
    fn merge_pipeline_covers_every_pixel() {
        let result = run_pipeline(gradient(64, 48), &PatternConfig::standard()).unwrap();
        let image = result.image.as_ref().expect("image should be kept");
        let colors: Vec<Color> = result.ranked_after.iter().map(|e| e.color).collect();
        assert!(image.pixels().iter().all(|p| colors.contains(p)));
        assert_eq!(
            result.ranked_after.iter().map(|e| e.count).sum::<u64>(),
            64 * 48
        );
        assert_eq!(
            result.ranked_before.iter().map(|e| e.count).sum::<u64>(),
            64 * 48
        );
        assert!(result.palette.len() <= result.ranked_before.len());
        assert!(result.scans.is_none());
    }

    #[test]
    fn cluster_pipeline_reports_scans() {
        let config = PatternConfig {
            reduction: ReductionMethod::Cluster(ClusterConfig {
                k: 4,
                mode: ClusterMode::Iterative,
                max_scans: Some(500),
            }),
            ..PatternConfig::standard()
        };
        let result = run_pipeline(gradient(32, 32), &config).unwrap();
        assert!(result.scans.unwrap() >= 2);
        assert!(result.palette.len() <= 4);
        let image = result.image.unwrap();
        let colors: Vec<Color> = result.ranked_after.iter().map(|e| e.color).collect();
        assert!(image.pixels().iter().all(|p| colors.contains(p)));
    }

    #[test]
    fn repeated_runs_share_a_fingerprint() {
        let config = PatternConfig {
            reduction: ReductionMethod::Cluster(ClusterConfig {
                k: 5,
                mode: ClusterMode::Continuous,
                max_scans: None,
            }),
            ..PatternConfig::fine()
        };
        let a = run_pipeline(gradient(40, 40), &config).unwrap();
        let b = run_pipeline(gradient(40, 40), &config).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);

        let c = run_pipeline(gradient(40, 40), &PatternConfig::bold()).unwrap();
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn annotation_labels_the_palette() {
        let config = PatternConfig {
            annotate: true,
            ..PatternConfig::bold()
        };
        let result = run_pipeline(gradient(48, 48), &config).unwrap();
        assert_eq!(result.palette[0].label, Some('A'));
        let labelled = result.palette.iter().filter(|s| s.label.is_some()).count();
        assert_eq!(labelled, result.palette.len().min(52));
    }

    #[test]
    fn progress_reports_stages_in_order() {
        let mut stages = Vec::new();
        let config = PatternConfig {
            annotate: true,
            ..PatternConfig::standard()
        };
        run_pipeline_with_progress(gradient(16, 16), &config, |s| stages.push(s)).unwrap();
        assert_eq!(
            stages,
            vec![Stage::Pixelate, Stage::Reduce, Stage::Remap, Stage::Annotate]
        );
    }

    #[test]
    fn fit_page_shrinks_before_pixelating() {
        let config = PatternConfig {
            fit_page: Some(PaperSize::A4),
            ..PatternConfig::standard()
        };
        let result = run_pipeline(gradient(1000, 100), &config).unwrap();
        assert_eq!((result.width, result.height), (531, 51));
    }

    #[test]
    fn zero_block_size_fails_the_call() {
        let config = PatternConfig {
            block_size: 0,
            ..PatternConfig::standard()
        };
        assert!(matches!(
            run_pipeline(gradient(8, 8), &config),
            Err(PatternError::InvalidArgument(_))
        ));
    }

    #[test]
    fn config_reads_camel_case_json_with_defaults() {
        let config: PatternConfig = serde_json::from_str(
            r#"{
                "blockSize": 6,
                "reduction": { "cluster": { "k": 12, "mode": "iterative", "maxScans": 50 } },
                "annotate": true
            }"#,
        )
        .expect("config should parse");
        assert_eq!(config.block_size, 6);
        assert_eq!(config.flatten_hint, 16);
        assert!(config.annotate);
        assert_eq!(
            config.reduction,
            ReductionMethod::Cluster(ClusterConfig {
                k: 12,
                mode: ClusterMode::Iterative,
                max_scans: Some(50),
            })
        );

        let merge: PatternConfig = serde_json::from_str(
            r#"{ "reduction": { "merge": { "threshold": { "frequencySpread": { "divisor": 3.0 } } } } }"#,
        )
        .expect("merge config should parse");
        assert_eq!(
            merge.reduction,
            ReductionMethod::Merge {
                threshold: ThresholdMode::FrequencySpread { divisor: 3.0 }
            }
        );
    }

    #[test]
    fn result_serializes_without_the_image() {
        let result = run_pipeline(gradient(16, 16), &PatternConfig::standard()).unwrap();
        let json = result.to_json().unwrap();
        assert!(json.contains("\"rankedBefore\""));
        assert!(json.contains("\"fingerprint\""));
        assert!(!json.contains("\"image\""));
    }
}
