mod buffer;
mod color;
mod error;
mod kmeans;
mod labels;
mod pipeline;
mod pixelator;
mod reduction;
mod remap;
mod worker;

pub use buffer::{fit_to_page, PaperSize, PixelBuffer};
pub use color::{cluster_distance, redmean_distance, Color, ColorMetric};
pub use error::PatternError;
pub use kmeans::{cluster, seed_clusters, Cluster, ClusterConfig, ClusterMode, Clustering};
pub use labels::{
    annotate, annotate_with_legend, LabelAssignment, LabelEntry, LABEL_ALPHABET, LABEL_STRIDE,
};
pub use pipeline::{
    run_pipeline, run_pipeline_with_progress, PaletteSwatch, PatternConfig, PatternResult,
    ReductionMethod, Stage,
};
pub use pixelator::{flatten_color, pixelate, pixelate_with, FlattenPolicy};
pub use reduction::{
    count_std_dev, preview_thresholds, reduce, reduce_buffer, ColorCount, ColorFrequencyMap,
    Palette, Reduction, ThresholdMode,
};
pub use remap::{nearest_color, remap};
pub use worker::{spawn_pipeline, PipelineStatus};

use std::fs;
use std::path::Path;

/// Turn encoded image bytes into a stitch pattern.
///
/// # Arguments
/// * `image_bytes` - Raw image bytes (PNG, JPEG, etc.)
/// * `config` - Block size, reduction method and labelling options
///
/// # Returns
/// PatternResult with the final image, ranked palettes and a fingerprint
pub fn process_stitch_pattern(
    image_bytes: &[u8],
    config: &PatternConfig,
) -> Result<PatternResult, String> {
    log::info!(
        "Processing stitch pattern: {} bytes, block={}, reduction={:?}",
        image_bytes.len(),
        config.block_size,
        config.reduction
    );

    let buffer = PixelBuffer::decode(image_bytes).map_err(|e| e.to_string())?;
    let result = run_pipeline(buffer, config).map_err(|e| e.to_string())?;
    log_result(&result);
    Ok(result)
}

/// Same as [`process_stitch_pattern`] for an image already on disk.
pub fn process_stitch_pattern_from_file(
    file_path: impl AsRef<Path>,
    config: &PatternConfig,
) -> Result<PatternResult, String> {
    let path = file_path.as_ref();
    log::info!("Processing stitch pattern from file: {}", path.display());

    let bytes = fs::read(path)
        .map_err(|e| PatternError::Io(format!("{}: {}", path.display(), e)).to_string())?;
    process_stitch_pattern(&bytes, config)
}

/// Process and encode the finished pattern as PNG.
pub fn export_pattern_png(image_bytes: &[u8], config: &PatternConfig) -> Result<Vec<u8>, String> {
    let result = process_stitch_pattern(image_bytes, config)?;
    let image = result
        .image
        .as_ref()
        .ok_or_else(|| "Pattern result carries no image".to_string())?;
    let png = image.encode_png().map_err(|e| e.to_string())?;
    log::info!("Exported pattern PNG: {} bytes", png.len());
    Ok(png)
}

/// Merge-reduce at each threshold in parallel and report the palette sizes,
/// so a caller can pick a threshold before running the full pipeline.
pub fn preview_palette_sizes(
    image_bytes: &[u8],
    config: &PatternConfig,
    thresholds: &[f64],
) -> Result<Vec<(f64, usize)>, String> {
    let buffer = PixelBuffer::decode(image_bytes).map_err(|e| e.to_string())?;
    let pixelated = pixelate_with(
        &buffer,
        config.block_size,
        config.flatten_hint,
        config.flatten_policy,
    )
    .map_err(|e| e.to_string())?;
    let map = ColorFrequencyMap::from_buffer(&pixelated);
    Ok(preview_thresholds(&map, thresholds, config.metric)
        .into_iter()
        .map(|r| (r.threshold, r.palette.len()))
        .collect())
}

fn log_result(result: &PatternResult) {
    log::info!(
        "Pattern processed: {}x{}, {} source colors, {} palette colors, {}ms",
        result.width,
        result.height,
        result.ranked_before.len(),
        result.palette.len(),
        result.processing_time_ms
    );
}
