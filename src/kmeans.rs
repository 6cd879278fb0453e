//! Deterministic centroid clustering, an alternative to frequency merging.
//!
//! Seeds are sampled along the image diagonal, so the same image and `k`
//! always produce the same palette. Scans repeat until one full scan leaves
//! every pixel in its cluster. Without a scan cap that loop has no upper
//! bound: assignments that cycle between clusters never terminate.

use crate::buffer::PixelBuffer;
use crate::color::{cluster_distance, Color};
use crate::error::PatternError;
use crate::reduction::{ColorCount, Palette};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClusterMode {
    /// Move a pixel between clusters as soon as its nearest cluster changes,
    /// updating both running means on the spot.
    #[default]
    Continuous,
    /// Assign every pixel against fixed centroids, then rebuild all clusters
    /// from the final assignments.
    Iterative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub k: usize,
    pub mode: ClusterMode,
    /// `None` scans until convergence, however long that takes.
    pub max_scans: Option<usize>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k: 15,
            mode: ClusterMode::Continuous,
            max_scans: None,
        }
    }
}

/// Running-sum cluster. The mean is truncated on every mutation, so a
/// remove/add sequence can drift from a batch recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub id: usize,
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    reds: u64,
    greens: u64,
    blues: u64,
    pixel_count: u64,
}

impl Cluster {
    /// New cluster centred on `seed`. The seed counts as one sample.
    pub fn new(id: usize, seed: Color) -> Self {
        let mut cluster = Self {
            id,
            red: seed.red as u32,
            green: seed.green as u32,
            blue: seed.blue as u32,
            reds: 0,
            greens: 0,
            blues: 0,
            pixel_count: 0,
        };
        cluster.add_pixel(seed);
        cluster
    }

    pub fn pixel_count(&self) -> u64 {
        self.pixel_count
    }

    pub fn mean(&self) -> Color {
        Color::rgb(self.red as u8, self.green as u8, self.blue as u8)
    }

    pub fn clear(&mut self) {
        self.red = 0;
        self.green = 0;
        self.blue = 0;
        self.reds = 0;
        self.greens = 0;
        self.blues = 0;
        self.pixel_count = 0;
    }

    pub fn add_pixel(&mut self, color: Color) {
        self.reds += color.red as u64;
        self.greens += color.green as u64;
        self.blues += color.blue as u64;
        self.pixel_count += 1;
        self.update_mean();
    }

    /// Remove a sample previously added. A cluster that would go below zero
    /// members is left untouched.
    pub fn remove_pixel(&mut self, color: Color) {
        if self.pixel_count == 0 {
            log::warn!("Removing pixel from empty cluster {}", self.id);
            return;
        }
        self.reds = self.reds.saturating_sub(color.red as u64);
        self.greens = self.greens.saturating_sub(color.green as u64);
        self.blues = self.blues.saturating_sub(color.blue as u64);
        self.pixel_count -= 1;
        self.update_mean();
    }

    fn update_mean(&mut self) {
        if self.pixel_count > 0 {
            self.red = (self.reds / self.pixel_count) as u32;
            self.green = (self.greens / self.pixel_count) as u32;
            self.blue = (self.blues / self.pixel_count) as u32;
        }
    }

    pub fn distance(&self, color: Color) -> u32 {
        cluster_distance(self.mean(), color)
    }
}

/// Output of a clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Mean color of every cluster that owns pixels, most pixels first.
    pub palette: Palette,
    /// Input with each pixel replaced by its cluster mean.
    pub buffer: PixelBuffer,
    /// Full-image scans performed, including the final one that changed nothing.
    pub scans: usize,
}

/// Seed `k` clusters along the diagonal, stepping `width / k` and `height / k`.
pub fn seed_clusters(buffer: &PixelBuffer, k: usize) -> Vec<Cluster> {
    let dx = buffer.width() as usize / k.max(1);
    let dy = buffer.height() as usize / k.max(1);
    let (mut x, mut y) = (0usize, 0usize);
    let mut clusters = Vec::with_capacity(k.min(buffer.len()));
    for id in 0..k {
        clusters.push(Cluster::new(id, buffer.get(x as u32, y as u32)));
        x += dx;
        y += dy;
    }
    clusters
}

/// Nearest cluster by mean absolute channel difference; the lowest index wins ties.
fn nearest_cluster(clusters: &[Cluster], color: Color) -> usize {
    let mut best = 0usize;
    let mut min = u32::MAX;
    for (i, cluster) in clusters.iter().enumerate() {
        let d = cluster.distance(color);
        if d < min {
            min = d;
            best = i;
        }
    }
    best
}

pub fn cluster(buffer: &PixelBuffer, config: &ClusterConfig) -> Result<Clustering, PatternError> {
    if config.k == 0 {
        return Err(PatternError::invalid("cluster count must be positive"));
    }
    if buffer.is_empty() {
        return Err(PatternError::invalid("cannot cluster an empty buffer"));
    }
    if config.k > buffer.len() {
        return Err(PatternError::invalid(format!(
            "cluster count {} exceeds the {} pixels in the buffer",
            config.k,
            buffer.len()
        )));
    }
    if config.max_scans == Some(0) {
        return Err(PatternError::invalid("scan cap must allow at least one scan"));
    }
    let start = std::time::Instant::now();
    let mut clusters = seed_clusters(buffer, config.k);
    let pixels = buffer.pixels();
    let mut lut: Vec<Option<usize>> = vec![None; pixels.len()];

    let mut scans = 0usize;
    loop {
        if let Some(cap) = config.max_scans {
            if scans >= cap {
                log::warn!(
                    "Clustering stopped after {} scans without converging (k={})",
                    scans,
                    config.k
                );
                return Err(PatternError::ConvergenceRisk { scans });
            }
        }
        scans += 1;

        let mut changed = 0usize;
        for (i, &pixel) in pixels.iter().enumerate() {
            let nearest = nearest_cluster(&clusters, pixel);
            if lut[i] == Some(nearest) {
                continue;
            }
            if config.mode == ClusterMode::Continuous {
                if let Some(previous) = lut[i] {
                    clusters[previous].remove_pixel(pixel);
                }
                clusters[nearest].add_pixel(pixel);
            }
            lut[i] = Some(nearest);
            changed += 1;
        }

        if config.mode == ClusterMode::Iterative {
            for cluster in &mut clusters {
                cluster.clear();
            }
            for (i, &pixel) in pixels.iter().enumerate() {
                if let Some(id) = lut[i] {
                    clusters[id].add_pixel(pixel);
                }
            }
        }

        log::debug!("Clustering scan {}: {} pixels moved", scans, changed);
        if changed == 0 {
            break;
        }
    }

    let mut owned = vec![0u64; clusters.len()];
    let mut out = Vec::with_capacity(pixels.len());
    for slot in &lut {
        // Every pixel is assigned during the first scan.
        let id = slot.unwrap_or(0);
        owned[id] += 1;
        out.push(clusters[id].mean());
    }

    let mut entries: Vec<ColorCount> = clusters
        .iter()
        .zip(owned.iter())
        .filter(|(_, &count)| count > 0)
        .map(|(cluster, &count)| ColorCount {
            color: cluster.mean(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count));

    log::debug!(
        "Clustered to {} clusters in {} scans in {} ms",
        config.k,
        scans,
        start.elapsed().as_millis()
    );

    Ok(Clustering {
        palette: Palette::new(entries),
        buffer: PixelBuffer::new(buffer.width(), buffer.height(), out)?,
        scans,
    })
}
