//! Frequency-ranked greedy palette merging.
//!
//! Colors are ranked by how many pixels use them. Walking the ranking from the
//! most used color down, every later color closer than the threshold is folded
//! into the current one: its count is added and its own count zeroed. Zeroed
//! entries stay in the ranking so positions never shift during the pass.

use crate::buffer::PixelBuffer;
use crate::color::{Color, ColorMetric};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A color with the number of pixels it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorCount {
    pub color: Color,
    pub count: u64,
}

/// Exact-RGB color occurrence counts, kept in first-seen order so that equal
/// counts always rank the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorFrequencyMap {
    entries: Vec<ColorCount>,
    index: HashMap<Color, usize>,
}

impl ColorFrequencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every pixel of `buffer` in row-major order.
    pub fn from_buffer(buffer: &PixelBuffer) -> Self {
        let mut map = Self::new();
        for &pixel in buffer.pixels() {
            map.add(pixel, 1);
        }
        map
    }

    /// Build from precomputed counts. Repeated colors accumulate.
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (Color, u64)>,
    {
        let mut map = Self::new();
        for (color, count) in counts {
            map.add(color, count);
        }
        map
    }

    pub fn add(&mut self, color: Color, count: u64) {
        let key = color.opaque();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].count += count,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(ColorCount { color: key, count });
            }
        }
    }

    pub fn count(&self, color: Color) -> u64 {
        self.index
            .get(&color.opaque())
            .map(|&i| self.entries[i].count)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn entries(&self) -> &[ColorCount] {
        &self.entries
    }

    /// Entries sorted by descending count; ties keep first-seen order.
    pub fn ranked(&self) -> Vec<ColorCount> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked
    }
}

/// Ordered list of representative colors, most used first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Palette {
    pub entries: Vec<ColorCount>,
}

impl Palette {
    pub fn new(entries: Vec<ColorCount>) -> Self {
        Self { entries }
    }

    /// Palette with a zero weight for every color, in the given order.
    pub fn from_colors<I: IntoIterator<Item = Color>>(colors: I) -> Self {
        Self {
            entries: colors
                .into_iter()
                .map(|color| ColorCount { color, count: 0 })
                .collect(),
        }
    }

    pub fn colors(&self) -> Vec<Color> {
        self.entries.iter().map(|e| e.color).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColorCount> {
        self.entries.iter()
    }
}

/// How aggressively to merge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThresholdMode {
    /// Merge colors closer than this distance.
    Fixed(f64),
    /// Standard deviation of the color counts divided by `divisor`. Images whose
    /// colors are used very unevenly merge harder.
    FrequencySpread { divisor: f64 },
}

impl Default for ThresholdMode {
    fn default() -> Self {
        ThresholdMode::Fixed(10.0)
    }
}

impl ThresholdMode {
    pub fn resolve(&self, map: &ColorFrequencyMap) -> f64 {
        match *self {
            ThresholdMode::Fixed(threshold) => threshold,
            ThresholdMode::FrequencySpread { divisor } => {
                if divisor <= 0.0 {
                    log::warn!("Non-positive spread divisor {}, merging disabled", divisor);
                    return 0.0;
                }
                count_std_dev(map) / divisor
            }
        }
    }
}

/// Population standard deviation of the counts in `map`.
pub fn count_std_dev(map: &ColorFrequencyMap) -> f64 {
    let n = map.len();
    if n == 0 {
        return 0.0;
    }
    let mean = map.total() as f64 / n as f64;
    let sum_sq: f64 = map
        .entries()
        .iter()
        .map(|e| {
            let d = e.count as f64 - mean;
            d * d
        })
        .sum();
    (sum_sq / n as f64).sqrt()
}

/// Result of one merge pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reduction {
    /// Surviving colors, descending by merged count.
    pub palette: Palette,
    /// Every distinct color with its original count, in ranking order.
    pub before: Vec<ColorCount>,
    /// Surviving colors with merged counts. Same content as `palette`.
    pub after: Vec<ColorCount>,
    pub threshold: f64,
}

/// Count colors in `buffer` and merge them.
pub fn reduce_buffer(buffer: &PixelBuffer, threshold: f64, metric: ColorMetric) -> Reduction {
    reduce(&ColorFrequencyMap::from_buffer(buffer), threshold, metric)
}

pub fn reduce(map: &ColorFrequencyMap, threshold: f64, metric: ColorMetric) -> Reduction {
    let before = map.ranked();
    let mut counts: Vec<u64> = before.iter().map(|e| e.count).collect();

    let mut merges = 0usize;
    for i in 0..before.len() {
        if counts[i] == 0 {
            continue;
        }
        for j in (i + 1)..before.len() {
            if counts[j] == 0 {
                continue;
            }
            if metric.distance(before[j].color, before[i].color) < threshold {
                counts[i] += counts[j];
                counts[j] = 0;
                merges += 1;
            }
        }
    }

    let mut after: Vec<ColorCount> = before
        .iter()
        .zip(counts.iter())
        .filter(|(_, &count)| count > 0)
        .map(|(entry, &count)| ColorCount {
            color: entry.color,
            count,
        })
        .collect();
    after.sort_by(|a, b| b.count.cmp(&a.count));

    log::debug!(
        "Palette reduction: {} colors -> {} ({} merges, threshold {:.2})",
        before.len(),
        after.len(),
        merges,
        threshold
    );

    Reduction {
        palette: Palette::new(after.clone()),
        before,
        after,
        threshold,
    }
}

/// Run one independent reduction per threshold on the rayon pool. Results come
/// back in `thresholds` order.
pub fn preview_thresholds(
    map: &ColorFrequencyMap,
    thresholds: &[f64],
    metric: ColorMetric,
) -> Vec<Reduction> {
    thresholds
        .par_iter()
        .map(|&threshold| reduce(map, threshold, metric))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::redmean_distance;

    const A: Color = Color::rgb(200, 40, 40);
    const B: Color = Color::rgb(203, 42, 40);
    const C: Color = Color::rgb(20, 40, 220);

    fn abc() -> ColorFrequencyMap {
        ColorFrequencyMap::from_counts([(A, 10), (B, 9), (C, 1)])
    }

    #[test]
    fn merges_close_colors_into_the_more_frequent_one() {
        let threshold = 20.0;
        assert!(redmean_distance(A, B) < threshold);
        assert!(redmean_distance(A, C) > threshold);

        let reduction = reduce(&abc(), threshold, ColorMetric::Redmean);
        assert_eq!(
            reduction.after,
            vec![
                ColorCount { color: A, count: 19 },
                ColorCount { color: C, count: 1 }
            ]
        );
        assert_eq!(reduction.palette.colors(), vec![A, C]);
        assert_eq!(
            reduction.before,
            vec![
                ColorCount { color: A, count: 10 },
                ColorCount { color: B, count: 9 },
                ColorCount { color: C, count: 1 }
            ]
        );
    }

    #[test]
    fn total_count_is_conserved() {
        let map = ColorFrequencyMap::from_counts((0..40u8).map(|i| {
            (Color::rgb(i * 6, 255 - i * 3, i), (i as u64 % 7) + 1)
        }));
        for threshold in [0.0, 5.0, 30.0, 120.0, 10_000.0] {
            let reduction = reduce(&map, threshold, ColorMetric::Redmean);
            assert_eq!(reduction.palette.total_count(), map.total());
        }
    }

    #[test]
    fn no_two_survivors_are_closer_than_threshold_to_their_absorber() {
        let map = ColorFrequencyMap::from_counts((0..30u8).map(|i| {
            (Color::rgb(i * 8, i * 4, 255 - i * 8), 30 - i as u64)
        }));
        let threshold = 25.0;
        let reduction = reduce(&map, threshold, ColorMetric::Redmean);
        let survivors = reduction.palette.colors();
        // every survivor earlier in the ranking swallowed anything near it
        for (i, a) in survivors.iter().enumerate() {
            for b in survivors.iter().skip(i + 1) {
                let rank_a = reduction.before.iter().position(|e| e.color == *a);
                let rank_b = reduction.before.iter().position(|e| e.color == *b);
                let (first, second) = if rank_a < rank_b { (a, b) } else { (b, a) };
                assert!(
                    redmean_distance(*first, *second) >= threshold,
                    "{:?} and {:?} both survived",
                    first,
                    second
                );
            }
        }
    }

    #[test]
    fn zeroed_entries_do_not_absorb_later_colors() {
        // B merges into A; C is close to B but not to A, so C must survive.
        let a = Color::rgb(100, 100, 100);
        let b = Color::rgb(100, 104, 100);
        let c = Color::rgb(100, 108, 100);
        let map = ColorFrequencyMap::from_counts([(a, 5), (b, 4), (c, 3)]);
        let threshold = 9.0;
        assert!(redmean_distance(a, b) < threshold);
        assert!(redmean_distance(b, c) < threshold);
        assert!(redmean_distance(a, c) >= threshold);

        let reduction = reduce(&map, threshold, ColorMetric::Redmean);
        assert_eq!(
            reduction.after,
            vec![
                ColorCount { color: a, count: 9 },
                ColorCount { color: c, count: 3 }
            ]
        );
    }

    #[test]
    fn single_color_is_its_own_palette() {
        let map = ColorFrequencyMap::from_counts([(A, 4)]);
        let reduction = reduce(&map, 1000.0, ColorMetric::Redmean);
        assert_eq!(reduction.after, vec![ColorCount { color: A, count: 4 }]);
    }

    #[test]
    fn equal_counts_rank_in_first_seen_order() {
        let pixels = vec![C, A, A, C, B, B];
        let buf = PixelBuffer::new(3, 2, pixels).unwrap();
        let map = ColorFrequencyMap::from_buffer(&buf);
        let ranked: Vec<Color> = map.ranked().iter().map(|e| e.color).collect();
        assert_eq!(ranked, vec![C, A, B]);
    }

    #[test]
    fn frequency_map_keys_ignore_alpha() {
        let map = ColorFrequencyMap::from_counts([
            (Color::rgba(1, 2, 3, 0), 2),
            (Color::rgba(1, 2, 3, 255), 3),
        ]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.count(Color::rgb(1, 2, 3)), 5);
    }

    #[test]
    fn frequency_spread_threshold() {
        let map = ColorFrequencyMap::from_counts([(A, 10), (B, 30)]);
        assert_eq!(count_std_dev(&map), 10.0);
        let threshold = ThresholdMode::FrequencySpread { divisor: 4.0 }.resolve(&map);
        assert_eq!(threshold, 2.5);
        assert_eq!(ThresholdMode::Fixed(7.0).resolve(&map), 7.0);
        assert_eq!(
            ThresholdMode::FrequencySpread { divisor: 0.0 }.resolve(&map),
            0.0
        );
    }

    #[test]
    fn preview_keeps_threshold_order() {
        let thresholds = [0.0, 20.0, 1000.0];
        let previews = preview_thresholds(&abc(), &thresholds, ColorMetric::Redmean);
        let sizes: Vec<usize> = previews.iter().map(|r| r.palette.len()).collect();
        assert_eq!(sizes, vec![3, 2, 1]);
        assert_eq!(previews[2].after, vec![ColorCount { color: A, count: 20 }]);
    }
}
