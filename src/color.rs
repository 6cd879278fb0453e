//! Color value type and the distance functions every stage agrees on.
//!
//! `redmean_distance` is the perceptual metric used for merging and remapping.
//! `cluster_distance` is the cheaper integer metric the centroid clusterer uses
//! internally; the two are not numerically comparable.

use palette::{color_difference::Ciede2000, white_point::D65, FromColor, Lab, Srgb};
use serde::{Deserialize, Serialize};

/// An 8-bit RGBA color. Alpha travels with the pixel but never takes part in
/// averaging or distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 255,
        }
    }

    pub const fn rgba(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Same RGB with alpha forced opaque. Frequency maps and label lookups key
    /// on this so that colors compare by exact RGB value.
    pub const fn opaque(self) -> Self {
        Self::rgb(self.red, self.green, self.blue)
    }

    pub fn channels(self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }

    /// Format as `#RRGGBB`.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }

    /// Parse `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::rgb(r, g, b))
    }

    fn to_lab(self) -> Lab<D65, f32> {
        let srgb = Srgb::new(
            self.red as f32 / 255.0,
            self.green as f32 / 255.0,
            self.blue as f32 / 255.0,
        );
        Lab::from_color(srgb)
    }
}

impl From<[u8; 3]> for Color {
    fn from(rgb: [u8; 3]) -> Self {
        Self::rgb(rgb[0], rgb[1], rgb[2])
    }
}

impl From<image::Rgba<u8>> for Color {
    fn from(px: image::Rgba<u8>) -> Self {
        Self::rgba(px[0], px[1], px[2], px[3])
    }
}

impl From<Color> for image::Rgba<u8> {
    fn from(color: Color) -> Self {
        image::Rgba([color.red, color.green, color.blue, color.alpha])
    }
}

/// Distance used to decide how different two colors look.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorMetric {
    /// Redmean-weighted Euclidean distance in sRGB.
    #[default]
    Redmean,
    /// CIEDE2000 Delta-E in CIE Lab. Values live on a much smaller scale than
    /// redmean, so thresholds do not carry over between the two.
    Ciede2000,
}

impl ColorMetric {
    pub fn distance(self, a: Color, b: Color) -> f64 {
        match self {
            ColorMetric::Redmean => redmean_distance(a, b),
            ColorMetric::Ciede2000 => a.to_lab().difference(b.to_lab()) as f64,
        }
    }
}

/// Redmean distance: `rmean` is the integer mean of the two red channels,
/// red weighted by `2 + rmean/256`, green by 4, blue by `2 + (255 - rmean)/256`.
pub fn redmean_distance(a: Color, b: Color) -> f64 {
    let rmean = ((a.red as i32 + b.red as i32) / 2) as f64;
    let r = (a.red as i32 - b.red as i32) as f64;
    let g = (a.green as i32 - b.green as i32) as f64;
    let b_delta = (a.blue as i32 - b.blue as i32) as f64;
    let weight_r = 2.0 + rmean / 256.0;
    let weight_g = 4.0;
    let weight_b = 2.0 + (255.0 - rmean) / 256.0;
    (weight_r * r * r + weight_g * g * g + weight_b * b_delta * b_delta).sqrt()
}

/// Mean absolute channel difference, integer-truncated.
pub fn cluster_distance(a: Color, b: Color) -> u32 {
    let rx = (a.red as i32 - b.red as i32).unsigned_abs();
    let gx = (a.green as i32 - b.green as i32).unsigned_abs();
    let bx = (a.blue as i32 - b.blue as i32).unsigned_abs();
    (rx + gx + bx) / 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_conversion() {
        assert_eq!(Color::from_hex("#FF0000"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::from_hex("00ff00"), Some(Color::rgb(0, 255, 0)));
        assert_eq!(Color::from_hex("#0000F"), None);
        assert_eq!(Color::from_hex("#GG0000"), None);
        assert_eq!(Color::rgb(255, 128, 0).to_hex(), "#FF8000");
    }

    #[test]
    fn redmean_matches_hand_computed_values() {
        let red = Color::rgb(255, 0, 0);
        let black = Color::BLACK;
        // rmean = 127, weight_r = 2 + 127/256
        let expected = ((2.0 + 127.0 / 256.0) * 255.0f64 * 255.0).sqrt();
        assert!((redmean_distance(red, black) - expected).abs() < 1e-9);

        let green = Color::rgb(0, 10, 0);
        assert!((redmean_distance(black, green) - 20.0).abs() < 1e-9);
        assert_eq!(redmean_distance(red, red), 0.0);
    }

    #[test]
    fn redmean_is_symmetric_and_ignores_alpha() {
        let a = Color::rgba(200, 30, 90, 10);
        let b = Color::rgba(20, 130, 9, 255);
        assert_eq!(redmean_distance(a, b), redmean_distance(b, a));
        assert_eq!(redmean_distance(a, b), redmean_distance(a.opaque(), b));
    }

    #[test]
    fn cluster_distance_truncates() {
        let a = Color::rgb(10, 20, 30);
        let b = Color::rgb(11, 22, 30);
        assert_eq!(cluster_distance(a, b), 1);
        assert_eq!(cluster_distance(Color::BLACK, Color::WHITE), 255);
    }

    #[test]
    fn ciede2000_separates_red_from_black() {
        let metric = ColorMetric::Ciede2000;
        let red = Color::rgb(255, 0, 0);
        assert!(metric.distance(red, Color::BLACK) > 20.0);
        assert!(metric.distance(red, red) < 1e-3);
    }
}
