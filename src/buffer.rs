use crate::color::Color;
use crate::error::PatternError;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

/// Rectangular row-major grid of colors. Dimensions are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, pixels: Vec<Color>) -> Result<Self, PatternError> {
        if width == 0 || height == 0 {
            return Err(PatternError::invalid(format!(
                "buffer dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(PatternError::invalid(format!(
                "buffer size mismatch: {}x{} needs {} pixels, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn filled(width: u32, height: u32, color: Color) -> Result<Self, PatternError> {
        Self::new(width, height, vec![color; width as usize * height as usize])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Panics when `(x, y)` is outside the buffer.
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        let idx = self.index(x, y);
        self.pixels[idx] = color;
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Color] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<Color> {
        self.pixels
    }

    pub fn from_image(img: &DynamicImage) -> Result<Self, PatternError> {
        let (width, height) = img.dimensions();
        let rgba = img.to_rgba8();
        let pixels = rgba.pixels().map(|p| Color::from(*p)).collect();
        Self::new(width, height, pixels)
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut raw = Vec::with_capacity(self.pixels.len() * 4);
        for c in &self.pixels {
            raw.extend_from_slice(&[c.red, c.green, c.blue, c.alpha]);
        }
        // Length always matches width * height * 4.
        RgbaImage::from_raw(self.width, self.height, raw)
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    pub fn from_rgba_image(img: &RgbaImage) -> Result<Self, PatternError> {
        let pixels = img.pixels().map(|p| Color::from(*p)).collect();
        Self::new(img.width(), img.height(), pixels)
    }

    /// Decode PNG, JPEG, etc. into a buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self, PatternError> {
        let img =
            image::load_from_memory(bytes).map_err(|e| PatternError::Decode(e.to_string()))?;
        Self::from_image(&img)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, PatternError> {
        let mut buf = Vec::new();
        {
            let mut cursor = std::io::Cursor::new(&mut buf);
            DynamicImage::ImageRgba8(self.to_rgba_image())
                .write_to(&mut cursor, ImageFormat::Png)
                .map_err(|e| PatternError::Encode(e.to_string()))?;
        }
        Ok(buf)
    }

    /// Shrink to fit `paper`, keeping the aspect ratio the way
    /// [`fit_to_page`] computes it. Returns a clone when nothing needs to change.
    pub fn resize_for_page(&self, paper: PaperSize) -> Result<Self, PatternError> {
        let (w, h) = fit_to_page(self.width, self.height, paper);
        if w == self.width && h == self.height {
            return Ok(self.clone());
        }
        if w == 0 || h == 0 {
            return Err(PatternError::invalid(format!(
                "image {}x{} cannot be fitted to the page without vanishing",
                self.width, self.height
            )));
        }
        let resized = image::imageops::resize(&self.to_rgba_image(), w, h, FilterType::Nearest);
        Self::from_rgba_image(&resized)
    }
}

/// Printable area in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperSize {
    pub width_mm: u32,
    pub height_mm: u32,
    pub width: u32,
    pub height: u32,
}

impl PaperSize {
    pub const A4: PaperSize = PaperSize {
        width_mm: 292,
        height_mm: 204,
        width: 578,
        height: 825,
    };
}

/// Repeatedly scale both sides by 9/10 until the width fits, then until the
/// height fits.
pub fn fit_to_page(width: u32, height: u32, paper: PaperSize) -> (u32, u32) {
    let shrink = |side: u32| (side as u64 * 9 / 10) as u32;
    let mut w = width;
    let mut h = height;
    while paper.width < w {
        w = shrink(w);
        h = shrink(h);
    }
    while paper.height < h {
        w = shrink(w);
        h = shrink(h);
    }
    (w, h)
}
