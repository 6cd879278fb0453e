//! Alphabetic stitch labels drawn over the most used palette colors.

use crate::buffer::PixelBuffer;
use crate::color::Color;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label characters in assignment order: A–Z then a–z.
pub const LABEL_ALPHABET: [char; 52] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j',
    'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Sampling stride of the label grid, in pixels.
pub const LABEL_STRIDE: u32 = 8;

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelEntry {
    pub label: char,
    pub color: Color,
}

/// Color → label for the top-ranked colors. Colors past the end of the
/// alphabet get no label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelAssignment {
    entries: Vec<LabelEntry>,
    by_color: HashMap<Color, char>,
}

impl LabelAssignment {
    pub fn from_ranked(ranked: &[Color]) -> Self {
        let mut assignment = Self::default();
        for (&color, &label) in ranked.iter().zip(LABEL_ALPHABET.iter()) {
            let key = color.opaque();
            if assignment.by_color.contains_key(&key) {
                continue;
            }
            assignment.by_color.insert(key, label);
            assignment.entries.push(LabelEntry { label, color: key });
        }
        if ranked.len() > LABEL_ALPHABET.len() {
            log::debug!(
                "{} ranked colors, only the first {} are labelled",
                ranked.len(),
                LABEL_ALPHABET.len()
            );
        }
        assignment
    }

    pub fn label_for(&self, color: Color) -> Option<char> {
        self.by_color.get(&color.opaque()).copied()
    }

    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Copy of `buffer` with labels drawn on an 8×8 grid. See [`annotate_with_legend`].
pub fn annotate(buffer: &PixelBuffer, ranked: &[Color]) -> PixelBuffer {
    annotate_with_legend(buffer, ranked).0
}

/// Sample `buffer` every 8 pixels in both directions. Where the sampled color
/// has a label, draw it twice: white with its baseline at (x+1, y+8), then
/// black at (x, y+7), which leaves a light outline readable on any color.
/// Samples are always read from the untouched input.
pub fn annotate_with_legend(
    buffer: &PixelBuffer,
    ranked: &[Color],
) -> (PixelBuffer, LabelAssignment) {
    let assignment = LabelAssignment::from_ranked(ranked);
    let mut canvas: RgbaImage = buffer.to_rgba_image();

    let mut drawn = 0usize;
    for y in (0..buffer.height()).step_by(LABEL_STRIDE as usize) {
        for x in (0..buffer.width()).step_by(LABEL_STRIDE as usize) {
            let Some(label) = assignment.label_for(buffer.get(x, y)) else {
                continue;
            };
            let (x, y) = (x as i32, y as i32);
            draw_glyph(&mut canvas, label, x + 1, y + 8, Color::WHITE);
            draw_glyph(&mut canvas, label, x, y + 7, Color::BLACK);
            drawn += 1;
        }
    }
    log::debug!("Drew {} labels for {} colors", drawn, assignment.len());

    // Canvas dimensions are the buffer's own.
    let annotated = PixelBuffer::from_rgba_image(&canvas).unwrap_or_else(|_| buffer.clone());
    (annotated, assignment)
}

/// Draw a 5×7 glyph whose bottom row sits just above `baseline_y`.
fn draw_glyph(canvas: &mut RgbaImage, label: char, left: i32, baseline_y: i32, color: Color) {
    let Some(glyph) = label_glyph(label) else {
        return;
    };
    let top = baseline_y - GLYPH_HEIGHT;
    let pixel: Rgba<u8> = color.into();
    for (row, row_bits) in glyph.iter().enumerate() {
        let bits = row_bits.as_bytes();
        debug_assert_eq!(bits.len(), GLYPH_WIDTH as usize);
        let mut col = 0usize;
        while col < bits.len() {
            if bits[col] != b'1' {
                col += 1;
                continue;
            }
            let start = col;
            while col < bits.len() && bits[col] == b'1' {
                col += 1;
            }
            // One rect per horizontal run; imageproc clips it to the canvas.
            draw_filled_rect_mut(
                canvas,
                Rect::at(left + start as i32, top + row as i32).of_size((col - start) as u32, 1),
                pixel,
            );
        }
    }
}

fn label_glyph(label: char) -> Option<[&'static str; 7]> {
    let glyph = match label {
        'A' => ["01110", "10001", "10001", "11111", "10001", "10001", "10001"],
        'B' => ["11110", "10001", "10001", "11110", "10001", "10001", "11110"],
        'C' => ["01111", "10000", "10000", "10000", "10000", "10000", "01111"],
        'D' => ["11110", "10001", "10001", "10001", "10001", "10001", "11110"],
        'E' => ["11111", "10000", "10000", "11110", "10000", "10000", "11111"],
        'F' => ["11111", "10000", "10000", "11110", "10000", "10000", "10000"],
        'G' => ["01111", "10000", "10000", "10011", "10001", "10001", "01111"],
        'H' => ["10001", "10001", "10001", "11111", "10001", "10001", "10001"],
        'I' => ["01110", "00100", "00100", "00100", "00100", "00100", "01110"],
        'J' => ["00111", "00010", "00010", "00010", "00010", "10010", "01100"],
        'K' => ["10001", "10010", "10100", "11000", "10100", "10010", "10001"],
        'L' => ["10000", "10000", "10000", "10000", "10000", "10000", "11111"],
        'M' => ["10001", "11011", "10101", "10101", "10001", "10001", "10001"],
        'N' => ["10001", "11001", "10101", "10011", "10001", "10001", "10001"],
        'O' => ["01110", "10001", "10001", "10001", "10001", "10001", "01110"],
        'P' => ["11110", "10001", "10001", "11110", "10000", "10000", "10000"],
        'Q' => ["01110", "10001", "10001", "10001", "10101", "10010", "01101"],
        'R' => ["11110", "10001", "10001", "11110", "10100", "10010", "10001"],
        'S' => ["01111", "10000", "10000", "01110", "00001", "00001", "11110"],
        'T' => ["11111", "00100", "00100", "00100", "00100", "00100", "00100"],
        'U' => ["10001", "10001", "10001", "10001", "10001", "10001", "01110"],
        'V' => ["10001", "10001", "10001", "10001", "10001", "01010", "00100"],
        'W' => ["10001", "10001", "10001", "10101", "10101", "10101", "01010"],
        'X' => ["10001", "10001", "01010", "00100", "01010", "10001", "10001"],
        'Y' => ["10001", "10001", "01010", "00100", "00100", "00100", "00100"],
        'Z' => ["11111", "00001", "00010", "00100", "01000", "10000", "11111"],
        'a' => ["00000", "00000", "01110", "00001", "01111", "10001", "01111"],
        'b' => ["10000", "10000", "10110", "11001", "10001", "10001", "11110"],
        'c' => ["00000", "00000", "01110", "10000", "10000", "10001", "01110"],
        'd' => ["00001", "00001", "01101", "10011", "10001", "10001", "01111"],
        'e' => ["00000", "00000", "01110", "10001", "11111", "10000", "01110"],
        'f' => ["00110", "01001", "01000", "11100", "01000", "01000", "01000"],
        'g' => ["00000", "01111", "10001", "10001", "01111", "00001", "01110"],
        'h' => ["10000", "10000", "10110", "11001", "10001", "10001", "10001"],
        'i' => ["00100", "00000", "01100", "00100", "00100", "00100", "01110"],
        'j' => ["00010", "00000", "00110", "00010", "00010", "10010", "01100"],
        'k' => ["10000", "10000", "10010", "10100", "11000", "10100", "10010"],
        'l' => ["01100", "00100", "00100", "00100", "00100", "00100", "01110"],
        'm' => ["00000", "00000", "11010", "10101", "10101", "10001", "10001"],
        'n' => ["00000", "00000", "10110", "11001", "10001", "10001", "10001"],
        'o' => ["00000", "00000", "01110", "10001", "10001", "10001", "01110"],
        'p' => ["00000", "00000", "11110", "10001", "11110", "10000", "10000"],
        'q' => ["00000", "00000", "01101", "10011", "01111", "00001", "00001"],
        'r' => ["00000", "00000", "10110", "11001", "10000", "10000", "10000"],
        's' => ["00000", "00000", "01110", "10000", "01110", "00001", "11110"],
        't' => ["01000", "01000", "11100", "01000", "01000", "01001", "00110"],
        'u' => ["00000", "00000", "10001", "10001", "10001", "10011", "01101"],
        'v' => ["00000", "00000", "10001", "10001", "10001", "01010", "00100"],
        'w' => ["00000", "00000", "10001", "10001", "10101", "10101", "01010"],
        'x' => ["00000", "00000", "10001", "01010", "00100", "01010", "10001"],
        'y' => ["00000", "00000", "10001", "10001", "01111", "00001", "01110"],
        'z' => ["00000", "00000", "11111", "00010", "00100", "01000", "11111"],
        _ => return None,
    };
    Some(glyph)
}
