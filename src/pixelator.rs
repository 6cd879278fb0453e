//! Block-average downsampling.
//!
//! The buffer is tiled into `block_size × block_size` blocks from the origin.
//! Each block is replaced by the integer mean of its pixels. Edge blocks that
//! hang off the image still divide by the full `block_size²`, so they come out
//! slightly darker than their true mean; pattern output depends on that.

use crate::buffer::PixelBuffer;
use crate::color::Color;
use crate::error::PatternError;
use serde::{Deserialize, Serialize};

/// What to do with the `flatten_hint` passed to [`pixelate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlattenPolicy {
    /// Keep the raw block mean.
    #[default]
    PassThrough,
    /// Snap each channel to a power-of-two grid when the hint is in `1..=7`.
    Round,
}

/// Pixelate with the default pass-through flatten policy.
pub fn pixelate(
    buffer: &PixelBuffer,
    block_size: u32,
    flatten_hint: u32,
) -> Result<PixelBuffer, PatternError> {
    pixelate_with(buffer, block_size, flatten_hint, FlattenPolicy::PassThrough)
}

pub fn pixelate_with(
    buffer: &PixelBuffer,
    block_size: u32,
    flatten_hint: u32,
    policy: FlattenPolicy,
) -> Result<PixelBuffer, PatternError> {
    if block_size == 0 {
        return Err(PatternError::invalid("block size must be positive"));
    }
    let width = buffer.width();
    let height = buffer.height();
    let area = block_size as u64 * block_size as u64;

    let mut pixeled = PixelBuffer::filled(width, height, Color::BLACK)?;
    let mut blocks = 0usize;

    let mut y = 0u32;
    while y < height {
        let y_bound = y.saturating_add(block_size).min(height);
        let mut x = 0u32;
        while x < width {
            let x_bound = x.saturating_add(block_size).min(width);

            let (mut rav, mut gav, mut bav) = (0u64, 0u64, 0u64);
            for sy in y..y_bound {
                for sx in x..x_bound {
                    let c = buffer.get(sx, sy);
                    rav += c.red as u64;
                    gav += c.green as u64;
                    bav += c.blue as u64;
                }
            }
            // The mean of at most `area` u8 samples divided by `area` fits in u8.
            let mean = Color::rgb((rav / area) as u8, (gav / area) as u8, (bav / area) as u8);
            let color = match policy {
                FlattenPolicy::PassThrough => mean,
                FlattenPolicy::Round => flatten_color(mean, flatten_hint),
            };

            for sy in y..y_bound {
                for sx in x..x_bound {
                    pixeled.set(sx, sy, color);
                }
            }
            blocks += 1;
            x = x_bound;
        }
        y = y_bound;
    }

    log::debug!(
        "Pixelated {}x{} into {} blocks of {}px",
        width,
        height,
        blocks,
        block_size
    );
    Ok(pixeled)
}

/// Round each channel to the nearest multiple of `2^(amount + 1)` and step
/// one below it, so that 256 lands on 255. Amounts outside `1..=7` leave the
/// color untouched.
pub fn flatten_color(color: Color, amount: u32) -> Color {
    if !(1..=7).contains(&amount) {
        return color;
    }
    let factor = 1u32 << (amount + 1);
    let round = |c: u8| -> u8 {
        let snapped = ((c as f64 / factor as f64 + 0.5) as u32) * factor;
        snapped.saturating_sub(1).min(255) as u8
    };
    Color::rgb(round(color.red), round(color.green), round(color.blue))
}
