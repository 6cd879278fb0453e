use crate::buffer::PixelBuffer;
use crate::color::{Color, ColorMetric};
use crate::error::PatternError;
use crate::reduction::Palette;

/// Closest color in `colors`; the first of several equally close entries wins.
pub fn nearest_color(color: Color, colors: &[Color], metric: ColorMetric) -> Option<Color> {
    let mut best: Option<(Color, f64)> = None;
    for &candidate in colors {
        let d = metric.distance(color, candidate);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((candidate, d)),
        }
    }
    best.map(|(c, _)| c)
}

/// Replace every pixel with its nearest palette color, in place.
pub fn remap(
    mut buffer: PixelBuffer,
    palette: &Palette,
    metric: ColorMetric,
) -> Result<PixelBuffer, PatternError> {
    if palette.is_empty() {
        return Err(PatternError::invalid("cannot remap onto an empty palette"));
    }
    let colors = palette.colors();
    log::debug!(
        "Remapping {} pixels onto {} colors",
        buffer.len(),
        colors.len()
    );

    // Pixelated buffers repeat each color many times over.
    let mut last: Option<(Color, Color)> = None;
    for pixel in buffer.pixels_mut() {
        let source = *pixel;
        let target = match last {
            Some((from, to)) if from.opaque() == source.opaque() => to,
            _ => {
                let to = nearest_color(source, &colors, metric).unwrap_or(colors[0]);
                last = Some((source, to));
                to
            }
        };
        *pixel = target;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pixel_becomes_a_palette_member() {
        let pixels: Vec<Color> = (0..64u8)
            .map(|i| Color::rgb(i * 4, 255 - i * 4, ((i as u32 * 37) % 255) as u8))
            .collect();
        let buf = PixelBuffer::new(8, 8, pixels).unwrap();
        let palette = Palette::from_colors([
            Color::rgb(255, 0, 0),
            Color::rgb(0, 255, 0),
            Color::rgb(0, 0, 255),
            Color::rgb(128, 128, 128),
        ]);
        let out = remap(buf, &palette, ColorMetric::Redmean).unwrap();
        let colors = palette.colors();
        assert!(out.pixels().iter().all(|p| colors.contains(p)));
    }

    #[test]
    fn ties_go_to_the_first_palette_entry() {
        let gray = Color::rgb(100, 100, 100);
        let up = Color::rgb(100, 110, 100);
        let down = Color::rgb(100, 90, 100);
        assert_eq!(
            nearest_color(gray, &[up, down], ColorMetric::Redmean),
            Some(up)
        );
        assert_eq!(
            nearest_color(gray, &[down, up], ColorMetric::Redmean),
            Some(down)
        );
        assert_eq!(nearest_color(gray, &[], ColorMetric::Redmean), None);
    }

    #[test]
    fn output_is_the_exact_palette_color() {
        let buf = PixelBuffer::filled(2, 1, Color::rgba(250, 5, 5, 40)).unwrap();
        let palette = Palette::from_colors([Color::WHITE, Color::rgb(255, 0, 0)]);
        let out = remap(buf, &palette, ColorMetric::Redmean).unwrap();
        assert_eq!(out.get(1, 0), Color::rgb(255, 0, 0));
    }

    #[test]
    fn empty_palette_is_rejected() {
        let buf = PixelBuffer::filled(2, 2, Color::WHITE).unwrap();
        assert!(matches!(
            remap(buf, &Palette::default(), ColorMetric::Redmean),
            Err(PatternError::InvalidArgument(_))
        ));
    }
}
