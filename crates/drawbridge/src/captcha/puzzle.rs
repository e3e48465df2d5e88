//! Puzzle challenge images.
//!
//! A 3x3 grid of numbered cells, one of which holds a marker. The numbers
//! match the hotbar keys, so the answer is the hotbar slot of the marked cell.

use image::{Luma, Rgb, RgbImage, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use rand::Rng;

use super::filters;
use super::generator::{IMAGE_SIZE, ImageGenerator, contrasting, merge, stamp};

pub const GRID: u32 = 3;
pub const CELLS: usize = (GRID * GRID) as usize;

impl ImageGenerator {
    /// Grid image with the marker in `target` (0-8, row-major)
    pub fn puzzle(&self, target: usize, rng: &mut impl Rng) -> RgbImage {
        debug_assert!(target < CELLS);
        let mut image = self.background.sample(rng);
        let cell = IMAGE_SIZE as f32 / GRID as f32;
        let ink = contrasting(&image, 0, 0, IMAGE_SIZE);

        for line in 1..GRID {
            let at = line as f32 * cell;
            for offset in [-0.5, 0.5] {
                draw_line_segment_mut(&mut image, (at + offset, 0.0), (at + offset, IMAGE_SIZE as f32), ink);
                draw_line_segment_mut(&mut image, (0.0, at + offset), (IMAGE_SIZE as f32, at + offset), ink);
            }
        }

        let mut foreground = RgbaImage::new(IMAGE_SIZE, IMAGE_SIZE);
        for index in 0..CELLS {
            let column = (index as u32 % GRID) as f32;
            let row = (index as u32 / GRID) as f32;
            let label = char::from_digit(index as u32 + 1, 10).unwrap_or('?');
            let mask = self.glyphs.render(label, rng.random_range(11.0..14.0));
            let left = (column * cell + 3.0) as i32;
            let top = (row * cell + 2.0) as i32;
            stamp(&mut foreground, &mask, left, top, ink);

            if index == target {
                let radius = rng.random_range(7..11);
                let center = (
                    (column * cell + cell * 0.6) as i32 + rng.random_range(-3..=3),
                    (row * cell + cell * 0.6) as i32 + rng.random_range(-3..=3),
                );
                let mut marker = image::GrayImage::new(IMAGE_SIZE, IMAGE_SIZE);
                draw_filled_circle_mut(&mut marker, center, radius, Luma([255]));
                let color = Rgb(ink.0.map(|c| c.saturating_add(rng.random_range(0..40))));
                stamp(&mut foreground, &marker, 0, 0, color);
            }
        }

        let foreground = filters::ripple(&foreground, 1.5, 1.5, 13.0);
        merge(&mut image, &foreground);
        filters::scratch(&mut image, rng.random_range(1..=3), 1, rng);
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::font::Glyphs;
    use crate::captcha::generator::Background;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn flat() -> ImageGenerator {
        ImageGenerator::new(
            Glyphs::Bitmap,
            Background::Picture(RgbImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, Rgb([30, 30, 30]))),
        )
    }

    /// Inked pixels inside one cell, ignoring the grid lines and labels
    fn marker_ink(image: &RgbImage, index: usize) -> usize {
        let cell = IMAGE_SIZE / GRID;
        let (x0, y0) = ((index as u32 % GRID) * cell, (index as u32 / GRID) * cell);
        let mut count = 0;
        for y in y0 + cell / 3..y0 + cell - 3 {
            for x in x0 + cell / 3..x0 + cell - 3 {
                if image.get_pixel(x, y).0[0] > 150 {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn test_marker_lands_in_target_cell() {
        let generator = flat();
        let mut rng = StdRng::seed_from_u64(5);
        for target in [0, 4, 8] {
            let image = generator.puzzle(target, &mut rng);
            let (best, _) = (0..CELLS)
                .map(|index| (index, marker_ink(&image, index)))
                .max_by_key(|(_, ink)| *ink)
                .unwrap();
            assert_eq!(best, target);
        }
    }
}
