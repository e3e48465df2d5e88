//! Map color palettes and nearest-color quantization.
//!
//! A map pixel is `base * 4 + shade`, where the shade scales the base color
//! by one of four fixed multipliers. Index 0..=3 is transparent and never
//! produced here.

use std::collections::HashMap;
use std::sync::LazyLock;

use image::RgbImage;

/// Base map colors, starting at base index 1
const BASE_COLORS: [[u8; 3]; 35] = [
    [127, 178, 56],
    [247, 233, 163],
    [167, 167, 167],
    [255, 0, 0],
    [160, 160, 255],
    [167, 167, 167],
    [0, 124, 0],
    [255, 255, 255],
    [164, 168, 184],
    [151, 109, 77],
    [112, 112, 112],
    [64, 64, 255],
    [143, 119, 72],
    [255, 252, 245],
    [216, 127, 51],
    [178, 76, 216],
    [102, 153, 216],
    [229, 229, 51],
    [127, 204, 25],
    [242, 127, 165],
    [76, 76, 76],
    [153, 153, 153],
    [76, 127, 153],
    [127, 63, 178],
    [51, 76, 178],
    [102, 76, 51],
    [102, 127, 51],
    [153, 51, 51],
    [25, 25, 25],
    [250, 238, 77],
    [92, 219, 213],
    [74, 128, 255],
    [0, 217, 58],
    [129, 86, 49],
    [112, 2, 0],
];

const SHADES: [u32; 4] = [180, 220, 255, 135];

/// Base colors a 1.7 client knows
const LEGACY_BASES: usize = 13;

static MODERN: LazyLock<Palette> = LazyLock::new(|| Palette::build(BASE_COLORS.len(), 4));
static LEGACY: LazyLock<Palette> = LazyLock::new(|| Palette::build(LEGACY_BASES, 3));

#[derive(Debug)]
pub struct Palette {
    entries: Vec<(u8, [u8; 3])>,
}

impl Palette {
    fn build(bases: usize, shades: usize) -> Self {
        let mut entries = Vec::with_capacity(bases * shades);
        for (base, rgb) in BASE_COLORS.iter().take(bases).enumerate() {
            for (shade, multiplier) in SHADES.iter().take(shades).enumerate() {
                let index = ((base + 1) * 4 + shade) as u8;
                let color = rgb.map(|c| (c as u32 * multiplier / 255) as u8);
                entries.push((index, color));
            }
        }
        Self { entries }
    }

    /// 1.8+ palette
    pub fn modern() -> &'static Palette {
        &MODERN
    }

    /// 1.7 palette
    pub fn legacy() -> &'static Palette {
        &LEGACY
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Color shown for a map index, if this palette has it
    pub fn color(&self, index: u8) -> Option<[u8; 3]> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == index)
            .map(|(_, rgb)| *rgb)
    }

    /// Closest palette index under a red-mean weighted distance
    pub fn nearest(&self, rgb: [u8; 3]) -> u8 {
        let mut best = (u32::MAX, self.entries[0].0);
        for (index, candidate) in &self.entries {
            let distance = distance(rgb, *candidate);
            if distance < best.0 {
                best = (distance, *index);
                if distance == 0 {
                    break;
                }
            }
        }
        best.1
    }

    /// Row-major index buffer for the whole image
    pub fn quantize(&self, image: &RgbImage) -> Vec<u8> {
        let mut cache: HashMap<[u8; 3], u8> = HashMap::new();
        image
            .pixels()
            .map(|pixel| *cache.entry(pixel.0).or_insert_with(|| self.nearest(pixel.0)))
            .collect()
    }
}

fn distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    let mean = (a[0] as u32 + b[0] as u32) / 2;
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    let (dr, dg, db) = ((dr * dr) as u32, (dg * dg) as u32, (db * db) as u32);
    (((512 + mean) * dr) >> 8) + 4 * dg + (((767 - mean) * db) >> 8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_palette_sizes() {
        assert_eq!(Palette::modern().len(), 140);
        assert_eq!(Palette::legacy().len(), 39);
    }

    #[test]
    fn test_palette_colors_map_to_themselves() {
        for palette in [Palette::modern(), Palette::legacy()] {
            for (index, rgb) in &palette.entries {
                let found = palette.nearest(*rgb);
                // duplicate base colors (cloth and iron) share an rgb value
                assert_eq!(palette.color(found), Some(*rgb), "index {index}");
            }
        }
    }

    #[test]
    fn test_legacy_indices_stay_in_range() {
        let image = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 200]));
        for index in Palette::legacy().quantize(&image) {
            assert!((4..56).contains(&index));
            assert_ne!(index % 4, 3);
        }
    }

    #[test]
    fn test_quantize_is_row_major() {
        let mut image = RgbImage::from_pixel(4, 2, Rgb([255, 255, 255]));
        image.put_pixel(3, 0, Rgb([0, 124, 0]));
        let buffer = Palette::modern().quantize(&image);
        assert_eq!(buffer.len(), 8);
        // foliage, full shade
        assert_eq!(buffer[3], 7 * 4 + 2);
        // snow, full shade
        assert_eq!(buffer[0], 8 * 4 + 2);
    }
}
