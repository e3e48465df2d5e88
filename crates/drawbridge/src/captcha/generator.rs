//! CAPTCHA image generation.
//!
//! Images are 128x128 so they fill one map. A code image draws the answer
//! with per-character rotation, scale and an offset outline on top of a
//! background texture, then distorts the result.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use rand::Rng;

use super::filters;
use super::font::Glyphs;
use crate::protocol::packets::map::MAP_SIZE;

pub const IMAGE_SIZE: u32 = MAP_SIZE as u32;

/// Background texture source
#[derive(Debug)]
pub enum Background {
    /// Random crops of a loaded picture
    Picture(RgbImage),
    /// Fractal value noise between two random colors
    Noise,
}

impl Background {
    /// Configured picture, or noise when none is set or it fails to load
    pub fn from_path(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::Noise;
        };
        match image::open(path) {
            Ok(picture) => {
                let mut picture = picture.to_rgb8();
                if picture.width() < IMAGE_SIZE || picture.height() < IMAGE_SIZE {
                    picture = imageops::resize(&picture, IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle);
                }
                Self::Picture(picture)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Falling back to generated backgrounds");
                Self::Noise
            }
        }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> RgbImage {
        match self {
            Self::Picture(picture) => {
                let x = rng.random_range(0..=picture.width() - IMAGE_SIZE);
                let y = rng.random_range(0..=picture.height() - IMAGE_SIZE);
                imageops::crop_imm(picture, x, y, IMAGE_SIZE, IMAGE_SIZE).to_image()
            }
            Self::Noise => fractal_noise(IMAGE_SIZE, rng),
        }
    }
}

/// Fractal Brownian motion over value noise, 4 octaves with H = 1.15
fn fractal_noise(size: u32, rng: &mut impl Rng) -> RgbImage {
    const OCTAVES: u32 = 4;
    const H: f32 = 1.15;
    let low: [u8; 3] = [rng.random(), rng.random(), rng.random()];
    let high: [u8; 3] = low.map(|c| c.wrapping_add(rng.random_range(96..160)));

    let mut field = vec![0f32; (size * size) as usize];
    let mut amplitude = 1.0;
    let mut total = 0.0;
    for octave in 0..OCTAVES {
        let cells = 4u32 << octave;
        let lattice: Vec<f32> = (0..(cells + 1) * (cells + 1)).map(|_| rng.random()).collect();
        let at = |gx: u32, gy: u32| lattice[(gy * (cells + 1) + gx) as usize];
        for y in 0..size {
            for x in 0..size {
                let fx = x as f32 * cells as f32 / size as f32;
                let fy = y as f32 * cells as f32 / size as f32;
                let (gx, gy) = (fx as u32, fy as u32);
                let (tx, ty) = (smooth(fx.fract()), smooth(fy.fract()));
                let top = lerp(at(gx, gy), at(gx + 1, gy), tx);
                let bottom = lerp(at(gx, gy + 1), at(gx + 1, gy + 1), tx);
                field[(y * size + x) as usize] += amplitude * lerp(top, bottom, ty);
            }
        }
        total += amplitude;
        amplitude *= 2f32.powf(-H);
    }

    RgbImage::from_fn(size, size, |x, y| {
        let t = field[(y * size + x) as usize] / total;
        Rgb([0, 1, 2].map(|i| lerp(low[i] as f32, high[i] as f32, t) as u8))
    })
}

fn smooth(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Inverse of the mean color under a region, pushed away from mid-gray
pub(super) fn contrasting(background: &RgbImage, x: u32, y: u32, side: u32) -> Rgb<u8> {
    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for py in y..(y + side).min(background.height()) {
        for px in x..(x + side).min(background.width()) {
            let pixel = background.get_pixel(px, py);
            for (acc, channel) in sum.iter_mut().zip(pixel.0) {
                *acc += channel as u64;
            }
            count += 1;
        }
    }
    let mean = sum.map(|s| (s / count.max(1)) as u8);
    let luma = (mean[0] as u32 * 299 + mean[1] as u32 * 587 + mean[2] as u32 * 114) / 1000;
    let inverse = mean.map(|c| 255 - c);
    // a mid-gray background inverts to itself
    if (96..160).contains(&luma) {
        return if luma < 128 { Rgb([250, 250, 250]) } else { Rgb([10, 10, 10]) };
    }
    Rgb(inverse)
}

/// Pastes a coverage mask onto `canvas`, top-left at `(x, y)`
pub(super) fn stamp(canvas: &mut RgbaImage, mask: &GrayImage, x: i32, y: i32, color: Rgb<u8>) {
    for (mx, my, coverage) in mask.enumerate_pixels() {
        let alpha = coverage.0[0];
        if alpha == 0 {
            continue;
        }
        let (px, py) = (x + mx as i32, y + my as i32);
        if px < 0 || py < 0 || px >= canvas.width() as i32 || py >= canvas.height() as i32 {
            continue;
        }
        let target = canvas.get_pixel_mut(px as u32, py as u32);
        if alpha >= target.0[3] {
            *target = Rgba([color.0[0], color.0[1], color.0[2], alpha]);
        }
    }
}

/// Alpha-blends `foreground` over `background`
pub fn merge(background: &mut RgbImage, foreground: &RgbaImage) {
    for (pixel, over) in background.pixels_mut().zip(foreground.pixels()) {
        let alpha = over.0[3] as u32;
        if alpha == 0 {
            continue;
        }
        for i in 0..3 {
            let blended = (over.0[i] as u32 * alpha + pixel.0[i] as u32 * (255 - alpha)) / 255;
            pixel.0[i] = blended as u8;
        }
    }
}

/// Draws challenge images; the puzzle variant lives in `puzzle.rs`
#[derive(Debug)]
pub struct ImageGenerator {
    pub(super) glyphs: Glyphs,
    pub(super) background: Background,
}

impl ImageGenerator {
    pub fn new(glyphs: Glyphs, background: Background) -> Self {
        Self { glyphs, background }
    }

    /// Distorted rendering of a text answer
    pub fn code(&self, answer: &str, rng: &mut impl Rng) -> RgbImage {
        let mut image = self.background.sample(rng);
        let mut foreground = RgbaImage::new(IMAGE_SIZE, IMAGE_SIZE);

        let count = answer.chars().count().max(1) as f32;
        let margin = 10.0;
        let advance = (IMAGE_SIZE as f32 - margin * 2.0) / count;
        let baseline = IMAGE_SIZE as f32 / 2.0 + rng.random_range(-8.0..8.0);
        let mut angle = 0f32;

        for (i, c) in answer.chars().enumerate() {
            let size = rng.random_range(32.0..40.0);
            angle += (6 - rng.random_range(0..12)) as f32;
            let mask = self.glyphs.render(c, size);
            let mask = rotate_about_center(&mask, angle.to_radians(), Interpolation::Bilinear, image::Luma([0]));

            let center_x = margin + advance * (i as f32 + 0.5) + rng.random_range(-2.0..2.0);
            let center_y = baseline + rng.random_range(-4.0..4.0);
            let left = (center_x - mask.width() as f32 / 2.0) as i32;
            let top = (center_y - mask.height() as f32 / 2.0) as i32;

            let color = contrasting(&image, left.max(0) as u32, top.max(0) as u32, mask.width());
            let outline = Rgb(color.0.map(|c| 255 - c));
            let shift = rng.random_range(1..=2);
            stamp(&mut foreground, &mask, left + shift, top + shift, outline);
            stamp(&mut foreground, &mask, left, top, color);
        }

        let foreground = filters::ripple(
            &foreground,
            rng.random_range(1.5..3.0),
            rng.random_range(1.5..3.0),
            13.0,
        );
        merge(&mut image, &foreground);
        filters::circle_inverse(&mut image, rng.random_range(1..=3), 6, 10, rng);
        filters::scratch(&mut image, rng.random_range(2..=4), 2, rng);
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_noise_background_is_map_sized() {
        let mut rng = StdRng::seed_from_u64(1);
        let background = Background::Noise.sample(&mut rng);
        assert_eq!(background.dimensions(), (IMAGE_SIZE, IMAGE_SIZE));
        let first = *background.get_pixel(0, 0);
        assert!(background.pixels().any(|p| *p != first));
    }

    #[test]
    fn test_picture_background_crops() {
        let picture = RgbImage::from_fn(300, 200, |x, y| Rgb([x as u8, y as u8, 7]));
        let mut rng = StdRng::seed_from_u64(2);
        let crop = Background::Picture(picture).sample(&mut rng);
        assert_eq!(crop.dimensions(), (IMAGE_SIZE, IMAGE_SIZE));
        assert!(crop.pixels().all(|p| p.0[2] == 7));
    }

    #[test]
    fn test_missing_background_falls_back_to_noise() {
        let background = Background::from_path(Some(Path::new("/nonexistent/background.png")));
        assert!(matches!(background, Background::Noise));
    }

    #[test]
    fn test_generate_changes_background() {
        let generator = ImageGenerator::new(Glyphs::Bitmap, Background::Picture(RgbImage::from_pixel(
            IMAGE_SIZE,
            IMAGE_SIZE,
            Rgb([20, 20, 20]),
        )));
        let mut rng = StdRng::seed_from_u64(3);
        let image = generator.code("ab3x7", &mut rng);
        assert_eq!(image.dimensions(), (IMAGE_SIZE, IMAGE_SIZE));
        let drawn = image.pixels().filter(|p| p.0 != [20, 20, 20]).count();
        assert!(drawn > 200, "only {drawn} pixels drawn");
    }

    #[test]
    fn test_contrasting_avoids_gray() {
        let gray = RgbImage::from_pixel(8, 8, Rgb([128, 128, 128]));
        let color = contrasting(&gray, 0, 0, 8);
        assert!(color.0[0] < 32 || color.0[0] > 224);
        let dark = RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]));
        assert_eq!(contrasting(&dark, 0, 0, 8), Rgb([245, 235, 225]));
    }
}
