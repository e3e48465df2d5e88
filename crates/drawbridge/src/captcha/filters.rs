//! Post-process distortions applied to CAPTCHA images.

use image::{Rgb, RgbImage, RgbaImage, Rgba};
use imageproc::drawing::draw_line_segment_mut;
use rand::Rng;
use std::f32::consts::PI;

/// Sine displacement: each pixel samples `(x + ax·sin(y/p), y + ay·sin(x/p))`.
/// Samples outside the image are transparent.
pub fn ripple(image: &RgbaImage, amplitude_x: f32, amplitude_y: f32, period: f32) -> RgbaImage {
    let (width, height) = image.dimensions();
    RgbaImage::from_fn(width, height, |x, y| {
        let sx = x as f32 + amplitude_x * (y as f32 / period).sin();
        let sy = y as f32 + amplitude_y * (x as f32 / period).sin();
        let (sx, sy) = (sx.round() as i64, sy.round() as i64);
        if sx < 0 || sy < 0 || sx >= width as i64 || sy >= height as i64 {
            Rgba([0, 0, 0, 0])
        } else {
            *image.get_pixel(sx as u32, sy as u32)
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Circle {
    x: i32,
    y: i32,
    radius: i32,
}

impl Circle {
    fn overlaps(&self, other: &Circle) -> bool {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        let reach = (self.radius + other.radius) as i64;
        dx * dx + dy * dy < reach * reach
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        let dx = (x - self.x) as i64;
        let dy = (y - self.y) as i64;
        dx * dx + dy * dy <= (self.radius as i64) * (self.radius as i64)
    }
}

/// Darkens and inverts up to `amount` non-overlapping circles.
///
/// Circle centers keep a `width / 15` margin from the edges; radii are
/// `min_radius + rand(max_expansion)`. Returns how many were placed.
pub fn circle_inverse(
    image: &mut RgbImage,
    amount: usize,
    min_radius: i32,
    max_expansion: i32,
    rng: &mut impl Rng,
) -> usize {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let margin = (width / 15).max(1);
    if width <= margin * 2 || height <= margin * 2 {
        return 0;
    }

    let mut circles: Vec<Circle> = Vec::with_capacity(amount);
    // bounded so a crowded image cannot spin forever
    for _ in 0..amount * 8 {
        if circles.len() == amount {
            break;
        }
        let candidate = Circle {
            x: rng.random_range(margin..width - margin),
            y: rng.random_range(margin..height - margin),
            radius: min_radius + rng.random_range(0..max_expansion.max(1)),
        };
        if circles.iter().any(|circle| circle.overlaps(&candidate)) {
            continue;
        }
        circles.push(candidate);
    }

    for circle in &circles {
        let top = (circle.y - circle.radius).max(0);
        let bottom = (circle.y + circle.radius).min(height - 1);
        let left = (circle.x - circle.radius).max(0);
        let right = (circle.x + circle.radius).min(width - 1);
        for y in top..=bottom {
            for x in left..=right {
                if !circle.contains(x, y) {
                    continue;
                }
                let divisor: u8 = rng.random_range(1..=3);
                let pixel = image.get_pixel_mut(x as u32, y as u32);
                pixel.0 = pixel.0.map(|c| 90u8.saturating_sub(c / divisor));
            }
        }
    }
    circles.len()
}

/// Draws `amount` random lines, `line_width` pixels thick, across the image
pub fn scratch(image: &mut RgbImage, amount: usize, line_width: u32, rng: &mut impl Rng) {
    let (width, height) = (image.width() as f32, image.height() as f32);
    let half_length = width / 2.0;
    for _ in 0..amount {
        let cx = rng.random_range(0.0..width);
        let cy = rng.random_range(0.0..height);
        let angle = 2.0 * PI * (rng.random::<f32>() - 0.5);
        let (dx, dy) = (angle.cos() * half_length, angle.sin() * half_length);
        let color = Rgb([rng.random(), rng.random(), rng.random()]);
        // thickness: parallel segments along the normal
        let (nx, ny) = (-angle.sin(), angle.cos());
        for step in 0..line_width.max(1) {
            let offset = step as f32 - (line_width as f32 - 1.0) / 2.0;
            let (ox, oy) = (nx * offset, ny * offset);
            draw_line_segment_mut(
                image,
                (cx - dx + ox, cy - dy + oy),
                (cx + dx + ox, cy + dy + oy),
                color,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_ripple_without_amplitude_is_identity() {
        let image = RgbaImage::from_fn(16, 16, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        assert_eq!(ripple(&image, 0.0, 0.0, 13.0), image);
    }

    #[test]
    fn test_ripple_displaces_pixels() {
        let image = RgbaImage::from_fn(64, 64, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let rippled = ripple(&image, 4.0, 4.0, 13.0);
        assert_ne!(rippled, image);
        assert_eq!(rippled.dimensions(), image.dimensions());
    }

    #[test]
    fn test_circle_inverse_places_disjoint_circles() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut image = RgbImage::from_pixel(128, 128, Rgb([200, 200, 200]));
        let placed = circle_inverse(&mut image, 3, 8, 6, &mut rng);
        assert!(placed >= 1);
        // every touched pixel is at most 90 - 200/3
        let darkened = image.pixels().filter(|p| p.0[0] < 200).count();
        assert!(darkened > 0);
        assert!(image.pixels().all(|p| p.0[0] == 200 || p.0[0] <= 24));
    }

    #[test]
    fn test_scratch_draws_lines() {
        let mut rng = StdRng::seed_from_u64(11);
        let original = RgbImage::from_pixel(128, 128, Rgb([0, 0, 0]));
        let mut image = original.clone();
        scratch(&mut image, 4, 2, &mut rng);
        assert_ne!(image, original);
    }
}
