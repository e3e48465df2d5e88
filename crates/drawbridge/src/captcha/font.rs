//! Glyph rasterization for CAPTCHA text.
//!
//! A configured TrueType font is used when it loads; otherwise a built-in
//! 5x7 bitmap font covering digits and lowercase letters is scaled up.

use std::path::Path;

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use moat_common::MoatError;
use rusttype::{Font, Scale, point};

const BITMAP_WIDTH: u32 = 5;
const BITMAP_HEIGHT: u32 = 7;

/// Rows top to bottom, bit 4 is the leftmost column
const DIGITS: [[u8; 7]; 10] = [
    [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
    [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
    [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
    [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
    [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
    [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
    [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
    [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
    [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
];

const LETTERS: [[u8; 7]; 26] = [
    [0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F],
    [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x1E],
    [0x00, 0x00, 0x0E, 0x10, 0x10, 0x11, 0x0E],
    [0x01, 0x01, 0x0D, 0x13, 0x11, 0x11, 0x0F],
    [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
    [0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08],
    [0x00, 0x0F, 0x11, 0x11, 0x0F, 0x01, 0x0E],
    [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x11],
    [0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E],
    [0x02, 0x00, 0x06, 0x02, 0x02, 0x12, 0x0C],
    [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12],
    [0x0C, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
    [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11],
    [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
    [0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E],
    [0x00, 0x00, 0x1E, 0x11, 0x1E, 0x10, 0x10],
    [0x00, 0x00, 0x0D, 0x13, 0x0F, 0x01, 0x01],
    [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10],
    [0x00, 0x00, 0x0E, 0x10, 0x0E, 0x01, 0x1E],
    [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06],
    [0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0D],
    [0x00, 0x00, 0x11, 0x11, 0x11, 0x0A, 0x04],
    [0x00, 0x00, 0x11, 0x11, 0x15, 0x15, 0x0A],
    [0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11],
    [0x00, 0x00, 0x11, 0x11, 0x0F, 0x01, 0x0E],
    [0x00, 0x00, 0x1F, 0x02, 0x04, 0x08, 0x1F],
];

fn bitmap(c: char) -> Option<&'static [u8; 7]> {
    match c {
        '0'..='9' => DIGITS.get(c as usize - '0' as usize),
        'a'..='z' => LETTERS.get(c as usize - 'a' as usize),
        'A'..='Z' => LETTERS.get(c as usize - 'A' as usize),
        _ => None,
    }
}

pub enum Glyphs {
    TrueType(Box<Font<'static>>),
    Bitmap,
}

impl std::fmt::Debug for Glyphs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrueType(_) => f.write_str("Glyphs::TrueType"),
            Self::Bitmap => f.write_str("Glyphs::Bitmap"),
        }
    }
}

impl Glyphs {
    pub fn load(path: &Path) -> Result<Self, MoatError> {
        let data = std::fs::read(path)
            .map_err(|e| MoatError::Captcha(format!("Failed to read font {}: {e}", path.display())))?;
        let font = Font::try_from_vec(data)
            .ok_or_else(|| MoatError::Captcha(format!("Invalid font file {}", path.display())))?;
        Ok(Self::TrueType(Box::new(font)))
    }

    /// Configured font, or the bitmap font when none is set or it fails to load
    pub fn from_path(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::Bitmap;
        };
        match Self::load(path) {
            Ok(glyphs) => glyphs,
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to the built-in bitmap font");
                Self::Bitmap
            }
        }
    }

    /// Coverage mask of `c`, `size` pixels tall, centered on a square canvas
    /// with enough room to rotate it without clipping.
    pub fn render(&self, c: char, size: f32) -> GrayImage {
        let side = (size * 1.5).ceil() as u32;
        let mut canvas = GrayImage::new(side, side);
        match self {
            Self::TrueType(font) => draw_truetype(font, c, size, &mut canvas),
            Self::Bitmap => draw_bitmap(c, size, &mut canvas),
        }
        canvas
    }
}

fn draw_bitmap(c: char, size: f32, canvas: &mut GrayImage) {
    let Some(rows) = bitmap(c) else {
        return;
    };
    let cell = (size / BITMAP_HEIGHT as f32).max(1.0);
    let width = cell * BITMAP_WIDTH as f32;
    let height = cell * BITMAP_HEIGHT as f32;
    let left = (canvas.width() as f32 - width) / 2.0;
    let top = (canvas.height() as f32 - height) / 2.0;
    let step = cell.ceil() as u32;

    for (row, bits) in rows.iter().enumerate() {
        for column in 0..BITMAP_WIDTH {
            if bits & (0x10 >> column) == 0 {
                continue;
            }
            let x = (left + column as f32 * cell).round() as i32;
            let y = (top + row as f32 * cell).round() as i32;
            draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(step, step), Luma([255]));
        }
    }
}

fn draw_truetype(font: &Font<'static>, c: char, size: f32, canvas: &mut GrayImage) {
    let scale = Scale::uniform(size);
    let ascent = font.v_metrics(scale).ascent;
    let glyph = font.glyph(c).scaled(scale).positioned(point(0.0, ascent));
    let Some(bounds) = glyph.pixel_bounding_box() else {
        return;
    };
    let offset_x = (canvas.width() as i32 - bounds.width()) / 2;
    let offset_y = (canvas.height() as i32 - bounds.height()) / 2;
    glyph.draw(|x, y, coverage| {
        let px = offset_x + x as i32;
        let py = offset_y + y as i32;
        if px >= 0 && py >= 0 && (px as u32) < canvas.width() && (py as u32) < canvas.height() {
            canvas.put_pixel(px as u32, py as u32, Luma([(coverage * 255.0) as u8]));
        }
    });
}
