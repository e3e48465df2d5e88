//! CAPTCHA challenges shown on in-game maps.
//!
//! Challenges are generated ahead of time by the pool worker; each one owns
//! its answer and the map packets for every wire layout, so handing one to a
//! session is an `Arc` clone.

mod filters;
mod font;
mod generator;
mod palette;
mod pool;
mod puzzle;

pub use font::Glyphs;
pub use generator::{Background, IMAGE_SIZE, ImageGenerator};
pub use palette::Palette;
pub use pool::{CaptchaPool, PoolStatsSnapshot, captcha_pool_worker};
pub use puzzle::CELLS as PUZZLE_CELLS;

use std::path::Path;

use bytes::Bytes;
use image::RgbImage;
use moat_common::{CaptchaKind, MoatError};
use rand::Rng;

use crate::config::CaptchaConfig;
use crate::protocol::ProtocolVersion;
use crate::protocol::packets::map::{MapLayout, encode_legacy_columns, encode_map_body};
use crate::protocol::packets::{Clientbound, MapData};

/// A prepared challenge: the answer and its pre-encoded picture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaChallenge {
    answer: String,
    /// 1.7: one body per column
    legacy: Vec<Bytes>,
    /// One body per entry of [`MapLayout::MODERN`]
    modern: [Bytes; 4],
}

impl CaptchaChallenge {
    pub fn from_image(answer: impl Into<String>, image: &RgbImage) -> Self {
        let legacy = encode_legacy_columns(&Palette::legacy().quantize(image));
        let colors = Palette::modern().quantize(image);
        let modern = MapLayout::MODERN.map(|layout| encode_map_body(layout, &colors));
        Self {
            answer: answer.into(),
            legacy,
            modern,
        }
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Map packets showing the picture to a client on `version`
    pub fn map_packets(&self, version: ProtocolVersion) -> Vec<Clientbound> {
        let layout = MapLayout::for_version(version);
        match layout.modern_index() {
            Some(index) => vec![Clientbound::MapData(MapData {
                body: self.modern[index].clone(),
            })],
            None => self
                .legacy
                .iter()
                .map(|body| Clientbound::MapData(MapData { body: body.clone() }))
                .collect(),
        }
    }
}

/// Builds challenges of the configured kind
#[derive(Debug)]
pub struct CaptchaGenerator {
    kind: CaptchaKind,
    dictionary: Vec<char>,
    answer_length: usize,
    images: ImageGenerator,
}

impl CaptchaGenerator {
    pub fn new(
        kind: CaptchaKind,
        dictionary: &str,
        answer_length: usize,
        images: ImageGenerator,
    ) -> Result<Self, MoatError> {
        let dictionary: Vec<char> = dictionary.chars().collect();
        if dictionary.is_empty() {
            return Err(MoatError::Config("CAPTCHA dictionary is empty".into()));
        }
        if answer_length == 0 {
            return Err(MoatError::Config("CAPTCHA answer length must be positive".into()));
        }
        Ok(Self {
            kind,
            dictionary,
            answer_length,
            images,
        })
    }

    pub fn from_config(config: &CaptchaConfig) -> Result<Self, MoatError> {
        let images = ImageGenerator::new(
            Glyphs::from_path(config.font_path.as_deref().map(Path::new)),
            Background::from_path(config.background_path.as_deref().map(Path::new)),
        );
        Self::new(config.kind, &config.dictionary, config.answer_length, images)
    }

    pub fn kind(&self) -> CaptchaKind {
        self.kind
    }

    pub fn random_answer(&self, rng: &mut impl Rng) -> String {
        (0..self.answer_length)
            .map(|_| self.dictionary[rng.random_range(0..self.dictionary.len())])
            .collect()
    }

    pub fn challenge(&self, rng: &mut impl Rng) -> CaptchaChallenge {
        match self.kind {
            CaptchaKind::Hand => {
                let answer = self.random_answer(rng);
                let image = self.images.code(&answer, rng);
                CaptchaChallenge::from_image(answer, &image)
            }
            CaptchaKind::Puzzle => {
                let target = rng.random_range(0..PUZZLE_CELLS);
                let image = self.images.puzzle(target, rng);
                CaptchaChallenge::from_image(target.to_string(), &image)
            }
        }
    }
}
