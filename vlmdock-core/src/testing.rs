//! Deterministic encoders for tests. Enabled by the `test-util` feature.

use anyhow::Result;
use image::{DynamicImage, ImageBuffer, Rgb};

use crate::policy::Embedder;

/// Words the keyword encoder knows, one dimension each.
pub const VOCAB: [&str; 8] = [
    "forward", "backward", "clockwise", "counter", "align", "hold", "move", "rotate",
];

fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; VOCAB.len()];
    for word in text.split_whitespace() {
        if let Some(i) = VOCAB.iter().position(|k| *k == word) {
            v[i] += 1.0;
        }
    }
    v
}

/// Bag-of-words encoder over [`VOCAB`]. Every image maps to the uniform
/// vector, which is equally close to every keyword, so the command alone
/// decides between actions.
pub struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }

    fn embed_image(&self, _image: &DynamicImage) -> Result<Vec<f32>> {
        Ok(vec![1.0; VOCAB.len()])
    }
}

/// Text tower of [`KeywordEmbedder`], but every image fails with
/// `"vision tower down"`.
pub struct FailingImageEmbedder;

impl Embedder for FailingImageEmbedder {
    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        KeywordEmbedder.embed_texts(texts)
    }

    fn embed_image(&self, _image: &DynamicImage) -> Result<Vec<f32>> {
        anyhow::bail!("vision tower down")
    }
}

/// Flat mid-gray 10x10 frame.
pub fn neutral_image() -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(10, 10, Rgb([128u8, 128, 128])))
}
