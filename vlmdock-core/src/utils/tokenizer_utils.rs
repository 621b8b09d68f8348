use anyhow::{Context, Result};
use std::path::Path;
use tokenizers::Tokenizer;

/// End-of-text marker of the CLIP BPE vocabulary.
pub const CLIP_EOT_TOKEN: &str = "<|endoftext|>";

pub fn load_tokenizer_from_model_dir<P: AsRef<Path>>(model_dir: P) -> Result<Tokenizer> {
    let model_dir = model_dir.as_ref();
    let tokenizer_json = model_dir.join("tokenizer.json");

    if !tokenizer_json.exists() {
        anyhow::bail!(
            "No tokenizer.json in {}. Download it alongside the model weights.",
            model_dir.display()
        );
    }

    load_tokenizer(&tokenizer_json)
}

pub fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Failed to load {}", path.display()))
}

/// Looks up the id of the CLIP end-of-text token.
pub fn clip_eot_token_id(tokenizer: &Tokenizer) -> Result<u32> {
    tokenizer
        .token_to_id(CLIP_EOT_TOKEN)
        .ok_or_else(|| anyhow::anyhow!("Tokenizer has no {CLIP_EOT_TOKEN} token"))
}

/// Clamps a token sequence to the text tower's context length.
///
/// The text tower pools the hidden state at the end-of-text position, so a
/// truncated sequence must still end with `eot_id`.
pub fn truncate_clip_ids(mut ids: Vec<u32>, max_len: usize, eot_id: u32) -> Vec<u32> {
    if max_len == 0 {
        return Vec::new();
    }
    if ids.len() > max_len {
        ids.truncate(max_len);
        if let Some(last) = ids.last_mut() {
            *last = eot_id;
        }
    }
    ids
}
