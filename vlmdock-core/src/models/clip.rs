//! CLIP ViT-B/32 dual encoder on top of `candle-transformers`.

use anyhow::{Error as E, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use hf_hub::{api::sync::Api, Repo, RepoType};
use image::DynamicImage;
use std::path::Path;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::policy::Embedder;
use crate::utils::{image_utils, tokenizer_utils};

/// Default Hub checkpoint, the same weights as OpenAI's `ViT-B/32`.
pub const DEFAULT_MODEL_ID: &str = "openai/clip-vit-base-patch32";
/// Hub revision that ships `model.safetensors`.
pub const DEFAULT_REVISION: &str = "refs/pr/15";

pub struct ClipEmbedder {
    model: ClipModel,
    tokenizer: Tokenizer,
    device: Device,
    image_size: usize,
    max_text_len: usize,
    eot_token_id: u32,
}

impl ClipEmbedder {
    pub fn from_pretrained(model_id: &str, revision: Option<&str>, device: &Device) -> Result<Self> {
        let revision = revision.unwrap_or(DEFAULT_REVISION);
        info!("Loading CLIP from HF: {} @ {}", model_id, revision);

        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        let tokenizer_path = repo.get("tokenizer.json")?;
        let model_file = repo
            .get("model.safetensors")
            .or_else(|_| repo.get("pytorch_model.bin"))?;

        let tokenizer = tokenizer_utils::load_tokenizer(&tokenizer_path)?;
        Self::load(&model_file, tokenizer, device)
    }

    pub fn from_local(path: impl AsRef<Path>, device: &Device) -> Result<Self> {
        let base = path.as_ref().to_path_buf();
        if !base.is_dir() {
            return Err(E::msg(format!("Not a directory: {:?}", base)));
        }

        let model_file = [base.join("model.safetensors"), base.join("pytorch_model.bin")]
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| {
                E::msg(format!(
                    "No model.safetensors or pytorch_model.bin in {:?}",
                    base
                ))
            })?;

        let tokenizer = tokenizer_utils::load_tokenizer_from_model_dir(&base)?;
        Self::load(&model_file, tokenizer, device)
    }

    fn load(model_file: &Path, tokenizer: Tokenizer, device: &Device) -> Result<Self> {
        let start = Instant::now();
        let config = ClipConfig::vit_base_patch32();

        let eot_token_id = tokenizer_utils::clip_eot_token_id(&tokenizer)?;

        info!("Loading weights from: {}", model_file.display());
        let vb = if model_file.extension().map_or(false, |ext| ext == "bin") {
            VarBuilder::from_pth(model_file, DType::F32, device)?
        } else {
            unsafe { VarBuilder::from_mmaped_safetensors(&[model_file], DType::F32, device)? }
        };
        let model = ClipModel::new(vb, &config)?;

        info!("CLIP loaded in {:.2}s", start.elapsed().as_secs_f32());

        Ok(Self {
            model,
            tokenizer,
            device: device.clone(),
            image_size: config.image_size,
            max_text_len: config.text_config.max_position_embeddings,
            eot_token_id,
        })
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self.tokenizer.encode(text, true).map_err(E::msg)?;
        Ok(tokenizer_utils::truncate_clip_ids(
            encoding.get_ids().to_vec(),
            self.max_text_len,
            self.eot_token_id,
        ))
    }

    fn features_to_vec(features: Tensor) -> Result<Vec<f32>> {
        Ok(features
            .squeeze(0)?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?)
    }
}

impl Embedder for ClipEmbedder {
    // Each text runs as its own batch of one: the text tower pools at the
    // highest token id, so padding with end-of-text would be ambiguous.
    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                let ids = self.tokenize(text)?;
                debug!("Text '{}' -> {} tokens", text, ids.len());
                let input_ids = Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?;
                Self::features_to_vec(self.model.get_text_features(&input_ids)?)
            })
            .collect()
    }

    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        let pixels = image_utils::image_to_clip_tensor(image, self.image_size, &self.device)?;
        Self::features_to_vec(self.model.get_image_features(&pixels)?)
    }
}
