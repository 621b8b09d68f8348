//! Model factory: resolves where the CLIP checkpoint comes from and builds the
//! action policy on top of it.

use anyhow::Result;
use std::path::{Path, PathBuf};

use vlmdock_core::models::clip::ClipEmbedder;
use vlmdock_core::models::Device;
use vlmdock_core::{ActionCatalog, ActionPolicy, Embedder};

// ─────────────────────────────────────────────────────────────
//  Sources
// ─────────────────────────────────────────────────────────────

/// Where the encoder weights are loaded from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// Local directory with `model.safetensors` (or `pytorch_model.bin`) and `tokenizer.json`.
    Local(PathBuf),
    /// Hugging Face Hub repository, cached by `hf-hub`.
    Hub { model_id: String, revision: String },
}

impl ModelSource {
    /// A local path wins over the Hub coordinates.
    pub fn resolve(model_path: Option<&str>, model_id: &str, revision: &str) -> Self {
        match model_path {
            Some(p) if !p.trim().is_empty() => Self::Local(PathBuf::from(p)),
            _ => Self::Hub {
                model_id: model_id.to_string(),
                revision: revision.to_string(),
            },
        }
    }

    /// Name reported in logs and the startup banner.
    pub fn display_name(&self) -> String {
        match self {
            Self::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Hub { model_id, .. } => model_id.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Factory
// ─────────────────────────────────────────────────────────────

/// Load the built-in docking catalog, or a TOML override.
pub fn load_catalog(path: Option<&Path>) -> Result<ActionCatalog> {
    match path {
        Some(p) => {
            tracing::info!("Loading action catalog from: {}", p.display());
            ActionCatalog::from_toml_file(p)
        }
        None => Ok(ActionCatalog::docking()),
    }
}

/// Create the CLIP encoder.
pub fn create_embedder(source: &ModelSource, device: &Device) -> Result<Box<dyn Embedder>> {
    tracing::info!("Creating CLIP encoder: {:?}", source);
    let embedder = match source {
        ModelSource::Local(path) => ClipEmbedder::from_local(path, device)?,
        ModelSource::Hub { model_id, revision } => {
            ClipEmbedder::from_pretrained(model_id, Some(revision), device)?
        }
    };
    Ok(Box::new(embedder))
}

/// Create the encoder and precompute the catalog's text embedding table.
pub fn create_policy(
    source: &ModelSource,
    device: &Device,
    catalog: ActionCatalog,
) -> Result<ActionPolicy> {
    let embedder = create_embedder(source, device)?;
    ActionPolicy::new(embedder, catalog)
}
