//! Zero-shot action selection.
//!
//! The policy embeds every catalog description once, then for each request
//! fuses the image and command embeddings into a single query vector and picks
//! the closest description by cosine similarity.
//!
//! ```text
//! image ──► embed_image ──► normalize ─┐
//!                                      ├─► mean ──► normalize ──► query
//! command ─► embed_texts ─► normalize ─┘
//!
//! query · table[i]  for every catalog row  ──► argmax (first wins ties)
//! ```

use std::fmt;

use anyhow::{Context, Result};
use image::DynamicImage;
use serde::Serialize;
use tracing::info;

use crate::catalog::ActionCatalog;
use crate::utils::vector_utils::{argmax, dot, l2_normalize, mean_pair};

/// A dual-tower encoder that maps images and texts into a shared space.
///
/// Implementations return raw features; the policy does all normalization.
pub trait Embedder: Send + 'static {
    /// Encode each text, preserving input order.
    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Encode a single RGB image.
    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>>;
}

/// Outcome of one inference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDecision {
    pub action: String,
    pub confidence: f32,
    /// Row of the winning action in the catalog.
    #[serde(skip)]
    pub index: usize,
}

/// Catalog, its precomputed text embedding table, and the encoder.
///
/// Built once at startup and never mutated afterwards.
pub struct ActionPolicy {
    catalog: ActionCatalog,
    table: Vec<Vec<f32>>,
    embedder: Box<dyn Embedder>,
}

impl fmt::Debug for ActionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionPolicy")
            .field("actions", &self.catalog.ids())
            .field("dims", &self.dims())
            .finish_non_exhaustive()
    }
}

impl ActionPolicy {
    pub fn new(embedder: Box<dyn Embedder>, catalog: ActionCatalog) -> Result<Self> {
        let descriptions = catalog.descriptions();
        let raw = embedder
            .embed_texts(&descriptions)
            .context("Failed to embed action descriptions")?;

        if raw.len() != catalog.len() {
            anyhow::bail!(
                "Encoder returned {} embeddings for {} actions",
                raw.len(),
                catalog.len()
            );
        }

        let table: Vec<Vec<f32>> = raw.iter().map(|v| l2_normalize(v)).collect();
        let dims = table.first().map(Vec::len).unwrap_or(0);
        if dims == 0 {
            anyhow::bail!("Encoder returned empty text embeddings");
        }
        if let Some(bad) = table.iter().position(|row| row.len() != dims) {
            anyhow::bail!(
                "Embedding for action '{}' has {} dims, expected {}",
                catalog.ids()[bad],
                table[bad].len(),
                dims
            );
        }

        info!(
            "Action table ready: {} actions x {} dims ({})",
            catalog.len(),
            dims,
            catalog.ids().join(", ")
        );

        Ok(Self {
            catalog,
            table,
            embedder,
        })
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    /// Unit-norm text embeddings, one row per catalog entry.
    pub fn table(&self) -> &[Vec<f32>] {
        &self.table
    }

    pub fn dims(&self) -> usize {
        self.table[0].len()
    }

    /// Joint image + command vector, unit norm.
    pub fn query_vector(&self, image: &DynamicImage, command: &str) -> Result<Vec<f32>> {
        let image_emb = l2_normalize(&self.embedder.embed_image(image)?);
        let text_emb = self
            .embedder
            .embed_texts(&[command])?
            .into_iter()
            .next()
            .map(|v| l2_normalize(&v))
            .ok_or_else(|| anyhow::anyhow!("Encoder returned no embedding for the command"))?;

        let dims = self.dims();
        if image_emb.len() != dims || text_emb.len() != dims {
            anyhow::bail!(
                "Embedding size mismatch: image={}, text={}, table={}",
                image_emb.len(),
                text_emb.len(),
                dims
            );
        }

        Ok(l2_normalize(&mean_pair(&image_emb, &text_emb)))
    }

    /// Cosine similarity of `query` against every table row, in catalog order.
    pub fn scores(&self, query: &[f32]) -> Vec<f32> {
        self.table.iter().map(|row| dot(query, row)).collect()
    }

    pub fn infer(&self, image: &DynamicImage, command: &str) -> Result<ActionDecision> {
        let query = self.query_vector(image, command)?;
        let scores = self.scores(&query);
        let index = argmax(&scores)
            .ok_or_else(|| anyhow::anyhow!("Action table is empty"))?;
        let action = self
            .catalog
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("No action at row {index}"))?;

        Ok(ActionDecision {
            action: action.id.clone(),
            confidence: scores[index],
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Action;
    use crate::testing::{neutral_image, KeywordEmbedder, VOCAB};

    /// Every text maps to the same vector.
    struct ConstantEmbedder;

    impl Embedder for ConstantEmbedder {
        fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0, 2.0, 0.0]).collect())
        }

        fn embed_image(&self, _image: &DynamicImage) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    struct RaggedEmbedder;

    impl Embedder for RaggedEmbedder {
        fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, _)| vec![1.0; i + 1])
                .collect())
        }

        fn embed_image(&self, _image: &DynamicImage) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    fn keyword_policy() -> ActionPolicy {
        ActionPolicy::new(Box::new(KeywordEmbedder), ActionCatalog::docking()).unwrap()
    }

    #[test]
    fn table_rows_are_unit_norm_and_ordered() {
        let policy = keyword_policy();
        assert_eq!(policy.table().len(), 6);
        assert_eq!(policy.dims(), VOCAB.len());
        for row in policy.table() {
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
        // "move forward" row has weight on "move" and "forward" only.
        assert!(policy.table()[0][0] > 0.0);
        assert!(policy.table()[0][6] > 0.0);
        assert_eq!(policy.table()[0][1], 0.0);
    }

    #[test]
    fn exact_description_selects_its_action() {
        let policy = keyword_policy();
        let image = neutral_image();
        for action in ActionCatalog::docking().iter() {
            let decision = policy.infer(&image, &action.description).unwrap();
            assert_eq!(decision.action, action.id, "command '{}'", action.description);
        }
    }

    #[test]
    fn move_forward_selects_forward() {
        let decision = keyword_policy()
            .infer(&neutral_image(), "move forward")
            .unwrap();
        assert_eq!(decision.action, "forward");
        assert_eq!(decision.index, 0);
    }

    #[test]
    fn decisions_stay_in_catalog_and_in_range() {
        let policy = keyword_policy();
        let image = neutral_image();
        for command in ["", "move", "rotate", "hold hold hold", "unrelated words", "align forward"] {
            let d = policy.infer(&image, command).unwrap();
            assert!(policy.catalog().contains(&d.action));
            assert!(
                (-1.0 - 1e-5..=1.0 + 1e-5).contains(&d.confidence),
                "confidence {} for '{command}'",
                d.confidence
            );
        }
    }

    #[test]
    fn query_vector_is_unit_norm() {
        let q = keyword_policy()
            .query_vector(&neutral_image(), "rotate clockwise")
            .unwrap();
        let norm: f32 = q.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn ties_resolve_to_first_action() {
        let policy = ActionPolicy::new(Box::new(ConstantEmbedder), ActionCatalog::docking()).unwrap();
        let d = policy.infer(&neutral_image(), "anything").unwrap();
        assert_eq!(d.action, "forward");
        // Image [1,0,0] and text [0,1,0] average to 45 degrees off the table rows.
        assert!((d.confidence - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
    }

    #[test]
    fn custom_catalog_is_honored() {
        let catalog = ActionCatalog::new(vec![
            Action::new("spin", "rotate clockwise"),
            Action::new("stay", "hold"),
        ])
        .unwrap();
        let policy = ActionPolicy::new(Box::new(KeywordEmbedder), catalog).unwrap();
        assert_eq!(policy.infer(&neutral_image(), "hold").unwrap().action, "stay");
    }

    #[test]
    fn debug_lists_actions_and_dims() {
        let text = format!("{:?}", keyword_policy());
        assert!(text.contains("rotate_ccw"));
        assert!(text.contains("dims: 8"));
    }

    #[test]
    fn ragged_embeddings_are_rejected() {
        let err = ActionPolicy::new(Box::new(RaggedEmbedder), ActionCatalog::docking()).unwrap_err();
        assert!(err.to_string().contains("dims"));
    }

    #[test]
    fn decision_serializes_without_index() {
        let d = ActionDecision {
            action: "hold".into(),
            confidence: 0.5,
            index: 5,
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json, serde_json::json!({"action": "hold", "confidence": 0.5}));
    }
}
