//! # vlmdock-core
//!
//! Zero-shot docking-action selection with a CLIP dual encoder, built on the
//! [Candle](https://github.com/huggingface/candle) framework.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |---|---|
//! | [`catalog`] | Ordered `(id, description)` action vocabulary, TOML loading |
//! | [`policy`] | [`policy::Embedder`] trait and the image+command → action procedure |
//! | [`models`] | CLIP ViT-B/32 encoder loaded from a local dir or the Hugging Face Hub |
//! | [`utils`] | Image preprocessing, tokenizer loading, device selection, vector math |
//!
//! ## Feature flags
//!
//! | Flag | Effect |
//! |---|---|
//! | `cuda` | Enable the CUDA device (requires CUDA toolkit) |
//! | `test-util` | Expose [`testing`] encoders to downstream test suites |

pub mod catalog;
pub mod models;
pub mod policy;
pub mod utils;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use catalog::{Action, ActionCatalog};
pub use policy::{ActionDecision, ActionPolicy, Embedder};
