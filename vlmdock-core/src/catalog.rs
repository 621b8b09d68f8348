//! The fixed vocabulary of docking actions.
//!
//! A catalog is an ordered list of `(id, description)` pairs. The order is
//! significant: the text embedding table is built in the same order, and the
//! policy maps a winning row back to an action id by position.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Short identifier returned to callers, e.g. `forward`.
    pub id: String,
    /// Natural-language phrase fed to the text encoder, e.g. `move forward`.
    pub description: String,
}

impl Action {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActionCatalog {
    actions: Vec<Action>,
}

/// On-disk catalog layout:
///
/// ```toml
/// [[action]]
/// id = "forward"
/// description = "move forward"
/// ```
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(rename = "action", default)]
    actions: Vec<Action>,
}

impl ActionCatalog {
    /// Builds a catalog, rejecting empty catalogs, blank ids and duplicate ids.
    pub fn new(actions: Vec<Action>) -> Result<Self> {
        if actions.is_empty() {
            anyhow::bail!("Action catalog is empty");
        }
        let mut seen = HashSet::new();
        for action in &actions {
            if action.id.trim().is_empty() {
                anyhow::bail!("Action id must not be blank");
            }
            if !seen.insert(action.id.as_str()) {
                anyhow::bail!("Duplicate action id '{}'", action.id);
            }
        }
        Ok(Self { actions })
    }

    /// The six built-in docking maneuvers.
    pub fn docking() -> Self {
        Self {
            actions: vec![
                Action::new("forward", "move forward"),
                Action::new("backward", "move backward"),
                Action::new("rotate_cw", "rotate clockwise"),
                Action::new("rotate_ccw", "rotate counter clockwise"),
                Action::new("align", "align with the docking port"),
                Action::new("hold", "hold position"),
            ],
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(s).context("Invalid action catalog TOML")?;
        Self::new(file.actions)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read action catalog {}", path.display()))?;
        Self::from_toml_str(&data)
            .with_context(|| format!("Failed to load action catalog {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.actions.iter().any(|a| a.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.id.as_str()).collect()
    }

    pub fn descriptions(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.description.as_str()).collect()
    }
}

impl Default for ActionCatalog {
    fn default() -> Self {
        Self::docking()
    }
}
