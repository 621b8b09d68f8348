//! # vlmdock-client
//!
//! Minimal client for the vlmdock `/infer` endpoint: read an image from disk,
//! base64-encode it, post it together with a command and hand back whatever
//! JSON the server answered.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;

pub const DEFAULT_URL: &str = "http://localhost:5001/infer";

/// Body of `POST /infer`.
#[derive(Debug, Clone, Serialize)]
pub struct InferPayload {
    pub image_base64: String,
    pub command: String,
}

/// Read a file and return its contents as standard base64.
pub fn encode_image(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    Ok(BASE64.encode(bytes))
}

pub fn build_payload(image_path: impl AsRef<Path>, command: &str) -> Result<InferPayload> {
    Ok(InferPayload {
        image_base64: encode_image(image_path)?,
        command: command.to_string(),
    })
}

pub struct InferClient {
    client: reqwest::Client,
    url: String,
}

impl InferClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Post the payload and return the response body.
    ///
    /// Error statuses are not turned into `Err`: a 400 still carries a JSON
    /// `{"error": ...}` body worth showing.
    pub async fn infer(&self, payload: &InferPayload) -> Result<serde_json::Value> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        let body = response.json::<serde_json::Value>().await?;
        Ok(body)
    }
}
