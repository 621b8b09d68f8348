//! Wire types for the inference service.
//!
//! Covers:
//! * `POST /infer`   (image + command → action)
//! * error bodies shared by every route

use serde::{Deserialize, Serialize};

// ═════════════════════════════════════════════════════════════
//  Inference  (/infer)
// ═════════════════════════════════════════════════════════════

// ── Request ──

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InferRequest {
    /// Base64-encoded image bytes (PNG, JPEG, ...). A `data:` URL prefix is tolerated.
    #[serde(default)]
    pub image_base64: Option<String>,
    /// Operator command, free text. Missing or `null` means "".
    #[serde(default)]
    pub command: Option<String>,
    /// Which camera produced the frame. Logged only.
    #[serde(default)]
    pub camera_id: Option<String>,
}

// ── Response ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferResponse {
    pub action: String,
    pub confidence: f32,
}

// ═════════════════════════════════════════════════════════════
//  Errors
// ═════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
