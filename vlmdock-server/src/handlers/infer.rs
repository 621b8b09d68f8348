//! `POST /infer`: log the frame as a dataset sample, then pick an action.
//!
//! Request validation happens before any side effect: a missing image or an
//! undecodable payload is answered with 400 and nothing is written.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::DynamicImage;
use tracing::{error, info, warn};

use vlmdock_core::utils::image_utils;

use crate::api::{ErrorResponse, InferRequest, InferResponse};
use crate::{make_error, AppState};

type HandlerError = (StatusCode, Json<ErrorResponse>);

/// Strip an optional `data:<mime>;base64,` prefix and any embedded whitespace.
fn clean_base64(payload: &str) -> String {
    let payload = payload.trim();
    let body = match payload.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, data)| data)
            .unwrap_or(payload),
        None => payload,
    };
    body.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}

/// Base64 → bytes → RGB image. The error string is the underlying cause.
fn decode_image_payload(payload: &str) -> Result<DynamicImage, String> {
    let raw = BASE64
        .decode(clean_base64(payload))
        .map_err(|e| e.to_string())?;
    image_utils::decode_rgb_image(&raw).map_err(|e| e.root_cause().to_string())
}

pub async fn infer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InferRequest>, JsonRejection>,
) -> Result<Json<InferResponse>, HandlerError> {
    let stats = &state.engine.stats;
    stats.total_requests.fetch_add(1, Ordering::Relaxed);

    let request_id = format!("infer-{}", uuid::Uuid::new_v4());
    let start = Instant::now();

    let reject = |msg: String| {
        stats.rejected_requests.fetch_add(1, Ordering::Relaxed);
        warn!("[{request_id}] Rejected: {msg}");
        make_error(StatusCode::BAD_REQUEST, &msg)
    };
    let fail = |msg: String| {
        stats.failed_requests.fetch_add(1, Ordering::Relaxed);
        error!("[{request_id}] {msg}");
        make_error(StatusCode::INTERNAL_SERVER_ERROR, &msg)
    };

    let Json(req) = payload.map_err(|e| reject(format!("Invalid request body: {}", e.body_text())))?;

    let command = req.command.unwrap_or_default();
    let image_b64 = match req.image_base64 {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Err(reject("Missing image_base64".to_string())),
    };

    // ── Decode ──

    let image = tokio::task::spawn_blocking(move || decode_image_payload(&image_b64))
        .await
        .map_err(|e| fail(format!("Image decode task failed: {e}")))?
        .map_err(|e| reject(format!("Image decode error: {e}")))?;

    // ── 1) Save to dataset ──

    let dataset = state.dataset.clone();
    let cmd = command.clone();
    let (image, sample) = tokio::task::spawn_blocking(move || {
        let sample = dataset.record(&image, &cmd);
        (image, sample)
    })
    .await
    .map_err(|e| fail(format!("Dataset task failed: {e}")))?;
    let sample = sample.map_err(|e| fail(format!("Dataset write error: {e:#}")))?;
    stats.samples_logged.fetch_add(1, Ordering::Relaxed);

    // ── 2) Inference ──

    let decision = state
        .engine
        .infer(request_id.clone(), image, command.clone())
        .await
        .map_err(|e| fail(format!("{e:#}")))?;

    info!(
        "[{request_id}] camera={} command={:?} sample={} -> {} ({:.4}) in {:.1}ms",
        req.camera_id.as_deref().unwrap_or("-"),
        command,
        sample.filename,
        decision.action,
        decision.confidence,
        start.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(Json(InferResponse {
        action: decision.action,
        confidence: decision.confidence,
    }))
}
