pub mod model_factory;
pub mod stats;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use image::DynamicImage;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use vlmdock_core::{ActionCatalog, ActionDecision, ActionPolicy};

pub use stats::EngineStats;

// ── Public types shared between engine thread and API handlers ──

/// One decoded frame waiting for an action.
pub struct InferJob {
    pub id: String,
    pub image: DynamicImage,
    pub command: String,
    pub tx: oneshot::Sender<Result<ActionDecision, String>>,
}

/// Handle returned to API handlers for sending requests.
#[derive(Clone)]
pub struct EngineHandle {
    request_tx: mpsc::UnboundedSender<InferJob>,
    pub stats: Arc<EngineStats>,
}

impl EngineHandle {
    /// Queue a frame and wait for the engine's decision.
    pub async fn infer(
        &self,
        id: String,
        image: DynamicImage,
        command: String,
    ) -> Result<ActionDecision> {
        let (tx, rx) = oneshot::channel();
        self.request_tx
            .send(InferJob {
                id,
                image,
                command,
                tx,
            })
            .map_err(|_| anyhow::anyhow!("Engine thread has shut down"))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Inference task dropped: {e}"))?
            .map_err(|e| anyhow::anyhow!("Inference failed: {e}"))
    }
}

// ── Engine ──

/// Owns the action policy and answers jobs one at a time.
///
/// Runs on a dedicated OS thread (model forward passes are synchronous).
///
/// ```text
/// API handlers ──(job channel)──► engine thread ──► ActionPolicy::infer
///       ◄──────(per-job oneshot)───────┘
/// ```
pub struct PolicyEngine {
    policy: ActionPolicy,
    request_rx: mpsc::UnboundedReceiver<InferJob>,
    stats: Arc<EngineStats>,
}

impl PolicyEngine {
    pub fn new(policy: ActionPolicy) -> (Self, EngineHandle) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(EngineStats::new());
        let engine = Self {
            policy,
            request_rx,
            stats: stats.clone(),
        };
        (engine, EngineHandle { request_tx, stats })
    }

    /// Serve jobs until every [`EngineHandle`] is dropped.
    pub fn run(mut self) {
        info!("Policy engine thread started");
        while let Some(job) = self.request_rx.blocking_recv() {
            let start = Instant::now();
            let result = self.policy.infer(&job.image, &job.command);
            let elapsed_us = start.elapsed().as_micros() as u64;

            match &result {
                Ok(decision) => {
                    self.stats.completed_requests.fetch_add(1, Ordering::Relaxed);
                    self.stats
                        .total_inference_time_us
                        .fetch_add(elapsed_us, Ordering::Relaxed);
                    debug!(
                        "[{}] {} ({:.4}) in {}us",
                        job.id, decision.action, decision.confidence, elapsed_us
                    );
                }
                Err(e) => error!("[{}] Inference failed: {e:#}", job.id),
            }

            let _ = job.tx.send(result.map_err(|e| format!("{e:#}")));
        }
        info!("Policy engine thread stopped");
    }
}

/// Build the policy on a dedicated thread and start serving.
///
/// Blocks until the policy is ready, so a failed model load surfaces here and
/// aborts startup. Returns the handle and the loaded catalog.
pub fn spawn<F>(build: F) -> Result<(EngineHandle, ActionCatalog)>
where
    F: FnOnce() -> Result<ActionPolicy> + Send + 'static,
{
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(EngineHandle, ActionCatalog)>>();

    std::thread::Builder::new()
        .name("policy-engine".into())
        .spawn(move || {
            let policy = match build() {
                Ok(p) => p,
                Err(e) => {
                    error!("Failed to build action policy: {e:#}");
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let catalog = policy.catalog().clone();
            let (engine, handle) = PolicyEngine::new(policy);
            if ready_tx.send(Ok((handle, catalog))).is_err() {
                return;
            }
            engine.run();
        })
        .context("Failed to spawn policy engine thread")?;

    ready_rx
        .recv()
        .map_err(|_| anyhow::anyhow!("Policy engine thread exited during startup"))?
}
