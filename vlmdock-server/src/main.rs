mod api;
mod dataset;
mod engine;
mod handlers;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::ErrorResponse;
use dataset::DatasetLogger;
use engine::model_factory::{self, ModelSource};
use engine::EngineHandle;
use vlmdock_core::models::clip::{DEFAULT_MODEL_ID, DEFAULT_REVISION};
use vlmdock_core::utils::candle_utils;
use vlmdock_core::ActionCatalog;

// ═════════════════════════════════════════════════════════════
//  CLI
// ═════════════════════════════════════════════════════════════

#[derive(Parser, Debug)]
#[command(
    name = "vlmdock-server",
    about = "Maps a camera frame and an operator command to a docking action"
)]
struct Args {
    /// Local CLIP directory (model.safetensors + tokenizer.json). Fetched from the Hub when omitted.
    #[arg(long)]
    model_path: Option<String>,

    /// Hugging Face Hub repository of the CLIP checkpoint
    #[arg(long, default_value = DEFAULT_MODEL_ID)]
    model_id: String,

    /// Hub revision (refs/pr/15 carries safetensors weights)
    #[arg(long, default_value = DEFAULT_REVISION)]
    revision: String,

    /// Host to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, default_value_t = 5001)]
    port: u16,

    /// Use CPU even if GPU is available
    #[arg(long)]
    cpu: bool,

    /// Directory for logged frames and labels.csv
    #[arg(long, default_value = "vlm_dataset")]
    dataset_dir: PathBuf,

    /// TOML file with `[[action]]` entries replacing the built-in docking catalog
    #[arg(long)]
    actions: Option<PathBuf>,
}

// ═════════════════════════════════════════════════════════════
//  App state (shared across handlers)
// ═════════════════════════════════════════════════════════════

pub struct AppState {
    pub engine: EngineHandle,
    pub dataset: Arc<DatasetLogger>,
    /// Catalog the policy was built from, in table order.
    pub catalog: ActionCatalog,
    pub model_name: String,
    pub device_name: String,
}

pub fn make_error(status: StatusCode, msg: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
}

// ═════════════════════════════════════════════════════════════
//  Main
// ═════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // ── Catalog & dataset ──

    let catalog = model_factory::load_catalog(args.actions.as_deref())?;
    let dataset = DatasetLogger::open(&args.dataset_dir)?;
    info!("Dataset directory: {}", dataset.dir().display());

    // ── Device & model ──

    let device = candle_utils::select_device(args.cpu)?;
    let device_name = candle_utils::device_label(&device).to_string();
    let source = ModelSource::resolve(args.model_path.as_deref(), &args.model_id, &args.revision);
    let model_name = source.display_name();
    info!("Loading CLIP from {:?} on {}", source, device_name);

    let (engine_handle, catalog) = engine::spawn(move || {
        model_factory::create_policy(&source, &device, catalog)
    })?;
    info!("Policy engine started ({} actions)", catalog.len());

    // ── Build router ──

    let state = Arc::new(AppState {
        engine: engine_handle,
        dataset: Arc::new(dataset),
        catalog,
        model_name,
        device_name,
    });

    let app = build_router(state.clone());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    // ── Startup banner (printed after successful bind) ──

    let sep = "═".repeat(60);
    let sep2 = "─".repeat(60);
    println!("\n  {sep}");
    println!("  vlmdock-server  v{}  ready", env!("CARGO_PKG_VERSION"));
    println!("  {sep}");
    println!("  Model   : {}", state.model_name);
    println!("  Device  : {}", state.device_name);
    println!("  Dataset : {}", state.dataset.dir().display());
    println!("  Actions : {}", state.catalog.ids().join(", "));
    println!("  Listen  : http://{local_addr}");
    println!("  {sep2}");
    println!("    POST  http://{local_addr}/infer");
    println!("    GET   http://{local_addr}/actions");
    println!("    GET   http://{local_addr}/health");
    println!("    GET   http://{local_addr}/v1/stats");
    println!("  {sep}\n");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the Axum router.
fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Health & management ──
        .route("/health", get(handlers::common::health))
        .route("/v1/stats", get(handlers::common::stats))
        .route("/actions", get(handlers::common::actions))
        // ── Inference ──
        .route("/infer", post(handlers::infer::infer))
        // Camera frames routinely exceed axum's 2 MB default.
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}
