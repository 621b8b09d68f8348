//! Shared fixtures for handler and engine tests.

use std::fs;
use std::io::Cursor;
use std::sync::Arc;

use axum::Router;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use tempfile::TempDir;

use vlmdock_core::{ActionCatalog, ActionPolicy, Embedder};

pub use vlmdock_core::testing::{neutral_image, FailingImageEmbedder, KeywordEmbedder};

use crate::dataset::DatasetLogger;
use crate::{build_router, engine, AppState};

/// A `width` x `height` PNG, base64-encoded.
pub fn png_base64(width: u32, height: u32) -> String {
    let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 20) as u8, (y * 20) as u8, 90])
    }));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    BASE64.encode(buf.into_inner())
}

/// Server state over a keyword policy and a throwaway dataset directory.
pub struct TestApp {
    pub state: Arc<AppState>,
    dir: TempDir,
}

pub fn test_app() -> TestApp {
    test_app_with(Box::new(KeywordEmbedder))
}

/// Same as [`test_app`] over any encoder.
pub fn test_app_with(embedder: Box<dyn Embedder>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let dataset = DatasetLogger::open(dir.path()).unwrap();
    let (engine, catalog) =
        engine::spawn(move || ActionPolicy::new(embedder, ActionCatalog::docking())).unwrap();

    let state = Arc::new(AppState {
        engine,
        dataset: Arc::new(dataset),
        catalog,
        model_name: "keyword-test".into(),
        device_name: "cpu".into(),
    });
    TestApp { state, dir }
}

impl TestApp {
    pub fn dataset_dir(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Saved sample names, sorted.
    pub fn png_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".png"))
            .collect();
        names.sort();
        names
    }

    pub fn labels(&self) -> String {
        fs::read_to_string(self.state.dataset.labels_path()).unwrap()
    }

    pub fn catalog_ids(&self) -> Vec<String> {
        self.state.catalog.ids().into_iter().map(String::from).collect()
    }
}
