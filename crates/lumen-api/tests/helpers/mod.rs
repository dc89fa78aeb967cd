//! Test helpers: build the router over a local store in a temporary directory.
//!
//! Run with: `cargo test -p lumen-api --test upload_test`

use axum_test::TestServer;
use image::{ImageFormat, Rgba, RgbaImage};
use lumen_api::setup::{build_state, routes};
use lumen_core::{Config, StorageBackend};
use lumen_processing::DerivativeGenerators;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Test application: server plus the directory backing its store.
pub struct TestApp {
    pub server: TestServer,
    pub root: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn stored_path(&self, key: &str) -> std::path::PathBuf {
        self.root.path().join(key)
    }

    pub fn object_exists(&self, key: &str) -> bool {
        self.stored_path(key).is_file()
    }

    pub fn object_count(&self) -> usize {
        count_files(self.root.path())
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| {
                    let path = entry.path();
                    if path.is_dir() {
                        count_files(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}

/// Local backend, default derivative settings, and ffmpeg binaries that do not exist,
/// so video derivatives always fail after the primary object is stored.
pub async fn setup_test_app() -> TestApp {
    let root = tempfile::tempdir().expect("tempdir");

    let mut config = Config::default();
    config.storage.backend = StorageBackend::Local;
    config.storage.local_path = Some(root.path().display().to_string());
    config.derivative.ffmpeg_path = "/nonexistent/ffmpeg".to_string();
    config.derivative.ffprobe_path = "/nonexistent/ffprobe".to_string();

    let storage = lumen_storage::create_storage(&config)
        .await
        .expect("local storage");
    let generators = DerivativeGenerators::from_config(&config).expect("generators");
    let state = build_state(Arc::new(config), storage, generators);
    let router = routes::setup_routes(state).expect("routes");

    TestApp {
        server: TestServer::new(router).expect("Failed to create test server"),
        root,
    }
}

/// Solid-colour PNG of the given size.
pub fn png_of(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 90, 255]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .expect("encode png");
    buffer
}
