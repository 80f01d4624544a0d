//! Test helpers: build the router over an in-memory store with a controllable clock.

use axum_test::TestServer;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration, Utc};
use pixdrop_api::setup::routes;
use pixdrop_api::AppState;
use pixdrop_core::Config;
use pixdrop_services::MemoryStorage;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

pub struct TestApp {
    pub server: TestServer,
    pub storage: MemoryStorage,
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Move the clock used for quota decisions.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("STORAGE_BACKEND", "memory"),
        ("QUOTA_ENFORCED", "true"),
        ("SWEEP_INTERVAL_SECS", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(test_config(&[]))
}

pub fn setup_test_app_with(config: Config) -> TestApp {
    let storage = MemoryStorage::new();
    let now = Arc::new(Mutex::new(Utc::now()));
    let clock_now = now.clone();

    let state = AppState::new(config.clone(), Arc::new(storage.clone()))
        .with_clock(Arc::new(move || *clock_now.lock().unwrap()));
    let router = routes::setup_routes(&config, Arc::new(state)).unwrap();

    TestApp {
        server: TestServer::new(router).unwrap(),
        storage,
        now,
    }
}

/// A JPEG of roughly `approx_bytes` bytes of noise (noise keeps the encoder from shrinking it).
pub fn noisy_jpeg(approx_bytes: usize) -> Vec<u8> {
    let side = ((approx_bytes as f64 / 1.5).sqrt() as u32).max(8);
    let mut seed: u32 = 0x1234_5678;
    let img = image::RgbImage::from_fn(side, side, |_, _| {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        let [r, g, b, _] = seed.to_le_bytes();
        image::Rgb([r, g, b])
    });
    let mut buffer = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Jpeg)
        .unwrap();
    buffer
}

pub fn small_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(32, 16, image::Rgb([10, 120, 200]));
    let mut buffer = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    buffer
}

pub fn upload_body(data: &[u8], file_name: &str, content_type: &str) -> serde_json::Value {
    serde_json::json!({
        "image": format!("data:{};base64,{}", content_type, STANDARD.encode(data)),
        "fileName": file_name,
        "contentType": content_type,
    })
}
