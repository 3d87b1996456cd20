use futures::future::BoxFuture;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use super::fetcher::{FetchError, ImageSource, RawImage};
use super::record::{ImageRecord, SharedRecord};

type Reply = oneshot::Sender<Result<RawImage, FetchError>>;

/// In-memory image source. Every request stays pending until the test
/// resolves it by index, so completion order is fully under test control.
pub struct ScriptedSource {
    calls: Mutex<Vec<(String, Option<Reply>)>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        let calls = self.calls.lock().unwrap();
        calls.iter().map(|(endpoint, _)| endpoint.clone()).collect()
    }

    pub fn launched(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn resolve(&self, index: usize, outcome: Result<RawImage, FetchError>) {
        let reply = self.calls.lock().unwrap()[index]
            .1
            .take()
            .expect("request already resolved");
        let _ = reply.send(outcome);
    }

    pub fn succeed(&self, index: usize, url: &str) {
        self.resolve(
            index,
            Ok(RawImage {
                bytes: png_bytes(4, 4),
                final_url: url.to_string(),
            }),
        );
    }

    pub fn fail(&self, index: usize, message: &str) {
        self.resolve(index, Err(FetchError::Network(message.to_string())));
    }
}

impl ImageSource for ScriptedSource {
    fn fetch_once(&self, endpoint: &str) -> BoxFuture<'static, Result<RawImage, FetchError>> {
        let (tx, rx) = oneshot::channel();
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), Some(tx)));

        Box::pin(async move {
            rx.await
                .unwrap_or_else(|_| Err(FetchError::Network("request dropped".to_string())))
        })
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn record(url: &str) -> SharedRecord {
    Arc::new(ImageRecord::new(
        DynamicImage::new_rgba8(1, 1),
        Vec::new(),
        url.to_string(),
    ))
}
