use futures::future::BoxFuture;
use image::DynamicImage;
use std::future::Future;
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;

use super::record::ImageRecord;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Body of a single response together with the URL it was served from
/// after redirects.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    pub final_url: String,
}

/// The remote image source. One call is one request; implementations never
/// retry on their own.
pub trait ImageSource: Send + Sync {
    fn fetch_once(&self, endpoint: &str) -> BoxFuture<'static, Result<RawImage, FetchError>>;
}

pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new() -> Self {
        Self {
            client: build_client(),
        }
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client")
}

impl ImageSource for HttpSource {
    fn fetch_once(&self, endpoint: &str) -> BoxFuture<'static, Result<RawImage, FetchError>> {
        let request = self.client.get(endpoint);
        let endpoint = endpoint.to_string();

        Box::pin(async move {
            let response = request
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| network_error(&endpoint, e))?;

            let final_url = response.url().to_string();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| network_error(&endpoint, e))?;

            Ok(RawImage {
                bytes: bytes.to_vec(),
                final_url,
            })
        })
    }
}

fn network_error(endpoint: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Network(format!("request timed out: {}", endpoint))
    } else {
        FetchError::Network(err.to_string())
    }
}

/// Starts one fetch unit: a single request to `endpoint` followed by a decode.
///
/// The request is issued against `source` before this returns, so the
/// returned future only awaits it. Decoding runs on the blocking pool.
pub fn fetch_image(
    source: &dyn ImageSource,
    endpoint: &str,
) -> impl Future<Output = Result<ImageRecord, FetchError>> + Send + 'static {
    let request = source.fetch_once(endpoint);

    async move {
        let raw = request.await?;
        if raw.bytes.is_empty() {
            return Err(FetchError::Decode("empty response body".to_string()));
        }

        let RawImage { bytes, final_url } = raw;
        let (bytes, decoded) = tokio::task::spawn_blocking(move || {
            let decoded = decode_image(&bytes);
            (bytes, decoded)
        })
        .await
        .map_err(|e| FetchError::Decode(format!("decode task failed: {}", e)))?;

        Ok(ImageRecord::new(decoded?, bytes, final_url))
    }
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, FetchError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FetchError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| FetchError::Decode(e.to_string()))
}
