use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::warn;

use crate::errors::PipelineError;
use crate::llm::gemini::truncate_for_log;
use crate::utils::http::get_http_client;

const MEDIA_DOWNLOAD_MAX_ATTEMPTS: usize = 3;
const MEDIA_DOWNLOAD_BASE_DELAY_MS: u64 = 400;
const MEDIA_DOWNLOAD_ERROR_BODY_LIMIT: usize = 800;
const FALLBACK_MIME_TYPE: &str = "image/jpeg";

static DATA_URL_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:([^;,]*);base64,").expect("valid data url regex"));

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn normalize_image_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => lowered,
    }
}

pub fn is_supported_image_mime(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "image/png" | "image/jpeg" | "image/webp" | "image/heic" | "image/heif"
    )
}

/// Returns the payload after the data URL header, or the input when there is none.
pub fn strip_data_url_header(value: &str) -> &str {
    match value.split_once(',') {
        Some((_, payload)) if !payload.is_empty() => payload,
        _ => value,
    }
}

pub fn file_extension_for_mime(mime_type: &str) -> &'static str {
    match normalize_image_mime_type(mime_type).as_str() {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/heic" | "image/heif" => "heic",
        _ => "bin",
    }
}

/// A decoded image payload as handed to the model service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageInput {
    /// Wraps raw bytes, preferring the sniffed mime type over the declared one.
    pub fn from_bytes(bytes: Vec<u8>, declared_mime: Option<&str>) -> Result<Self, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::InvalidImage("image is empty".to_string()));
        }

        let mut candidates = Vec::new();
        if let Some(detected) = detect_mime_type(&bytes) {
            candidates.push(detected);
        }
        if let Some(declared) = declared_mime {
            if !declared.trim().is_empty() {
                candidates.push(declared.to_string());
            }
        }

        for candidate in &candidates {
            let normalized = normalize_image_mime_type(candidate);
            if is_supported_image_mime(&normalized) {
                return Ok(Self {
                    mime_type: normalized,
                    bytes,
                });
            }
        }

        Err(PipelineError::InvalidImage(format!(
            "unsupported image type (candidates: {})",
            if candidates.is_empty() {
                "none".to_string()
            } else {
                candidates.join(", ")
            }
        )))
    }

    /// Parses `data:<mime>;base64,<payload>`. A bare base64 string is accepted
    /// with the fallback mime type.
    pub fn from_data_url(value: &str) -> Result<Self, PipelineError> {
        let value = value.trim();
        let declared = DATA_URL_HEADER
            .captures(value)
            .and_then(|captures| captures.get(1))
            .map(|mime| mime.as_str().to_string())
            .filter(|mime| !mime.is_empty())
            .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());
        let payload = strip_data_url_header(value);
        let bytes = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|err| PipelineError::InvalidImage(format!("invalid base64 payload: {err}")))?;
        Self::from_bytes(bytes, Some(&declared))
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    #[cfg(test)]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn inline_part(&self) -> Value {
        json!({
            "inlineData": {
                "mimeType": self.mime_type,
                "data": self.to_base64()
            }
        })
    }

    pub fn dimensions(&self) -> Result<(u32, u32), PipelineError> {
        image::ImageReader::new(Cursor::new(&self.bytes))
            .with_guessed_format()
            .map_err(|err| PipelineError::InvalidImage(err.to_string()))?
            .into_dimensions()
            .map_err(|err| PipelineError::InvalidImage(err.to_string()))
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn download_backoff(retry: usize) -> Duration {
    Duration::from_millis(MEDIA_DOWNLOAD_BASE_DELAY_MS << retry)
}

enum FetchAttempt {
    Fetched(Vec<u8>),
    Transient(String),
    Fatal(String),
}

async fn fetch_once(url: &str) -> FetchAttempt {
    let response = match get_http_client().get(url).send().await {
        Ok(response) => response,
        Err(err) if err.is_timeout() || err.is_connect() => {
            return FetchAttempt::Transient(err.to_string())
        }
        Err(err) => return FetchAttempt::Fatal(err.to_string()),
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let reason = format!(
            "status {status}: {}",
            truncate_for_log(&body, MEDIA_DOWNLOAD_ERROR_BODY_LIMIT)
        );
        return if should_retry_status(status) {
            FetchAttempt::Transient(reason)
        } else {
            FetchAttempt::Fatal(reason)
        };
    }

    match response.bytes().await {
        Ok(bytes) => FetchAttempt::Fetched(bytes.to_vec()),
        Err(err) => FetchAttempt::Transient(format!("reading body: {err}")),
    }
}

/// Fetches `url`, retrying timeouts, connect failures and retryable statuses
/// with exponential backoff.
pub async fn download_media(url: &str) -> Result<Vec<u8>, PipelineError> {
    let mut last_reason = String::new();
    for attempt in 1..=MEDIA_DOWNLOAD_MAX_ATTEMPTS {
        match fetch_once(url).await {
            FetchAttempt::Fetched(bytes) => return Ok(bytes),
            FetchAttempt::Fatal(reason) => {
                warn!("Image download from {url} failed: {reason}");
                return Err(PipelineError::InvalidImage(format!(
                    "could not download {url}: {reason}"
                )));
            }
            FetchAttempt::Transient(reason) => {
                warn!(
                    "Image download from {url} failed (attempt {attempt}/{}): {reason}",
                    MEDIA_DOWNLOAD_MAX_ATTEMPTS
                );
                last_reason = reason;
                if attempt < MEDIA_DOWNLOAD_MAX_ATTEMPTS {
                    tokio::time::sleep(download_backoff(attempt - 1)).await;
                }
            }
        }
    }
    Err(PipelineError::InvalidImage(format!(
        "could not download {url} after {MEDIA_DOWNLOAD_MAX_ATTEMPTS} attempts: {last_reason}"
    )))
}

/// Acquires an image from an `http(s)` URL, a `data:` URL, or a file path.
pub async fn load_image(source: &str) -> Result<ImageInput, PipelineError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(PipelineError::InvalidImage("no image source given".to_string()));
    }

    if source.starts_with("http://") || source.starts_with("https://") {
        let bytes = download_media(source).await?;
        return ImageInput::from_bytes(bytes, None);
    }

    if source.starts_with("data:") {
        return ImageInput::from_data_url(source);
    }

    let path = Path::new(source);
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| PipelineError::InvalidImage(format!("{}: {err}", path.display())))?;
    ImageInput::from_bytes(bytes, None)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::GrayImage::new(width, height);
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    pub(crate) fn png_input(width: u32, height: u32) -> ImageInput {
        ImageInput::from_bytes(png_bytes(width, height), None).expect("png input")
    }

    #[test]
    fn strips_header_only_when_present() {
        assert_eq!(strip_data_url_header("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url_header("AAAA"), "AAAA");
    }

    #[test]
    fn parses_data_url_and_round_trips_mime() {
        let original = png_input(4, 3);
        let parsed = ImageInput::from_data_url(&original.to_data_url()).unwrap();
        assert_eq!(parsed.mime_type, "image/png");
        assert_eq!(parsed.bytes, original.bytes);
        assert_eq!(parsed.dimensions().unwrap(), (4, 3));
    }

    #[test]
    fn bare_base64_is_accepted() {
        let original = png_input(2, 2);
        let parsed = ImageInput::from_data_url(&original.to_base64()).unwrap();
        assert_eq!(parsed.mime_type, "image/png");
    }

    #[test]
    fn rejects_non_image_payloads() {
        let err = ImageInput::from_bytes(b"just some text, not an image".to_vec(), Some("text/plain"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidImage(_)));
        assert!(matches!(
            ImageInput::from_bytes(Vec::new(), None),
            Err(PipelineError::InvalidImage(_))
        ));
        assert!(matches!(
            ImageInput::from_data_url("data:image/png;base64,@@@"),
            Err(PipelineError::InvalidImage(_))
        ));
    }

    #[test]
    fn normalizes_legacy_mime_names() {
        assert_eq!(normalize_image_mime_type(" IMAGE/JPG "), "image/jpeg");
        assert_eq!(file_extension_for_mime("image/jpg"), "jpg");
        assert_eq!(file_extension_for_mime("application/octet-stream"), "bin");
    }

    #[test]
    fn inline_part_carries_raw_base64() {
        let input = png_input(1, 1);
        let part = input.inline_part();
        assert_eq!(part["inlineData"]["mimeType"], "image/png");
        let data = part["inlineData"]["data"].as_str().unwrap();
        assert!(!data.starts_with("data:"));
        assert_eq!(general_purpose::STANDARD.decode(data).unwrap(), input.bytes);
    }

    #[tokio::test]
    async fn loads_image_from_file() {
        let dir = std::env::temp_dir().join(format!("image_analyst_media_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("source.png");
        std::fs::write(&path, png_bytes(8, 6)).unwrap();

        let loaded = load_image(path.to_str().unwrap()).await.unwrap();
        assert_eq!(loaded.mime_type, "image/png");
        assert_eq!(loaded.dimensions().unwrap(), (8, 6));

        let missing = load_image(dir.join("missing.png").to_str().unwrap()).await;
        assert!(matches!(missing, Err(PipelineError::InvalidImage(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn retry_policy_covers_transient_statuses_only() {
        assert!(should_retry_status(StatusCode::BAD_GATEWAY));
        assert!(should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry_status(StatusCode::REQUEST_TIMEOUT));
        assert!(!should_retry_status(StatusCode::NOT_FOUND));
        assert!(!should_retry_status(StatusCode::FORBIDDEN));
        assert_eq!(download_backoff(0), Duration::from_millis(400));
        assert_eq!(download_backoff(2), Duration::from_millis(1600));
    }

    #[tokio::test]
    async fn unreachable_url_is_an_invalid_image_after_retries() {
        let err = load_image("http://127.0.0.1:9/photo.jpg").await.unwrap_err();
        match err {
            PipelineError::InvalidImage(detail) => {
                assert!(detail.contains("after 3 attempts"), "{detail}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
