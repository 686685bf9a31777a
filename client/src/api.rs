use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response, multipart};
use serde::de::DeserializeOwned;

use crate::models::{ErrorBody, PredictionResult, TextClassification, TextRequest};

/// Errors that can occur while talking to the detection service.
#[derive(Debug)]
pub enum ApiError {
    Http(reqwest::Error),
    Io { path: PathBuf, source: io::Error },
    UnexpectedStatus { status: StatusCode, body: String },
}

impl ApiError {
    /// Message shown to the user: the server's `error` field when it sent one,
    /// otherwise the transport-level error text.
    pub fn display_message(&self) -> String {
        match self {
            ApiError::UnexpectedStatus { status, body } => server_error_message(body)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .map(str::to_string)
                        .unwrap_or_else(|| status.as_str().to_string())
                }),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Http(err) => write!(f, "http error: {err}"),
            ApiError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ApiError::UnexpectedStatus { status, body } => {
                write!(f, "unexpected status {status}: {body}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        ApiError::Http(value)
    }
}

fn server_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
}

/// The two calls the UI makes. Implemented by [`ApiClient`]; kept as a trait so
/// handlers can be driven without a network.
pub trait PredictionService {
    fn predict(&self, file: &Path) -> Result<PredictionResult, ApiError>;

    fn classify_text(&self, text: &str) -> Result<TextClassification, ApiError>;
}

/// Blocking client for the `/predict` and `/text` endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    /// Create a new client targeting the provided base URL.
    ///
    /// Requests never time out unless `timeout` is set.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn handle_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        if response.status().is_success() {
            return response.json().map_err(ApiError::from);
        }

        let status = response.status();
        let body = response.text().unwrap_or_default();
        Err(ApiError::UnexpectedStatus { status, body })
    }
}

impl PredictionService for ApiClient {
    /// Uploads `file` as the `file` field of a multipart form to `/predict`.
    fn predict(&self, file: &Path) -> Result<PredictionResult, ApiError> {
        let bytes = fs::read(file).map_err(|source| ApiError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_type_for(file))?;
        let form = multipart::Form::new().part("file", part);

        let url = format!("{}/predict", self.base_url);
        log::debug!("POST {url} ({})", file.display());
        let response = self.http.post(url).multipart(form).send()?;
        Self::handle_json(response)
    }

    /// Sends `{"text": ...}` to `/text`.
    fn classify_text(&self, text: &str) -> Result<TextClassification, ApiError> {
        let url = format!("{}/text", self.base_url);
        log::debug!("POST {url} ({} chars)", text.chars().count());
        let response = self.http.post(url).json(&TextRequest { text }).send()?;
        Self::handle_json(response)
    }
}

/// Image formats the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Video formats the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    Mp4,
    Avi,
    QuickTime,
}

impl VideoFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "video/mp4",
            VideoFormat::Avi => "video/x-msvideo",
            VideoFormat::QuickTime => "video/quicktime",
        }
    }
}

fn image_format_from_path(path: &Path) -> Option<ImageFormat> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("png") {
        Some(ImageFormat::Png)
    } else if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") {
        Some(ImageFormat::Jpeg)
    } else {
        None
    }
}

fn video_format_from_path(path: &Path) -> Option<VideoFormat> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("mp4") {
        Some(VideoFormat::Mp4)
    } else if ext.eq_ignore_ascii_case("avi") {
        Some(VideoFormat::Avi)
    } else if ext.eq_ignore_ascii_case("mov") {
        Some(VideoFormat::QuickTime)
    } else {
        None
    }
}

/// MIME type sent with an upload. Unknown extensions still go out; the server
/// decides what it supports.
pub fn mime_type_for(path: &Path) -> &'static str {
    if let Some(format) = image_format_from_path(path) {
        format.mime_type()
    } else if let Some(format) = video_format_from_path(path) {
        format.mime_type()
    } else {
        "application/octet-stream"
    }
}
