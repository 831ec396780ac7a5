// Common data models for stream resolution

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use super::errors::ResolveError;

/// Opaque video identifier as handed to us by the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    /// Accepts any non-blank identifier (surrounding whitespace is dropped)
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::InvalidInput("missing video id".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Percent-encoded form for URL paths and query values
    pub fn url_encoded(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the caller wants out of the video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Audio,
    Video,
}

impl StreamKind {
    /// Extension used when the stream's mime type tells us nothing
    pub fn default_ext(&self) -> &'static str {
        match self {
            Self::Audio => "m4a",
            Self::Video => "mp4",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// API flavour spoken by a provider instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Piped,
    Invidious,
}

impl ProviderKind {
    pub fn streams_path(&self, video_id: &VideoId) -> String {
        match self {
            Self::Piped => format!("/streams/{}", video_id.url_encoded()),
            Self::Invidious => format!("/api/v1/videos/{}", video_id.url_encoded()),
        }
    }

    pub fn health_path(&self) -> &'static str {
        match self {
            Self::Piped => "/healthcheck",
            Self::Invidious => "/api/v1/stats",
        }
    }
}

/// Advisory liveness of a provider. A healthy provider may still fail a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Liveness {
    #[default]
    Unknown,
    Healthy,
    Unreachable,
}

impl Liveness {
    /// Sort key used by health-ranked ordering (lower goes first)
    pub fn rank(&self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Unknown => 1,
            Self::Unreachable => 2,
        }
    }
}

/// A metadata provider instance (Piped / Invidious)
#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    pub base_url: String,
    pub kind: ProviderKind,
    pub liveness: Liveness,
    pub last_checked: Option<OffsetDateTime>,
}

impl Provider {
    pub fn new(base_url: impl Into<String>, kind: ProviderKind) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            kind,
            liveness: Liveness::Unknown,
            last_checked: None,
        }
    }

    pub fn piped(base_url: impl Into<String>) -> Self {
        Self::new(base_url, ProviderKind::Piped)
    }

    pub fn invidious(base_url: impl Into<String>) -> Self {
        Self::new(base_url, ProviderKind::Invidious)
    }

    pub fn streams_url(&self, video_id: &VideoId) -> String {
        format!("{}{}", self.base_url, self.kind.streams_path(video_id))
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.base_url, self.kind.health_path())
    }
}

/// One normalized stream offered by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct StreamCandidate {
    pub url: String,
    pub kind: StreamKind,
    /// Bitrate for audio, numeric quality (720, 1080...) for video
    pub measure: u32,
    /// Video stream that also carries audio
    pub is_muxed: bool,
    pub mime_type: Option<String>,
    pub quality_label: Option<String>,
}

/// Normalized metadata response from one provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadata {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub candidates: Vec<StreamCandidate>,
}

/// Output of the fallback extractor
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedStream {
    pub direct_url: String,
    pub title: String,
    pub uploader: String,
    pub ext: Option<String>,
}

/// Who produced a resolved stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSource {
    Provider(String),
    Fallback(&'static str),
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(url) => write!(f, "{}", url),
            Self::Fallback(name) => write!(f, "fallback:{}", name),
        }
    }
}

/// The single externally visible result of a resolve call
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStream {
    pub url: String,
    pub display_title: String,
    pub kind: StreamKind,
    pub source: StreamSource,
    pub mime_type: Option<String>,
    /// Container extension reported by the extractor, if any
    pub ext: Option<String>,
}

impl ResolvedStream {
    /// File extension for downloads: extractor ext, then mime type, then kind default
    pub fn file_ext(&self) -> String {
        if let Some(ext) = self.ext.as_deref().filter(|e| !e.is_empty()) {
            return ext.to_string();
        }
        self.mime_type
            .as_deref()
            .and_then(ext_from_mime)
            .unwrap_or_else(|| self.kind.default_ext())
            .to_string()
    }
}

fn ext_from_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or(mime).trim().to_lowercase();
    match essence.as_str() {
        "audio/mp4" | "audio/m4a" => Some("m4a"),
        "audio/webm" => Some("webm"),
        "audio/mpeg" => Some("mp3"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/3gpp" => Some("3gp"),
        _ => None,
    }
}
