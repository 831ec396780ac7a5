// Failure diagnostics - classifies why the fallback extractor gave up
//
// yt-dlp reports everything through stderr text. We map that text to a
// coarse reason so callers can tell a transient outage from a video that
// will never resolve.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingReason {
    /// HTTP 403 Forbidden
    Http403Forbidden,

    /// 429 or similar throttling
    RateLimited,

    /// Captcha / "confirm you're not a bot"
    BotDetection,

    /// Needs a logged-in, age-verified account
    AgeRestricted,

    GeoBlocked,

    PrivateVideo,

    /// Deleted, removed or never existed
    VideoUnavailable,

    /// DRM / paid content, never downloadable
    DrmProtected,

    /// Socket timeouts, refused connections
    NetworkTimeout,

    Unknown,
}

impl BlockingReason {
    /// No amount of retrying will help
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::DrmProtected | Self::VideoUnavailable | Self::PrivateVideo
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "Access denied (HTTP 403)",
            Self::RateLimited => "Rate limited upstream",
            Self::BotDetection => "Bot detection triggered",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Geographic restriction",
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::DrmProtected => "DRM-protected content",
            Self::NetworkTimeout => "Network timeout",
            Self::Unknown => "Unknown failure",
        }
    }
}

/// Substrings (lowercase) per reason, checked top to bottom. Permanent
/// reasons come first so they win over transient noise in the same message.
const PATTERNS: &[(BlockingReason, &[&str])] = &[
    (
        BlockingReason::DrmProtected,
        &["drm", "widevine", "requires purchase", "requires payment"],
    ),
    (BlockingReason::PrivateVideo, &["private video", "video is private"]),
    (
        BlockingReason::VideoUnavailable,
        &["video unavailable", "video is unavailable", "has been removed", "no longer available"],
    ),
    (BlockingReason::AgeRestricted, &["age-restricted", "confirm your age"]),
    (
        BlockingReason::GeoBlocked,
        &["not available in your country", "blocked in your country"],
    ),
    (
        BlockingReason::RateLimited,
        &["429", "rate limit", "too many requests"],
    ),
    (
        BlockingReason::BotDetection,
        &["not a bot", "captcha", "unusual traffic"],
    ),
    (BlockingReason::Http403Forbidden, &["403", "forbidden"]),
    (
        BlockingReason::NetworkTimeout,
        &["timeout", "timed out", "connection refused", "network unreachable"],
    ),
];

/// Classify extractor stderr. Blank input yields `None`, anything
/// unrecognised `Unknown`.
pub fn diagnose_error(stderr: &str) -> Option<BlockingReason> {
    if stderr.trim().is_empty() {
        return None;
    }

    let lower = stderr.to_lowercase();
    PATTERNS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(reason, _)| *reason)
        .or(Some(BlockingReason::Unknown))
}
