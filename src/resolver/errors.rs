// Error types for stream resolution

use std::time::Duration;
use thiserror::Error;

use super::extractors::{diagnose_error, BlockingReason};
use super::models::StreamKind;

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Transport error or non-2xx status from one provider
    #[error("provider unreachable: {0}")]
    ProviderUnreachable(String),

    /// Per-request timeout expired
    #[error("provider timed out")]
    ProviderTimeout,

    /// 200 with a body we cannot use
    #[error("bad provider response: {0}")]
    BadResponse(String),

    /// Valid metadata, but nothing of the requested kind
    #[error("no {0} streams available")]
    NoStreamsAvailable(StreamKind),

    /// Last-resort extractor failed as well
    #[error("temporarily unavailable: {0}")]
    FallbackUnavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("resolution did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    /// Provider list could not be loaded
    #[error("provider source failed: {0}")]
    Source(String),
}

impl ResolveError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::ProviderTimeout
        } else if err.is_decode() {
            Self::BadResponse(err.to_string())
        } else {
            Self::ProviderUnreachable(err.to_string())
        }
    }
}

/// Caller-facing failure of a resolve call
#[derive(Debug, Clone)]
pub struct ResolverFailure {
    pub error: ResolveError,
    pub reason: Option<BlockingReason>,
    /// Upstream outages are usually transient, so most failures suggest retrying
    pub retry_suggested: bool,
}

impl From<ResolveError> for ResolverFailure {
    fn from(error: ResolveError) -> Self {
        let reason = match &error {
            ResolveError::FallbackUnavailable(msg) => diagnose_error(msg),
            _ => None,
        };
        let retry_suggested = match &error {
            ResolveError::InvalidInput(_) => false,
            _ => !reason.map_or(false, |r| r.is_permanent()),
        };

        Self {
            error,
            reason,
            retry_suggested,
        }
    }
}

impl std::fmt::Display for ResolverFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(reason) = &self.reason {
            write!(f, " ({})", reason.description())?;
        }

        Ok(())
    }
}

impl std::error::Error for ResolverFailure {}
