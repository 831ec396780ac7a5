// StreamSelector - picks the one stream we hand back to the caller
//
// Rules:
// - Audio: highest bitrate wins
// - Video: muxed (audio+video) beats video-only no matter the resolution,
//   then highest numeric quality wins
// - Ties always go to the candidate seen first
//
// Pure functions only; nothing in here touches the network.

use lazy_static::lazy_static;
use regex::Regex;

use super::errors::ResolveError;
use super::models::{StreamCandidate, StreamKind};

lazy_static! {
    static ref QUALITY_RE: Regex = Regex::new(r"^\s*(\d+)").expect("static quality regex");
}

/// Knobs that change how candidates are ranked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Rank MP4/AAC audio ahead of other containers when any is offered
    pub prefer_compatible_audio: bool,
}

pub struct StreamSelector;

impl StreamSelector {
    /// Select the best candidate of `kind`
    pub fn select(
        candidates: &[StreamCandidate],
        kind: StreamKind,
        policy: SelectionPolicy,
    ) -> Result<StreamCandidate, ResolveError> {
        let matching: Vec<&StreamCandidate> =
            candidates.iter().filter(|c| c.kind == kind).collect();

        if matching.is_empty() {
            return Err(ResolveError::NoStreamsAvailable(kind));
        }

        let pool = match kind {
            StreamKind::Audio => Self::audio_pool(matching, policy),
            StreamKind::Video => Self::video_pool(matching),
        };

        first_max(&pool)
            .cloned()
            .ok_or(ResolveError::NoStreamsAvailable(kind))
    }

    fn audio_pool(
        matching: Vec<&StreamCandidate>,
        policy: SelectionPolicy,
    ) -> Vec<&StreamCandidate> {
        if !policy.prefer_compatible_audio {
            return matching;
        }

        let compatible: Vec<&StreamCandidate> = matching
            .iter()
            .copied()
            .filter(|c| is_compatible_audio(c))
            .collect();

        if compatible.is_empty() {
            matching
        } else {
            compatible
        }
    }

    fn video_pool(matching: Vec<&StreamCandidate>) -> Vec<&StreamCandidate> {
        let (muxed, video_only): (Vec<&StreamCandidate>, Vec<&StreamCandidate>) =
            matching.into_iter().partition(|c| c.is_muxed);

        if muxed.is_empty() {
            video_only
        } else {
            muxed
        }
    }
}

/// Maximum by `measure`; the earliest candidate wins ties.
/// (`Iterator::max_by_key` returns the last maximum, which is not what we want.)
fn first_max<'a>(pool: &[&'a StreamCandidate]) -> Option<&'a StreamCandidate> {
    let mut best: Option<&'a StreamCandidate> = None;
    for &candidate in pool {
        match best {
            Some(current) if candidate.measure <= current.measure => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// MP4 container with AAC audio plays everywhere
fn is_compatible_audio(candidate: &StreamCandidate) -> bool {
    candidate.mime_type.as_deref().map_or(false, |m| {
        let m = m.to_lowercase();
        m.starts_with("audio/mp4") || m.starts_with("audio/m4a") || m.contains("mp4a")
    })
}

/// Parse a quality label like "720p" or "1080p60" into 720 / 1080.
/// Anything unparsable ranks lowest (0).
pub fn parse_quality(label: &str) -> u32 {
    QUALITY_RE
        .captures(label)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}
