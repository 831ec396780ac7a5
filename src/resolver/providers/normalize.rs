// Response normalization - both provider shapes into StreamCandidate
//
// "streams" shape (Piped):
//   { title, uploader, audioStreams: [{url, bitrate, mimeType}],
//     videoStreams: [{url, quality, mimeType, videoOnly}] }
//
// flat "format list" shape (Invidious):
//   { title, author, formatStreams: [{url, type, quality, qualityLabel}],
//     adaptiveFormats: [{url, type, bitrate, qualityLabel}] }
//   or a generic `formats: [{url, type, quality}]` list in the same style
//
// The shape is detected from the body, never from the provider kind.

use serde_json::Value;

use crate::resolver::errors::ResolveError;
use crate::resolver::models::{RawMetadata, StreamCandidate, StreamKind};
use crate::resolver::selector::parse_quality;

/// Parse and normalize a provider body
pub fn parse_metadata(body: &[u8]) -> Result<RawMetadata, ResolveError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ResolveError::BadResponse("empty body".to_string()));
    }

    let json: Value = serde_json::from_slice(body)
        .map_err(|e| ResolveError::BadResponse(format!("Invalid JSON: {}", e)))?;

    normalize(&json)
}

/// Normalize an already-parsed provider response
pub fn normalize(json: &Value) -> Result<RawMetadata, ResolveError> {
    if !json.is_object() {
        return Err(ResolveError::BadResponse("expected a JSON object".to_string()));
    }

    let title = non_empty_str(&json["title"]);
    let has_streams_shape = json["audioStreams"].is_array() || json["videoStreams"].is_array();
    let has_flat_shape = json["formatStreams"].is_array()
        || json["adaptiveFormats"].is_array()
        || json["formats"].is_array();

    // An error payload ({"error": "..."}) has none of these
    if title.is_none() && !has_streams_shape && !has_flat_shape {
        return Err(ResolveError::BadResponse(
            json["error"]
                .as_str()
                .map(|e| format!("provider error: {}", e))
                .unwrap_or_else(|| "no title or stream lists in response".to_string()),
        ));
    }

    let mut candidates = Vec::new();
    if has_streams_shape {
        candidates.extend(streams_shape(json));
    }
    if has_flat_shape {
        candidates.extend(flat_shape(json));
    }

    Ok(RawMetadata {
        title,
        uploader: non_empty_str(&json["uploader"]).or_else(|| non_empty_str(&json["author"])),
        candidates,
    })
}

fn streams_shape(json: &Value) -> Vec<StreamCandidate> {
    let mut out = Vec::new();

    for s in array(&json["audioStreams"]) {
        let Some(url) = non_empty_str(&s["url"]) else {
            continue;
        };
        out.push(StreamCandidate {
            url,
            kind: StreamKind::Audio,
            measure: number(&s["bitrate"]),
            is_muxed: false,
            mime_type: non_empty_str(&s["mimeType"]),
            quality_label: non_empty_str(&s["quality"]),
        });
    }

    for s in array(&json["videoStreams"]) {
        let Some(url) = non_empty_str(&s["url"]) else {
            continue;
        };
        let quality = non_empty_str(&s["quality"]);
        out.push(StreamCandidate {
            url,
            kind: StreamKind::Video,
            measure: quality.as_deref().map(parse_quality).unwrap_or(0),
            // Missing flag means the stream carries audio
            is_muxed: !s["videoOnly"].as_bool().unwrap_or(false),
            mime_type: non_empty_str(&s["mimeType"]),
            quality_label: quality,
        });
    }

    out
}

fn flat_shape(json: &Value) -> Vec<StreamCandidate> {
    let mut out = Vec::new();

    for f in array(&json["formatStreams"]) {
        out.extend(flat_entry(f, true));
    }
    for f in array(&json["adaptiveFormats"]).chain(array(&json["formats"])) {
        out.extend(flat_entry(f, false));
    }

    out
}

fn flat_entry(f: &Value, from_muxed_list: bool) -> Option<StreamCandidate> {
    let url = non_empty_str(&f["url"])?;
    let mime = non_empty_str(&f["type"]).or_else(|| non_empty_str(&f["mimeType"]));
    let mime_lower = mime.as_deref().unwrap_or("").to_lowercase();

    let kind = if mime_lower.starts_with("audio/") {
        StreamKind::Audio
    } else if mime_lower.starts_with("video/") || from_muxed_list {
        StreamKind::Video
    } else {
        return None;
    };

    let candidate = match kind {
        StreamKind::Audio => StreamCandidate {
            url,
            kind,
            measure: number(&f["bitrate"]),
            is_muxed: false,
            mime_type: mime,
            quality_label: non_empty_str(&f["audioQuality"]),
        },
        StreamKind::Video => {
            let label =
                non_empty_str(&f["qualityLabel"]).or_else(|| non_empty_str(&f["quality"]));
            StreamCandidate {
                url,
                kind,
                measure: label.as_deref().map(parse_quality).unwrap_or(0),
                is_muxed: from_muxed_list || codecs_carry_audio(&mime_lower),
                mime_type: mime,
                quality_label: label,
            }
        }
    };

    Some(candidate)
}

/// `video/mp4; codecs="avc1.42001E, mp4a.40.2"` lists an audio codec too
fn codecs_carry_audio(mime_lower: &str) -> bool {
    let Some(codecs) = mime_lower.split("codecs=").nth(1) else {
        return false;
    };
    codecs
        .split(',')
        .map(|c| c.trim_matches(|ch: char| ch == '"' || ch.is_whitespace()))
        .any(|c| c.starts_with("mp4a") || c.starts_with("opus") || c.starts_with("vorbis"))
}

fn array(value: &Value) -> impl Iterator<Item = &Value> {
    value.as_array().into_iter().flatten()
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Bitrates arrive as numbers (Piped) or numeric strings (Invidious)
fn number(value: &Value) -> u32 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_streams_shape() {
        let body = json!({
            "title": "Song",
            "uploader": "DJ",
            "audioStreams": [
                {"url": "https://a/1", "bitrate": 130000, "mimeType": "audio/mp4", "quality": "128 kbps"},
                {"url": "", "bitrate": 999999}
            ],
            "videoStreams": [
                {"url": "https://v/1", "quality": "1080p", "mimeType": "video/mp4", "videoOnly": true},
                {"url": "https://v/2", "quality": "360p", "mimeType": "video/mp4", "videoOnly": false},
                {"url": "https://v/3", "quality": "720p"}
            ]
        });

        let meta = normalize(&body).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Song"));
        assert_eq!(meta.uploader.as_deref(), Some("DJ"));
        assert_eq!(meta.candidates.len(), 4);

        let audio: Vec<_> = meta.candidates.iter().filter(|c| c.kind == StreamKind::Audio).collect();
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].measure, 130000);

        let v1 = meta.candidates.iter().find(|c| c.url == "https://v/1").unwrap();
        assert!(!v1.is_muxed);
        assert_eq!(v1.measure, 1080);
        let v3 = meta.candidates.iter().find(|c| c.url == "https://v/3").unwrap();
        assert!(v3.is_muxed);
    }

    #[test]
    fn test_flat_shape() {
        let body = json!({
            "title": "Clip",
            "author": "Channel",
            "formatStreams": [
                {"url": "https://f/18", "type": "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"", "quality": "medium", "qualityLabel": "360p"}
            ],
            "adaptiveFormats": [
                {"url": "https://f/140", "type": "audio/mp4; codecs=\"mp4a.40.2\"", "bitrate": "130000"},
                {"url": "https://f/251", "type": "audio/webm; codecs=\"opus\"", "bitrate": "160000"},
                {"url": "https://f/137", "type": "video/mp4; codecs=\"avc1.640028\"", "bitrate": "4000000", "qualityLabel": "1080p"}
            ]
        });

        let meta = normalize(&body).unwrap();
        assert_eq!(meta.uploader.as_deref(), Some("Channel"));
        assert_eq!(meta.candidates.len(), 4);

        let muxed = meta.candidates.iter().find(|c| c.url == "https://f/18").unwrap();
        assert_eq!(muxed.kind, StreamKind::Video);
        assert!(muxed.is_muxed);
        assert_eq!(muxed.measure, 360);

        let opus = meta.candidates.iter().find(|c| c.url == "https://f/251").unwrap();
        assert_eq!(opus.kind, StreamKind::Audio);
        assert_eq!(opus.measure, 160000);

        let adaptive = meta.candidates.iter().find(|c| c.url == "https://f/137").unwrap();
        assert!(!adaptive.is_muxed);
        assert_eq!(adaptive.measure, 1080);
    }

    #[test]
    fn test_generic_formats_list() {
        let body = json!({
            "title": "Generic",
            "formats": [
                {"url": "https://g/1", "type": "video/mp4", "quality": "720p"},
                {"url": "https://g/2", "type": "audio/webm", "bitrate": 96000},
                {"url": "https://g/3", "type": "text/vtt"},
                {"url": "https://g/4"}
            ]
        });

        let meta = normalize(&body).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Generic"));
        let urls: Vec<&str> = meta.candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://g/1", "https://g/2"]);

        let video = &meta.candidates[0];
        assert_eq!(video.kind, StreamKind::Video);
        assert_eq!(video.measure, 720);
        assert_eq!(video.quality_label.as_deref(), Some("720p"));
        assert!(!video.is_muxed);

        let audio = &meta.candidates[1];
        assert_eq!(audio.kind, StreamKind::Audio);
        assert_eq!(audio.measure, 96000);
        assert!(!audio.is_muxed);
    }

    #[test]
    fn test_title_only_is_accepted() {
        let meta = normalize(&json!({"title": "Live now"})).unwrap();
        assert!(meta.candidates.is_empty());
    }

    #[test]
    fn test_bad_bodies() {
        assert!(matches!(parse_metadata(b""), Err(ResolveError::BadResponse(_))));
        assert!(matches!(parse_metadata(b"<html>"), Err(ResolveError::BadResponse(_))));
        assert!(matches!(parse_metadata(b"[]"), Err(ResolveError::BadResponse(_))));
        assert!(matches!(parse_metadata(b"{}"), Err(ResolveError::BadResponse(_))));

        let err = parse_metadata(br#"{"error": "Video unavailable"}"#).unwrap_err();
        assert!(err.to_string().contains("Video unavailable"));
    }

    #[test]
    fn test_codecs_carry_audio() {
        assert!(codecs_carry_audio("video/mp4; codecs=\"avc1.42001e, mp4a.40.2\""));
        assert!(!codecs_carry_audio("video/webm; codecs=\"vp9\""));
        assert!(!codecs_carry_audio("video/mp4"));
    }
}
