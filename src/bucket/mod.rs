//! Request bucketing strategies.
//!
//! # Responsibilities
//! - Derive a short classification string from request metadata and raw
//!   payload bytes
//! - Segment diff metrics per bucket and drive require/exclude filtering
//!
//! # Design Decisions
//! - Closed set of tagged variants; exactly one is active per process,
//!   enforced by config validation before startup completes
//! - Strategies are pure functions of fixed offsets plus input; an empty
//!   string means "unclassified"
//! - Payload bytes may not be valid UTF-8; conversion is lossy

use crate::mirror::capture::RequestMeta;

/// A bucketing strategy with its fixed offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bucketer {
    /// `payload[start..end)`, end clamped to the payload length.
    RangeSlice { start: usize, end: usize },
    /// Substring from `start` up to one byte before the first NUL.
    NullTerminatedString { start: usize },
    /// 4-byte big-endian length at `pos`, followed by that many bytes.
    LengthPrefixedString { pos: usize },
    /// Path segments `[start..end)` joined with `_`.
    PathSegment { start: usize, end: usize },
}

impl Bucketer {
    /// Classify one request. Returns the empty string when the configured
    /// offsets do not land inside the input.
    pub fn classify(&self, meta: &RequestMeta, payload: &[u8]) -> String {
        match *self {
            Bucketer::RangeSlice { start, end } => {
                let end = end.min(payload.len());
                payload.get(start..end).map(lossy).unwrap_or_default()
            }
            Bucketer::NullTerminatedString { start } => {
                let Some(tail) = payload.get(start..) else {
                    return String::new();
                };
                let Some(nul) = tail.iter().position(|&b| b == 0) else {
                    return String::new();
                };
                // The byte just before the NUL is trimmed, matching the
                // wire format this strategy was built for.
                match (start + nul).checked_sub(1) {
                    Some(end) if end >= start => lossy(&payload[start..end]),
                    _ => String::new(),
                }
            }
            Bucketer::LengthPrefixedString { pos } => {
                let Some(prefix) = pos
                    .checked_add(4)
                    .and_then(|prefix_end| payload.get(pos..prefix_end))
                else {
                    return String::new();
                };
                let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
                let start = pos + 4;
                let end = start.saturating_add(len as usize).min(payload.len());
                lossy(&payload[start..end])
            }
            Bucketer::PathSegment { start, end } => {
                let parts: Vec<&str> = meta.uri.path().split('/').collect();
                if start >= parts.len() {
                    return String::new();
                }
                let end = end.min(parts.len());
                if start >= end {
                    return String::new();
                }
                parts[start..end].join("_")
            }
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method, Uri, Version};

    fn meta(path: &str) -> RequestMeta {
        RequestMeta {
            method: Method::GET,
            uri: path.parse::<Uri>().unwrap(),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
        }
    }

    #[test]
    fn range_slice_takes_configured_window() {
        let b = Bucketer::RangeSlice { start: 0, end: 4 };
        assert_eq!(b.classify(&meta("/"), b"abcdXYZ"), "abcd");
    }

    #[test]
    fn range_slice_clamps_end_to_payload() {
        let b = Bucketer::RangeSlice { start: 0, end: 4 };
        assert_eq!(b.classify(&meta("/"), b"abc"), "abc");
    }

    #[test]
    fn range_slice_out_of_range_start_is_unclassified() {
        let b = Bucketer::RangeSlice { start: 9, end: 12 };
        assert_eq!(b.classify(&meta("/"), b"abc"), "");
    }

    #[test]
    fn cstring_trims_byte_before_nul() {
        let b = Bucketer::NullTerminatedString { start: 0 };
        assert_eq!(b.classify(&meta("/"), b"abcd\0rest"), "abc");
    }

    #[test]
    fn cstring_respects_start_offset() {
        let b = Bucketer::NullTerminatedString { start: 2 };
        assert_eq!(b.classify(&meta("/"), b"xxabcd\0"), "abc");
    }

    #[test]
    fn cstring_without_nul_is_unclassified() {
        let b = Bucketer::NullTerminatedString { start: 0 };
        assert_eq!(b.classify(&meta("/"), b"abcd"), "");
    }

    #[test]
    fn cstring_nul_at_start_is_unclassified() {
        let b = Bucketer::NullTerminatedString { start: 0 };
        assert_eq!(b.classify(&meta("/"), b"\0abcd"), "");
    }

    #[test]
    fn length_prefixed_reads_big_endian_length() {
        let b = Bucketer::LengthPrefixedString { pos: 0 };
        let mut payload = vec![0, 0, 0, 4];
        payload.extend_from_slice(b"keysrest");
        assert_eq!(b.classify(&meta("/"), &payload), "keys");
    }

    #[test]
    fn length_prefixed_clamps_to_payload_end() {
        let b = Bucketer::LengthPrefixedString { pos: 0 };
        let mut payload = vec![0, 0, 0, 200];
        payload.extend_from_slice(b"short");
        assert_eq!(b.classify(&meta("/"), &payload), "short");
    }

    #[test]
    fn length_prefixed_truncated_prefix_is_unclassified() {
        let b = Bucketer::LengthPrefixedString { pos: 2 };
        assert_eq!(b.classify(&meta("/"), b"abcd"), "");
    }

    #[test]
    fn path_segment_joins_with_underscore() {
        let b = Bucketer::PathSegment { start: 1, end: 3 };
        assert_eq!(b.classify(&meta("/api/v2/users/42"), b""), "api_v2");
    }

    #[test]
    fn path_segment_clamps_end() {
        let b = Bucketer::PathSegment { start: 1, end: 10 };
        assert_eq!(b.classify(&meta("/api/v2"), b""), "api_v2");
    }

    #[test]
    fn path_segment_start_past_segments_is_unclassified() {
        let b = Bucketer::PathSegment { start: 5, end: 6 };
        assert_eq!(b.classify(&meta("/api"), b""), "");
    }

    #[test]
    fn classification_ignores_invalid_utf8_gracefully() {
        let b = Bucketer::RangeSlice { start: 0, end: 2 };
        let got = b.classify(&meta("/"), &[0xff, 0xfe, b'x']);
        assert_eq!(got.chars().count(), 2);
    }
}
