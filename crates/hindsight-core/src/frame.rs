//! Frame representation for encoded video data
//!
//! This module provides the common FrameRecord type passed from the encoder
//! side into the cache and back out to muxer sinks.

use bytes::Bytes;

/// Milliseconds since the Unix epoch, the timestamp base producers use
pub fn epoch_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A single encoded video frame together with its stream metadata
#[derive(Clone, PartialEq, Eq)]
pub struct FrameRecord {
    /// Presentation timestamp in milliseconds, assigned by the producer
    pub timestamp_ms: i64,
    /// Whether this frame starts a new group of pictures
    pub is_keyframe: bool,
    /// Encoded payload bytes, opaque to the cache
    pub payload: Bytes,
}

impl FrameRecord {
    /// Create a new frame record from encoded payload bytes
    pub fn new(timestamp_ms: i64, is_keyframe: bool, payload: impl Into<Bytes>) -> Self {
        Self {
            timestamp_ms,
            is_keyframe,
            payload: payload.into(),
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True when the payload carries no bytes
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl std::fmt::Debug for FrameRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRecord")
            .field("timestamp_ms", &self.timestamp_ms)
            .field("is_keyframe", &self.is_keyframe)
            .field("size", &self.payload.len())
            .finish()
    }
}
