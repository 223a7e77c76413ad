//! Cache controller over the ring storage
//!
//! [`FrameCache`] is a cheap-to-clone handle; the producer side keeps one
//! clone for writes while any number of readers seek and walk the stream.
//! All operations take `&self` and hold the internal lock only for the
//! duration of a single insert or lookup, so a slow reader never blocks the
//! producer for longer than one frame copy.

use std::sync::Arc;

use hindsight_core::{CacheConfig, Error, FrameRecord, Result};
use parking_lot::RwLock;
use tracing::debug;

use crate::ring::{NextFrame, RingStorage};

/// Outcome of a cache read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    /// The requested frame, copied out of the ring
    Success(FrameRecord),
    /// Nothing newer has been written yet; retry after a short pause
    Waiting,
    /// The requested position is gone from the ring and will not come back
    Failed,
}

impl ReadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ReadResult::Success(_))
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, ReadResult::Waiting)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ReadResult::Failed)
    }

    /// Extract the frame from a successful read
    pub fn into_frame(self) -> Option<FrameRecord> {
        match self {
            ReadResult::Success(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Point-in-time counters and occupancy of the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Frames currently resident
    pub frames: usize,
    /// Resident keyframes
    pub keyframes: usize,
    /// Payload bytes currently resident
    pub bytes_used: usize,
    /// Arena size in bytes
    pub capacity_bytes: usize,
    /// Frames accepted since construction
    pub inserted: u64,
    /// Frames displaced to make room since construction
    pub evicted: u64,
    /// Duplicate-timestamp writes that replaced an entry
    pub replaced: u64,
    /// Writes that arrived with a timestamp older than their predecessor
    pub regressions: u64,
    /// Smallest resident timestamp
    pub oldest_timestamp: Option<i64>,
    /// Largest resident timestamp
    pub newest_timestamp: Option<i64>,
}

/// Shared handle to a fixed-capacity frame cache
#[derive(Clone)]
pub struct FrameCache {
    ring: Arc<RwLock<RingStorage>>,
    config: CacheConfig,
}

impl FrameCache {
    /// Create a cache with default capacity and limits
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a cache from a configuration; out-of-range values are
    /// normalized with a logged warning rather than rejected
    pub fn with_config(config: CacheConfig) -> Self {
        let config = config.normalized();
        let ring = RingStorage::new(config.capacity_bytes());
        debug!(
            "frame cache ready: {} MiB arena, {} byte frame limit",
            config.capacity_mib, config.max_frame_size
        );
        Self {
            ring: Arc::new(RwLock::new(ring)),
            config,
        }
    }

    /// Append one frame, evicting the oldest frames if needed.
    ///
    /// Fails fast on an empty or oversized payload without touching the
    /// cache; those frames are lost, never truncated.
    pub fn write_frame(&self, frame: FrameRecord) -> Result<()> {
        if frame.payload.is_empty() {
            return Err(Error::EmptyPayload);
        }
        if frame.payload.len() > self.config.max_frame_size {
            return Err(Error::PayloadTooLarge {
                len: frame.payload.len(),
                max: self.config.max_frame_size,
            });
        }
        self.ring.write().insert(&frame);
        if self.config.debug_logging {
            debug!(
                "cached frame ts={} keyframe={} len={}",
                frame.timestamp_ms,
                frame.is_keyframe,
                frame.payload.len()
            );
        }
        Ok(())
    }

    /// Find the earliest keyframe at or after `timestamp_ms`.
    ///
    /// Replay must start on a keyframe, so non-keyframes are invisible to
    /// this seek. Never returns [`ReadResult::Waiting`]: either a suitable
    /// keyframe is resident now or the request is not servable.
    pub fn read_first_keyframe(&self, timestamp_ms: i64) -> ReadResult {
        let ring = self.ring.read();
        match ring.first_keyframe_at_or_after(timestamp_ms) {
            Some(frame) => {
                if self.config.debug_logging {
                    debug!(
                        "first keyframe for ts={} is ts={}",
                        timestamp_ms, frame.timestamp_ms
                    );
                }
                ReadResult::Success(frame)
            }
            None => ReadResult::Failed,
        }
    }

    /// Fetch the frame that follows `prev_timestamp_ms` in the stream.
    ///
    /// [`ReadResult::Waiting`] means the caller is at the head of the stream
    /// and should retry once the producer has written more.
    /// [`ReadResult::Failed`] means the anchor frame was evicted (or never
    /// existed) and the walk cannot continue.
    pub fn read_next_frame(&self, prev_timestamp_ms: i64) -> ReadResult {
        let ring = self.ring.read();
        match ring.successor_of(prev_timestamp_ms) {
            NextFrame::Found(frame) => {
                if self.config.debug_logging {
                    debug!("next frame after ts={} is ts={}", prev_timestamp_ms, frame.timestamp_ms);
                }
                ReadResult::Success(frame)
            }
            NextFrame::NoneNewer => ReadResult::Waiting,
            NextFrame::AnchorGone => ReadResult::Failed,
        }
    }

    /// Drop every resident frame, keeping the arena and lifetime counters
    pub fn clear(&self) {
        self.ring.write().clear();
        debug!("frame cache cleared");
    }

    /// Snapshot the current occupancy and counters
    pub fn stats(&self) -> CacheStats {
        let ring = self.ring.read();
        CacheStats {
            frames: ring.frames(),
            keyframes: ring.keyframe_count(),
            bytes_used: ring.bytes_used(),
            capacity_bytes: ring.capacity(),
            inserted: ring.inserted(),
            evicted: ring.evicted(),
            replaced: ring.replaced(),
            regressions: ring.regressions(),
            oldest_timestamp: ring.oldest_timestamp(),
            newest_timestamp: ring.newest_timestamp(),
        }
    }

    /// The normalized configuration this cache runs with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new()
    }
}
