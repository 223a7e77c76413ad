//! Configuration types for Hindsight

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default ring capacity in MiB when none (or an invalid one) is given
pub const DEFAULT_CAPACITY_MIB: usize = 30;

/// Largest accepted ring capacity in MiB
pub const MAX_CAPACITY_MIB: usize = 99;

/// Largest accepted single-frame payload in bytes
pub const DEFAULT_MAX_FRAME_SIZE: usize = 2 * 1024 * 1024;

/// Largest accepted ingest frame rate
pub const MAX_FPS: u32 = 240;

/// Configuration for the in-memory frame cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Ring capacity hint in MiB
    pub capacity_mib: usize,
    /// Upper bound for a single frame payload in bytes
    pub max_frame_size: usize,
    /// Emit per-frame debug logging for writes and reads
    pub debug_logging: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_mib: DEFAULT_CAPACITY_MIB,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            debug_logging: false,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set ring capacity in MiB
    pub fn with_capacity_mib(mut self, capacity_mib: usize) -> Self {
        self.capacity_mib = capacity_mib;
        self
    }

    /// Builder pattern: set the per-frame payload ceiling in bytes
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Builder pattern: toggle per-frame debug logging
    pub fn with_debug_logging(mut self, debug_logging: bool) -> Self {
        self.debug_logging = debug_logging;
        self
    }

    /// Return a copy with out-of-range values replaced by defaults.
    ///
    /// Capacity hints outside `1..=99` MiB fall back to
    /// [`DEFAULT_CAPACITY_MIB`] rather than failing construction.
    pub fn normalized(&self) -> Self {
        let mut cfg = self.clone();
        if cfg.capacity_mib == 0 || cfg.capacity_mib > MAX_CAPACITY_MIB {
            warn!(
                "cache capacity {} MiB out of range, using {} MiB",
                cfg.capacity_mib, DEFAULT_CAPACITY_MIB
            );
            cfg.capacity_mib = DEFAULT_CAPACITY_MIB;
        }
        if cfg.max_frame_size == 0 {
            warn!(
                "max frame size of zero is unusable, using {} bytes",
                DEFAULT_MAX_FRAME_SIZE
            );
            cfg.max_frame_size = DEFAULT_MAX_FRAME_SIZE;
        }
        // a frame must fit the arena whole
        if cfg.max_frame_size > cfg.capacity_bytes() {
            warn!(
                "max frame size {} larger than the arena, capping at {}",
                cfg.max_frame_size,
                cfg.capacity_bytes()
            );
            cfg.max_frame_size = cfg.capacity_bytes();
        }
        cfg
    }

    /// Ring capacity in bytes
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_mib * 1024 * 1024
    }
}

/// Configuration for the recording session around the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Target ingest frame rate
    pub fps: u32,
    /// Nominal stream bitrate in bits per second, used to size synthetic frames
    pub bitrate: u32,
    /// Keyframe cadence in milliseconds
    pub keyframe_interval_ms: i64,
    /// Replay window length in milliseconds when a request gives none
    pub default_window_ms: i64,
    /// Sleep between retries while waiting on the producer
    pub retry_interval_ms: u64,
    /// How many consecutive waiting retries a replay may spend before aborting
    pub waiting_retry_budget: u32,
    /// Directory for replayed stream files
    pub output_dir: PathBuf,
    /// Newest output files kept when pruning the output directory
    pub keep_files: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            fps: 20,
            bitrate: 400_000,
            keyframe_interval_ms: 1_000,
            default_window_ms: 30_000,
            retry_interval_ms: 10,
            waiting_retry_budget: 500,
            output_dir: std::env::temp_dir().join("hindsight"),
            keep_files: 8,
        }
    }
}

impl RecorderConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set frame rate, clamped to `1..=MAX_FPS`
    pub fn with_fps(mut self, fps: u32) -> Self {
        if fps == 0 || fps > MAX_FPS {
            warn!("frame rate {} out of range, clamping to 1..={}", fps, MAX_FPS);
        }
        self.fps = fps.clamp(1, MAX_FPS);
        self
    }

    /// Builder pattern: set nominal bitrate
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Builder pattern: set keyframe cadence
    pub fn with_keyframe_interval_ms(mut self, interval_ms: i64) -> Self {
        self.keyframe_interval_ms = interval_ms.max(1);
        self
    }

    /// Builder pattern: set the default replay window
    pub fn with_default_window_ms(mut self, window_ms: i64) -> Self {
        self.default_window_ms = window_ms;
        self
    }

    /// Builder pattern: set the waiting retry interval
    pub fn with_retry_interval_ms(mut self, interval_ms: u64) -> Self {
        self.retry_interval_ms = interval_ms;
        self
    }

    /// Builder pattern: set the waiting retry budget
    pub fn with_waiting_retry_budget(mut self, budget: u32) -> Self {
        self.waiting_retry_budget = budget;
        self
    }

    /// Builder pattern: set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Builder pattern: set how many output files pruning keeps
    pub fn with_keep_files(mut self, keep_files: usize) -> Self {
        self.keep_files = keep_files;
        self
    }

    /// Time between two frames at the configured rate, never zero
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis((1_000 / u64::from(self.fps.max(1))).max(1))
    }

    /// Sleep used between waiting retries
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Nominal payload size for one frame at the configured bitrate
    pub fn nominal_frame_len(&self) -> usize {
        (self.bitrate / 8 / self.fps.max(1)).max(1) as usize
    }
}
