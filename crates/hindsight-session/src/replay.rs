//! Trailing-window replay out of the cache
//!
//! A replay anchors on the first keyframe at or after the window start and
//! walks the stream forward one frame at a time. When the walk catches up
//! with the producer it pauses briefly and retries, up to a configurable
//! budget of consecutive waits; when the window is evicted from under it
//! the replay fails for good.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use hindsight_cache::{FrameCache, ReadResult};
use hindsight_core::{FrameRecord, RecorderConfig, Result};
use tracing::{debug, info};

use crate::error::{SessionError, SessionResult};

/// Receives replayed frames in stream order
pub trait FrameSink: Send {
    /// Write one frame's payload
    fn write_frame(&mut self, frame: &FrameRecord) -> Result<()>;
    /// Flush buffered data once the window is complete
    fn finish(&mut self) -> Result<()>;
}

/// Replay window in producer timestamps: the replay covers the first
/// keyframe at or after `start_ms` through `end_ms` inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// What a completed replay wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames: u64,
    pub bytes: u64,
    pub first_timestamp_ms: i64,
    pub last_timestamp_ms: i64,
}

/// Drain one window of the stream into `sink`.
///
/// The quit flag is checked once per iteration, so cancellation takes
/// effect within one retry interval.
pub async fn replay_window<S: FrameSink>(
    cache: &FrameCache,
    sink: &mut S,
    window: ReplayWindow,
    config: &RecorderConfig,
    quit: &AtomicBool,
) -> SessionResult<ReplaySummary> {
    if window.end_ms <= window.start_ms {
        return Err(SessionError::InvalidWindow {
            start_ms: window.start_ms,
            end_ms: window.end_ms,
        });
    }

    let anchor = match cache.read_first_keyframe(window.start_ms) {
        ReadResult::Success(frame) => frame,
        _ => return Err(SessionError::NoAnchor(window.start_ms)),
    };
    if anchor.timestamp_ms > window.end_ms {
        // the nearest keyframe lies beyond the window, nothing to replay
        return Err(SessionError::NoAnchor(window.start_ms));
    }
    debug!("replay anchored at keyframe {}", anchor.timestamp_ms);

    sink.write_frame(&anchor)?;
    let mut summary = ReplaySummary {
        frames: 1,
        bytes: anchor.payload.len() as u64,
        first_timestamp_ms: anchor.timestamp_ms,
        last_timestamp_ms: anchor.timestamp_ms,
    };

    let mut waits = 0u32;
    loop {
        if quit.load(Ordering::Relaxed) {
            return Err(SessionError::Cancelled);
        }
        match cache.read_next_frame(summary.last_timestamp_ms) {
            ReadResult::Success(frame) => {
                waits = 0;
                if frame.timestamp_ms > window.end_ms {
                    break;
                }
                sink.write_frame(&frame)?;
                summary.frames += 1;
                summary.bytes += frame.payload.len() as u64;
                summary.last_timestamp_ms = frame.timestamp_ms;
            }
            ReadResult::Waiting => {
                if waits >= config.waiting_retry_budget {
                    return Err(SessionError::WaitBudgetExhausted { retries: waits });
                }
                waits += 1;
                tokio::time::sleep(config.retry_interval()).await;
            }
            ReadResult::Failed => {
                return Err(SessionError::WindowLost(summary.last_timestamp_ms));
            }
        }
    }

    sink.finish()?;
    info!(
        "replay complete: {} frames, {} bytes, span {}..{}",
        summary.frames, summary.bytes, summary.first_timestamp_ms, summary.last_timestamp_ms
    );
    Ok(summary)
}

/// Sink that appends raw frame payloads to a file.
///
/// The output is the elementary stream exactly as cached; wrapping it in a
/// container is left to the host.
pub struct StreamFileSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl StreamFileSink {
    /// Create the output file, including missing parent directories
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(&path)?);
        Ok(Self { writer, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSink for StreamFileSink {
    fn write_frame(&mut self, frame: &FrameRecord) -> Result<()> {
        self.writer.write_all(&frame.payload)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Sink that collects frames in memory, for tests and programmatic use
#[derive(Debug, Default)]
pub struct MemorySink {
    pub frames: Vec<FrameRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &FrameRecord) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
