//! Hindsight Session - Recording session management around the frame cache
//!
//! This crate wires producers and consumers onto a [`hindsight_cache::FrameCache`]:
//! an ingest loop feeds frames from a [`FrameSource`], and the [`Recorder`]
//! replays trailing windows of the stream into [`FrameSink`]s on request,
//! tracking finished replay tasks for the host to poll.

pub mod dispatch;
pub mod error;
pub mod recorder;
pub mod replay;
pub mod source;

pub use dispatch::dispatch;
pub use error::{SessionError, SessionResult};
pub use recorder::Recorder;
pub use replay::{FrameSink, MemorySink, ReplaySummary, ReplayWindow, StreamFileSink};
pub use source::{FrameSource, SyntheticSource};
