//! Hindsight Cache - Fixed-capacity time-indexed frame storage
//!
//! This crate holds the trailing window of an encoded video stream in a
//! preallocated byte ring. A producer appends frames as they leave the
//! encoder; a consumer seeks a keyframe near a requested timestamp and walks
//! the stream forward from there, while writes and evictions continue.

pub mod cache;
mod ring;

pub use cache::{CacheStats, FrameCache, ReadResult};
