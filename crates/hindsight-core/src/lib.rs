//! Hindsight Core - Shared types and protocol definitions
//!
//! This crate provides the foundational types used across all Hindsight components.

pub mod config;
pub mod error;
pub mod frame;
pub mod protocol;

pub use config::{CacheConfig, RecorderConfig};
pub use error::{Error, Result};
pub use frame::{epoch_millis, FrameRecord};
pub use protocol::{Command, CommandReply};
