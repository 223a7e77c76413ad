//! Control protocol message types
//!
//! The recorder daemon is driven by small JSON commands, one object per
//! line, mirroring the intent-style operations the original host app sent.
//! Variant names are the wire-level operation names.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Commands sent from a host application to the recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum Command {
    /// Ask whether the capture environment is up and frames are flowing
    IsEnvReady,
    /// Replay the trailing window ending at `timestamp` into a file
    StartMuxer {
        /// Window end in epoch milliseconds; the current time when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
        /// Window length in seconds; the configured default when absent
        #[serde(default, rename = "totalTime", skip_serializing_if = "Option::is_none")]
        total_time_secs: Option<i64>,
    },
    /// Ask whether a replay task has finished
    IsFinishedMuxer {
        #[serde(rename = "taskId")]
        task_id: i64,
    },
    /// Fetch the output path of a finished replay task
    GetMuxerVideo {
        #[serde(rename = "taskId")]
        task_id: i64,
    },
    /// Forget a finished replay task
    RemoveFinishedMuxer {
        #[serde(rename = "taskId")]
        task_id: i64,
    },
}

/// Replies sent back for each command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CommandReply {
    /// Answer to [`Command::IsEnvReady`]
    EnvReady { ready: bool },
    /// A replay task was accepted and started
    MuxerStarted {
        #[serde(rename = "taskId")]
        task_id: i64,
    },
    /// Answer to [`Command::IsFinishedMuxer`]
    MuxerFinished {
        #[serde(rename = "taskId")]
        task_id: i64,
        finished: bool,
    },
    /// Answer to [`Command::GetMuxerVideo`]
    MuxerVideo {
        #[serde(rename = "taskId")]
        task_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    /// Answer to [`Command::RemoveFinishedMuxer`]
    Removed {
        #[serde(rename = "taskId")]
        task_id: i64,
        removed: bool,
    },
    /// The command was understood but could not be carried out
    Error { message: String },
}
