//! Command dispatch for the control surface
//!
//! Maps the wire commands onto the [`Recorder`] and shapes the replies.

use hindsight_core::{epoch_millis, Command, CommandReply};
use tracing::debug;

use crate::recorder::Recorder;

/// Execute one command against the session.
///
/// Failures come back as [`CommandReply::Error`] rather than `Err`, so the
/// wire loop never has to unwind.
pub async fn dispatch(recorder: &Recorder, command: Command) -> CommandReply {
    debug!("dispatching {:?}", command);
    match command {
        Command::IsEnvReady => CommandReply::EnvReady {
            ready: recorder.is_env_ready(),
        },
        Command::StartMuxer {
            timestamp,
            total_time_secs,
        } => {
            // the window trails backwards from the given end, or from now;
            // wire values can sit at the integer limits, so saturate
            let end_ms = timestamp.unwrap_or_else(epoch_millis);
            let window_ms = total_time_secs
                .map(|secs| secs.saturating_mul(1_000))
                .unwrap_or(recorder.config().default_window_ms);
            match recorder.replay_last(end_ms, window_ms).await {
                Ok(task_id) => CommandReply::MuxerStarted { task_id },
                Err(err) => CommandReply::Error {
                    message: err.to_string(),
                },
            }
        }
        Command::IsFinishedMuxer { task_id } => CommandReply::MuxerFinished {
            task_id,
            finished: recorder.is_finished(task_id).await,
        },
        Command::GetMuxerVideo { task_id } => CommandReply::MuxerVideo {
            task_id,
            path: recorder.video_path(task_id).await,
        },
        Command::RemoveFinishedMuxer { task_id } => CommandReply::Removed {
            task_id,
            removed: recorder.remove_finished(task_id).await,
        },
    }
}
