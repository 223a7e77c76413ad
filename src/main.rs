//! Hindsight - Trailing-window screen recording daemon
//!
//! Keeps the last seconds of an encoded frame stream in a fixed-size
//! in-memory cache and writes trailing windows of it to disk on demand.
//! Commands arrive as JSON objects on stdin, one per line; replies go to
//! stdout the same way.

use anyhow::Result;
use clap::Parser;
use hindsight_core::{CacheConfig, Command, CommandReply, RecorderConfig};
use hindsight_session::{dispatch, Recorder, SyntheticSource};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Hindsight - record the recent past of a frame stream on demand
#[derive(Parser, Debug)]
#[command(name = "hindsight")]
#[command(version, about, long_about = None)]
struct Args {
    /// Frame cache capacity in MiB
    #[arg(short, long, default_value = "30")]
    capacity: usize,

    /// Ingest frame rate
    #[arg(short, long, default_value = "20")]
    fps: u32,

    /// Stream bitrate in bits per second
    #[arg(short, long, default_value = "400000")]
    bitrate: u32,

    /// Keyframe interval in milliseconds
    #[arg(short = 'k', long, default_value = "1000")]
    keyframe_interval: i64,

    /// Replay window in seconds when startMuxer does not give one
    #[arg(short = 'w', long, default_value = "30")]
    window: i64,

    /// Directory for finished recordings (default: the user's video dir)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// How many finished recordings to keep on disk
    #[arg(long, default_value = "8")]
    keep: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("Hindsight v{}", env!("CARGO_PKG_VERSION"));

    let output_dir = args.output_dir.unwrap_or_else(|| {
        dirs::video_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("hindsight")
    });

    let cache_config = CacheConfig::new()
        .with_capacity_mib(args.capacity)
        .with_debug_logging(args.verbose);
    let recorder_config = RecorderConfig::new()
        .with_fps(args.fps)
        .with_bitrate(args.bitrate)
        .with_keyframe_interval_ms(args.keyframe_interval)
        .with_default_window_ms(args.window.saturating_mul(1_000))
        .with_output_dir(output_dir)
        .with_keep_files(args.keep);

    let recorder = Recorder::new(cache_config, recorder_config);
    let ingest = recorder.spawn_ingest(SyntheticSource::new(recorder.config()));

    info!("Recordings go to {}", recorder.config().output_dir.display());
    info!("Send one JSON command per line on stdin. Press Ctrl+C to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let reply = match serde_json::from_str::<Command>(line) {
                            Ok(command) => dispatch(&recorder, command).await,
                            Err(err) => {
                                warn!("unreadable command: {}", err);
                                CommandReply::Error {
                                    message: format!("unreadable command: {}", err),
                                }
                            }
                        };
                        println!("{}", serde_json::to_string(&reply)?);
                    }
                    None => {
                        info!("stdin closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    recorder.shutdown();
    ingest.await.ok();

    let stats = recorder.cache().stats();
    info!(
        "cache at shutdown: {} frames, {} bytes, {} evicted over the run",
        stats.frames, stats.bytes_used, stats.evicted
    );
    info!("Goodbye!");
    Ok(())
}
