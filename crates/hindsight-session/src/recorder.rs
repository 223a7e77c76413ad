//! Recording session orchestration
//!
//! The [`Recorder`] owns the frame cache and the session state around it:
//! an environment-ready flag maintained by the ingest loop, a single-slot
//! busy guard for replays, and a registry of finished replay outputs keyed
//! by task id. Replays run on spawned tasks; callers poll the registry.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use hindsight_cache::FrameCache;
use hindsight_core::{CacheConfig, RecorderConfig};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::replay::{replay_window, ReplayWindow, StreamFileSink};
use crate::source::FrameSource;

/// Shared handle on a recording session. Clones talk to the same session.
#[derive(Clone)]
pub struct Recorder {
    cache: FrameCache,
    config: RecorderConfig,
    env_ready: Arc<AtomicBool>,
    replaying: Arc<AtomicBool>,
    quit: Arc<AtomicBool>,
    finished: Arc<RwLock<HashMap<i64, PathBuf>>>,
}

impl Recorder {
    pub fn new(cache_config: CacheConfig, config: RecorderConfig) -> Self {
        let cache = FrameCache::with_config(cache_config);
        info!(
            "recorder ready: {} MiB cache, output dir {}",
            cache.config().capacity_mib,
            config.output_dir.display()
        );
        Self {
            cache,
            config,
            env_ready: Arc::new(AtomicBool::new(false)),
            replaying: Arc::new(AtomicBool::new(false)),
            quit: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// True while a producer is feeding the cache
    pub fn is_env_ready(&self) -> bool {
        self.env_ready.load(Ordering::Relaxed)
    }

    /// For producers that feed the cache directly instead of through
    /// [`Recorder::spawn_ingest`]
    pub fn set_env_ready(&self, ready: bool) {
        self.env_ready.store(ready, Ordering::Relaxed);
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying.load(Ordering::SeqCst)
    }

    /// Run `source` on a spawned task, feeding every frame into the cache.
    ///
    /// The environment counts as ready for as long as the loop runs. A frame
    /// the cache rejects is dropped with a warning; a source error ends the
    /// loop.
    pub fn spawn_ingest<S>(&self, mut source: S) -> tokio::task::JoinHandle<()>
    where
        S: FrameSource + 'static,
    {
        let cache = self.cache.clone();
        let config = self.config.clone();
        let env_ready = Arc::clone(&self.env_ready);
        let quit = Arc::clone(&self.quit);
        tokio::spawn(async move {
            info!("capture loop started");
            env_ready.store(true, Ordering::Relaxed);
            while !quit.load(Ordering::Relaxed) {
                match source.next_frame() {
                    Ok(Some(frame)) => {
                        let timestamp_ms = frame.timestamp_ms;
                        if let Err(err) = cache.write_frame(frame) {
                            warn!("dropping frame {}: {}", timestamp_ms, err);
                        }
                    }
                    Ok(None) => {
                        // next frame is not due yet
                        tokio::time::sleep(config.retry_interval()).await;
                    }
                    Err(err) => {
                        error!("frame source failed: {}", err);
                        break;
                    }
                }
            }
            env_ready.store(false, Ordering::Relaxed);
            info!("capture loop stopped");
        })
    }

    /// Replay the window `start_ms..=end_ms` into a new output file.
    ///
    /// Returns the task id (the window end timestamp) as soon as the replay
    /// task is off the ground. At most one replay runs at a time; a second
    /// request while one is in flight is rejected as busy. On success the
    /// task registers its output under the returned id; on failure it
    /// removes the partial file and registers nothing.
    pub async fn start_replay(&self, start_ms: i64, end_ms: i64) -> SessionResult<i64> {
        if !self.is_env_ready() {
            return Err(SessionError::NotReady);
        }
        if end_ms <= start_ms {
            return Err(SessionError::InvalidWindow { start_ms, end_ms });
        }
        if self.replaying.swap(true, Ordering::SeqCst) {
            return Err(SessionError::Busy);
        }

        if let Err(err) = prune_old_outputs(&self.config.output_dir, self.config.keep_files) {
            warn!("could not prune old recordings: {}", err);
        }

        let task_id = end_ms;
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        let path = self.config.output_dir.join(format!("rec_{}.h264", stamp));
        info!(
            "muxer task {} started: window {}..{} -> {}",
            task_id,
            start_ms,
            end_ms,
            path.display()
        );

        let recorder = self.clone();
        tokio::spawn(async move {
            let window = ReplayWindow { start_ms, end_ms };
            let result = async {
                let mut sink = StreamFileSink::create(&path)?;
                replay_window(
                    &recorder.cache,
                    &mut sink,
                    window,
                    &recorder.config,
                    &recorder.quit,
                )
                .await
            }
            .await;
            match result {
                Ok(summary) => {
                    info!(
                        "muxer task {} finished: {} frames, {} bytes",
                        task_id, summary.frames, summary.bytes
                    );
                    recorder.finished.write().await.insert(task_id, path);
                }
                Err(err) => {
                    warn!("muxer task {} failed: {}", task_id, err);
                    if let Err(remove_err) = fs::remove_file(&path) {
                        debug!(
                            "could not remove partial file {}: {}",
                            path.display(),
                            remove_err
                        );
                    }
                }
            }
            recorder.replaying.store(false, Ordering::SeqCst);
        });

        Ok(task_id)
    }

    /// Replay the `window_ms` milliseconds of stream ending at `end_ms`.
    ///
    /// The window start saturates rather than wrapping, so an oversized
    /// length asks for everything cached and a degenerate end collapses
    /// into the invalid-window rejection.
    pub async fn replay_last(&self, end_ms: i64, window_ms: i64) -> SessionResult<i64> {
        self.start_replay(end_ms.saturating_sub(window_ms), end_ms).await
    }

    pub async fn is_finished(&self, task_id: i64) -> bool {
        self.finished.read().await.contains_key(&task_id)
    }

    pub async fn video_path(&self, task_id: i64) -> Option<PathBuf> {
        self.finished.read().await.get(&task_id).cloned()
    }

    /// Drop a finished task from the registry. The output file stays on
    /// disk until pruning catches up with it.
    pub async fn remove_finished(&self, task_id: i64) -> bool {
        self.finished.write().await.remove(&task_id).is_some()
    }

    /// Stop the ingest loop and any replay in flight
    pub fn shutdown(&self) {
        info!("shutdown requested");
        self.quit.store(true, Ordering::Relaxed);
    }
}

/// Keep the newest `keep` files in `dir`, removing the rest by modification
/// time. A directory that does not exist yet counts as already pruned.
fn prune_old_outputs(dir: &Path, keep: usize) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    let mut outputs: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        outputs.push((meta.modified()?, entry.path()));
    }
    if outputs.len() <= keep {
        return Ok(());
    }
    outputs.sort_by_key(|(modified, _)| *modified);
    let excess = outputs.len() - keep;
    for (_, path) in outputs.into_iter().take(excess) {
        debug!("pruning old recording {}", path.display());
        fs::remove_file(&path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SyntheticSource;
    use hindsight_core::FrameRecord;
    use std::time::Duration;

    fn test_recorder(output_dir: &Path) -> Recorder {
        Recorder::new(
            CacheConfig::new().with_capacity_mib(1),
            RecorderConfig::new()
                .with_output_dir(output_dir)
                .with_retry_interval_ms(1),
        )
    }

    fn prefill(recorder: &Recorder, upto_ms: i64) {
        for ts in (0..=upto_ms).step_by(20) {
            recorder
                .cache()
                .write_frame(FrameRecord::new(ts, ts % 400 == 0, vec![0x44; 300]))
                .unwrap();
        }
    }

    async fn wait_for_finished(recorder: &Recorder, task_id: i64) -> Option<PathBuf> {
        for _ in 0..200 {
            if recorder.is_finished(task_id).await {
                return recorder.video_path(task_id).await;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    #[tokio::test]
    async fn replay_requires_a_ready_environment_and_a_sane_window() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = test_recorder(dir.path());

        let err = recorder.start_replay(0, 1_000).await.unwrap_err();
        assert!(matches!(err, SessionError::NotReady));

        recorder.set_env_ready(true);
        let err = recorder.start_replay(1_000, 1_000).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidWindow {
                start_ms: 1_000,
                end_ms: 1_000
            }
        ));
    }

    #[tokio::test]
    async fn a_second_replay_is_rejected_while_one_is_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = test_recorder(dir.path());
        recorder.set_env_ready(true);
        prefill(&recorder, 2_000);

        // the busy flag is taken before the task runs, so this is
        // deterministic even though the first replay has not finished
        let task_id = recorder.start_replay(0, 1_000).await.unwrap();
        assert!(recorder.is_replaying());
        let err = recorder.start_replay(0, 2_000).await.unwrap_err();
        assert!(matches!(err, SessionError::Busy));

        assert!(wait_for_finished(&recorder, task_id).await.is_some());
        assert!(!recorder.is_replaying());
    }

    #[tokio::test]
    async fn finished_tasks_are_registered_and_removable() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = test_recorder(dir.path());
        recorder.set_env_ready(true);
        prefill(&recorder, 2_000);

        let task_id = recorder.start_replay(500, 1_500).await.unwrap();
        assert_eq!(task_id, 1_500);

        let path = wait_for_finished(&recorder, task_id).await.unwrap();
        assert!(path.exists());
        // window 500..1500 anchors at the keyframe 800, 36 frames of 300 B
        assert_eq!(std::fs::read(&path).unwrap().len(), 36 * 300);

        assert!(recorder.remove_finished(task_id).await);
        assert!(!recorder.is_finished(task_id).await);
        assert!(!recorder.remove_finished(task_id).await);
        // removal drops the registry entry, not the file
        assert!(path.exists());
    }

    #[tokio::test]
    async fn failed_replays_leave_no_registry_entry_or_file() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = test_recorder(dir.path());
        recorder.set_env_ready(true);

        // nothing cached, the replay has no anchor and must fail
        let task_id = recorder.start_replay(0, 1_000).await.unwrap();
        for _ in 0..200 {
            if !recorder.is_replaying() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!recorder.is_replaying());
        assert!(!recorder.is_finished(task_id).await);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn old_recordings_are_pruned_before_a_new_replay() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..11 {
            std::fs::write(dir.path().join(format!("rec_{:02}.h264", i)), b"x").unwrap();
        }

        let recorder = Recorder::new(
            CacheConfig::new().with_capacity_mib(1),
            RecorderConfig::new()
                .with_output_dir(dir.path())
                .with_keep_files(8)
                .with_retry_interval_ms(1),
        );
        recorder.set_env_ready(true);
        prefill(&recorder, 1_000);

        let task_id = recorder.start_replay(0, 1_000).await.unwrap();
        assert!(wait_for_finished(&recorder, task_id).await.is_some());

        // 8 survivors plus the fresh recording
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 9);
    }

    #[tokio::test]
    async fn ingest_loop_marks_the_environment_ready_and_caches_frames() {
        let recorder = Recorder::new(
            CacheConfig::new().with_capacity_mib(1),
            RecorderConfig::new().with_fps(200).with_retry_interval_ms(1),
        );
        let handle = recorder.spawn_ingest(SyntheticSource::new(recorder.config()));

        let mut frames = 0;
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            frames = recorder.cache().stats().frames;
            if recorder.is_env_ready() && frames >= 5 {
                break;
            }
        }
        assert!(recorder.is_env_ready());
        assert!(frames >= 5);

        recorder.shutdown();
        handle.await.unwrap();
        assert!(!recorder.is_env_ready());
    }
}
