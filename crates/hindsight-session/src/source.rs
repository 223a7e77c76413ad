//! Frame producers feeding the ingest loop

use std::time::{Duration, Instant};

use hindsight_core::{epoch_millis, FrameRecord, RecorderConfig, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Supplies encoded frames to the ingest loop.
///
/// Implementations are polled: `Ok(None)` means no frame is due yet and the
/// caller should try again after a short pause. An error ends the ingest
/// loop for good.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<FrameRecord>>;
}

/// Paced test-pattern producer standing in for a real encoder.
///
/// Emits frames at the configured rate with wall-clock timestamps, a
/// keyframe at every GOP boundary, and payload sizes derived from the
/// nominal bitrate. Keyframes carry several times the bytes of a delta
/// frame, like real encoded video.
pub struct SyntheticSource {
    interval: Duration,
    frames_per_gop: u64,
    nominal_len: usize,
    next_due: Instant,
    frame_index: u64,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(config: &RecorderConfig) -> Self {
        let frame_ms = (config.frame_interval().as_millis() as i64).max(1);
        let frames_per_gop = (config.keyframe_interval_ms / frame_ms).max(1) as u64;
        Self {
            interval: config.frame_interval(),
            frames_per_gop,
            nominal_len: config.nominal_frame_len(),
            next_due: Instant::now(),
            frame_index: 0,
            rng: StdRng::from_entropy(),
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<FrameRecord>> {
        let now = Instant::now();
        if now < self.next_due {
            return Ok(None);
        }
        self.next_due += self.interval;
        // if we fell behind, skip ahead rather than bursting
        if self.next_due <= now {
            self.next_due = now + self.interval;
        }

        let is_keyframe = self.frame_index % self.frames_per_gop == 0;
        self.frame_index += 1;

        let base = if is_keyframe {
            self.nominal_len * 4
        } else {
            self.nominal_len
        };
        let len = base + self.rng.gen_range(0..=base / 4);
        let mut payload = vec![0u8; len];
        self.rng.fill(payload.as_mut_slice());

        Ok(Some(FrameRecord::new(epoch_millis(), is_keyframe, payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_is_an_immediate_keyframe() {
        let config = RecorderConfig::default();
        let mut source = SyntheticSource::new(&config);

        let frame = source.next_frame().unwrap().unwrap();
        assert!(frame.is_keyframe);
        assert!(frame.payload.len() >= config.nominal_frame_len());

        // the next frame is not due yet
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn keyframes_follow_the_gop_cadence() {
        // 200 fps with a 20 ms GOP: a keyframe every 4th frame
        let config = RecorderConfig::new()
            .with_fps(200)
            .with_keyframe_interval_ms(20);
        let mut source = SyntheticSource::new(&config);

        let mut flags = Vec::new();
        while flags.len() < 8 {
            match source.next_frame().unwrap() {
                Some(frame) => flags.push(frame.is_keyframe),
                None => std::thread::sleep(Duration::from_millis(1)),
            }
        }
        assert_eq!(
            flags,
            vec![true, false, false, false, true, false, false, false]
        );
    }
}
