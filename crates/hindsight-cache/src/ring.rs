//! Ring storage for encoded frames
//!
//! A preallocated byte arena holds frame payloads back to back. The write
//! cursor only ever moves forward; when a claim would run past the end of the
//! arena it jumps back to offset zero, leaving any short remainder as dead
//! space. Frames are always stored contiguously, never split across the wrap.
//!
//! Three side structures track what is resident: a timestamp-ordered index of
//! slots, an ordered set of keyframe timestamps for seeks, and an arrival
//! queue that fixes the eviction order. Eviction is strictly oldest-arrival
//! first, which under a monotonic producer is also oldest-timestamp first.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::Bound;

use bytes::Bytes;
use hindsight_core::FrameRecord;
use tracing::{trace, warn};

/// Where one frame lives inside the arena
#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: usize,
    len: usize,
    is_keyframe: bool,
}

/// Outcome of a successor lookup
#[derive(Debug)]
pub(crate) enum NextFrame {
    /// The frame following the anchor
    Found(FrameRecord),
    /// The anchor timestamp is no longer resident
    AnchorGone,
    /// The anchor is the newest frame written so far
    NoneNewer,
}

pub(crate) struct RingStorage {
    arena: Box<[u8]>,
    /// Next write offset
    cursor: usize,
    /// Offset where the oldest surviving payload begins; claims below this
    /// boundary need no reclaiming
    free_end: usize,
    index: BTreeMap<i64, Slot>,
    keyframes: BTreeSet<i64>,
    /// Timestamps in arrival order, front is evicted first
    arrival: VecDeque<i64>,
    bytes_used: usize,
    last_arrival: Option<i64>,
    inserted: u64,
    evicted: u64,
    replaced: u64,
    regressions: u64,
}

impl RingStorage {
    pub(crate) fn new(capacity_bytes: usize) -> Self {
        Self {
            arena: vec![0u8; capacity_bytes].into_boxed_slice(),
            cursor: 0,
            free_end: capacity_bytes,
            index: BTreeMap::new(),
            keyframes: BTreeSet::new(),
            arrival: VecDeque::new(),
            bytes_used: 0,
            last_arrival: None,
            inserted: 0,
            evicted: 0,
            replaced: 0,
            regressions: 0,
        }
    }

    /// Store one frame, evicting the oldest frames until its claim fits.
    ///
    /// The caller has already bounded the payload length, so a claim always
    /// fits the arena once enough old frames are retired.
    pub(crate) fn insert(&mut self, frame: &FrameRecord) {
        let ts = frame.timestamp_ms;
        let len = frame.payload.len();
        debug_assert!(len > 0 && len <= self.arena.len());

        if let Some(last) = self.last_arrival {
            if ts < last {
                warn!(
                    "frame timestamp {} arrived after {}, trailing-window ordering degraded",
                    ts, last
                );
                self.regressions += 1;
            }
        }
        self.last_arrival = Some(ts);

        if self.index.contains_key(&ts) {
            warn!("duplicate frame timestamp {}, replacing cached entry", ts);
            self.remove_entry(ts);
            self.replaced += 1;
        }

        // Wrap: the claim would run past the arena end. Retire frames
        // stranded in the tail, then continue from offset zero.
        if self.cursor + len > self.arena.len() {
            let mut dropped = 0usize;
            while let Some((_, slot)) = self.oldest_slot() {
                if slot.offset < self.cursor {
                    break;
                }
                self.evict_oldest();
                dropped += 1;
            }
            trace!("ring wrapped at offset {}, retired {} tail frames", self.cursor, dropped);
            self.cursor = 0;
            self.free_end = 0;
        }

        // Reclaim: the claim reaches into the oldest surviving payloads.
        // Evict in arrival order until the claim region holds no live frame.
        let claim_end = self.cursor + len;
        if claim_end > self.free_end {
            while let Some((_, slot)) = self.oldest_slot() {
                if slot.offset < self.cursor || slot.offset >= claim_end {
                    break;
                }
                self.free_end = slot.offset + slot.len;
                self.evict_oldest();
            }
        }

        let offset = self.cursor;
        self.arena[offset..offset + len].copy_from_slice(&frame.payload);
        self.index.insert(
            ts,
            Slot {
                offset,
                len,
                is_keyframe: frame.is_keyframe,
            },
        );
        if frame.is_keyframe {
            self.keyframes.insert(ts);
        }
        self.arrival.push_back(ts);
        self.cursor += len;
        self.bytes_used += len;
        self.inserted += 1;

        debug_assert_eq!(self.arrival.len(), self.index.len());
        debug_assert!(self.bytes_used <= self.arena.len());
    }

    /// Earliest keyframe at or after `ts`, copied out of the arena
    pub(crate) fn first_keyframe_at_or_after(&self, ts: i64) -> Option<FrameRecord> {
        let &key_ts = self.keyframes.range(ts..).next()?;
        let slot = self.index.get(&key_ts)?;
        Some(self.frame_at(key_ts, slot))
    }

    /// The frame immediately after `prev_ts` in timestamp order
    pub(crate) fn successor_of(&self, prev_ts: i64) -> NextFrame {
        if !self.index.contains_key(&prev_ts) {
            return NextFrame::AnchorGone;
        }
        match self
            .index
            .range((Bound::Excluded(prev_ts), Bound::Unbounded))
            .next()
        {
            Some((&ts, slot)) => NextFrame::Found(self.frame_at(ts, slot)),
            None => NextFrame::NoneNewer,
        }
    }

    fn frame_at(&self, ts: i64, slot: &Slot) -> FrameRecord {
        let payload = Bytes::copy_from_slice(&self.arena[slot.offset..slot.offset + slot.len]);
        FrameRecord {
            timestamp_ms: ts,
            is_keyframe: slot.is_keyframe,
            payload,
        }
    }

    fn oldest_slot(&self) -> Option<(i64, Slot)> {
        let &ts = self.arrival.front()?;
        let slot = self.index.get(&ts)?;
        Some((ts, *slot))
    }

    fn evict_oldest(&mut self) -> Option<i64> {
        let ts = self.arrival.pop_front()?;
        let slot = self.index.remove(&ts);
        debug_assert!(slot.is_some(), "arrival queue out of sync with index");
        let slot = slot?;
        if slot.is_keyframe {
            self.keyframes.remove(&ts);
        }
        self.bytes_used -= slot.len;
        self.evicted += 1;
        Some(ts)
    }

    fn remove_entry(&mut self, ts: i64) {
        if let Some(slot) = self.index.remove(&ts) {
            if slot.is_keyframe {
                self.keyframes.remove(&ts);
            }
            self.bytes_used -= slot.len;
            if let Some(pos) = self.arrival.iter().position(|&t| t == ts) {
                self.arrival.remove(pos);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.index.clear();
        self.keyframes.clear();
        self.arrival.clear();
        self.cursor = 0;
        self.free_end = self.arena.len();
        self.bytes_used = 0;
        self.last_arrival = None;
    }

    pub(crate) fn frames(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    pub(crate) fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub(crate) fn capacity(&self) -> usize {
        self.arena.len()
    }

    pub(crate) fn oldest_timestamp(&self) -> Option<i64> {
        self.index.keys().next().copied()
    }

    pub(crate) fn newest_timestamp(&self) -> Option<i64> {
        self.index.keys().next_back().copied()
    }

    pub(crate) fn inserted(&self) -> u64 {
        self.inserted
    }

    pub(crate) fn evicted(&self) -> u64 {
        self.evicted
    }

    pub(crate) fn replaced(&self) -> u64 {
        self.replaced
    }

    pub(crate) fn regressions(&self) -> u64 {
        self.regressions
    }
}

#[cfg(test)]
impl RingStorage {
    /// Full structural check: queue/index/keyframe bijection, slot bounds,
    /// no two live slots overlapping.
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(self.arrival.len(), self.index.len());
        for ts in &self.arrival {
            assert!(self.index.contains_key(ts));
        }
        for ts in &self.keyframes {
            assert!(self.index.contains_key(ts));
        }
        let mut spans: Vec<(usize, usize)> = self
            .index
            .values()
            .map(|s| (s.offset, s.offset + s.len))
            .collect();
        spans.sort_unstable();
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlapping slots: {pair:?}");
        }
        if let Some(&(_, end)) = spans.last() {
            assert!(end <= self.arena.len());
        }
        assert_eq!(
            self.bytes_used,
            self.index.values().map(|s| s.len).sum::<usize>()
        );
    }

    pub(crate) fn resident_timestamps(&self) -> Vec<i64> {
        self.index.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts: i64, is_keyframe: bool, len: usize) -> FrameRecord {
        FrameRecord::new(ts, is_keyframe, vec![ts as u8; len])
    }

    #[test]
    fn eviction_follows_arrival_order() {
        let mut ring = RingStorage::new(100);
        for ts in 1..=3 {
            ring.insert(&frame(ts, ts == 1, 30));
        }
        assert_eq!(ring.resident_timestamps(), vec![1, 2, 3]);

        // the fourth frame wraps and displaces the oldest
        ring.insert(&frame(4, false, 30));
        assert_eq!(ring.resident_timestamps(), vec![2, 3, 4]);
        ring.assert_consistent();

        ring.insert(&frame(5, false, 30));
        assert_eq!(ring.resident_timestamps(), vec![3, 4, 5]);
        ring.assert_consistent();
    }

    #[test]
    fn wrap_retires_frames_stranded_in_the_tail() {
        let mut ring = RingStorage::new(100);
        ring.insert(&frame(1, true, 30));
        ring.insert(&frame(2, false, 30));
        ring.insert(&frame(3, false, 30));
        // 50 bytes do not fit in the 10-byte tail: wrap, evicting 1 and 2
        ring.insert(&frame(4, false, 50));
        assert_eq!(ring.resident_timestamps(), vec![3, 4]);
        // the next wrap happens before the cursor reaches frame 3's offset,
        // so frame 3 is retired as a stranded tail frame
        ring.insert(&frame(5, false, 60));
        assert_eq!(ring.resident_timestamps(), vec![5]);
        ring.assert_consistent();
    }

    #[test]
    fn payload_bytes_survive_a_full_lap() {
        let mut ring = RingStorage::new(64);
        for ts in 0..10 {
            ring.insert(&frame(ts, true, 20));
            ring.assert_consistent();
        }
        let newest = ring.first_keyframe_at_or_after(9).unwrap();
        assert_eq!(newest.timestamp_ms, 9);
        assert!(newest.payload.iter().all(|&b| b == 9));
    }

    #[test]
    fn duplicate_timestamp_replaces_the_cached_entry() {
        let mut ring = RingStorage::new(100);
        ring.insert(&frame(10, false, 20));
        ring.insert(&FrameRecord::new(10, true, vec![7u8; 30]));
        assert_eq!(ring.frames(), 1);
        assert_eq!(ring.replaced(), 1);
        let f = ring.first_keyframe_at_or_after(0).unwrap();
        assert_eq!(f.timestamp_ms, 10);
        assert_eq!(f.payload.len(), 30);
        assert!(f.payload.iter().all(|&b| b == 7));
        ring.assert_consistent();
    }

    #[test]
    fn out_of_order_arrival_is_counted_not_rejected() {
        let mut ring = RingStorage::new(100);
        ring.insert(&frame(100, true, 10));
        ring.insert(&frame(50, false, 10));
        assert_eq!(ring.regressions(), 1);
        assert_eq!(ring.resident_timestamps(), vec![50, 100]);
    }

    #[test]
    fn usage_never_exceeds_capacity() {
        let mut ring = RingStorage::new(1_000);
        for ts in 0..200 {
            ring.insert(&frame(ts, ts % 10 == 0, 64));
            assert!(ring.bytes_used() <= ring.capacity());
            ring.assert_consistent();
        }
        assert!(ring.evicted() > 0);
    }

    #[test]
    fn successor_walk_distinguishes_gone_from_not_yet() {
        let mut ring = RingStorage::new(1_000);
        for ts in [0, 40, 80] {
            ring.insert(&frame(ts, ts == 0, 50));
        }
        match ring.successor_of(40) {
            NextFrame::Found(f) => assert_eq!(f.timestamp_ms, 80),
            other => panic!("unexpected lookup result: {other:?}"),
        }
        assert!(matches!(ring.successor_of(80), NextFrame::NoneNewer));
        assert!(matches!(ring.successor_of(41), NextFrame::AnchorGone));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any write sequence keeps the indexes bijective, stays inside
            /// the arena, and only ever displaces the oldest arrivals.
            #[test]
            fn arbitrary_write_sequences_keep_the_ring_consistent(
                frames in proptest::collection::vec((1usize..=512, any::<bool>()), 1..200)
            ) {
                let mut ring = RingStorage::new(4_096);
                let mut written = Vec::new();
                for (i, &(len, key)) in frames.iter().enumerate() {
                    let ts = i as i64 * 10;
                    ring.insert(&FrameRecord::new(ts, key, vec![0xAB; len]));
                    written.push(ts);

                    ring.assert_consistent();
                    prop_assert!(ring.bytes_used() <= ring.capacity());
                    let resident = ring.resident_timestamps();
                    prop_assert_eq!(
                        &written[written.len() - resident.len()..],
                        &resident[..]
                    );
                }
            }
        }
    }
}
