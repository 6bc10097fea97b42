//! LRU-K replacement policy.
//!
//! The LRU-K algorithm evicts the frame whose backward k-distance is the
//! maximum over all evictable frames, where backward k-distance is the
//! time between now and the k-th most recent access. A frame with fewer
//! than k recorded accesses has infinite k-distance and is always
//! preferred as a victim over any frame with k or more.
//!
//! Rather than recomputing distances, tracked frames live in one of two
//! ordered cohorts:
//!
//! - the **history list**: frames with fewer than k accesses, in FIFO
//!   order of first access. All have infinite k-distance, and FIFO order
//!   is exactly the earliest-first-access tiebreak.
//! - the **buffer list**: frames with at least k accesses, most recently
//!   used at the tail. The head is the frame with the largest finite
//!   k-distance.
//!
//! Eviction scans the history head first, then the buffer head. A cold
//! page touched fewer than k times is therefore always chosen before a
//! hot one, at negligible cost over a single queue.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use super::frame::FrameId;

/// Per-frame bookkeeping.
struct FrameRecord {
    visits: usize,
    evictable: bool,
}

/// Cohort lists and record map, guarded by the replacer latch.
struct ReplacerInner {
    /// Frames with visits < k, FIFO by first access.
    history: VecDeque<FrameId>,
    /// Frames with visits >= k, most recently used at the tail.
    buffer: VecDeque<FrameId>,
    /// All tracked frames.
    records: HashMap<FrameId, FrameRecord>,
    /// Count of tracked frames currently marked evictable.
    evictable: usize,
}

impl ReplacerInner {
    /// Removes `frame_id` from a cohort list.
    ///
    /// Every tracked frame is in exactly one list, so a miss here is a
    /// corrupted-state bug.
    fn detach(list: &mut VecDeque<FrameId>, frame_id: FrameId) {
        let pos = list
            .iter()
            .position(|&f| f == frame_id)
            .expect("tracked frame missing from its cohort list");
        list.remove(pos);
    }

    /// Pops the first evictable frame from `list`, if any.
    fn pop_evictable(
        list: &mut VecDeque<FrameId>,
        records: &mut HashMap<FrameId, FrameRecord>,
    ) -> Option<FrameId> {
        let pos = list
            .iter()
            .position(|frame_id| records[frame_id].evictable)?;
        let frame_id = list.remove(pos).expect("position came from this list");
        records.remove(&frame_id);
        Some(frame_id)
    }
}

/// Replacer choosing eviction victims by backward k-distance.
///
/// Tracks up to `capacity` frames (the pool size); the buffer pool only
/// ever records accesses for frame ids below the pool size, so the bound
/// is asserted rather than enforced by eviction.
pub struct LruKReplacer {
    /// Number of historical accesses that make a frame "hot".
    k: usize,
    /// Maximum number of tracked frames.
    capacity: usize,
    inner: Mutex<ReplacerInner>,
}

impl LruKReplacer {
    /// Creates a replacer for `capacity` frames with the given `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero.
    pub fn new(capacity: usize, k: usize) -> Self {
        assert!(k > 0, "k must be greater than 0");
        Self {
            k,
            capacity,
            inner: Mutex::new(ReplacerInner {
                history: VecDeque::new(),
                buffer: VecDeque::new(),
                records: HashMap::with_capacity(capacity),
                evictable: 0,
            }),
        }
    }

    /// Records an access to `frame_id` at the current time.
    ///
    /// An untracked frame is admitted non-evictable with one recorded
    /// access - into the history cohort, or straight into the buffer
    /// cohort when that single access already meets k. A tracked frame's
    /// visit count rises; at k visits it graduates to the buffer cohort,
    /// and further accesses move it to the buffer tail.
    ///
    /// # Panics
    ///
    /// Panics if `frame_id` is outside the pool (`index >= capacity`).
    pub fn record_access(&self, frame_id: FrameId) {
        assert!(
            frame_id.index() < self.capacity,
            "frame {} outside replacer capacity {}",
            frame_id.index(),
            self.capacity
        );
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if let Some(record) = inner.records.get_mut(&frame_id) {
            if record.visits < self.k {
                record.visits += 1;
                if record.visits == self.k {
                    ReplacerInner::detach(&mut inner.history, frame_id);
                    inner.buffer.push_back(frame_id);
                }
            } else {
                ReplacerInner::detach(&mut inner.buffer, frame_id);
                inner.buffer.push_back(frame_id);
            }
            return;
        }
        inner.records.insert(
            frame_id,
            FrameRecord {
                visits: 1,
                evictable: false,
            },
        );
        // Keep the cohort invariant (visits < k lives in history) on
        // admission too: with k = 1 a single access already makes the
        // frame a full LRU citizen.
        if self.k == 1 {
            inner.buffer.push_back(frame_id);
        } else {
            inner.history.push_back(frame_id);
        }
    }

    /// Marks a tracked frame evictable or not. No-op for untracked frames.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(record) = inner.records.get_mut(&frame_id) else {
            return;
        };
        if record.evictable == evictable {
            return;
        }
        record.evictable = evictable;
        if evictable {
            inner.evictable += 1;
        } else {
            inner.evictable -= 1;
        }
    }

    /// Evicts the evictable frame with the largest backward k-distance.
    ///
    /// Returns `None` when no tracked frame is evictable. The victim is
    /// dropped from the replacer entirely; a later `record_access` starts
    /// its history from scratch.
    pub fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.evictable == 0 {
            return None;
        }
        let frame_id = ReplacerInner::pop_evictable(&mut inner.history, &mut inner.records)
            .or_else(|| ReplacerInner::pop_evictable(&mut inner.buffer, &mut inner.records))
            .expect("evictable count is positive but no cohort holds an evictable frame");
        inner.evictable -= 1;
        Some(frame_id)
    }

    /// Drops a tracked frame from the replacer.
    ///
    /// No-op for untracked frames. Must only be called on evictable
    /// frames; the buffer pool removes pinned frames by never marking
    /// them evictable in the first place.
    ///
    /// # Panics
    ///
    /// Panics if the frame is tracked but not evictable.
    pub fn remove(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(record) = inner.records.get(&frame_id) else {
            return;
        };
        assert!(record.evictable, "remove called on a non-evictable frame");
        // Cohort invariant: visits < k is in history, everything else
        // (including k = 1 admissions) is in buffer.
        if record.visits < self.k {
            ReplacerInner::detach(&mut inner.history, frame_id);
        } else {
            ReplacerInner::detach(&mut inner.buffer, frame_id);
        }
        inner.records.remove(&frame_id);
        inner.evictable -= 1;
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.inner.lock().evictable
    }
}

impl std::fmt::Debug for LruKReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LruKReplacer")
            .field("k", &self.k)
            .field("capacity", &self.capacity)
            .field("tracked", &inner.records.len())
            .field("evictable", &inner.evictable)
            .finish()
    }
}
