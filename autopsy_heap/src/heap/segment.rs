//! Segment index: ordered segment list with MRU-hinted lookup.
//!
//! Heap walks exhibit strong spatial locality, so `segment_of`
//! remembers the index of the last hit and starts the next scan
//! there, wrapping once. This amortizes lookup to O(1) for walk
//! workloads without any per-call allocation.

use autopsy_core::{Address, HeapError, Result, Segment};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Ordered, validated list of heap segments.
#[derive(Debug)]
pub struct SegmentIndex {
    /// Segments in ascending `start` order.
    segments: Vec<Segment>,
    /// Index of the most recently hit segment.
    hint: AtomicUsize,
}

impl SegmentIndex {
    /// Build an index, validating the segment invariants.
    ///
    /// Segments must arrive sorted by `start` and non-overlapping,
    /// with `first_object >= start` and `committed_end <= end`.
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        for pair in segments.windows(2) {
            if pair[1].start < pair[0].start {
                return Err(HeapError::invariant(format!(
                    "segment at {:#x} out of order after {:#x}",
                    pair[1].start, pair[0].start
                )));
            }
            if pair[1].start < pair[0].start + pair[0].length {
                return Err(HeapError::invariant(format!(
                    "segment at {:#x} overlaps segment at {:#x}",
                    pair[1].start, pair[0].start
                )));
            }
        }
        for seg in &segments {
            if seg.first_object < seg.start || seg.committed_end > seg.end {
                return Err(HeapError::invariant(format!(
                    "segment at {:#x} has inconsistent bounds",
                    seg.start
                )));
            }
        }

        Ok(Self {
            segments,
            hint: AtomicUsize::new(0),
        })
    }

    /// All segments, ascending by `start`.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the index holds no segments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Find the segment containing `addr`.
    pub fn segment_of(&self, addr: Address) -> Option<&Segment> {
        let first = self.segments.first()?;
        let last = self.segments.last()?;

        // Fast reject outside the heap's overall bounds.
        if addr < first.first_object || addr >= last.end {
            return None;
        }

        // Scan from the last hit, wrapping once.
        let len = self.segments.len();
        let start = self.hint.load(Ordering::Relaxed).min(len - 1);
        for step in 0..len {
            let idx = (start + step) % len;
            let seg = &self.segments[idx];
            if seg.contains(addr) {
                self.hint.store(idx, Ordering::Relaxed);
                return Some(seg);
            }
        }
        None
    }
}
