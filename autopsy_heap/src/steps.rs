//! Heap-walk step diagnostics.
//!
//! When step logging is enabled, every cursor advance during a
//! segment walk records a [`HeapWalkStep`]. Steps accumulate in a
//! walk-local circular ring and are merged into the heap's shared
//! log when the enumeration finishes, so concurrent walks never
//! contend on the log. The log is a debugging aid and has no
//! observable effect on walk results.

use autopsy_core::Address;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One step of a heap walk: the object the cursor passed, or a
/// sentinel describing why the segment walk stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapWalkStep {
    /// Cursor address at this step.
    pub address: Address,
    /// Method table read at the cursor (zero if unreadable).
    pub method_table: Address,
    /// Base size of the resolved type, or a sentinel.
    pub base_size: i32,
    /// Component size of the resolved type.
    pub component_size: u32,
    /// Component count read from the object (zero for non-array
    /// types).
    pub count: u32,
}

impl HeapWalkStep {
    /// Sentinel `base_size`: the type factory returned no type for
    /// the method table at this address.
    pub const TYPE_LOOKUP_FAILED: i32 = i32::MIN + 1;

    /// Sentinel `base_size`: an allocation-context skip went
    /// backward or past the segment end.
    pub const CONTEXT_SKIP_CORRUPT: i32 = i32::MIN + 2;

    /// Whether this step records a failure rather than an object.
    #[inline]
    pub fn is_failure(&self) -> bool {
        self.base_size == Self::TYPE_LOOKUP_FAILED || self.base_size == Self::CONTEXT_SKIP_CORRUPT
    }
}

/// Walk-local circular step buffer.
///
/// Fixed capacity; the oldest step is overwritten once full. Owned
/// by a single enumeration, never shared.
#[derive(Debug, Default)]
pub(crate) struct StepRing {
    buf: VecDeque<HeapWalkStep>,
    capacity: usize,
}

impl StepRing {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Whether recording is enabled for this walk.
    #[inline]
    pub(crate) fn enabled(&self) -> bool {
        self.capacity != 0
    }

    pub(crate) fn push(&mut self, step: HeapWalkStep) {
        if self.capacity == 0 {
            return;
        }
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(step);
    }

    pub(crate) fn drain(&mut self) -> VecDeque<HeapWalkStep> {
        std::mem::take(&mut self.buf)
    }
}

/// The heap's shared step log.
///
/// Process-wide configuration (capacity) with walk-local storage:
/// walks record into their own [`StepRing`] and merge here when they
/// finish. Changing the capacity reallocates and clears the log.
#[derive(Debug)]
pub(crate) struct StepLog {
    capacity: AtomicUsize,
    ring: Mutex<VecDeque<HeapWalkStep>>,
}

impl StepLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: AtomicUsize::new(capacity),
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Current capacity; zero means logging is disabled.
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Set a new capacity, clearing any recorded steps.
    pub(crate) fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
        let mut ring = self.ring.lock();
        *ring = VecDeque::with_capacity(capacity);
    }

    /// Merge a finished walk's steps, keeping the newest `capacity`
    /// entries overall.
    pub(crate) fn absorb(&self, mut steps: VecDeque<HeapWalkStep>) {
        let capacity = self.capacity();
        if capacity == 0 || steps.is_empty() {
            return;
        }
        let mut ring = self.ring.lock();
        ring.append(&mut steps);
        while ring.len() > capacity {
            ring.pop_front();
        }
    }

    /// All recorded steps, oldest first.
    pub(crate) fn steps(&self) -> Vec<HeapWalkStep> {
        self.ring.lock().iter().copied().collect()
    }

    /// One recorded step by index (0 = oldest).
    pub(crate) fn step(&self, index: usize) -> Option<HeapWalkStep> {
        self.ring.lock().get(index).copied()
    }
}
