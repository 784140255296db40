//! Linear object enumeration within a segment.
//!
//! The walker advances a cursor from the segment's first object,
//! reading each method table, resolving the type, computing the
//! aligned size and stepping to the next object. Allocation contexts
//! (unused bump-pointer gaps) are skipped. Corruption — an
//! unresolvable method table or an allocation-context skip that goes
//! backward or past the segment end — records a diagnostic step and
//! terminates the current segment only; the overall heap walk
//! continues with the next segment.
//!
//! Per-walk state (the memory window and the step ring) lives in a
//! [`WalkContext`] owned by the iterator, so concurrent walks never
//! share caches. The context's recorded steps merge into the heap's
//! shared log when the walk finishes.

use super::{align_object, Heap};
use crate::memory::MemoryReader;
use crate::steps::{HeapWalkStep, StepRing};
use autopsy_core::{Address, ObjectRef, Segment};
use std::sync::atomic::Ordering;

/// Mutable state owned by a single enumeration.
///
/// Created at the start of a top-level walk or search and discarded
/// when it completes, so stale target memory is never reused across
/// phases.
pub(crate) struct WalkContext {
    pub(crate) memory: MemoryReader,
    pub(crate) steps: StepRing,
}

impl WalkContext {
    pub(crate) fn new(heap: &Heap) -> Self {
        Self {
            memory: MemoryReader::new(heap.config().cache_window_size, heap.pointer_size()),
            steps: StepRing::new(heap.step_log().capacity()),
        }
    }
}

/// Lazy iterator over the objects of one segment, strictly ascending
/// by address.
pub struct ObjectIter<'h> {
    heap: &'h Heap,
    segment: Segment,
    cursor: Address,
    ctx: WalkContext,
    done: bool,
}

impl<'h> ObjectIter<'h> {
    pub(crate) fn new(heap: &'h Heap, segment: Segment) -> Self {
        Self {
            heap,
            segment,
            cursor: segment.first_object,
            ctx: WalkContext::new(heap),
            done: false,
        }
    }

    /// The segment this iterator walks.
    #[inline]
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Read the method table at the cursor, and for large segments
    /// the component-count word in the same call.
    fn read_header(&mut self) -> (Option<Address>, Option<u32>) {
        let ptr = self.heap.pointer_size() as usize;

        if self.segment.is_large {
            // Large objects are sparse; one bulk read fetches the
            // method table and the array-count word together instead
            // of cycling the window cache.
            let len = 2 * ptr + 4;
            let mut buf = [0u8; 20];
            if self.heap.reader().read_memory(self.cursor, &mut buf[..len]) != len {
                return (None, None);
            }
            let mt = if ptr == 8 {
                u64::from_le_bytes(buf[..8].try_into().unwrap_or([0; 8]))
            } else {
                u32::from_le_bytes(buf[..4].try_into().unwrap_or([0; 4])) as u64
            };
            let count = u32::from_le_bytes(buf[ptr..ptr + 4].try_into().unwrap_or([0; 4]));
            (Some(mt), Some(count))
        } else {
            (
                self.ctx.memory.read_ptr(self.cursor, self.heap.reader()),
                None,
            )
        }
    }

    /// Terminate the segment: the method table at the cursor could
    /// not be read or resolved.
    fn fail_type_lookup(&mut self, method_table: Address) {
        self.ctx.steps.push(HeapWalkStep {
            address: self.cursor,
            method_table,
            base_size: HeapWalkStep::TYPE_LOOKUP_FAILED,
            component_size: 0,
            count: 0,
        });
        self.heap
            .stats()
            .type_lookup_failures
            .fetch_add(1, Ordering::Relaxed);
        self.finish(false);
    }

    /// Terminate the segment: an allocation-context skip went
    /// backward or past the segment end.
    fn fail_context_skip(&mut self, at: Address) {
        self.ctx.steps.push(HeapWalkStep {
            address: at,
            method_table: 0,
            base_size: HeapWalkStep::CONTEXT_SKIP_CORRUPT,
            component_size: 0,
            count: 0,
        });
        self.finish(false);
    }

    fn finish(&mut self, completed: bool) {
        if self.done {
            return;
        }
        self.done = true;
        let counter = if completed {
            &self.heap.stats().segments_completed
        } else {
            &self.heap.stats().segments_aborted
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.heap.step_log().absorb(self.ctx.steps.drain());
    }
}

impl Iterator for ObjectIter<'_> {
    type Item = ObjectRef;

    fn next(&mut self) -> Option<ObjectRef> {
        if self.done {
            return None;
        }
        if self.cursor >= self.segment.committed_end {
            self.finish(true);
            return None;
        }

        let (mt, bulk_count) = self.read_header();
        let mt = match mt {
            Some(mt) if mt != 0 => mt,
            _ => {
                self.fail_type_lookup(mt.unwrap_or(0));
                return None;
            }
        };
        let Some(ty) = self.heap.factory().get_or_create_type(mt, self.cursor) else {
            self.fail_type_lookup(mt);
            return None;
        };

        let heap = self.heap;
        let large = self.segment.is_large;
        let ctx = &mut self.ctx;
        let (size, count) =
            heap.object_size_with(self.cursor, &ty, large, |count_addr| match bulk_count {
                Some(count) => Some(count),
                None => ctx.memory.read_u32(count_addr, heap.reader()),
            });

        ctx.steps.push(HeapWalkStep {
            address: self.cursor,
            method_table: mt,
            base_size: ty.base_size as i32,
            component_size: ty.component_size,
            count,
        });
        heap.stats().record_object(size);

        let object = ObjectRef::new(self.cursor, ty);

        // Advance, skipping any allocation contexts the cursor lands
        // on. The gap past a context's limit is one aligned minimum
        // object.
        let mut next = self.cursor + size;
        while let Some(&limit) = heap.allocation_contexts().get(&next) {
            let skip_to = limit + align_object(heap.min_object_size(), large, heap.pointer_size());
            if skip_to <= next || skip_to > self.segment.end {
                self.fail_context_skip(next);
                return Some(object);
            }
            next = skip_to;
        }
        self.cursor = next;

        Some(object)
    }
}

impl Drop for ObjectIter<'_> {
    fn drop(&mut self) {
        // An abandoned walk still publishes its recorded steps, but
        // counts neither as completed nor aborted.
        if !self.done {
            self.done = true;
            self.heap.step_log().absorb(self.ctx.steps.drain());
        }
    }
}
