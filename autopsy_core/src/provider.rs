//! Contracts an embedding debugger implements to expose a target
//! process image.
//!
//! The engine is strictly a consumer: it never writes to the target
//! and never caches metadata beyond what these traits hand out. A
//! provider backs these traits with a live-process reader or a dump
//! file; the engine cannot tell the difference.
//!
//! # Read contract
//!
//! Raw reads return zero or garbage silently on invalid addresses.
//! The engine validates addresses against segment bounds before
//! trusting anything it reads; providers must not panic on wild
//! addresses.

use crate::types::{HeapType, Segment};
use crate::Address;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Raw memory access to the target process image.
///
/// In the default (sequential) configuration the engine calls this
/// from a single thread at a time. Parallel path search is only
/// attempted when [`is_fully_local`](DataReader::is_fully_local)
/// reports that all relevant memory has been copied into process-
/// local buffers, at which point the reader must be read-only and
/// thread-safe.
pub trait DataReader: Send + Sync {
    /// Read up to `buf.len()` bytes at `addr`; returns the number of
    /// bytes actually read (zero on failure).
    fn read_memory(&self, addr: Address, buf: &mut [u8]) -> usize;

    /// Read a target-pointer-width value, zero-extended.
    ///
    /// Returns 0/garbage silently on invalid addresses.
    fn read_pointer(&self, addr: Address) -> Address;

    /// Read a 32-bit value. Returns 0/garbage silently on invalid
    /// addresses.
    fn read_u32(&self, addr: Address) -> u32;

    /// Target pointer width in bytes (4 or 8).
    fn pointer_size(&self) -> u32;

    /// Whether all relevant target memory is resident in process-
    /// local buffers, making concurrent reads safe.
    fn is_fully_local(&self) -> bool {
        false
    }
}

/// A half-open address range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryRange {
    /// First address in the range.
    pub start: Address,
    /// One past the last address.
    pub end: Address,
}

impl MemoryRange {
    /// Create a range. `end < start` is normalized to empty.
    pub fn new(start: Address, end: Address) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the range is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Heap geometry produced once at heap construction.
pub struct HeapGeometry {
    /// All heap segments, in ascending `start` order.
    pub segments: Vec<Segment>,
    /// Allocation contexts: bump-pointer gaps to skip while walking,
    /// keyed by context pointer, valued by context limit.
    pub allocation_contexts: FxHashMap<Address, Address>,
    /// Finalizer-queue ranges whose slots hold rooting references.
    pub finalizer_roots: Vec<MemoryRange>,
    /// Finalizer-queue ranges holding finalizable (but not rooting)
    /// object slots.
    pub finalizer_objects: Vec<MemoryRange>,
}

/// Metadata needed to construct a heap: well-known method tables and
/// segment geometry.
pub trait HeapBuilder {
    /// Whether the target's GC data structures are intact enough to
    /// walk. Heap construction fails when this is false.
    fn can_walk_heap(&self) -> bool;

    /// Whether the target runs the server GC flavor.
    fn is_server(&self) -> bool;

    /// Method table of `System.String`.
    fn string_method_table(&self) -> Address;
    /// Method table of `System.Object`.
    fn object_method_table(&self) -> Address;
    /// Method table of free blocks.
    fn free_method_table(&self) -> Address;
    /// Method table of `System.Exception`.
    fn exception_method_table(&self) -> Address;

    /// Produce the heap geometry: segments, allocation contexts and
    /// finalizer queues.
    fn create_segments(&self) -> HeapGeometry;
}

/// Type metadata factory plus dependent-handle table access.
///
/// The factory's cache is external to the engine; it must be safe
/// for concurrent reads once populated.
pub trait TypeFactory: Send + Sync {
    /// Resolve a method table to a type, optionally refined by the
    /// address of a concrete instance. Equal method tables must
    /// yield equal types. Returns `None` when the method table does
    /// not describe a valid type.
    fn get_or_create_type(&self, method_table: Address, object: Address)
        -> Option<Arc<HeapType>>;

    /// Enumerate `(source, target)` dependent-handle links. Order is
    /// not significant; the engine sorts.
    fn enumerate_dependent_handles(&self) -> Box<dyn Iterator<Item = (Address, Address)> + '_>;
}

/// Kind of a GC handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleKind {
    /// Short weak handle; does not keep the target alive.
    WeakShort,
    /// Long weak handle; does not keep the target alive.
    WeakLong,
    /// Strong handle.
    Strong,
    /// Pinned strong handle.
    Pinned,
    /// Reference-counted handle (strong while the count is
    /// non-zero).
    RefCounted,
    /// Dependent handle (conditional edge, not a root).
    Dependent,
    /// Asynchronous pinned handle.
    AsyncPinned,
    /// Sized reference handle.
    SizedRef,
}

impl HandleKind {
    /// Whether handles of this kind root their referent.
    #[inline]
    pub fn is_strong(self) -> bool {
        matches!(
            self,
            HandleKind::Strong | HandleKind::Pinned | HandleKind::RefCounted | HandleKind::SizedRef
        )
    }
}

/// A GC handle-table entry.
#[derive(Clone, Copy, Debug)]
pub struct HandleInfo {
    /// Address of the handle slot.
    pub address: Address,
    /// Object the handle refers to.
    pub object: Address,
    /// Handle kind.
    pub kind: HandleKind,
}

/// An object reference found on a thread stack.
#[derive(Clone, Copy, Debug)]
pub struct StackRootInfo {
    /// Stack slot (or register spill) address holding the
    /// reference.
    pub address: Address,
    /// Referenced object.
    pub object: Address,
}

/// A live thread in the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadInfo {
    /// Operating-system thread id.
    pub os_id: u32,
}

/// Runtime-level root sources: the handle table and thread stacks.
pub trait RuntimeView: Send + Sync {
    /// Enumerate all handle-table entries, in provider order.
    fn enumerate_handles(&self) -> Box<dyn Iterator<Item = HandleInfo> + '_>;

    /// All live threads.
    fn threads(&self) -> Vec<ThreadInfo>;

    /// Enumerate stack roots of one thread, in provider order.
    fn enumerate_stack_roots(
        &self,
        thread: ThreadInfo,
    ) -> Box<dyn Iterator<Item = StackRootInfo> + '_>;
}
