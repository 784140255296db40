//! Heap data model: segments, types, object references, GC
//! descriptors.
//!
//! Everything here is an immutable snapshot of target-process state.
//! `HeapType` instances are produced by an external
//! [`TypeFactory`](crate::provider::TypeFactory) and shared via
//! `Arc`; the factory must hand out equal types for equal method
//! tables so identity checks against the well-known String / Object
//! / Free / Exception types reduce to a method-table comparison.

use crate::Address;
use std::fmt;
use std::sync::Arc;

/// A contiguous region of managed heap memory.
///
/// Invariants (enforced by the segment index at heap construction):
/// segments are sorted by `start` and non-overlapping,
/// `first_object >= start`, `committed_end <= end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    /// First address of the segment.
    pub start: Address,
    /// One past the last reserved address.
    pub end: Address,
    /// One past the last committed address. Objects never extend
    /// beyond this.
    pub committed_end: Address,
    /// Address of the first object in the segment.
    pub first_object: Address,
    /// Reserved length in bytes.
    pub length: u64,
    /// Whether this is a large-object segment (8-byte alignment
    /// regardless of the target's pointer width).
    pub is_large: bool,
}

impl Segment {
    /// Check whether `addr` falls within `[start, start + length)`.
    #[inline]
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr < self.start + self.length
    }

    /// Committed length in bytes.
    #[inline]
    pub fn committed_length(&self) -> u64 {
        self.committed_end.saturating_sub(self.start)
    }
}

/// Per-type reference map walker.
///
/// A GC descriptor encodes which fields of an object hold managed
/// pointers. The engine treats it as an opaque iterator: given a
/// live object's address and size, the descriptor reads pointer
/// fields through `read_ptr` and reports each
/// `(referent, field_offset)` pair to `visit`.
///
/// The descriptor is trusted to stay within
/// `[object, object + size)`. Failed reads (`read_ptr` returning
/// `None`) are "no reference" and must be skipped, not reported.
pub trait GcDescriptor: Send + Sync {
    /// Walk the reference map of the object at `object` with the
    /// given size, reporting each referent and its field offset.
    fn walk(
        &self,
        object: Address,
        size: u64,
        read_ptr: &mut dyn FnMut(Address) -> Option<Address>,
        visit: &mut dyn FnMut(Address, u64),
    );
}

/// The canonical [`GcDescriptor`]: a sorted list of fixed pointer
/// field offsets.
///
/// Sufficient for non-array types and the common test fixtures;
/// providers with repeating element layouts supply their own
/// implementation.
#[derive(Clone, Debug, Default)]
pub struct OffsetGcDesc {
    offsets: Vec<u64>,
}

impl OffsetGcDesc {
    /// Create a descriptor from pointer field offsets.
    ///
    /// Offsets are relative to the object start and are sorted
    /// internally.
    pub fn new(mut offsets: Vec<u64>) -> Self {
        offsets.sort_unstable();
        Self { offsets }
    }

    /// The pointer field offsets, ascending.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }
}

impl GcDescriptor for OffsetGcDesc {
    fn walk(
        &self,
        object: Address,
        size: u64,
        read_ptr: &mut dyn FnMut(Address) -> Option<Address>,
        visit: &mut dyn FnMut(Address, u64),
    ) {
        for &offset in &self.offsets {
            if offset >= size {
                break;
            }
            if let Some(referent) = read_ptr(object + offset) {
                visit(referent, offset);
            }
        }
    }
}

/// An immutable per-method-table type descriptor.
///
/// One instance exists per method table; the factory caches and
/// shares them. `base_size`/`component_size` drive object size
/// computation, `gc_desc` drives reference enumeration.
pub struct HeapType {
    /// Fully qualified type name.
    pub name: Arc<str>,
    /// The method table this type was constructed from.
    pub method_table: Address,
    /// Fixed part of the object size in bytes.
    pub base_size: u32,
    /// Per-element size for array-like types; zero otherwise.
    pub component_size: u32,
    /// Whether instances hold managed pointers.
    pub contains_pointers: bool,
    /// Whether the type belongs to an unloadable assembly.
    pub is_collectible: bool,
    /// For collectible types, the handle keeping the type's loader
    /// allocator alive; zero otherwise.
    pub loader_allocator_handle: Address,
    /// Reference map, present when `contains_pointers`.
    pub gc_desc: Option<Arc<dyn GcDescriptor>>,
}

impl HeapType {
    /// Create a plain (non-array, pointer-free) type.
    pub fn plain(name: impl Into<Arc<str>>, method_table: Address, base_size: u32) -> Self {
        Self {
            name: name.into(),
            method_table,
            base_size,
            component_size: 0,
            contains_pointers: false,
            is_collectible: false,
            loader_allocator_handle: 0,
            gc_desc: None,
        }
    }

    /// Create an array-like type with the given per-element size.
    pub fn array(
        name: impl Into<Arc<str>>,
        method_table: Address,
        base_size: u32,
        component_size: u32,
    ) -> Self {
        Self {
            component_size,
            ..Self::plain(name, method_table, base_size)
        }
    }

    /// Attach a reference map, marking the type pointer-bearing.
    pub fn with_gc_desc(mut self, desc: Arc<dyn GcDescriptor>) -> Self {
        self.contains_pointers = true;
        self.gc_desc = Some(desc);
        self
    }

    /// Mark the type collectible with its loader-allocator handle.
    pub fn with_loader_allocator(mut self, handle: Address) -> Self {
        self.is_collectible = true;
        self.loader_allocator_handle = handle;
        self
    }

    /// Whether instances carry a component count word.
    #[inline]
    pub fn has_components(&self) -> bool {
        self.component_size != 0
    }
}

impl fmt::Debug for HeapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapType")
            .field("name", &self.name)
            .field("method_table", &format_args!("{:#x}", self.method_table))
            .field("base_size", &self.base_size)
            .field("component_size", &self.component_size)
            .field("contains_pointers", &self.contains_pointers)
            .finish()
    }
}

/// A typed object reference: an address plus its resolved type.
///
/// The type is `None` when the method table could not be resolved;
/// such references still participate in path results.
#[derive(Clone, Debug)]
pub struct ObjectRef {
    /// Object address in the target.
    pub address: Address,
    /// Resolved type, if the factory could produce one.
    pub ty: Option<Arc<HeapType>>,
}

impl ObjectRef {
    /// Create a typed reference.
    pub fn new(address: Address, ty: Arc<HeapType>) -> Self {
        Self {
            address,
            ty: Some(ty),
        }
    }

    /// Create a reference whose type could not be resolved.
    pub fn untyped(address: Address) -> Self {
        Self { address, ty: None }
    }

    /// Whether the reference points at a plausible object (non-null).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.address != 0
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for ObjectRef {}
