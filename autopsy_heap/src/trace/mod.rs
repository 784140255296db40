//! Outbound-reference enumeration.
//!
//! References of an object come from three sources, in order:
//!
//! 1. **Dependent handles** — conditional edges from the runtime's
//!    dependent-handle table, materialized lazily into a sorted
//!    array on the first query that asks for them.
//! 2. **Loader allocator** — a collectible type's anchor handle; the
//!    pointer stored there keeps the type's code and metadata alive
//!    and counts as an outbound edge.
//! 3. **GC descriptor** — the type's encoded reference map, walked
//!    with a reader that prefers the walk's window cache and falls
//!    back to the raw data reader.
//!
//! Null referents are filtered before yield; failed reads are "no
//! reference", never errors. In careful mode, an object whose
//! computed size crosses its segment end, or reaches the oversize
//! limit on a non-large segment, is skipped entirely.

use crate::heap::{Heap, WalkContext};
use autopsy_core::{Address, HeapType, ObjectRef, Segment};
use smallvec::SmallVec;
use std::sync::atomic::Ordering;

/// Child reference list; most objects hold only a few pointers.
pub(crate) type RefVec = SmallVec<[ObjectRef; 8]>;

/// Careful-mode corruption bound: the object must fit its segment,
/// and on non-large segments must stay under the oversize limit.
#[inline]
pub(crate) fn is_too_large(addr: Address, size: u64, seg: &Segment, oversize_limit: u64) -> bool {
    addr + size > seg.end || (!seg.is_large && size >= oversize_limit)
}

/// Read one pointer directly from the raw reader, bypassing the
/// window.
fn direct_ptr(heap: &Heap, addr: Address) -> Option<Address> {
    let len = heap.pointer_size() as usize;
    let mut buf = [0u8; 8];
    if heap.reader().read_memory(addr, &mut buf[..len]) != len {
        return None;
    }
    if len == 8 {
        Some(u64::from_le_bytes(buf))
    } else {
        Some(u32::from_le_bytes(buf[..4].try_into().ok()?) as u64)
    }
}

/// Wrap a referent with its resolved type; unresolvable method
/// tables still yield (with `ty: None`).
fn resolve(heap: &Heap, addr: Address) -> ObjectRef {
    ObjectRef {
        address: addr,
        ty: heap.object_type(addr),
    }
}

/// Collect the outbound references of `(addr, ty)` into `out`.
pub(crate) fn collect_references(
    heap: &Heap,
    ctx: &mut WalkContext,
    addr: Address,
    ty: &HeapType,
    carefully: bool,
    include_dependent: bool,
    out: &mut RefVec,
) {
    if include_dependent {
        collect_dependent(heap, addr, out);
    }

    if ty.is_collectible {
        if let Some(anchor) = direct_ptr(heap, ty.loader_allocator_handle) {
            if anchor != 0 {
                heap.stats()
                    .loader_allocator_edges
                    .fetch_add(1, Ordering::Relaxed);
                out.push(resolve(heap, anchor));
            }
        }
    }

    if ty.contains_pointers {
        let Some(desc) = ty.gc_desc.clone() else {
            return;
        };

        let segment = heap.segment_containing(addr).copied();
        let large = segment.is_some_and(|s| s.is_large);
        let (size, _) = heap.object_size_with(addr, ty, large, |count_addr| {
            ctx.memory.read_u32(count_addr, heap.reader())
        });

        if carefully {
            let Some(segment) = segment else {
                return;
            };
            if is_too_large(addr, size, &segment, heap.config().oversize_limit) {
                return;
            }
        }

        let memory = &ctx.memory;
        let mut read = |ptr_addr: Address| -> Option<Address> {
            memory
                .cached_ptr(ptr_addr)
                .or_else(|| direct_ptr(heap, ptr_addr))
        };
        let mut visit = |referent: Address, _offset: u64| {
            if referent != 0 {
                heap.stats()
                    .reference_edges
                    .fetch_add(1, Ordering::Relaxed);
                out.push(resolve(heap, referent));
            }
        };
        desc.walk(addr, size, &mut read, &mut visit);
    }
}

/// Emit every dependent-handle target whose source is `addr`.
///
/// The edge array is sorted by source; a partition-point search
/// lands on the first matching edge and the scan emits every target
/// for the same source (multiple targets are allowed).
fn collect_dependent(heap: &Heap, addr: Address, out: &mut RefVec) {
    let edges = heap.dependent_edges();
    let first = edges.partition_point(|&(source, _)| source < addr);
    for &(source, target) in &edges[first..] {
        if source != addr {
            break;
        }
        if target != 0 {
            heap.stats()
                .dependent_edges
                .fetch_add(1, Ordering::Relaxed);
            out.push(resolve(heap, target));
        }
    }
}
