//! GC root enumeration.
//!
//! Roots are yielded in three fixed phases:
//!
//! 1. **Strong handles** — handle-table entries whose kind roots the
//!    referent (weak, dependent and async-pinned handles are
//!    skipped).
//! 2. **Finalizer-queue roots** — each finalizer root range scanned
//!    word-by-word; a slot roots its referent while the finalizer
//!    has not yet run.
//! 3. **Thread stack roots** — every live thread's reported stack
//!    slots.
//!
//! Within each phase, ordering mirrors the external provider.

use crate::heap::Heap;
use autopsy_core::{Address, HandleKind, ObjectRef, ThreadInfo};

/// A GC root: something outside the object graph that keeps an
/// object alive.
#[derive(Clone, Debug)]
pub enum Root {
    /// A strong handle-table entry.
    Handle {
        /// Address of the handle slot.
        address: Address,
        /// Kind of the handle.
        kind: HandleKind,
        /// The rooted object.
        object: ObjectRef,
    },
    /// A live slot in a finalizer queue.
    Finalizer {
        /// Address of the queue slot.
        slot: Address,
        /// The rooted object.
        object: ObjectRef,
    },
    /// An object reference on a thread stack.
    Stack {
        /// The owning thread.
        thread: ThreadInfo,
        /// Stack slot address holding the reference.
        address: Address,
        /// The rooted object.
        object: ObjectRef,
    },
}

impl Root {
    /// The rooted object.
    #[inline]
    pub fn object(&self) -> &ObjectRef {
        match self {
            Root::Handle { object, .. }
            | Root::Finalizer { object, .. }
            | Root::Stack { object, .. } => object,
        }
    }

    /// Address of the slot holding the rooting reference.
    #[inline]
    pub fn address(&self) -> Address {
        match self {
            Root::Handle { address, .. } | Root::Stack { address, .. } => *address,
            Root::Finalizer { slot, .. } => *slot,
        }
    }
}

fn resolve(heap: &Heap, addr: Address) -> ObjectRef {
    ObjectRef {
        address: addr,
        ty: heap.object_type(addr),
    }
}

/// All roots, in the fixed phase order.
pub(crate) fn enumerate_roots(heap: &Heap) -> impl Iterator<Item = Root> + '_ {
    strong_handles(heap)
        .chain(enumerate_finalizer_roots(heap))
        .chain(stack_roots(heap))
}

fn strong_handles(heap: &Heap) -> impl Iterator<Item = Root> + '_ {
    heap.runtime()
        .enumerate_handles()
        .filter(|handle| handle.kind.is_strong() && handle.object != 0)
        .map(move |handle| Root::Handle {
            address: handle.address,
            kind: handle.kind,
            object: resolve(heap, handle.object),
        })
}

/// Finalizer-queue roots: non-zero slots of each root range.
pub(crate) fn enumerate_finalizer_roots(heap: &Heap) -> impl Iterator<Item = Root> + '_ {
    finalizer_slots(heap, true).map(move |(slot, object)| Root::Finalizer {
        slot,
        object: resolve(heap, object),
    })
}

/// Objects queued for finalization. These do not root anything; they
/// are the objects whose finalizers have yet to run.
pub(crate) fn enumerate_finalizable_objects(heap: &Heap) -> impl Iterator<Item = ObjectRef> + '_ {
    finalizer_slots(heap, false).map(move |(_, object)| resolve(heap, object))
}

/// Scan finalizer-queue ranges word-by-word, yielding
/// `(slot, referent)` for each non-zero slot.
fn finalizer_slots(heap: &Heap, roots: bool) -> impl Iterator<Item = (Address, Address)> + '_ {
    let ranges = if roots {
        heap.finalizer_root_ranges()
    } else {
        heap.finalizer_object_ranges()
    };
    let step = heap.pointer_size() as u64;
    ranges.iter().flat_map(move |range| {
        (range.start..range.end)
            .step_by(step as usize)
            .filter_map(move |slot| {
                let object = heap.reader().read_pointer(slot);
                (object != 0).then_some((slot, object))
            })
    })
}

fn stack_roots(heap: &Heap) -> impl Iterator<Item = Root> + '_ {
    heap.runtime().threads().into_iter().flat_map(move |thread| {
        heap.runtime()
            .enumerate_stack_roots(thread)
            .filter(|root| root.object != 0)
            .map(move |root| Root::Stack {
                thread,
                address: root.address,
                object: resolve(heap, root.object),
            })
    })
}
