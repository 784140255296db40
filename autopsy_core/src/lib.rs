//! Autopsy Core
//!
//! Shared data model and provider contracts for the Autopsy
//! post-mortem heap inspector.
//!
//! # Architecture
//!
//! The inspector is split into two layers:
//!
//! - **This crate**: the vocabulary both sides speak — addresses,
//!   heap types, object references, segments, GC descriptors, and
//!   the traits an embedding debugger implements to expose a target
//!   process image (memory reads, heap geometry, type metadata,
//!   runtime handles and stacks).
//!
//! - **`autopsy_heap`**: the engine that consumes these contracts to
//!   walk segments, enumerate references and roots, and search for
//!   reference paths.
//!
//! Everything here is read-only with respect to the target: a
//! provider hands out snapshots of memory and metadata, and the
//! model types are plain immutable records.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod error;
pub mod provider;
pub mod types;

pub use cancel::CancelToken;
pub use error::{HeapError, Result};
pub use provider::{
    DataReader, HandleInfo, HandleKind, HeapBuilder, HeapGeometry, MemoryRange, RuntimeView,
    StackRootInfo, ThreadInfo, TypeFactory,
};
pub use types::{GcDescriptor, HeapType, ObjectRef, OffsetGcDesc, Segment};

/// An address in the target process.
///
/// Always 64 bits wide regardless of the target's pointer size; a
/// 32-bit target simply never produces addresses above 4 GiB. Zero
/// is never a valid object address.
pub type Address = u64;
