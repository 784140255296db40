//! Autopsy Heap
//!
//! The heap walker and GC-rooting engine of the Autopsy post-mortem
//! inspector. Given read-only access to a stopped managed-runtime
//! process image (through the provider traits in `autopsy_core`),
//! this crate reconstructs the logical garbage-collected heap and
//! answers reachability queries.
//!
//! # Architecture
//!
//! - **[`Heap`]**: the facade. Built once per attached runtime, it
//!   eagerly resolves the well-known types and segment geometry,
//!   then exposes object enumeration, size and type queries,
//!   reference enumeration and root enumeration.
//!
//! - **Walking**: each segment is scanned linearly from its first
//!   object; object sizes (base + components, alignment, minimum
//!   size, string terminator) drive the cursor, and allocation
//!   contexts are skipped. Corruption terminates the segment, never
//!   the walk.
//!
//! - **References**: a per-type GC descriptor yields pointer fields;
//!   dependent-handle links and loader-allocator anchors extend the
//!   edge set.
//!
//! - **Rooting**: [`PathFinder`] searches reference chains from
//!   roots (strong handles, finalizer queues, thread stacks) to a
//!   target object, with optional bounded parallel fan-out when the
//!   image is fully memory-resident.
//!
//! # Usage
//!
//! ```ignore
//! use autopsy_heap::{Heap, InspectorConfig, PathFinder};
//! use autopsy_core::CancelToken;
//!
//! let heap = Heap::new(&builder, reader, factory, runtime, InspectorConfig::default())?;
//!
//! for obj in heap.enumerate_objects() {
//!     println!("{:#x} {}", obj.address, obj.ty.as_ref().map_or("?", |t| &t.name));
//! }
//!
//! let finder = PathFinder::new(&heap);
//! for rooted in finder.enumerate_gc_roots(target, false, &CancelToken::new()) {
//!     println!("{:?}", rooted?);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod heap;
pub mod memory;
pub mod path;
pub mod roots;
pub mod steps;
pub mod trace;

mod stats;

#[cfg(test)]
mod testutil;

pub use config::{ConfigError, InspectorConfig};
pub use heap::{Heap, ObjectIter, Segment, SegmentIndex};
pub use memory::MemoryReader;
pub use path::{PathFinder, RootPath};
pub use roots::Root;
pub use stats::{HeapStats, StatsSnapshot};
pub use steps::HeapWalkStep;
