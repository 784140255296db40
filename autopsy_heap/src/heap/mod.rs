//! Heap reconstruction facade.
//!
//! A [`Heap`] is created once per attached runtime. Construction
//! eagerly resolves the four well-known types (String, Object, Free,
//! Exception) and the segment geometry; failure there is fatal.
//! Everything afterwards is lazy: object enumeration, size and type
//! queries, reference enumeration and root enumeration all operate
//! on demand against the read-only target image.

mod segment;
mod walker;

pub use autopsy_core::Segment;
pub use segment::SegmentIndex;
pub use walker::ObjectIter;

pub(crate) use walker::WalkContext;

use crate::config::InspectorConfig;
use crate::roots::{self, Root};
use crate::stats::HeapStats;
use crate::steps::{HeapWalkStep, StepLog};
use crate::trace;
use autopsy_core::{
    Address, DataReader, HeapBuilder, HeapError, HeapType, MemoryRange, ObjectRef, Result,
    RuntimeView, TypeFactory,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::{Arc, OnceLock};

/// Align an object size to the heap's granularity.
///
/// Large-object segments use 8-byte alignment regardless of the
/// target's pointer width; everything else aligns to the pointer
/// width.
#[inline]
pub const fn align_object(size: u64, large: bool, pointer_size: u32) -> u64 {
    let mask: u64 = if large || pointer_size == 8 { 7 } else { 3 };
    (size + mask) & !mask
}

/// The pre-resolved well-known types of the target runtime.
#[derive(Clone)]
pub struct WellKnownTypes {
    string: Arc<HeapType>,
    object: Arc<HeapType>,
    free: Arc<HeapType>,
    exception: Arc<HeapType>,
}

impl WellKnownTypes {
    /// The `System.String` type.
    #[inline]
    pub fn string(&self) -> &Arc<HeapType> {
        &self.string
    }

    /// The `System.Object` type.
    #[inline]
    pub fn object(&self) -> &Arc<HeapType> {
        &self.object
    }

    /// The free-block pseudo-type.
    #[inline]
    pub fn free(&self) -> &Arc<HeapType> {
        &self.free
    }

    /// The `System.Exception` type.
    #[inline]
    pub fn exception(&self) -> &Arc<HeapType> {
        &self.exception
    }
}

/// A reconstructed view of a stopped process's managed heap.
pub struct Heap {
    // Debug is derived manually below because the trait-object fields
    // (`reader`, `factory`, `runtime`) don't implement it.
    reader: Arc<dyn DataReader>,
    factory: Arc<dyn TypeFactory>,
    runtime: Arc<dyn RuntimeView>,

    index: SegmentIndex,
    allocation_contexts: FxHashMap<Address, Address>,
    finalizer_roots: Vec<MemoryRange>,
    finalizer_objects: Vec<MemoryRange>,

    well_known: WellKnownTypes,
    pointer_size: u32,
    is_server: bool,

    config: InspectorConfig,
    stats: HeapStats,
    step_log: StepLog,

    /// Dependent-handle edges sorted by source, built on first use.
    dependent_edges: OnceLock<Vec<(Address, Address)>>,
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("pointer_size", &self.pointer_size)
            .field("is_server", &self.is_server)
            .finish_non_exhaustive()
    }
}

impl Heap {
    /// Construct a heap view from the provider stack.
    ///
    /// Eagerly resolves the well-known types and segment geometry.
    /// Fails fast on invalid configuration, an unwalkable target, a
    /// factory that cannot resolve a mandatory type, or segments
    /// violating the ordering invariants.
    pub fn new(
        builder: &dyn HeapBuilder,
        reader: Arc<dyn DataReader>,
        factory: Arc<dyn TypeFactory>,
        runtime: Arc<dyn RuntimeView>,
        config: InspectorConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| HeapError::invalid_argument(e.to_string()))?;

        if !builder.can_walk_heap() {
            return Err(HeapError::invariant(
                "target GC data structures are not walkable",
            ));
        }

        let pointer_size = reader.pointer_size();
        if pointer_size != 4 && pointer_size != 8 {
            return Err(HeapError::invariant(format!(
                "unsupported pointer size {}",
                pointer_size
            )));
        }

        let resolve = |mt: Address, what: &str| {
            factory.get_or_create_type(mt, 0).ok_or_else(|| {
                HeapError::invariant(format!(
                    "type factory returned no type for {} method table {:#x}",
                    what, mt
                ))
            })
        };
        let well_known = WellKnownTypes {
            string: resolve(builder.string_method_table(), "String")?,
            object: resolve(builder.object_method_table(), "Object")?,
            free: resolve(builder.free_method_table(), "Free")?,
            exception: resolve(builder.exception_method_table(), "Exception")?,
        };

        let geometry = builder.create_segments();
        let index = SegmentIndex::new(geometry.segments)?;

        let step_log = StepLog::new(config.step_log_capacity);

        Ok(Self {
            reader,
            factory,
            runtime,
            index,
            allocation_contexts: geometry.allocation_contexts,
            finalizer_roots: geometry.finalizer_roots,
            finalizer_objects: geometry.finalizer_objects,
            well_known,
            pointer_size,
            is_server: builder.is_server(),
            config,
            stats: HeapStats::new(),
            step_log,
            dependent_edges: OnceLock::new(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Target pointer width in bytes.
    #[inline]
    pub fn pointer_size(&self) -> u32 {
        self.pointer_size
    }

    /// Whether the target runs the server GC flavor.
    #[inline]
    pub fn is_server(&self) -> bool {
        self.is_server
    }

    /// The segment index.
    #[inline]
    pub fn segments(&self) -> &SegmentIndex {
        &self.index
    }

    /// The pre-resolved well-known types.
    #[inline]
    pub fn well_known(&self) -> &WellKnownTypes {
        &self.well_known
    }

    /// Inspector configuration this heap was built with.
    #[inline]
    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    /// Cumulative walk and search statistics.
    #[inline]
    pub fn stats(&self) -> &HeapStats {
        &self.stats
    }

    pub(crate) fn reader(&self) -> &dyn DataReader {
        &*self.reader
    }

    pub(crate) fn factory(&self) -> &dyn TypeFactory {
        &*self.factory
    }

    pub(crate) fn runtime(&self) -> &dyn RuntimeView {
        &*self.runtime
    }

    pub(crate) fn allocation_contexts(&self) -> &FxHashMap<Address, Address> {
        &self.allocation_contexts
    }

    pub(crate) fn finalizer_root_ranges(&self) -> &[MemoryRange] {
        &self.finalizer_roots
    }

    pub(crate) fn finalizer_object_ranges(&self) -> &[MemoryRange] {
        &self.finalizer_objects
    }

    pub(crate) fn step_log(&self) -> &StepLog {
        &self.step_log
    }

    // =========================================================================
    // Sizing
    // =========================================================================

    /// Minimum size of any object: three pointers.
    #[inline]
    pub fn min_object_size(&self) -> u64 {
        3 * self.pointer_size as u64
    }

    /// Compute the in-memory size of the object at `addr` with the
    /// given type.
    ///
    /// Applies the component count, the string terminator, alignment
    /// and the minimum object size.
    pub fn object_size(&self, addr: Address, ty: &HeapType) -> u64 {
        let large = self.segment_containing(addr).is_some_and(|s| s.is_large);
        self.object_size_with(addr, ty, large, |count_addr| {
            Some(self.reader.read_u32(count_addr))
        })
        .0
    }

    /// Size computation parameterized over the count read, so walks
    /// can serve it from their window cache. Returns `(size, count)`.
    pub(crate) fn object_size_with(
        &self,
        addr: Address,
        ty: &HeapType,
        large: bool,
        read_count: impl FnOnce(Address) -> Option<u32>,
    ) -> (u64, u32) {
        let mut count = 0u32;
        let mut size = ty.base_size as u64;

        if ty.has_components() {
            count = read_count(addr + self.pointer_size as u64).unwrap_or(0);
            // The runtime does not account for the string's trailing
            // terminator character in its stored length.
            if ty.method_table == self.well_known.string.method_table {
                count = count.saturating_add(1);
            }
            size = count as u64 * ty.component_size as u64 + ty.base_size as u64;
        }

        let size = align_object(size, large, self.pointer_size).max(self.min_object_size());
        (size, count)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Resolve the type of the object at `addr` by reading its
    /// method table.
    ///
    /// Returns `None` for the null address, an unreadable method
    /// table, or a method table the factory cannot resolve.
    pub fn object_type(&self, addr: Address) -> Option<Arc<HeapType>> {
        if addr == 0 {
            return None;
        }
        let mt = self.reader.read_pointer(addr);
        if mt == 0 {
            return None;
        }
        self.factory.get_or_create_type(mt, addr)
    }

    /// Find the segment containing `addr`.
    #[inline]
    pub fn segment_containing(&self, addr: Address) -> Option<&Segment> {
        self.index.segment_of(addr)
    }

    /// Whether `addr` lies within any heap segment.
    #[inline]
    pub fn contains(&self, addr: Address) -> bool {
        self.index.segment_of(addr).is_some()
    }

    // =========================================================================
    // Enumeration
    // =========================================================================

    /// Enumerate every object on the heap, segment by segment in
    /// ascending `start` order, addresses ascending within each
    /// segment.
    pub fn enumerate_objects(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.index
            .segments()
            .iter()
            .flat_map(move |seg| ObjectIter::new(self, *seg))
    }

    /// Enumerate the objects of a single segment.
    pub fn enumerate_segment_objects(&self, segment: &Segment) -> ObjectIter<'_> {
        ObjectIter::new(self, *segment)
    }

    /// Enumerate the outbound references of the object at `addr`.
    ///
    /// `carefully` skips objects whose computed size crosses the
    /// segment end or exceeds the oversize limit on non-large
    /// segments. `include_dependent` adds dependent-handle targets.
    /// Null referents are filtered before yield.
    pub fn enumerate_object_references(
        &self,
        addr: Address,
        ty: &HeapType,
        carefully: bool,
        include_dependent: bool,
    ) -> impl Iterator<Item = ObjectRef> {
        let mut ctx = WalkContext::new(self);
        let mut out = SmallVec::new();
        trace::collect_references(self, &mut ctx, addr, ty, carefully, include_dependent, &mut out);
        out.into_iter()
    }

    /// Enumerate all GC roots: strong handles, then finalizer-queue
    /// roots, then per-thread stack roots.
    pub fn enumerate_roots(&self) -> impl Iterator<Item = Root> + '_ {
        roots::enumerate_roots(self)
    }

    /// Enumerate finalizer-queue roots only.
    pub fn enumerate_finalizer_roots(&self) -> impl Iterator<Item = Root> + '_ {
        roots::enumerate_finalizer_roots(self)
    }

    /// Enumerate objects queued for finalization (not rooting).
    pub fn enumerate_finalizable_objects(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        roots::enumerate_finalizable_objects(self)
    }

    /// Dependent-handle edges sorted by source address, built on the
    /// first query that asks for them and reused afterwards.
    pub(crate) fn dependent_edges(&self) -> &[(Address, Address)] {
        self.dependent_edges.get_or_init(|| {
            let mut edges: Vec<(Address, Address)> =
                self.factory.enumerate_dependent_handles().collect();
            edges.sort_unstable();
            edges
        })
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Enable (or resize) step logging. Zero disables it. Resizing
    /// discards previously recorded steps.
    pub fn log_heap_walk_steps(&self, capacity: usize) {
        self.step_log.set_capacity(capacity);
    }

    /// Recorded walk steps, oldest first.
    pub fn steps(&self) -> Vec<HeapWalkStep> {
        self.step_log.steps()
    }

    /// One recorded walk step by index (0 = oldest).
    pub fn step(&self, index: usize) -> Option<HeapWalkStep> {
        self.step_log.step(index)
    }
}
