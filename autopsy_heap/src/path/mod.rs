//! Reference-path search: which roots keep an object alive.
//!
//! The search is a depth-first traversal of the object graph with an
//! explicit frame stack. A `seen` set prevents cycles and duplicate
//! work; in non-unique mode a `known endpoints` map remembers every
//! address of every emitted path so later searches can splice a
//! previously found suffix onto a fresh prefix instead of
//! re-searching.
//!
//! Sequential searches yield paths lazily in DFS pre-order. The
//! opt-in parallel mode (one bounded task per root, shared
//! concurrent seen set) yields in undefined order and only runs when
//! the data reader reports a fully memory-resident image.

pub(crate) mod parallel;

use crate::heap::{Heap, WalkContext};
use crate::roots::Root;
use crate::trace;
use autopsy_core::{Address, CancelToken, HeapError, ObjectRef, Result};
use dashmap::DashSet;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A rooted reference chain: the root plus the object path from the
/// root's referent to the search target.
#[derive(Clone, Debug)]
pub struct RootPath {
    /// The root anchoring the chain.
    pub root: Root,
    /// Objects from the root's referent (inclusive) to the target
    /// (inclusive).
    pub path: Vec<ObjectRef>,
}

/// Progress callback, invoked with the processed-object count each
/// time it changes.
pub type ProgressCallback = Box<dyn Fn(u64) + Send + Sync>;

/// A node in a previously found path, linked toward the target.
pub(crate) struct PathNode {
    object: ObjectRef,
    next: Option<Arc<PathNode>>,
}

/// Set of already-visited addresses.
pub(crate) enum SeenSet {
    Local(FxHashSet<Address>),
    Shared(Arc<DashSet<Address>>),
}

impl SeenSet {
    fn insert(&mut self, addr: Address) -> bool {
        match self {
            SeenSet::Local(set) => set.insert(addr),
            SeenSet::Shared(set) => set.insert(addr),
        }
    }

    fn contains(&self, addr: Address) -> bool {
        match self {
            SeenSet::Local(set) => set.contains(&addr),
            SeenSet::Shared(set) => set.contains(&addr),
        }
    }
}

/// Map from address to a known path suffix reaching the target.
///
/// Disabled in unique mode; guarded by a single lock when shared
/// between parallel root searches.
pub(crate) enum KnownMap {
    Disabled,
    Local(FxHashMap<Address, Arc<PathNode>>),
    Shared(Arc<Mutex<FxHashMap<Address, Arc<PathNode>>>>),
}

impl KnownMap {
    fn get(&self, addr: Address) -> Option<Arc<PathNode>> {
        match self {
            KnownMap::Disabled => None,
            KnownMap::Local(map) => map.get(&addr).cloned(),
            KnownMap::Shared(map) => map.lock().get(&addr).cloned(),
        }
    }

    /// Insert unless the address is already mapped (first occurrence
    /// wins).
    fn insert_first(&mut self, addr: Address, node: Arc<PathNode>) {
        match self {
            KnownMap::Disabled => {}
            KnownMap::Local(map) => {
                map.entry(addr).or_insert(node);
            }
            KnownMap::Shared(map) => {
                map.lock().entry(addr).or_insert(node);
            }
        }
    }
}

/// Collect a suffix chain into a vector, endpoint first.
fn suffix(node: &Arc<PathNode>) -> Vec<ObjectRef> {
    let mut out = Vec::new();
    let mut cursor = Some(node.clone());
    while let Some(n) = cursor {
        out.push(n.object.clone());
        cursor = n.next.clone();
    }
    out
}

/// Finds chains of object references from roots (or an arbitrary
/// source object) to a target object.
pub struct PathFinder<'h> {
    heap: &'h Heap,
    max_tasks: usize,
    allow_parallel: bool,
    careful: bool,
    progress: Mutex<Vec<(u64, ProgressCallback)>>,
    next_callback_id: AtomicU64,
}

impl<'h> PathFinder<'h> {
    /// Create a finder over the given heap, configured from the
    /// heap's [`InspectorConfig`](crate::InspectorConfig).
    pub fn new(heap: &'h Heap) -> Self {
        Self {
            heap,
            max_tasks: heap.config().max_tasks,
            allow_parallel: heap.config().allow_parallel_search,
            careful: true,
            progress: Mutex::new(Vec::new()),
            next_callback_id: AtomicU64::new(0),
        }
    }

    /// The heap this finder searches.
    #[inline]
    pub fn heap(&self) -> &'h Heap {
        self.heap
    }

    /// Upper bound on concurrent per-root search tasks.
    #[inline]
    pub fn max_tasks(&self) -> usize {
        self.max_tasks
    }

    /// Set the parallel task bound. Rejects zero.
    pub fn set_max_tasks(&mut self, max_tasks: usize) -> Result<()> {
        if max_tasks == 0 {
            return Err(HeapError::invalid_argument("max_tasks must be at least 1"));
        }
        self.max_tasks = max_tasks;
        Ok(())
    }

    /// Whether parallel per-root fan-out is permitted.
    #[inline]
    pub fn allow_parallel_search(&self) -> bool {
        self.allow_parallel
    }

    /// Permit or forbid parallel per-root fan-out. Parallel search
    /// additionally requires a fully memory-resident image.
    pub fn set_allow_parallel_search(&mut self, allow: bool) {
        self.allow_parallel = allow;
    }

    /// Whether reference expansion bounds object sizes to detect
    /// obvious corruption.
    #[inline]
    pub fn walk_carefully(&self) -> bool {
        self.careful
    }

    /// Enable or disable careful reference expansion.
    pub fn set_walk_carefully(&mut self, careful: bool) {
        self.careful = careful;
    }

    // =========================================================================
    // Progress
    // =========================================================================

    /// Register a progress callback; returns a token for
    /// [`unregister_progress`](Self::unregister_progress).
    ///
    /// The callback is invoked with the processed-object count every
    /// time it changes, on the thread doing the enumeration.
    pub fn register_progress(&self, callback: impl Fn(u64) + Send + Sync + 'static) -> u64 {
        let id = self.next_callback_id.fetch_add(1, Ordering::Relaxed);
        self.progress.lock().push((id, Box::new(callback)));
        id
    }

    /// Remove a previously registered callback. Returns whether it
    /// was present.
    pub fn unregister_progress(&self, id: u64) -> bool {
        let mut callbacks = self.progress.lock();
        let before = callbacks.len();
        callbacks.retain(|(cb_id, _)| *cb_id != id);
        callbacks.len() != before
    }

    fn report_progress(&self, count: u64) {
        for (_, callback) in self.progress.lock().iter() {
            callback(count);
        }
    }

    // =========================================================================
    // Searches
    // =========================================================================

    /// Enumerate rooted paths to `target`: for each GC root whose
    /// referent reaches the target, the first path found.
    ///
    /// With `unique`, no address appears on more than one yielded
    /// path (except the target itself). Without it, addresses of
    /// emitted paths become splice points that accelerate searches
    /// from later roots.
    ///
    /// Falls back to the bounded parallel fan-out when permitted and
    /// the image is fully memory-resident; emission order is
    /// undefined in that case.
    pub fn enumerate_gc_roots(
        &self,
        target: Address,
        unique: bool,
        cancel: &CancelToken,
    ) -> Result<GcRootPaths<'h, '_>> {
        if target == 0 {
            return Err(HeapError::invalid_argument("target must be non-null"));
        }

        if self.allow_parallel && self.max_tasks > 1 && self.heap.reader().is_fully_local() {
            let results = parallel::search_roots_parallel(self, target, unique, cancel);
            return Ok(GcRootPaths {
                inner: GcRootPathsInner::Buffered(results.into_iter()),
            });
        }

        Ok(GcRootPaths {
            inner: GcRootPathsInner::Sequential(RootSearchIter {
                roots: Box::new(self.heap.enumerate_roots()),
                search: self.new_search(target, unique, cancel),
                finished: false,
            }),
        })
    }

    /// Find one path from `source` to `target`, or `None` if the
    /// target is unreachable from the source.
    pub fn find_single_path(
        &self,
        source: Address,
        target: Address,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<ObjectRef>>> {
        let mut paths = self.enumerate_all_paths(source, target, false, cancel)?;
        match paths.next() {
            None => Ok(None),
            Some(Ok(path)) => Ok(Some(path)),
            Some(Err(e)) => Err(e),
        }
    }

    /// Lazily enumerate paths from `source` to `target`.
    ///
    /// With `unique`, yielded paths share no address except the
    /// target.
    pub fn enumerate_all_paths(
        &self,
        source: Address,
        target: Address,
        unique: bool,
        cancel: &CancelToken,
    ) -> Result<PathsIter<'h, '_>> {
        if source == 0 || target == 0 {
            return Err(HeapError::invalid_argument(
                "source and target must be non-null",
            ));
        }
        let source = ObjectRef {
            address: source,
            ty: self.heap.object_type(source),
        };
        Ok(PathsIter {
            search: self.new_search(target, unique, cancel),
            dfs: Dfs::new(source),
            finished: false,
        })
    }

    fn new_search<'f>(&'f self, target: Address, unique: bool, cancel: &CancelToken) -> Search<'h, 'f> {
        Search {
            finder: self,
            target,
            unique,
            seen: SeenSet::Local(FxHashSet::default()),
            known: if unique {
                KnownMap::Disabled
            } else {
                KnownMap::Local(FxHashMap::default())
            },
            ctx: WalkContext::new(self.heap),
            cancel: cancel.clone(),
            processed: Arc::new(AtomicU64::new(0)),
        }
    }
}

// =============================================================================
// Search State
// =============================================================================

/// Per-search state: the visited set, splice map, walk context and
/// progress counter. Parallel workers each own one, sharing the seen
/// set and splice map behind thread-safe wrappers.
pub(crate) struct Search<'h, 'f> {
    finder: &'f PathFinder<'h>,
    target: Address,
    unique: bool,
    seen: SeenSet,
    known: KnownMap,
    ctx: WalkContext,
    cancel: CancelToken,
    processed: Arc<AtomicU64>,
}

enum Expansion {
    /// A child was the target; emit and do not descend.
    Target(ObjectRef),
    /// A child was a known splice point; emit prefix + suffix.
    Ending(Arc<PathNode>),
    /// Unseen children to descend into.
    Children(SmallVec<[ObjectRef; 8]>),
}

impl<'h> Search<'h, '_> {
    #[inline]
    fn heap(&self) -> &'h Heap {
        self.finder.heap
    }

    /// Enumerate an object's children, classifying the result.
    fn expand(&mut self, object: &ObjectRef) -> Result<Expansion> {
        self.cancel.checkpoint()?;

        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        self.finder.report_progress(processed);
        self.heap()
            .stats()
            .search_visits
            .fetch_add(1, Ordering::Relaxed);

        // An unresolvable type is a dead end, not an error.
        let Some(ty) = object.ty.clone() else {
            return Ok(Expansion::Children(SmallVec::new()));
        };

        let mut refs = SmallVec::new();
        trace::collect_references(
            self.heap(),
            &mut self.ctx,
            object.address,
            &ty,
            self.finder.careful,
            true,
            &mut refs,
        );

        let mut found_ending = None;
        let mut todo = SmallVec::new();
        for child in refs {
            if child.address == self.target {
                return Ok(Expansion::Target(child));
            }
            if found_ending.is_none() {
                if let Some(node) = self.known.get(child.address) {
                    found_ending = Some(node);
                    continue;
                }
            }
            if !self.seen.contains(child.address) {
                todo.push(child);
            }
        }

        match found_ending {
            Some(node) => Ok(Expansion::Ending(node)),
            None => Ok(Expansion::Children(todo)),
        }
    }

    /// After emitting a path, make every address on it a splice
    /// point (no-op in unique mode).
    fn record_known(&mut self, path: &[ObjectRef]) {
        if self.unique {
            return;
        }
        let mut node: Option<Arc<PathNode>> = None;
        for object in path.iter().rev() {
            let linked = Arc::new(PathNode {
                object: object.clone(),
                next: node.take(),
            });
            self.known.insert_first(object.address, linked.clone());
            node = Some(linked);
        }
    }
}

// =============================================================================
// DFS Engine
// =============================================================================

struct Frame {
    object: ObjectRef,
    todo: SmallVec<[ObjectRef; 8]>,
}

/// Explicit-stack DFS from one source object. `next_path` resumes
/// where the previous emission left off, so one `Dfs` yields every
/// path the search policy allows.
struct Dfs {
    source: ObjectRef,
    stack: Vec<Frame>,
    started: bool,
}

impl Dfs {
    fn new(source: ObjectRef) -> Self {
        Self {
            source,
            stack: Vec::new(),
            started: false,
        }
    }

    fn current_path(&self) -> Vec<ObjectRef> {
        self.stack.iter().map(|f| f.object.clone()).collect()
    }

    fn emit(&self, search: &mut Search<'_, '_>, path: Vec<ObjectRef>) -> Vec<ObjectRef> {
        search.record_known(&path);
        search
            .heap()
            .stats()
            .paths_found
            .fetch_add(1, Ordering::Relaxed);
        path
    }

    /// Find the next path, or `None` when the search space is
    /// exhausted.
    fn next_path(&mut self, search: &mut Search<'_, '_>) -> Result<Option<Vec<ObjectRef>>> {
        if !self.started {
            self.started = true;

            if !search.seen.insert(self.source.address) {
                return Ok(None);
            }
            if self.source.address == search.target {
                let path = vec![self.source.clone()];
                return Ok(Some(self.emit(search, path)));
            }
            match search.expand(&self.source)? {
                Expansion::Target(target) => {
                    let path = vec![self.source.clone(), target];
                    return Ok(Some(self.emit(search, path)));
                }
                Expansion::Ending(node) => {
                    let mut path = vec![self.source.clone()];
                    path.extend(suffix(&node));
                    return Ok(Some(self.emit(search, path)));
                }
                Expansion::Children(todo) => self.stack.push(Frame {
                    object: self.source.clone(),
                    todo,
                }),
            }
        }

        loop {
            search.cancel.checkpoint()?;

            let child = match self.stack.last_mut() {
                None => return Ok(None),
                Some(frame) => frame.todo.pop(),
            };
            let Some(child) = child else {
                self.stack.pop();
                continue;
            };

            if !search.seen.insert(child.address) {
                continue;
            }

            match search.expand(&child)? {
                Expansion::Target(target) => {
                    let mut path = self.current_path();
                    path.push(child);
                    path.push(target);
                    return Ok(Some(self.emit(search, path)));
                }
                Expansion::Ending(node) => {
                    let mut path = self.current_path();
                    path.push(child);
                    path.extend(suffix(&node));
                    return Ok(Some(self.emit(search, path)));
                }
                Expansion::Children(todo) => self.stack.push(Frame {
                    object: child,
                    todo,
                }),
            }
        }
    }
}

// =============================================================================
// Public Iterators
// =============================================================================

/// Lazy iterator over paths from one source to the target.
pub struct PathsIter<'h, 'f> {
    search: Search<'h, 'f>,
    dfs: Dfs,
    finished: bool,
}

impl Iterator for PathsIter<'_, '_> {
    type Item = Result<Vec<ObjectRef>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.dfs.next_path(&mut self.search) {
            Ok(Some(path)) => Some(Ok(path)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Sequential per-root search: for each root, the first path to the
/// target, with seen set and splice map shared across roots.
pub struct RootSearchIter<'h, 'f> {
    roots: Box<dyn Iterator<Item = Root> + 'h>,
    search: Search<'h, 'f>,
    finished: bool,
}

impl Iterator for RootSearchIter<'_, '_> {
    type Item = Result<RootPath>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            if let Err(e) = self.search.cancel.checkpoint() {
                self.finished = true;
                return Some(Err(e));
            }

            let Some(root) = self.roots.next() else {
                self.finished = true;
                return None;
            };

            let mut dfs = Dfs::new(root.object().clone());
            match dfs.next_path(&mut self.search) {
                Ok(Some(path)) => return Some(Ok(RootPath { root, path })),
                // Unreachable from this root; try the next one.
                Ok(None) => continue,
                Err(e) if e.is_cancelled() => {
                    self.finished = true;
                    return Some(Err(e));
                }
                // Non-cancellation failures are dead ends.
                Err(_) => continue,
            }
        }
    }
}

enum GcRootPathsInner<'h, 'f> {
    Sequential(RootSearchIter<'h, 'f>),
    Buffered(std::vec::IntoIter<Result<RootPath>>),
}

/// Iterator over rooted paths to a target.
///
/// Sequential searches yield lazily in root order; parallel searches
/// yield buffered results in undefined order.
pub struct GcRootPaths<'h, 'f> {
    inner: GcRootPathsInner<'h, 'f>,
}

impl Iterator for GcRootPaths<'_, '_> {
    type Item = Result<RootPath>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            GcRootPathsInner::Sequential(iter) => iter.next(),
            GcRootPathsInner::Buffered(iter) => iter.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Fixture, MT_OBJECT};
    use autopsy_core::{HandleInfo, HandleKind, HeapType, OffsetGcDesc};

    const B: Address = Fixture::BASE;

    /// A 40-byte object with pointer fields at offsets 8 and 16.
    fn add_node_type(fx: &mut Fixture) {
        fx.add_type(
            HeapType::plain("Node", 0xA00, 40)
                .with_gc_desc(Arc::new(OffsetGcDesc::new(vec![8, 16]))),
        );
    }

    fn addrs(path: &[ObjectRef]) -> Vec<Address> {
        path.iter().map(|o| o.address).collect()
    }

    #[test]
    fn test_direct_source_to_target() {
        let mut fx = Fixture::new();
        add_node_type(&mut fx);
        fx.place_object(B, 0xA00);
        fx.set_field(B, 8, B + 0x40);
        fx.place_object(B + 0x40, MT_OBJECT);
        fx.segment(B, B + 0x58);
        let heap = fx.heap();

        let finder = PathFinder::new(&heap);
        let path = finder
            .find_single_path(B, B + 0x40, &CancelToken::new())
            .unwrap()
            .unwrap();
        assert_eq!(addrs(&path), vec![B, B + 0x40]);
    }

    #[test]
    fn test_source_equals_target() {
        let mut fx = Fixture::new();
        fx.place_object(B, MT_OBJECT);
        fx.segment(B, B + 0x18);
        let heap = fx.heap();

        let finder = PathFinder::new(&heap);
        let path = finder
            .find_single_path(B, B, &CancelToken::new())
            .unwrap()
            .unwrap();
        assert_eq!(addrs(&path), vec![B]);
    }

    #[test]
    fn test_cycle_terminates_with_progress() {
        let mut fx = Fixture::new();
        add_node_type(&mut fx);
        // A <-> B cycle; target C is unreachable.
        fx.place_object(B, 0xA00);
        fx.set_field(B, 8, B + 0x28);
        fx.place_object(B + 0x28, 0xA00);
        fx.set_field(B + 0x28, 8, B);
        fx.place_object(B + 0x50, MT_OBJECT);
        fx.segment(B, B + 0x68);
        let heap = fx.heap();

        let finder = PathFinder::new(&heap);
        let fired = Arc::new(AtomicU64::new(0));
        let fired_in_callback = fired.clone();
        finder.register_progress(move |count| {
            fired_in_callback.store(count, Ordering::Relaxed);
        });

        let paths: Vec<_> = finder
            .enumerate_all_paths(B, B + 0x50, false, &CancelToken::new())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert!(paths.is_empty());
        // Both cycle members were processed.
        assert_eq!(fired.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_dependent_handle_edge_reaches_target() {
        let mut fx = Fixture::new();
        fx.place_object(B, MT_OBJECT);
        fx.place_object(B + 0x40, MT_OBJECT);
        fx.dependents.push((B, B + 0x40));
        fx.segment(B, B + 0x58);
        let heap = fx.heap();

        let finder = PathFinder::new(&heap);
        let path = finder
            .find_single_path(B, B + 0x40, &CancelToken::new())
            .unwrap()
            .unwrap();
        assert_eq!(addrs(&path), vec![B, B + 0x40]);
    }

    /// Shared graph for the splice tests:
    /// `R1 -> X -> T` and `R2 -> X`, with strong handles on R1 and R2.
    fn splice_fixture() -> (Fixture, [Address; 4]) {
        let mut fx = Fixture::new();
        add_node_type(&mut fx);
        let r1 = B;
        let x = B + 0x28;
        let t = B + 0x50;
        let r2 = B + 0x70;

        fx.place_object(r1, 0xA00);
        fx.set_field(r1, 8, x);
        fx.place_object(x, 0xA00);
        fx.set_field(x, 8, t);
        fx.place_object(t, MT_OBJECT);
        fx.place_object(r2, 0xA00);
        fx.set_field(r2, 8, x);
        fx.segment(B, B + 0x98);

        fx.handles.push(HandleInfo {
            address: B + 0x2000,
            object: r1,
            kind: HandleKind::Strong,
        });
        fx.handles.push(HandleInfo {
            address: B + 0x2008,
            object: r2,
            kind: HandleKind::Strong,
        });
        (fx, [r1, x, t, r2])
    }

    #[test]
    fn test_known_endpoint_splice() {
        let (fx, [r1, x, t, r2]) = splice_fixture();
        let heap = fx.heap();
        let finder = PathFinder::new(&heap);

        let paths: Vec<_> = finder
            .enumerate_gc_roots(t, false, &CancelToken::new())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(addrs(&paths[0].path), vec![r1, x, t]);
        // The second search never re-expands X; it splices the known
        // suffix.
        assert_eq!(addrs(&paths[1].path), vec![r2, x, t]);
    }

    #[test]
    fn test_unique_mode_yields_disjoint_paths() {
        let (fx, [r1, x, t, _r2]) = splice_fixture();
        let heap = fx.heap();
        let finder = PathFinder::new(&heap);

        let paths: Vec<_> = finder
            .enumerate_gc_roots(t, true, &CancelToken::new())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        // X is consumed by the first path, so R2 finds nothing.
        assert_eq!(paths.len(), 1);
        assert_eq!(addrs(&paths[0].path), vec![r1, x, t]);
    }

    #[test]
    fn test_set_max_tasks_validates_incoming_value() {
        let mut fx = Fixture::new();
        fx.segment(B, B + 0x18);
        let heap = fx.heap();

        let mut finder = PathFinder::new(&heap);
        assert!(finder.set_max_tasks(0).is_err());
        finder.set_max_tasks(4).unwrap();
        assert_eq!(finder.max_tasks(), 4);
    }

    #[test]
    fn test_cancellation_surfaces() {
        let mut fx = Fixture::new();
        fx.place_object(B, MT_OBJECT);
        fx.place_object(B + 0x18, MT_OBJECT);
        fx.segment(B, B + 0x30);
        let heap = fx.heap();

        let finder = PathFinder::new(&heap);
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut paths = finder
            .enumerate_all_paths(B, B + 0x18, false, &cancel)
            .unwrap();
        assert_eq!(paths.next(), Some(Err(HeapError::Cancelled)));
        assert_eq!(paths.next(), None);
    }

    #[test]
    fn test_rejects_null_arguments() {
        let mut fx = Fixture::new();
        fx.segment(B, B + 0x18);
        let heap = fx.heap();
        let finder = PathFinder::new(&heap);

        assert!(finder
            .enumerate_all_paths(0, B, false, &CancelToken::new())
            .is_err());
        assert!(finder
            .enumerate_gc_roots(0, false, &CancelToken::new())
            .is_err());
    }

    #[test]
    fn test_unregister_progress() {
        let mut fx = Fixture::new();
        fx.segment(B, B + 0x18);
        let heap = fx.heap();
        let finder = PathFinder::new(&heap);

        let id = finder.register_progress(|_| {});
        assert!(finder.unregister_progress(id));
        assert!(!finder.unregister_progress(id));
    }
}
