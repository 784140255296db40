//! Bounded parallel per-root search.
//!
//! Legal only when the caller has copied all relevant target memory
//! into process-local buffers (`DataReader::is_fully_local`), which
//! makes the reader read-only and thread-safe. Each worker owns its
//! own walk context; only the seen set (concurrent) and the splice
//! map (single lock) are shared. A fixed pool of `max_tasks` workers
//! drains a shared root queue, which bounds concurrency the same way
//! a launch/wait-any/replace task array would while keeping every
//! worker busy until the queue empties.

use super::{Dfs, KnownMap, PathFinder, RootPath, Search, SeenSet};
use crate::heap::WalkContext;
use crate::roots::Root;
use autopsy_core::{Address, CancelToken, HeapError, Result};
use dashmap::DashSet;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Search every root concurrently, returning the buffered results.
///
/// Emission order is undefined. If cancellation fires, a single
/// `Err(Cancelled)` terminates the buffered results.
pub(crate) fn search_roots_parallel(
    finder: &PathFinder<'_>,
    target: Address,
    unique: bool,
    cancel: &CancelToken,
) -> Vec<Result<RootPath>> {
    let heap = finder.heap();
    let roots: Vec<Root> = heap.enumerate_roots().collect();

    let seen: Arc<DashSet<Address>> = Arc::new(DashSet::default());
    let known: Arc<Mutex<FxHashMap<Address, Arc<super::PathNode>>>> =
        Arc::new(Mutex::new(FxHashMap::default()));
    let processed = Arc::new(AtomicU64::new(0));
    let next_root = AtomicUsize::new(0);
    let results: Mutex<Vec<Result<RootPath>>> = Mutex::new(Vec::new());

    let workers = finder.max_tasks().min(roots.len()).max(1);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                let mut search = Search {
                    finder,
                    target,
                    unique,
                    seen: SeenSet::Shared(seen.clone()),
                    known: if unique {
                        KnownMap::Disabled
                    } else {
                        KnownMap::Shared(known.clone())
                    },
                    ctx: WalkContext::new(heap),
                    cancel: cancel.clone(),
                    processed: processed.clone(),
                };

                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let index = next_root.fetch_add(1, Ordering::Relaxed);
                    let Some(root) = roots.get(index) else { break };

                    let mut dfs = Dfs::new(root.object().clone());
                    match dfs.next_path(&mut search) {
                        Ok(Some(path)) => results.lock().push(Ok(RootPath {
                            root: root.clone(),
                            path,
                        })),
                        // Unreachable from this root.
                        Ok(None) => {}
                        Err(e) if e.is_cancelled() => break,
                        // Non-cancellation failures are dead ends.
                        Err(_) => {}
                    }
                }
            });
        }
    });

    let mut results = results.into_inner();
    if cancel.is_cancelled() {
        results.push(Err(HeapError::Cancelled));
    }
    results
}
