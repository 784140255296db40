//! Heap Walk and Path Search Benchmarks
//!
//! Measures the two hot loops of the inspector over a synthetic
//! in-process image:
//!
//! 1. **Segment walk**: linear object enumeration with the window
//!    cache engaged (thousands of small objects per segment).
//! 2. **Path search**: DFS from a root across a linked-list graph.

use autopsy_core::{
    Address, CancelToken, DataReader, HandleInfo, HeapBuilder, HeapGeometry, HeapType, ObjectRef,
    OffsetGcDesc, RuntimeView, Segment, StackRootInfo, ThreadInfo, TypeFactory,
};
use autopsy_heap::{Heap, InspectorConfig, PathFinder};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rustc_hash::FxHashMap;
use std::hint::black_box;
use std::sync::Arc;

const BASE: Address = 0x10_0000;
const MT_STRING: Address = 0x100;
const MT_OBJECT: Address = 0x200;
const MT_FREE: Address = 0x300;
const MT_EXCEPTION: Address = 0x400;
const MT_NODE: Address = 0xA00;

// =============================================================================
// Benchmark Providers
// =============================================================================

struct ImageReader {
    bytes: Vec<u8>,
}

impl DataReader for ImageReader {
    fn read_memory(&self, addr: Address, buf: &mut [u8]) -> usize {
        if addr < BASE {
            return 0;
        }
        let offset = (addr - BASE) as usize;
        if offset >= self.bytes.len() {
            return 0;
        }
        let n = buf.len().min(self.bytes.len() - offset);
        buf[..n].copy_from_slice(&self.bytes[offset..offset + n]);
        n
    }

    fn read_pointer(&self, addr: Address) -> Address {
        let mut buf = [0u8; 8];
        self.read_memory(addr, &mut buf);
        u64::from_le_bytes(buf)
    }

    fn read_u32(&self, addr: Address) -> u32 {
        let mut buf = [0u8; 4];
        self.read_memory(addr, &mut buf);
        u32::from_le_bytes(buf)
    }

    fn pointer_size(&self) -> u32 {
        8
    }
}

struct Factory {
    types: FxHashMap<Address, Arc<HeapType>>,
}

impl TypeFactory for Factory {
    fn get_or_create_type(&self, method_table: Address, _object: Address) -> Option<Arc<HeapType>> {
        self.types.get(&method_table).cloned()
    }

    fn enumerate_dependent_handles(&self) -> Box<dyn Iterator<Item = (Address, Address)> + '_> {
        Box::new(std::iter::empty())
    }
}

struct Runtime {
    root: Address,
}

impl RuntimeView for Runtime {
    fn enumerate_handles(&self) -> Box<dyn Iterator<Item = HandleInfo> + '_> {
        Box::new(std::iter::once(HandleInfo {
            address: BASE,
            object: self.root,
            kind: autopsy_core::HandleKind::Strong,
        }))
    }

    fn threads(&self) -> Vec<ThreadInfo> {
        Vec::new()
    }

    fn enumerate_stack_roots(
        &self,
        _thread: ThreadInfo,
    ) -> Box<dyn Iterator<Item = StackRootInfo> + '_> {
        Box::new(std::iter::empty())
    }
}

struct Builder {
    segments: Vec<Segment>,
}

impl HeapBuilder for Builder {
    fn can_walk_heap(&self) -> bool {
        true
    }

    fn is_server(&self) -> bool {
        false
    }

    fn string_method_table(&self) -> Address {
        MT_STRING
    }

    fn object_method_table(&self) -> Address {
        MT_OBJECT
    }

    fn free_method_table(&self) -> Address {
        MT_FREE
    }

    fn exception_method_table(&self) -> Address {
        MT_EXCEPTION
    }

    fn create_segments(&self) -> HeapGeometry {
        HeapGeometry {
            segments: self.segments.clone(),
            allocation_contexts: FxHashMap::default(),
            finalizer_roots: Vec::new(),
            finalizer_objects: Vec::new(),
        }
    }
}

/// Build a heap whose single segment holds `count` 40-byte nodes,
/// each pointing at the next (a `count`-deep reference chain).
fn chain_heap(count: usize) -> Heap {
    let seg_start = BASE + 0x1000;
    let node_size = 40u64;

    let mut types = FxHashMap::default();
    let mut add = |ty: HeapType| {
        let ty = Arc::new(ty);
        types.insert(ty.method_table, ty);
    };
    add(HeapType::array("System.String", MT_STRING, 22, 2));
    add(HeapType::plain("System.Object", MT_OBJECT, 24));
    add(HeapType::array("Free", MT_FREE, 24, 1));
    add(HeapType::plain("System.Exception", MT_EXCEPTION, 0x98));
    add(
        HeapType::plain("App.Node", MT_NODE, node_size as u32)
            .with_gc_desc(Arc::new(OffsetGcDesc::new(vec![8]))),
    );

    let mut bytes = vec![0u8; 0x1000 + count * node_size as usize];
    for i in 0..count {
        let addr = seg_start + i as u64 * node_size;
        let offset = (addr - BASE) as usize;
        bytes[offset..offset + 8].copy_from_slice(&MT_NODE.to_le_bytes());
        if i + 1 < count {
            let next = addr + node_size;
            bytes[offset + 8..offset + 16].copy_from_slice(&next.to_le_bytes());
        }
    }

    let seg_end = seg_start + count as u64 * node_size;
    let builder = Builder {
        segments: vec![Segment {
            start: seg_start,
            end: seg_end,
            committed_end: seg_end,
            first_object: seg_start,
            length: seg_end - seg_start,
            is_large: false,
        }],
    };

    Heap::new(
        &builder,
        Arc::new(ImageReader { bytes }),
        Arc::new(Factory { types }),
        Arc::new(Runtime { root: seg_start }),
        InspectorConfig::default(),
    )
    .expect("bench heap")
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_segment_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_walk");
    for count in [1_000usize, 10_000] {
        let heap = chain_heap(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &heap, |b, heap| {
            b.iter(|| {
                let n = heap.enumerate_objects().count();
                black_box(n)
            });
        });
    }
    group.finish();
}

fn bench_path_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_search");
    for count in [100usize, 1_000] {
        let heap = chain_heap(count);
        let target = BASE + 0x1000 + (count as u64 - 1) * 40;
        group.bench_with_input(BenchmarkId::from_parameter(count), &heap, |b, heap| {
            let finder = PathFinder::new(heap);
            let cancel = CancelToken::new();
            b.iter(|| {
                let path: Option<Vec<ObjectRef>> = finder
                    .find_single_path(BASE + 0x1000, target, &cancel)
                    .unwrap();
                black_box(path.map(|p| p.len()))
            });
        });
    }
    group.finish();
}

criterion_group!(walk_benches, bench_segment_walk, bench_path_search);
criterion_main!(walk_benches);
