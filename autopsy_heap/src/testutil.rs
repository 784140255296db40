//! Synthetic target images for unit tests.
//!
//! A [`Fixture`] assembles a flat byte image plus the provider stack
//! (reader, type factory, runtime view, heap builder) and produces a
//! fully constructed [`Heap`]. Addresses are absolute; the image
//! starts at [`Fixture::BASE`].

use crate::config::InspectorConfig;
use crate::heap::Heap;
use autopsy_core::{
    Address, DataReader, HandleInfo, HeapBuilder, HeapGeometry, HeapType, MemoryRange,
    RuntimeView, Segment, StackRootInfo, ThreadInfo, TypeFactory,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;

pub(crate) const MT_STRING: Address = 0x100;
pub(crate) const MT_OBJECT: Address = 0x200;
pub(crate) const MT_FREE: Address = 0x300;
pub(crate) const MT_EXCEPTION: Address = 0x400;

pub(crate) struct Fixture {
    pub bytes: Vec<u8>,
    pub types: FxHashMap<Address, Arc<HeapType>>,
    pub dependents: Vec<(Address, Address)>,
    pub segments: Vec<Segment>,
    pub allocation_contexts: FxHashMap<Address, Address>,
    pub finalizer_roots: Vec<MemoryRange>,
    pub finalizer_objects: Vec<MemoryRange>,
    pub handles: Vec<HandleInfo>,
    pub threads: Vec<(ThreadInfo, Vec<StackRootInfo>)>,
    pub fully_local: bool,
    pub walkable: bool,
    pub config: InspectorConfig,
}

impl Fixture {
    /// Target address of `bytes[0]`.
    pub const BASE: Address = 0x1_0000;

    pub fn new() -> Self {
        let mut types = FxHashMap::default();
        let mut add = |ty: HeapType| {
            let mt = ty.method_table;
            types.insert(mt, Arc::new(ty));
        };
        add(HeapType::array("System.String", MT_STRING, 22, 2));
        add(HeapType::plain("System.Object", MT_OBJECT, 24));
        add(HeapType::array("Free", MT_FREE, 24, 1));
        add(HeapType::plain("System.Exception", MT_EXCEPTION, 0x98));

        Self {
            bytes: vec![0; 0x4_0000],
            types,
            dependents: Vec::new(),
            segments: Vec::new(),
            allocation_contexts: FxHashMap::default(),
            finalizer_roots: Vec::new(),
            finalizer_objects: Vec::new(),
            handles: Vec::new(),
            threads: Vec::new(),
            fully_local: false,
            walkable: true,
            config: InspectorConfig::default(),
        }
    }

    pub fn add_type(&mut self, ty: HeapType) -> Arc<HeapType> {
        let ty = Arc::new(ty);
        self.types.insert(ty.method_table, ty.clone());
        ty
    }

    pub fn write_u64(&mut self, addr: Address, value: u64) {
        let offset = (addr - Self::BASE) as usize;
        self.bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, addr: Address, value: u32) {
        let offset = (addr - Self::BASE) as usize;
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Write an object header (method table) at `addr`.
    pub fn place_object(&mut self, addr: Address, method_table: Address) {
        self.write_u64(addr, method_table);
    }

    /// Write an array-like object header: method table plus
    /// component count.
    pub fn place_array(&mut self, addr: Address, method_table: Address, count: u32) {
        self.write_u64(addr, method_table);
        self.write_u32(addr + 8, count);
    }

    /// Write a pointer field of the object at `addr`.
    pub fn set_field(&mut self, addr: Address, offset: u64, target: Address) {
        self.write_u64(addr + offset, target);
    }

    /// Add a small-object segment spanning `[start, committed_end)`,
    /// fully committed and reserved.
    pub fn segment(&mut self, start: Address, committed_end: Address) {
        self.segments.push(Segment {
            start,
            end: committed_end,
            committed_end,
            first_object: start,
            length: committed_end - start,
            is_large: false,
        });
    }

    /// Add a large-object segment spanning `[start, committed_end)`.
    pub fn large_segment(&mut self, start: Address, committed_end: Address) {
        self.segments.push(Segment {
            start,
            end: committed_end,
            committed_end,
            first_object: start,
            length: committed_end - start,
            is_large: true,
        });
    }

    pub fn heap(self) -> Heap {
        self.try_heap().expect("fixture heap")
    }

    pub fn try_heap(self) -> autopsy_core::Result<Heap> {
        let reader = Arc::new(FixtureReader {
            bytes: self.bytes,
            pointer_size: 8,
            fully_local: self.fully_local,
        });
        let factory = Arc::new(FixtureFactory {
            types: self.types,
            dependents: self.dependents,
        });
        let runtime = Arc::new(FixtureRuntime {
            handles: self.handles,
            threads: self.threads,
        });
        let builder = FixtureBuilder {
            walkable: self.walkable,
            segments: self.segments,
            allocation_contexts: self.allocation_contexts,
            finalizer_roots: self.finalizer_roots,
            finalizer_objects: self.finalizer_objects,
        };
        Heap::new(&builder, reader, factory, runtime, self.config)
    }
}

struct FixtureReader {
    bytes: Vec<u8>,
    pointer_size: u32,
    fully_local: bool,
}

impl DataReader for FixtureReader {
    fn read_memory(&self, addr: Address, buf: &mut [u8]) -> usize {
        if addr < Fixture::BASE {
            return 0;
        }
        let offset = (addr - Fixture::BASE) as usize;
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
        self.pointer_size
    }

    fn is_fully_local(&self) -> bool {
        self.fully_local
    }
}

struct FixtureFactory {
    types: FxHashMap<Address, Arc<HeapType>>,
    dependents: Vec<(Address, Address)>,
}

impl TypeFactory for FixtureFactory {
    fn get_or_create_type(
        &self,
        method_table: Address,
        _object: Address,
    ) -> Option<Arc<HeapType>> {
        self.types.get(&method_table).cloned()
    }

    fn enumerate_dependent_handles(&self) -> Box<dyn Iterator<Item = (Address, Address)> + '_> {
        Box::new(self.dependents.iter().copied())
    }
}

struct FixtureRuntime {
    handles: Vec<HandleInfo>,
    threads: Vec<(ThreadInfo, Vec<StackRootInfo>)>,
}

impl RuntimeView for FixtureRuntime {
    fn enumerate_handles(&self) -> Box<dyn Iterator<Item = HandleInfo> + '_> {
        Box::new(self.handles.iter().copied())
    }

    fn threads(&self) -> Vec<ThreadInfo> {
        self.threads.iter().map(|(thread, _)| *thread).collect()
    }

    fn enumerate_stack_roots(
        &self,
        thread: ThreadInfo,
    ) -> Box<dyn Iterator<Item = StackRootInfo> + '_> {
        match self.threads.iter().find(|(t, _)| *t == thread) {
            Some((_, roots)) => Box::new(roots.iter().copied()),
            None => Box::new(std::iter::empty()),
        }
    }
}

struct FixtureBuilder {
    walkable: bool,
    segments: Vec<Segment>,
    allocation_contexts: FxHashMap<Address, Address>,
    finalizer_roots: Vec<MemoryRange>,
    finalizer_objects: Vec<MemoryRange>,
}

impl HeapBuilder for FixtureBuilder {
    fn can_walk_heap(&self) -> bool {
        self.walkable
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
            allocation_contexts: self.allocation_contexts.clone(),
            finalizer_roots: self.finalizer_roots.clone(),
            finalizer_objects: self.finalizer_objects.clone(),
        }
    }
}
