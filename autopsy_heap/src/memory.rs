//! Cooperative read cache over the raw data reader.
//!
//! Heap walks read the target almost entirely in ascending address
//! order, so a single contiguous window captures nearly every read.
//! The reader holds one window; a read outside it reloads the window
//! at the requested address, and reads the window cannot satisfy
//! fall through to the raw [`DataReader`].
//!
//! # Thread affinity
//!
//! A `MemoryReader` is owned by exactly one enumeration and is
//! discarded when that enumeration completes, so stale target memory
//! is never reused across walk phases and readers are never shared
//! between threads.

use autopsy_core::{Address, DataReader};

/// A single-window read cache.
pub struct MemoryReader {
    window: Vec<u8>,
    /// Target address of `window[0]`.
    base: Address,
    /// Number of valid bytes in the window.
    valid: usize,
    pointer_size: u32,
}

impl MemoryReader {
    /// Create a reader with the given window capacity.
    pub fn new(capacity: usize, pointer_size: u32) -> Self {
        Self {
            window: vec![0; capacity],
            base: 0,
            valid: 0,
            pointer_size,
        }
    }

    /// Target pointer width in bytes.
    #[inline]
    pub fn pointer_size(&self) -> u32 {
        self.pointer_size
    }

    /// Whether `addr` lies inside the currently cached window.
    #[inline]
    pub fn contains(&self, addr: Address) -> bool {
        self.valid != 0 && addr >= self.base && addr < self.base + self.valid as u64
    }

    /// Whether `len` bytes at `addr` are fully cached.
    #[inline]
    fn contains_range(&self, addr: Address, len: usize) -> bool {
        self.valid != 0
            && addr >= self.base
            && addr + len as u64 <= self.base + self.valid as u64
    }

    /// Load the window covering `addr`. Returns true if at least one
    /// pointer's worth of bytes became available.
    pub fn ensure_range_in_cache(&mut self, addr: Address, reader: &dyn DataReader) -> bool {
        self.base = addr;
        self.valid = reader.read_memory(addr, &mut self.window);
        self.valid >= self.pointer_size as usize
    }

    /// Read a target-pointer-width value, preferring the window.
    ///
    /// Returns `None` when the address cannot be read at all.
    pub fn read_ptr(&mut self, addr: Address, reader: &dyn DataReader) -> Option<Address> {
        let len = self.pointer_size as usize;
        if !self.contains_range(addr, len) && !self.ensure_range_in_cache(addr, reader) {
            return Self::direct_read_ptr(addr, len, reader);
        }
        if self.contains_range(addr, len) {
            return Some(self.decode_ptr((addr - self.base) as usize));
        }
        Self::direct_read_ptr(addr, len, reader)
    }

    /// Read a 32-bit value, preferring the window.
    pub fn read_u32(&mut self, addr: Address, reader: &dyn DataReader) -> Option<u32> {
        if !self.contains_range(addr, 4) && !self.ensure_range_in_cache(addr, reader) {
            return Self::direct_read_u32(addr, reader);
        }
        if self.contains_range(addr, 4) {
            let offset = (addr - self.base) as usize;
            let bytes: [u8; 4] = self.window[offset..offset + 4].try_into().ok()?;
            return Some(u32::from_le_bytes(bytes));
        }
        Self::direct_read_u32(addr, reader)
    }

    /// Serve a pointer read only if the window already covers it.
    ///
    /// Used by the descriptor walk, which prefers the window but
    /// must not displace it mid-object.
    pub fn cached_ptr(&self, addr: Address) -> Option<Address> {
        if self.contains_range(addr, self.pointer_size as usize) {
            Some(self.decode_ptr((addr - self.base) as usize))
        } else {
            None
        }
    }

    fn decode_ptr(&self, offset: usize) -> Address {
        if self.pointer_size == 8 {
            let bytes: [u8; 8] = self.window[offset..offset + 8]
                .try_into()
                .unwrap_or([0; 8]);
            u64::from_le_bytes(bytes)
        } else {
            let bytes: [u8; 4] = self.window[offset..offset + 4]
                .try_into()
                .unwrap_or([0; 4]);
            u32::from_le_bytes(bytes) as u64
        }
    }

    fn direct_read_ptr(addr: Address, len: usize, reader: &dyn DataReader) -> Option<Address> {
        let mut buf = [0u8; 8];
        if reader.read_memory(addr, &mut buf[..len]) != len {
            return None;
        }
        if len == 8 {
            Some(u64::from_le_bytes(buf))
        } else {
            Some(u32::from_le_bytes(buf[..4].try_into().ok()?) as u64)
        }
    }

    fn direct_read_u32(addr: Address, reader: &dyn DataReader) -> Option<u32> {
        let mut buf = [0u8; 4];
        if reader.read_memory(addr, &mut buf) != 4 {
            return None;
        }
        Some(u32::from_le_bytes(buf))
    }
}
