//! Guest linear memory and function table management.
//!
//! The memory and table are host-created and imported by the guest, sized
//! exactly to the binary the module was built with (min == max, no growth).
//! All host-side access goes through the bounds-checked accessors here;
//! guest-returned offsets are wrapped in [`GuestOffset`] which rejects the
//! zero "allocation failed" sentinel at construction.

use std::num::NonZeroU32;

use wasmtime::{AsContext, AsContextMut, Memory, MemoryType, Ref, RefType, Table, TableType};

use crate::config::GuestLayout;
use crate::error::{BridgeError, Result};

/// A validated, non-zero offset into guest linear memory.
///
/// Distinct from host pointers on purpose: a `GuestOffset` is only
/// meaningful relative to one instance's linear memory and must never be
/// dereferenced outside [`GuestMemory`]'s accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestOffset(NonZeroU32);

impl GuestOffset {
    /// Wrap a raw guest-returned offset, rejecting the zero failure
    /// sentinel.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Raw offset value.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// The guest's linear memory plus its indirect-call table.
pub struct GuestMemory {
    memory: Memory,
    table: Table,
}

impl GuestMemory {
    /// Allocate the fixed-size memory and table described by `layout` and
    /// seed the guest allocator's dynamic-top word.
    pub fn new(mut store: impl AsContextMut, layout: &GuestLayout) -> Result<Self> {
        let pages = layout.memory_pages();
        let memory = Memory::new(&mut store, MemoryType::new(pages, Some(pages)))
            .map_err(|e| BridgeError::Instantiate(format!("memory allocation failed: {e}")))?;

        let table = Table::new(
            &mut store,
            TableType::new(RefType::FUNCREF, layout.table_size, Some(layout.table_size)),
            Ref::Func(None),
        )
        .map_err(|e| BridgeError::Instantiate(format!("table allocation failed: {e}")))?;

        let mem = Self { memory, table };

        // The guest's own allocator starts above the toolchain's static
        // data; without this seed its first malloc lands at offset 0.
        mem.write_u32(&mut store, layout.dynamic_top_ptr, layout.dynamic_base)?;

        Ok(mem)
    }

    /// Underlying wasmtime memory handle.
    pub fn memory(&self) -> Memory {
        self.memory
    }

    /// Underlying wasmtime table handle.
    pub fn table(&self) -> Table {
        self.table
    }

    /// Copy `bytes` into guest memory at `offset`.
    pub fn write(
        &self,
        mut store: impl AsContextMut,
        offset: GuestOffset,
        bytes: &[u8],
    ) -> Result<()> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| BridgeError::UnitTooLarge(bytes.len()))?;
        let range = self.checked_range(&store, offset.get(), len)?;
        self.memory.data_mut(&mut store)[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Copy `len` bytes out of guest memory at `offset`.
    pub fn read(
        &self,
        store: impl AsContext,
        offset: GuestOffset,
        len: u32,
    ) -> Result<Vec<u8>> {
        let range = self.checked_range(&store, offset.get(), len)?;
        Ok(self.memory.data(&store)[range].to_vec())
    }

    /// Borrow `len` bytes of guest memory at `offset` without copying.
    ///
    /// The returned slice aliases live guest state; it is only valid until
    /// the next guest call through the same store.
    pub fn slice<'a, T: 'a>(
        &self,
        store: &'a impl AsContext<Data = T>,
        offset: GuestOffset,
        len: u32,
    ) -> Result<&'a [u8]> {
        let range = self.checked_range(store, offset.get(), len)?;
        Ok(&self.memory.data(store)[range])
    }

    /// Read one little-endian u32 word at `offset`.
    pub fn read_u32(&self, store: impl AsContext, offset: u32) -> Result<u32> {
        let range = self.checked_range(&store, offset, 4)?;
        let bytes: [u8; 4] = self.memory.data(&store)[range].try_into().unwrap();
        Ok(u32::from_le_bytes(bytes))
    }

    /// Write one little-endian u32 word at `offset`.
    pub fn write_u32(&self, mut store: impl AsContextMut, offset: u32, value: u32) -> Result<()> {
        let range = self.checked_range(&store, offset, 4)?;
        self.memory.data_mut(&mut store)[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn checked_range(
        &self,
        store: impl AsContext,
        offset: u32,
        len: u32,
    ) -> Result<std::ops::Range<usize>> {
        let size = self.memory.data_size(&store);
        let end = offset as u64 + len as u64;
        if end > size as u64 {
            return Err(BridgeError::MemoryAccess { offset, len });
        }
        Ok(offset as usize..end as usize)
    }
}
