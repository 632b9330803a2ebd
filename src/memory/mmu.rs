//! The two-level page-table engine.
//!
//! [`AddressSpace`] owns the level-1 translation table and the pool of
//! coarse tables, builds the boot-time identity map, and installs single
//! small pages on demand from the data-abort path. It is plain data over
//! borrowed tables, so the whole engine runs under test on a host; only the
//! CP15 programming around it is hardware-specific.

use super::descriptor::{
    AccessPermission, L1Descriptor, L1Entry, L2Descriptor, L2Entry, KERNEL_DOMAIN,
};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Entries in the level-1 translation table.
pub const LVL1_ENTRIES: usize = 4096;
/// Entries in one coarse table.
pub const LVL2_ENTRIES: usize = 256;
/// Bytes mapped by one level-2 small-page entry.
pub const PAGE_SIZE: u32 = 4096;
/// Coarse tables in the statically allocated pool.
pub const POOL_TABLES: usize = 4096;

/// The frame deliberately left unmapped by the boot identity map, so that
/// the first touch of it exercises the demand-mapping abort path.
pub const DEMAND_TEST_FRAME: u32 = 0b1010_1010_1010_1010_1010;

/// The level-1 translation table the MMU walks via CP15 c2. The linker pins
/// it 16 KiB aligned.
#[repr(C, align(16384))]
pub struct TranslationTable {
    entries: [L1Entry; LVL1_ENTRIES],
}

impl TranslationTable {
    pub const EMPTY: Self = Self {
        entries: [L1Entry::new(); LVL1_ENTRIES],
    };

    fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = L1Entry::cleared();
        }
    }

    pub fn entry(&self, index: usize) -> L1Entry {
        self.entries[index]
    }
}

/// One level-2 table of 256 small-page entries, 1 KiB aligned.
#[repr(C, align(1024))]
pub struct CoarseTable {
    entries: [L2Entry; LVL2_ENTRIES],
}

impl CoarseTable {
    pub const EMPTY: Self = Self {
        entries: [L2Entry::new(); LVL2_ENTRIES],
    };

    fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = L2Entry::cleared();
        }
    }
}

impl Clone for CoarseTable {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries,
        }
    }
}

/// Why a page could not be installed. Both are fatal to the requester and
/// never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapError {
    /// Every coarse table in the pool has been handed out
    PoolExhausted,
    /// The level-2 slot already maps a different frame
    AlreadyMapped,
}

/// Result of a successful [`AddressSpace::install_page`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Installed {
    Fresh,
    /// The identical mapping was already present; the call was a no-op
    AlreadyPresent,
}

/// Marker for a level-1 slot with no coarse table behind it.
const NO_BACKING: u16 = u16::MAX;

/// The kernel's address space: the translation table, the coarse-table pool
/// and the bookkeeping linking them.
///
/// The descriptor words hold the hardware's view of each coarse table's
/// address (truncated, shifted); software walks instead resolve level-1
/// slots through `backing`, which records the pool slot serving each one.
/// The pool only grows; tables are never returned.
pub struct AddressSpace<'t> {
    table: &'t mut TranslationTable,
    pool: &'t mut [CoarseTable],
    pool_used: usize,
    backing: [u16; LVL1_ENTRIES],
}

impl<'t> AddressSpace<'t> {
    /// Wraps and clears the given tables.
    pub fn new(table: &'t mut TranslationTable, pool: &'t mut [CoarseTable]) -> Self {
        table.clear();
        for coarse in pool.iter_mut() {
            coarse.clear();
        }
        Self {
            table,
            pool,
            pool_used: 0,
            backing: [NO_BACKING; LVL1_ENTRIES],
        }
    }

    /// Identity-maps every 4-KiB frame in `[0, data_end >> 12)` read-write
    /// for everyone, except `hole`, which is left unmapped.
    pub fn identity_map_to(&mut self, data_end: u32, hole: u32) -> Result<(), MapError> {
        for frame in 0..(data_end / PAGE_SIZE) {
            if frame == hole {
                continue;
            }
            self.install_page(frame * PAGE_SIZE, AccessPermission::Full)?;
        }
        Ok(())
    }

    /// Maps the 4-KiB frame containing `virtual_address` onto itself.
    ///
    /// Idempotent per frame: re-installing the identical mapping is a no-op.
    /// A level-2 slot that already maps a *different* frame is refused, and
    /// a missing coarse table is taken from the pool (linked under the
    /// kernel domain) or reported exhausted.
    pub fn install_page(
        &mut self,
        virtual_address: u32,
        permissions: AccessPermission,
    ) -> Result<Installed, MapError> {
        let frame = virtual_address / PAGE_SIZE;
        let l1_index = (virtual_address >> 20) as usize;
        let l2_index = (frame as usize) & (LVL2_ENTRIES - 1);

        let pool_slot = match self.backing[l1_index] {
            NO_BACKING => self.link_coarse_table(l1_index)?,
            linked => linked as usize,
        };

        let entry = self.pool[pool_slot].entries[l2_index];
        if entry.descriptor() != L2Descriptor::Invalid {
            if entry.base_address() == frame {
                return Ok(Installed::AlreadyPresent);
            }
            return Err(MapError::AlreadyMapped);
        }

        self.pool[pool_slot].entries[l2_index] = L2Entry::small_page(frame, permissions);
        Ok(Installed::Fresh)
    }

    /// Takes the next coarse table from the pool and links it into the
    /// level-1 slot.
    fn link_coarse_table(&mut self, l1_index: usize) -> Result<usize, MapError> {
        if self.pool_used == self.pool.len() {
            return Err(MapError::PoolExhausted);
        }
        let slot = self.pool_used;
        self.pool_used += 1;

        let base = (core::ptr::from_ref(&self.pool[slot]) as usize as u32) >> 10;
        self.table.entries[l1_index] = L1Entry::coarse(base, KERNEL_DOMAIN);
        self.backing[l1_index] = slot as u16;
        Ok(slot)
    }

    /// Walks the tables for `virtual_address`; the mapped frame, if any.
    pub fn translate(&self, virtual_address: u32) -> Option<u32> {
        let entry = self.level2_entry(virtual_address)?;
        (entry.descriptor() == L2Descriptor::Small).then(|| entry.base_address())
    }

    /// The level-2 entry covering `virtual_address`, if its level-1 slot has
    /// a coarse table at all.
    pub fn level2_entry(&self, virtual_address: u32) -> Option<L2Entry> {
        let l1_index = (virtual_address >> 20) as usize;
        if self.table.entries[l1_index].descriptor() != L1Descriptor::CoarseTable {
            return None;
        }
        let pool_slot = self.backing[l1_index];
        debug_assert_ne!(pool_slot, NO_BACKING);
        let l2_index = ((virtual_address / PAGE_SIZE) as usize) & (LVL2_ENTRIES - 1);
        Some(self.pool[pool_slot as usize].entries[l2_index])
    }

    /// Address to program into the translation-table base register.
    pub fn table_base(&self) -> *const TranslationTable {
        core::ptr::from_ref(self.table)
    }

    /// Coarse tables handed out so far. Never decreases.
    pub fn tables_used(&self) -> usize {
        self.pool_used
    }
}

/// Data-abort fault status, the low four bits of CP15 c5.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum FaultKind {
    Alignment = 0b0001,
    ExternalAbort = 0b1000,
    /// No section descriptor for the address
    TranslationSection = 0b0101,
    /// Section mapped, but no page descriptor for the address
    TranslationPage = 0b0111,
    DomainSection = 0b1001,
    DomainPage = 0b1011,
    ExternalTranslationLevel1 = 0b1100,
    ExternalTranslationLevel2 = 0b1110,
    PermissionSection = 0b1101,
    PermissionPage = 0b1111,
}

impl FaultKind {
    /// Decodes a raw fault-status word; `None` for codes this kernel does
    /// not know.
    pub fn from_fsr(fsr: u32) -> Option<Self> {
        FromPrimitive::from_u32(fsr & 0xF)
    }

    /// Whether this fault means "nothing mapped here", the one condition the
    /// demand-mapping path repairs.
    pub fn is_translation(self) -> bool {
        matches!(self, Self::TranslationSection | Self::TranslationPage)
    }
}
