//! Kernel memory management.
//!
//! The codec and the engine are portable; the glue below owns the
//! linker-pinned tables, programs CP15 and services data aborts.

/// Descriptor-word codecs
pub mod descriptor;
/// The page-table engine
pub mod mmu;

pub use mmu::{AddressSpace, CoarseTable, TranslationTable, DEMAND_TEST_FRAME};

#[cfg(target_arch = "arm")]
mod hardware {
    use super::descriptor::{AccessPermission, DomainAccess};
    use super::mmu::{
        AddressSpace, CoarseTable, FaultKind, TranslationTable, DEMAND_TEST_FRAME, PAGE_SIZE,
        POOL_TABLES,
    };
    use crate::architecture::cp15;
    use crate::cell::{InitCell, TrapCell};
    use crate::{board, call_once, log, println};
    use core::ptr::addr_of_mut;

    /// The translation table the MMU walks. The linker script pins this
    /// section 16 KiB aligned at a known address so CP15 c2 can be
    /// programmed with it.
    #[link_section = ".kernel_page_table"]
    static mut KERNEL_TABLE: TranslationTable = TranslationTable::EMPTY;

    /// The grow-only pool of coarse tables, 1 KiB aligned by the linker.
    #[link_section = ".coarse_tables"]
    static mut COARSE_POOL: [CoarseTable; POOL_TABLES] = [CoarseTable::EMPTY; POOL_TABLES];

    static ADDRESS_SPACE: InitCell<TrapCell<AddressSpace<'static>>> = InitCell::new();

    /// Builds the kernel address space and turns the MMU on.
    ///
    /// Identity-maps everything up to the board's `DATA_END` except the
    /// demand-test frame, points CP15 c2 at the table, grants the kernel
    /// domain MANAGER rights in c3 and sets the enable bit in c1. Runs
    /// exactly once.
    pub fn init() {
        call_once!();

        // SAFETY: Guarded by `call_once!`; afterwards the tables are only
        // reached through the address-space cell
        let (table, pool) = unsafe { (&mut *addr_of_mut!(KERNEL_TABLE), &mut *addr_of_mut!(COARSE_POOL)) };
        let mut space = AddressSpace::new(table, pool);

        log!("identity mapping up to {:#x}", board::DATA_END);
        if let Err(error) = space.identity_map_to(board::DATA_END, DEMAND_TEST_FRAME) {
            panic!("building the kernel identity map failed: {:?}", error);
        }

        // SAFETY: The table is fully built and lives at its linker-pinned
        // address for the rest of time
        unsafe {
            cp15::set_translation_table_base(space.table_base() as u32);
            cp15::set_domain_access_control(DomainAccess::Manager as u32);
        }

        // SAFETY: Only reachable once; nothing reads the cell before init
        unsafe {
            ADDRESS_SPACE.set(TrapCell::new(space));
        }

        // SAFETY: Every address the kernel touches from here on is identity
        // mapped, so enabling translation changes nothing it can observe
        unsafe {
            cp15::enable_mmu();
        }
        println!("mmu: enabled");
    }

    /// Services a data abort: reads the fault state from CP15 c5/c6 and, for
    /// plain translation faults, installs the missing identity page
    /// read-write for everyone so the aborted instruction can restart.
    /// Every other fault kind is fatal.
    pub fn handle_data_abort(fault_pc: u32) {
        let fsr = cp15::fault_status();
        let fault_address = cp15::fault_address();

        match FaultKind::from_fsr(fsr) {
            Some(kind) if kind.is_translation() => {
                log!(
                    "demand mapping {:#010x} (faulted at {:#010x})",
                    fault_address,
                    fault_pc
                );
                let installed = ADDRESS_SPACE
                    .with(|space| space.install_page(fault_address, AccessPermission::Full));
                if let Err(error) = installed {
                    println!(
                        "unrecoverable fault at {:#010x}: {:?} while mapping frame {:#x}",
                        fault_pc,
                        error,
                        fault_address / PAGE_SIZE
                    );
                    board::halt();
                }
            }
            kind => {
                println!(
                    "unhandled data abort at {:#010x}: kind {:?}, fsr {:#x}, address {:#010x}",
                    fault_pc, kind, fsr, fault_address
                );
                board::halt();
            }
        }
    }
}

#[cfg(target_arch = "arm")]
pub use hardware::{handle_data_abort, init};
