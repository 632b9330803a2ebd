//! Full-scale page-table checks with the real board geometry: the boot
//! identity map leaves exactly one hole, and the demand path repairs it.

use kestrel::memory::descriptor::{AccessPermission, L2Descriptor};
use kestrel::memory::mmu::{Installed, POOL_TABLES};
use kestrel::memory::{AddressSpace, CoarseTable, TranslationTable, DEMAND_TEST_FRAME};

const PAGE_SIZE: u32 = 4096;
/// The qemu board's identity-mapped extent.
const DATA_END: u32 = 0xC000_0000;

fn full_size_space() -> AddressSpace<'static> {
    let table = Box::leak(Box::new(TranslationTable::EMPTY));
    let pool = Box::leak(vec![CoarseTable::EMPTY; POOL_TABLES].into_boxed_slice());
    AddressSpace::new(table, pool)
}

#[test]
fn boot_identity_map_covers_everything_but_the_test_frame() {
    let mut space = full_size_space();
    space
        .identity_map_to(DATA_END, DEMAND_TEST_FRAME)
        .expect("the pool is large enough for the whole region");

    // One coarse table per mapped megabyte, and room to spare in the pool
    assert_eq!(space.tables_used(), (DATA_END >> 20) as usize);
    assert!(space.tables_used() < POOL_TABLES);

    for frame in 0..(DATA_END / PAGE_SIZE) {
        let address = frame * PAGE_SIZE;
        if frame == DEMAND_TEST_FRAME {
            let entry = space
                .level2_entry(address)
                .expect("the surrounding megabyte is mapped");
            assert_eq!(entry.descriptor(), L2Descriptor::Invalid);
            assert_eq!(space.translate(address), None);
        } else {
            assert_eq!(space.translate(address), Some(frame));
        }
    }
}

#[test]
fn demand_mapping_repairs_the_test_frame_idempotently() {
    let mut space = full_size_space();
    space
        .identity_map_to(DATA_END, DEMAND_TEST_FRAME)
        .expect("the pool is large enough for the whole region");
    let tables_before = space.tables_used();

    // What the abort path does for a fault anywhere inside the frame
    let faulting_address = DEMAND_TEST_FRAME * PAGE_SIZE + 0x0042;
    assert_eq!(
        space.install_page(faulting_address, AccessPermission::Full),
        Ok(Installed::Fresh)
    );

    // The frame now identity maps, read-write for everyone
    let entry = space.level2_entry(faulting_address).unwrap();
    assert_eq!(entry.descriptor(), L2Descriptor::Small);
    assert_eq!(entry.base_address(), DEMAND_TEST_FRAME);
    assert_eq!(entry.ap0(), AccessPermission::Full);
    assert_eq!(entry.ap1(), AccessPermission::Full);
    assert_eq!(entry.ap2(), AccessPermission::Full);
    assert_eq!(entry.ap3(), AccessPermission::Full);
    assert_eq!(space.translate(faulting_address), Some(DEMAND_TEST_FRAME));

    // The level-1 slot was already linked, so no fresh table was taken
    assert_eq!(space.tables_used(), tables_before);

    // A second fault on the same frame (the restarted access racing a
    // second toucher) is a no-op, not a conflict
    assert_eq!(
        space.install_page(DEMAND_TEST_FRAME * PAGE_SIZE, AccessPermission::Full),
        Ok(Installed::AlreadyPresent)
    );
}
