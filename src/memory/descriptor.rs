//! Bit-exact codecs for the two-level page-descriptor words.
//!
//! The MMU reads these words directly, so the encodings must match the
//! hardware layout byte for byte. The bitfields below generate explicit
//! shift/mask accessors over a `u32` with LSB-0 numbering; setting one field
//! never disturbs another.

use bitfield_struct::bitfield;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};

/// Level-1 descriptor types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum L1Descriptor {
    Invalid = 0b00,
    CoarseTable = 0b01,
    Section = 0b10,
    Fine = 0b11,
}

impl From<u32> for L1Descriptor {
    fn from(value: u32) -> Self {
        FromPrimitive::from_u32(value).expect("two bits always decode to a level-1 type")
    }
}

impl From<L1Descriptor> for u32 {
    #[inline]
    fn from(value: L1Descriptor) -> Self {
        // SAFETY: `L1Descriptor` can always fit into a `u32`
        unsafe { ToPrimitive::to_u32(&value).unwrap_unchecked() }
    }
}

/// Level-2 descriptor types. Only small pages are ever written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum L2Descriptor {
    Invalid = 0b00,
    /// 64 KiB page
    Large = 0b01,
    /// 4 KiB page
    Small = 0b10,
    /// 1 KiB page
    Tiny = 0b11,
}

impl From<u32> for L2Descriptor {
    fn from(value: u32) -> Self {
        FromPrimitive::from_u32(value).expect("two bits always decode to a level-2 type")
    }
}

impl From<L2Descriptor> for u32 {
    #[inline]
    fn from(value: L2Descriptor) -> Self {
        // SAFETY: `L2Descriptor` can always fit into a `u32`
        unsafe { ToPrimitive::to_u32(&value).unwrap_unchecked() }
    }
}

/// One AP field's worth of access control (each level-2 entry carries four,
/// one per 1 KiB subpage).
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum AccessPermission {
    NoAccess = 0b00,
    PrivilegedOnly = 0b01,
    UserReadOnly = 0b10,
    /// Read/write from both privilege levels
    Full = 0b11,
}

impl From<u32> for AccessPermission {
    fn from(value: u32) -> Self {
        FromPrimitive::from_u32(value).expect("two bits always decode to an access permission")
    }
}

impl From<AccessPermission> for u32 {
    #[inline]
    fn from(value: AccessPermission) -> Self {
        // SAFETY: `AccessPermission` can always fit into a `u32`
        unsafe { ToPrimitive::to_u32(&value).unwrap_unchecked() }
    }
}

/// Cache and write-buffer behavior of a mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum CacheBehavior {
    NonCacheable = 0b00,
    Buffered = 0b01,
    WriteThrough = 0b10,
    WriteBack = 0b11,
}

impl From<u32> for CacheBehavior {
    fn from(value: u32) -> Self {
        FromPrimitive::from_u32(value).expect("two bits always decode to a cache behavior")
    }
}

impl From<CacheBehavior> for u32 {
    #[inline]
    fn from(value: CacheBehavior) -> Self {
        // SAFETY: `CacheBehavior` can always fit into a `u32`
        unsafe { ToPrimitive::to_u32(&value).unwrap_unchecked() }
    }
}

/// Domain access modes programmed into CP15 c3, two bits per domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DomainAccess {
    /// Every access faults
    NoAccess = 0b00,
    /// Accesses are checked against the AP bits
    Client = 0b01,
    /// No permission checks at all
    Manager = 0b11,
}

/// The domain every kernel mapping lives in. CP15 c3 grants it MANAGER and
/// leaves every other domain at NO_ACCESS.
pub const KERNEL_DOMAIN: u8 = 0;

/// A level-1 translation-table entry.
#[bitfield(u32)]
pub struct L1Entry {
    #[bits(2)]
    pub descriptor: L1Descriptor,
    /// Bits 3:2, must be written as zero
    #[bits(2)]
    reserved: u8,
    /// Constant one in every cleared or valid entry
    pub always_one: bool,
    #[bits(4)]
    pub domain: u8,
    /// Bit 9, implementation defined; kept zero
    imp: bool,
    /// Physical address of the coarse table, right-shifted by 10
    #[bits(22)]
    pub base_address: u32,
}

impl L1Entry {
    /// The reset pattern: type invalid, constant-one bit set, everything
    /// else zero (encodes to 0x0000_0010).
    pub fn cleared() -> Self {
        Self::new().with_always_one(true)
    }

    /// An entry linking a translation slot to the coarse table at `base`
    /// (the table's physical address right-shifted by 10).
    pub fn coarse(base: u32, domain: u8) -> Self {
        Self::cleared()
            .with_descriptor(L1Descriptor::CoarseTable)
            .with_domain(domain)
            .with_base_address(base)
    }
}

/// A level-2 (coarse-table) entry.
#[bitfield(u32)]
pub struct L2Entry {
    #[bits(2)]
    pub descriptor: L2Descriptor,
    #[bits(2)]
    pub cache_behavior: CacheBehavior,
    #[bits(2)]
    pub ap0: AccessPermission,
    #[bits(2)]
    pub ap1: AccessPermission,
    #[bits(2)]
    pub ap2: AccessPermission,
    #[bits(2)]
    pub ap3: AccessPermission,
    /// Physical frame number (address right-shifted by 12)
    #[bits(20)]
    pub base_address: u32,
}

impl L2Entry {
    /// The reset pattern: all zeroes, type invalid.
    pub fn cleared() -> Self {
        Self::new()
    }

    /// A small-page mapping of `frame` with the same permission on all four
    /// subpages and uncached, unbuffered memory behavior.
    pub fn small_page(frame: u32, permissions: AccessPermission) -> Self {
        Self::new()
            .with_descriptor(L2Descriptor::Small)
            .with_cache_behavior(CacheBehavior::NonCacheable)
            .with_ap0(permissions)
            .with_ap1(permissions)
            .with_ap2(permissions)
            .with_ap3(permissions)
            .with_base_address(frame)
    }
}
