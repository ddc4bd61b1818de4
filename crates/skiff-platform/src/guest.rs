//! Guest model contract.
//!
//! The slice of a guest partition that device models interact with: its
//! virtual interrupt controller (line-level emulation and host→guest
//! translation registration), its memory region table, and lifecycle
//! control. Guest identity is `Arc` pointer identity; the framework hands
//! out `Arc<dyn Guest>` handles.

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Attributes of a guest memory region, usable as an enumeration filter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegionFlags: u32 {
        /// Backed by an emulated device model.
        const VIRTUAL = 1 << 0;
        /// Backed by real host resources (pass-through).
        const REAL = 1 << 1;
        /// A memory (as opposed to I/O) region.
        const MEMORY = 1 << 2;
        /// An I/O region.
        const IO = 1 << 3;
        /// The region is RAM.
        const IS_RAM = 1 << 4;
        /// The region is ROM.
        const IS_ROM = 1 << 5;
        /// The region is a device aperture.
        const IS_DEVICE = 1 << 6;
        /// The backing store is host RAM (not aliased/remapped).
        const IS_HOST_RAM = 1 << 7;
    }
}

/// One guest memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRegion {
    /// Guest-physical base address.
    pub gphys: u64,
    /// Host-physical base address backing the region.
    pub hphys: u64,
    /// Region length in bytes.
    pub size: u64,
    pub flags: RegionFlags,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuestIrqError {
    #[error("guest irq {0} is out of range")]
    InvalidIrq(u32),

    #[error("guest virtual interrupt controller rejected the operation")]
    Rejected,
}

/// A guest partition, as seen by device models.
pub trait Guest: Send + Sync {
    fn name(&self) -> &str;

    /// Emulate a level change on a virtual interrupt line.
    fn emulate_irq_level(&self, guest_irq: u32, level: bool) -> Result<(), GuestIrqError>;

    /// Record that `host_irq` feeds `guest_irq`, so later injections and
    /// queries can resolve the pairing.
    fn register_host2guest_irq(&self, guest_irq: u32, host_irq: u32) -> Result<(), GuestIrqError>;

    /// Visit every region whose flags contain all bits of `filter`.
    fn for_each_region(&self, filter: RegionFlags, f: &mut dyn FnMut(&MemRegion));

    /// Stop the guest. Used when continuing execution would violate guest
    /// integrity; there is no resume path through this contract.
    fn halt(&self);
}
