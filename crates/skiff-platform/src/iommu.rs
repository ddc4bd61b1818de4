//! IOMMU driver contract.
//!
//! A domain is a hardware translation context scoped to one IOMMU group.
//! Owning a [`IommuDomain`] box keeps the domain allocated; dropping it
//! frees it in the driver. Translation faults are delivered to a fault sink
//! installed on the domain.

use std::sync::Arc;

use bitflags::bitflags;
use thiserror::Error;

use crate::device::{IommuGroupId, PlatformDevice};

bitflags! {
    /// Access permissions for a mapping installed in a domain.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IommuPerms: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const CACHE = 1 << 2;
        const NOEXEC = 1 << 3;
    }
}

bitflags! {
    /// Fault condition bits reported by the hardware.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IommuFaultFlags: u32 {
        /// The faulting access was a write.
        const WRITE = 1 << 0;
        /// No translation existed for the address.
        const TRANSLATION = 1 << 1;
        /// A translation existed but the permissions did not allow the access.
        const PERMISSION = 1 << 2;
    }
}

/// How the driver manages a domain's page tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IommuDomainMode {
    /// The owner installs every mapping explicitly.
    Unmanaged,
    /// The driver maintains mappings for host DMA API use.
    Dma,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IommuError {
    #[error("no IOMMU backs group {0:?}")]
    NoSuchGroup(IommuGroupId),

    #[error("domain allocation failed for group {0:?}")]
    DomainAlloc(IommuGroupId),

    #[error("mapping [{iova:#x}..{iova:#x}+{size:#x}) rejected")]
    MapRejected { iova: u64, size: u64 },
}

/// A translation fault raised by a device behind the domain.
#[derive(Clone)]
pub struct IommuFault {
    /// The offending device, when the hardware can attribute the access.
    pub device: Option<Arc<dyn PlatformDevice>>,
    /// Faulting I/O virtual (guest-physical) address.
    pub iova: u64,
    pub flags: IommuFaultFlags,
}

/// Receives translation faults for one domain.
pub trait IommuFaultSink: Send + Sync {
    fn on_fault(&self, fault: &IommuFault);
}

/// An allocated translation domain. Dropping the box frees the domain.
pub trait IommuDomain: Send + Sync {
    /// Install a translation for `[iova, iova + size)` onto host physical
    /// `paddr` with the given permissions.
    fn map(&self, iova: u64, paddr: u64, size: u64, perms: IommuPerms) -> Result<(), IommuError>;

    /// Install the fault sink. At most one sink is active; a later call
    /// replaces the earlier one.
    fn set_fault_sink(&self, sink: Arc<dyn IommuFaultSink>);
}

/// The IOMMU driver: allocates domains scoped to hardware groups.
pub trait IommuDriver: Send + Sync {
    fn allocate_domain(
        &self,
        group: IommuGroupId,
        mode: IommuDomainMode,
    ) -> Result<Box<dyn IommuDomain>, IommuError>;
}
