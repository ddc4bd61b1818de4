use skiff_platform::{DevtreeError, HostIrq, HostIrqError, IommuError};
use thiserror::Error;

use crate::config::NAME_MAX;

/// Failure surfaced by a pass-through probe.
///
/// Every variant is reported after full rollback: a failed probe leaves no
/// routed IRQ, device reference, IOMMU domain, or event subscription behind.
/// IOMMU faults hit at guest runtime are deliberately *not* represented
/// here; they halt the guest instead of propagating (see `iommu`).
#[derive(Debug, Error)]
pub enum PassthroughError {
    #[error("assignment identifier {0:?} does not fit {NAME_MAX} bytes")]
    NameTooLong(String),

    #[error("bad pass-through configuration")]
    BadConfig(#[from] DevtreeError),

    #[error(
        "host-interrupts carries {host_cells} cells but interrupts carries \
         {guest_cells} (expected pairs matching one guest irq each)"
    )]
    IrqCountMismatch { host_cells: usize, guest_cells: usize },

    #[error("host irq {irq}: trigger bits {bits:#x} do not decode")]
    InvalidTrigger { irq: HostIrq, bits: u32 },

    #[error("host irq {irq}: setup failed")]
    IrqSetup {
        irq: HostIrq,
        #[source]
        source: HostIrqError,
    },

    #[error("iommu device {0:?} not found on the platform bus")]
    DeviceNotFound(String),

    #[error("device {0:?} exposes no hardware IOMMU group")]
    NoIommuGroup(String),

    #[error("IOMMU domain allocation failed")]
    DomainAlloc(#[source] IommuError),

    #[error("address-space event subscription failed")]
    Subscribe,
}
