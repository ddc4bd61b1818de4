//! Pass-through configuration parsed from the device-tree node.
//!
//! Parsing is a pure pass over the node: it touches no host resources, so a
//! configuration error never leaves anything to unwind.

use skiff_platform::{DeviceNode, Guest, IrqTrigger};

use crate::error::PassthroughError;
use crate::irq::IrqMappingEntry;

/// Pairs of (host IRQ, trigger type) cells.
pub(crate) const HOST_INTERRUPTS_PROP: &str = "host-interrupts";
/// Guest IRQ numbers, one per host-interrupt pair.
pub(crate) const GUEST_INTERRUPTS_PROP: &str = "interrupts";
/// Optional name of the IOMMU-capable device to bind.
pub(crate) const IOMMU_DEVICE_PROP: &str = "iommu-device";

/// Maximum byte length of the assignment identifier, including the NUL the
/// host diagnostics buffer reserves.
pub const NAME_MAX: usize = 64;

pub(crate) struct PassthroughConfig {
    /// `<guest name>/<node name>` identifier used in host diagnostics.
    pub name: String,
    pub entries: Vec<IrqMappingEntry>,
    pub iommu_device: Option<String>,
}

impl PassthroughConfig {
    pub fn parse(guest: &dyn Guest, node: &DeviceNode) -> Result<Self, PassthroughError> {
        let name = compose_name(guest.name(), node.name())?;

        let host_cells = node.u32_cells(HOST_INTERRUPTS_PROP);
        let guest_cells = node.u32_cells(GUEST_INTERRUPTS_PROP);
        if host_cells % 2 != 0 || guest_cells != host_cells / 2 {
            return Err(PassthroughError::IrqCountMismatch {
                host_cells,
                guest_cells,
            });
        }

        let count = host_cells / 2;
        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let host_irq = node.u32_at(HOST_INTERRUPTS_PROP, 2 * i)?;
            let bits = node.u32_at(HOST_INTERRUPTS_PROP, 2 * i + 1)?;
            let trigger = IrqTrigger::from_bits(bits)
                .ok_or(PassthroughError::InvalidTrigger { irq: host_irq, bits })?;
            let guest_irq = node.u32_at(GUEST_INTERRUPTS_PROP, i)?;
            entries.push(IrqMappingEntry {
                host_irq,
                trigger,
                guest_irq,
            });
        }

        let iommu_device = node.string(IOMMU_DEVICE_PROP).map(str::to_owned);

        Ok(Self {
            name,
            entries,
            iommu_device,
        })
    }
}

fn compose_name(guest: &str, node: &str) -> Result<String, PassthroughError> {
    let name = format!("{guest}/{node}");
    if name.len() >= NAME_MAX {
        return Err(PassthroughError::NameTooLong(name));
    }
    Ok(name)
}
