//! IOMMU binding: confine the pass-through device's DMA to guest RAM.
//!
//! The binding owns an unmanaged translation domain scoped to the device's
//! hardware IOMMU group. Mappings are installed in one bulk pass once the
//! guest's address space exists; a translation fault afterwards means the
//! hardware stepped outside its programmed window and halts the guest.

use std::sync::Arc;

use skiff_platform::{
    DeviceRegistry, Guest, IommuDomain, IommuDomainMode, IommuDriver, IommuFault, IommuFaultSink,
    IommuPerms, PlatformDevice, RegionFlags,
};
use tracing::{error, warn};

use crate::error::PassthroughError;

/// Region attributes that select the guest's pass-through-visible RAM:
/// real (not emulated), memory, RAM, and genuinely backed by host RAM
/// (not an alias).
const REGION_FILTER: RegionFlags = RegionFlags::REAL
    .union(RegionFlags::MEMORY)
    .union(RegionFlags::IS_RAM)
    .union(RegionFlags::IS_HOST_RAM);

/// An allocated IOMMU domain bound to the pass-through device's group.
///
/// Field order is teardown order: the domain is freed while the device
/// reference still pins the hardware group it was scoped to.
pub(crate) struct IommuBinding {
    domain: Box<dyn IommuDomain>,
    device: Arc<dyn PlatformDevice>,
}

impl IommuBinding {
    /// Resolve `device_name`, require a hardware IOMMU group, allocate an
    /// unmanaged domain for it, and arm the fault sink. The `Arc` device
    /// reference and the domain box unwind automatically if a later probe
    /// step fails.
    pub fn bind(
        devices: &Arc<dyn DeviceRegistry>,
        iommu: &Arc<dyn IommuDriver>,
        guest: Arc<dyn Guest>,
        assignment: &str,
        device_name: &str,
    ) -> Result<Self, PassthroughError> {
        let device = devices
            .find_by_name(device_name)
            .ok_or_else(|| PassthroughError::DeviceNotFound(device_name.to_owned()))?;
        let group = device
            .iommu_group()
            .ok_or_else(|| PassthroughError::NoIommuGroup(device_name.to_owned()))?;

        let domain = iommu
            .allocate_domain(group, IommuDomainMode::Unmanaged)
            .map_err(PassthroughError::DomainAlloc)?;

        domain.set_fault_sink(Arc::new(FaultHalter {
            guest,
            assignment: assignment.to_owned(),
        }));

        Ok(Self { domain, device })
    }

    pub fn device(&self) -> &Arc<dyn PlatformDevice> {
        &self.device
    }

    /// Map every real, host-RAM-backed guest region into the domain with
    /// read+write permission. One-time bulk pass: later region layout
    /// changes are not tracked, and a rejected region is logged rather than
    /// aborting the rest of the pass.
    pub fn map_guest_regions(&self, guest: &dyn Guest) {
        guest.for_each_region(REGION_FILTER, &mut |region| {
            if let Err(err) = self.domain.map(
                region.gphys,
                region.hphys,
                region.size,
                IommuPerms::READ | IommuPerms::WRITE,
            ) {
                warn!(
                    guest = guest.name(),
                    gphys = region.gphys,
                    size = region.size,
                    "iommu map failed: {err}"
                );
            }
        });
    }
}

/// Fault sink installed on the binding's domain: log and halt.
///
/// By the time the hardware reports a fault the device has already issued
/// an access outside the guest's RAM; there is no software recovery, so the
/// guest is stopped unconditionally.
pub(crate) struct FaultHalter {
    guest: Arc<dyn Guest>,
    assignment: String,
}

impl IommuFaultSink for FaultHalter {
    fn on_fault(&self, fault: &IommuFault) {
        let device = fault.device.as_ref().map(|d| d.name()).unwrap_or("<unknown>");
        error!(
            assignment = self.assignment.as_str(),
            device,
            flags = fault.flags.bits(),
            iova = fault.iova,
            "iommu fault, halting guest"
        );
        self.guest.halt();
    }
}
