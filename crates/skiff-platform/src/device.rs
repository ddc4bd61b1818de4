//! Platform device registry contract.
//!
//! The registry resolves devices by name so a device model can bind to the
//! physical hardware backing it. Device handles are reference counted via
//! `Arc`: holding a clone keeps the device pinned for as long as the model
//! needs it.

use std::sync::Arc;

/// Identifies the hardware IOMMU group a device belongs to.
///
/// Devices behind the same group share translation: an IOMMU domain is
/// always attached to a whole group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IommuGroupId(pub u32);

/// A physical platform device known to the host.
pub trait PlatformDevice: Send + Sync {
    fn name(&self) -> &str;

    /// The device's hardware IOMMU group, if it sits behind an IOMMU.
    fn iommu_group(&self) -> Option<IommuGroupId>;
}

/// Name-based lookup over the platform bus.
pub trait DeviceRegistry: Send + Sync {
    fn find_by_name(&self, name: &str) -> Option<Arc<dyn PlatformDevice>>;
}
