//! Host-framework contracts consumed by Skiff device models.
//!
//! This crate defines the seams between a device emulator and the host
//! framework that drives it: device-tree configuration nodes, the host
//! interrupt controller, the platform device registry, the IOMMU driver,
//! the guest model (virtual interrupt lines, memory regions, lifecycle),
//! guest address-space lifecycle events, and the emulator registry that
//! dispatches probe/reset/remove.
//!
//! Everything here is a contract: concrete implementations live in the host
//! framework (or in test mocks). The one concrete type is [`DeviceNode`],
//! the in-memory device-tree node that configuration is read from.
#![forbid(unsafe_code)]

pub mod aspace;
pub mod devemu;
pub mod device;
pub mod devtree;
pub mod guest;
pub mod iommu;
pub mod irq;

pub use aspace::{
    AspaceEvent, AspaceEventKind, AspaceEventSource, AspaceListener, EventDisposition,
    SubscribeError,
};
pub use devemu::{
    EmuError, EmulatedDevice, EmulatedDeviceHandle, Emulator, EmulatorRegistry, NodeMatch,
};
pub use device::{DeviceRegistry, IommuGroupId, PlatformDevice};
pub use devtree::{DeviceNode, DevtreeError, PropValue};
pub use guest::{Guest, GuestIrqError, MemRegion, RegionFlags};
pub use iommu::{
    IommuDomain, IommuDomainMode, IommuDriver, IommuError, IommuFault, IommuFaultFlags,
    IommuFaultSink, IommuPerms,
};
pub use irq::{
    HostInterruptController, HostIrq, HostIrqError, HostIrqHandler, IrqHandled, IrqTrigger,
};
