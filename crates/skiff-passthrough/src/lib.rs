//! Platform device pass-through emulator.
//!
//! Assigns a physical platform device directly to a guest partition:
//! physical interrupts raised by the device are forwarded onto the guest's
//! virtual interrupt lines with edge-preserving pulse semantics, and the
//! device's DMA is confined to the guest's real memory through an IOMMU
//! domain programmed once the guest's address space exists.
//!
//! The emulator is registered with the host framework's
//! [`EmulatorRegistry`](skiff_platform::EmulatorRegistry) via [`register`].
//! A probe builds the whole assembly transactionally: every acquired
//! resource (routed host IRQs, the bound device reference, the IOMMU
//! domain, the address-space subscription) is held by a scoped owner, so a
//! failure at any point, and eventual removal, releases exactly what was
//! acquired, in reverse order.
#![forbid(unsafe_code)]

mod config;
mod emulator;
mod error;
mod iommu;
mod irq;
mod listener;

#[cfg(test)]
mod testutil;

pub use config::NAME_MAX;
pub use emulator::{register, HostServices, PassthroughDevice, PlatformPassthrough};
pub use error::PassthroughError;
pub use irq::{IrqMappingEntry, IrqRouter};
