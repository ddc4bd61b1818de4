//! The pass-through controller: probe and remove as one transactional unit.
//!
//! Probe acquires, in order: the parsed configuration (no host resources),
//! one routed host IRQ per mapping entry, the optional IOMMU binding, and
//! the address-space subscription. Every acquisition is held by a scoped
//! owner, so `?` at any step releases exactly the resources acquired so
//! far. Removal is `Drop` of [`PassthroughDevice`]: fields are declared in
//! teardown order (subscription, shared state with the IOMMU binding,
//! routed IRQs, mapping table), which releases everything in the reverse of
//! acquisition. In particular the host IRQ handlers are gone before the
//! table they read is freed.

use std::sync::Arc;

use skiff_platform::{
    AspaceEventSource, DeviceNode, DeviceRegistry, EmuError, EmulatedDevice, Emulator,
    EmulatorRegistry, Guest, HostInterruptController, HostIrqHandler, IommuDriver, NodeMatch,
};
use tracing::debug;

use crate::config::PassthroughConfig;
use crate::error::PassthroughError;
use crate::iommu::IommuBinding;
use crate::irq::{IrqMappingEntry, IrqRouter, RoutedIrq};
use crate::listener::{AspaceInitListener, AspaceSubscription};

/// Collaborator handles the emulator needs from the host framework.
#[derive(Clone)]
pub struct HostServices {
    pub intc: Arc<dyn HostInterruptController>,
    pub devices: Arc<dyn DeviceRegistry>,
    pub iommu: Arc<dyn IommuDriver>,
    pub aspace: Arc<dyn AspaceEventSource>,
}

/// State shared between an assignment and its address-space listener.
pub(crate) struct AssignmentShared {
    pub name: String,
    pub guest: Arc<dyn Guest>,
    pub entries: Arc<[IrqMappingEntry]>,
    pub binding: Option<IommuBinding>,
}

/// A live pass-through assignment. Dropping it is removal.
pub struct PassthroughDevice {
    // Teardown order == field order. Keep the subscription first and the
    // routed IRQ guards ahead of the router that owns the mapping table.
    subscription: AspaceSubscription,
    shared: Arc<AssignmentShared>,
    routed: Vec<RoutedIrq>,
    router: Arc<IrqRouter>,
    listener: Arc<AspaceInitListener>,
}

impl PassthroughDevice {
    /// The `<guest>/<node>` assignment identifier.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Router lookup misses observed so far (see [`IrqRouter::miss_count`]).
    pub fn irq_miss_count(&self) -> u64 {
        self.router.miss_count()
    }

    /// Number of host IRQ lines this assignment holds routed.
    pub fn routed_irq_count(&self) -> usize {
        self.routed.len()
    }

    /// Whether the deferred address-space wiring has run.
    pub fn aspace_wired(&self) -> bool {
        self.listener.has_fired()
    }
}

impl EmulatedDevice for PassthroughDevice {
    fn reset(&mut self) -> Result<(), EmuError> {
        // Pass-through has no device model state to reset.
        Ok(())
    }
}

/// The platform pass-through emulator.
pub struct PlatformPassthrough {
    services: HostServices,
}

impl PlatformPassthrough {
    pub fn new(services: HostServices) -> Self {
        Self { services }
    }

    /// Build a pass-through assignment for `node` on `guest`.
    ///
    /// On error, everything acquired before the failing step has already
    /// been released; the caller sees a clean failure.
    pub fn probe_device(
        &self,
        guest: Arc<dyn Guest>,
        node: &DeviceNode,
    ) -> Result<PassthroughDevice, PassthroughError> {
        let config = PassthroughConfig::parse(guest.as_ref(), node)?;

        let entries: Arc<[IrqMappingEntry]> = config.entries.into();
        let router = Arc::new(IrqRouter::new(guest.clone(), entries.clone()));
        let handler: Arc<dyn HostIrqHandler> = router.clone();

        let mut routed = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            // A failure here drops `routed`, unwinding the already-claimed
            // lines in claim order before the error propagates.
            routed.push(RoutedIrq::claim(
                &self.services.intc,
                entry,
                &config.name,
                handler.clone(),
            )?);
        }

        let binding = config
            .iommu_device
            .as_deref()
            .map(|device_name| {
                IommuBinding::bind(
                    &self.services.devices,
                    &self.services.iommu,
                    guest.clone(),
                    &config.name,
                    device_name,
                )
            })
            .transpose()?;
        if let Some(binding) = &binding {
            debug!(
                assignment = config.name.as_str(),
                device = binding.device().name(),
                "iommu domain bound"
            );
        }

        let shared = Arc::new(AssignmentShared {
            name: config.name,
            guest,
            entries,
            binding,
        });
        let listener = Arc::new(AspaceInitListener::new(Arc::downgrade(&shared)));
        let subscription =
            AspaceSubscription::subscribe(&self.services.aspace, listener.clone())?;

        debug!(
            assignment = shared.name.as_str(),
            irqs = shared.entries.len(),
            "pass-through probe complete"
        );

        Ok(PassthroughDevice {
            subscription,
            shared,
            routed,
            router,
            listener,
        })
    }
}

impl Emulator for PlatformPassthrough {
    fn name(&self) -> &str {
        "platform"
    }

    fn match_table(&self) -> &[NodeMatch] {
        const MATCHES: &[NodeMatch] = &[NodeMatch {
            node_type: "pt",
            compatible: "platform",
        }];
        MATCHES
    }

    fn probe(
        &self,
        guest: Arc<dyn Guest>,
        node: &DeviceNode,
    ) -> Result<Box<dyn EmulatedDevice>, EmuError> {
        let device = self.probe_device(guest, node).map_err(EmuError::probe)?;
        Ok(Box::new(device))
    }
}

/// Register the pass-through emulator with the framework's registry.
pub fn register(registry: &mut EmulatorRegistry, services: HostServices) -> Result<(), EmuError> {
    registry.register(Arc::new(PlatformPassthrough::new(services)))
}
