//! Mock collaborators for the pass-through test suites.
//!
//! Every mock records the calls the contract receives so tests can assert
//! acquisition/release symmetry, and supports targeted failure injection
//! for the rollback paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::emulator::HostServices;

use skiff_platform::{
    AspaceEvent, AspaceEventSource, AspaceListener, DeviceRegistry, EventDisposition, Guest,
    GuestIrqError, HostInterruptController, HostIrq, HostIrqError, HostIrqHandler, IommuDomain,
    IommuDomainMode, IommuDriver, IommuError, IommuFault, IommuFaultSink, IommuGroupId,
    IommuPerms, IrqHandled, IrqTrigger, MemRegion, PlatformDevice, RegionFlags, SubscribeError,
};

// ---------------------------------------------------------------------------
// Guest

pub struct MockGuest {
    name: String,
    regions: Vec<MemRegion>,
    irq_events: Mutex<Vec<(u32, bool)>>,
    translations: Mutex<Vec<(u32, u32)>>,
    reject_irq: AtomicBool,
    halts: AtomicUsize,
}

impl MockGuest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            regions: Vec::new(),
            irq_events: Mutex::new(Vec::new()),
            translations: Mutex::new(Vec::new()),
            reject_irq: AtomicBool::new(false),
            halts: AtomicUsize::new(0),
        }
    }

    pub fn with_regions(mut self, regions: Vec<MemRegion>) -> Self {
        self.regions = regions;
        self
    }

    /// Make `emulate_irq_level` reject every call (the calls are still
    /// recorded).
    pub fn reject_irq_levels(&self, reject: bool) {
        self.reject_irq.store(reject, Ordering::Relaxed);
    }

    /// `(guest_irq, level)` in call order.
    pub fn irq_events(&self) -> Vec<(u32, bool)> {
        self.irq_events.lock().unwrap().clone()
    }

    /// `(guest_irq, host_irq)` in registration order.
    pub fn translations(&self) -> Vec<(u32, u32)> {
        self.translations.lock().unwrap().clone()
    }

    pub fn clear_translations(&self) {
        self.translations.lock().unwrap().clear();
    }

    pub fn halt_count(&self) -> usize {
        self.halts.load(Ordering::Relaxed)
    }
}

impl Guest for MockGuest {
    fn name(&self) -> &str {
        &self.name
    }

    fn emulate_irq_level(&self, guest_irq: u32, level: bool) -> Result<(), GuestIrqError> {
        self.irq_events.lock().unwrap().push((guest_irq, level));
        if self.reject_irq.load(Ordering::Relaxed) {
            return Err(GuestIrqError::Rejected);
        }
        Ok(())
    }

    fn register_host2guest_irq(&self, guest_irq: u32, host_irq: u32) -> Result<(), GuestIrqError> {
        self.translations.lock().unwrap().push((guest_irq, host_irq));
        Ok(())
    }

    fn for_each_region(&self, filter: RegionFlags, f: &mut dyn FnMut(&MemRegion)) {
        for region in self.regions.iter().filter(|r| r.flags.contains(filter)) {
            f(region);
        }
    }

    fn halt(&self) {
        self.halts.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Host interrupt controller

#[derive(Default)]
pub struct MockIntc {
    triggers: Mutex<Vec<(HostIrq, IrqTrigger)>>,
    marked: Mutex<Vec<HostIrq>>,
    unmarked: Mutex<Vec<HostIrq>>,
    register_log: Mutex<Vec<HostIrq>>,
    unregister_log: Mutex<Vec<HostIrq>>,
    registered: Mutex<Vec<(HostIrq, Arc<dyn HostIrqHandler>)>>,
    fail_set_trigger_for: Mutex<Option<HostIrq>>,
    fail_mark_for: Mutex<Option<HostIrq>>,
    fail_register_for: Mutex<Option<HostIrq>>,
}

impl MockIntc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_set_trigger_on(&self, irq: HostIrq) {
        *self.fail_set_trigger_for.lock().unwrap() = Some(irq);
    }

    pub fn fail_mark_on(&self, irq: HostIrq) {
        *self.fail_mark_for.lock().unwrap() = Some(irq);
    }

    pub fn fail_register_on(&self, irq: HostIrq) {
        *self.fail_register_for.lock().unwrap() = Some(irq);
    }

    /// Dispatch a firing host IRQ to its registered handler, as the host
    /// interrupt loop would.
    pub fn fire(&self, irq: HostIrq) -> Option<IrqHandled> {
        let handler = self
            .registered
            .lock()
            .unwrap()
            .iter()
            .find(|(registered_irq, _)| *registered_irq == irq)
            .map(|(_, handler)| handler.clone())?;
        Some(handler.handle(irq))
    }

    pub fn triggers(&self) -> Vec<(HostIrq, IrqTrigger)> {
        self.triggers.lock().unwrap().clone()
    }

    pub fn marked(&self) -> Vec<HostIrq> {
        self.marked.lock().unwrap().clone()
    }

    pub fn unmarked(&self) -> Vec<HostIrq> {
        self.unmarked.lock().unwrap().clone()
    }

    pub fn register_log(&self) -> Vec<HostIrq> {
        self.register_log.lock().unwrap().clone()
    }

    pub fn unregister_log(&self) -> Vec<HostIrq> {
        self.unregister_log.lock().unwrap().clone()
    }

    /// Handlers currently installed.
    pub fn active_registrations(&self) -> usize {
        self.registered.lock().unwrap().len()
    }
}

impl HostInterruptController for MockIntc {
    fn set_trigger(&self, irq: HostIrq, trigger: IrqTrigger) -> Result<(), HostIrqError> {
        if *self.fail_set_trigger_for.lock().unwrap() == Some(irq) {
            return Err(HostIrqError::UnsupportedTrigger(irq));
        }
        self.triggers.lock().unwrap().push((irq, trigger));
        Ok(())
    }

    fn mark_routed(&self, irq: HostIrq) -> Result<(), HostIrqError> {
        if *self.fail_mark_for.lock().unwrap() == Some(irq) {
            return Err(HostIrqError::AlreadyRouted(irq));
        }
        self.marked.lock().unwrap().push(irq);
        Ok(())
    }

    fn unmark_routed(&self, irq: HostIrq) {
        self.unmarked.lock().unwrap().push(irq);
    }

    fn register_handler(
        &self,
        irq: HostIrq,
        _name: &str,
        handler: Arc<dyn HostIrqHandler>,
    ) -> Result<(), HostIrqError> {
        if *self.fail_register_for.lock().unwrap() == Some(irq) {
            return Err(HostIrqError::HandlerConflict(irq));
        }
        self.register_log.lock().unwrap().push(irq);
        self.registered.lock().unwrap().push((irq, handler));
        Ok(())
    }

    fn unregister_handler(&self, irq: HostIrq, handler: &Arc<dyn HostIrqHandler>) {
        self.unregister_log.lock().unwrap().push(irq);
        self.registered
            .lock()
            .unwrap()
            .retain(|(registered_irq, registered)| {
                *registered_irq != irq || !Arc::ptr_eq(registered, handler)
            });
    }
}

// ---------------------------------------------------------------------------
// Device registry

pub struct MockDevice {
    name: String,
    group: Option<IommuGroupId>,
}

impl MockDevice {
    pub fn new(name: impl Into<String>, group: Option<IommuGroupId>) -> Self {
        Self {
            name: name.into(),
            group,
        }
    }
}

impl PlatformDevice for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn iommu_group(&self) -> Option<IommuGroupId> {
        self.group
    }
}

#[derive(Default)]
pub struct MockRegistry {
    devices: Vec<Arc<MockDevice>>,
}

impl MockRegistry {
    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        Self {
            devices: devices.into_iter().map(Arc::new).collect(),
        }
    }

    /// Direct handle for `Arc::strong_count` symmetry checks.
    pub fn arc(&self, name: &str) -> Option<Arc<MockDevice>> {
        self.devices.iter().find(|d| d.name == name).cloned()
    }
}

impl DeviceRegistry for MockRegistry {
    fn find_by_name(&self, name: &str) -> Option<Arc<dyn PlatformDevice>> {
        self.devices
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.clone() as Arc<dyn PlatformDevice>)
    }
}

// ---------------------------------------------------------------------------
// IOMMU driver

pub struct MockDomainState {
    maps: Mutex<Vec<(u64, u64, u64, IommuPerms)>>,
    sink: Mutex<Option<Arc<dyn IommuFaultSink>>>,
    freed: AtomicBool,
}

impl MockDomainState {
    pub fn maps(&self) -> Vec<(u64, u64, u64, IommuPerms)> {
        self.maps.lock().unwrap().clone()
    }

    pub fn freed(&self) -> bool {
        self.freed.load(Ordering::Relaxed)
    }

    /// Deliver a hardware fault to the installed sink.
    pub fn fault(&self, fault: IommuFault) {
        let sink = self.sink.lock().unwrap().clone();
        sink.expect("no fault sink installed").on_fault(&fault);
    }
}

struct MockDomain {
    state: Arc<MockDomainState>,
}

impl IommuDomain for MockDomain {
    fn map(&self, iova: u64, paddr: u64, size: u64, perms: IommuPerms) -> Result<(), IommuError> {
        self.state
            .maps
            .lock()
            .unwrap()
            .push((iova, paddr, size, perms));
        Ok(())
    }

    fn set_fault_sink(&self, sink: Arc<dyn IommuFaultSink>) {
        *self.state.sink.lock().unwrap() = Some(sink);
    }
}

impl Drop for MockDomain {
    fn drop(&mut self) {
        self.state.freed.store(true, Ordering::Relaxed);
    }
}

#[derive(Default)]
pub struct MockIommu {
    allocated: AtomicUsize,
    fail_alloc: AtomicBool,
    last_domain: Mutex<Option<Arc<MockDomainState>>>,
}

impl MockIommu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_alloc(&self, fail: bool) {
        self.fail_alloc.store(fail, Ordering::Relaxed);
    }

    pub fn domains_allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    pub fn last_domain(&self) -> Option<Arc<MockDomainState>> {
        self.last_domain.lock().unwrap().clone()
    }
}

impl IommuDriver for MockIommu {
    fn allocate_domain(
        &self,
        group: IommuGroupId,
        _mode: IommuDomainMode,
    ) -> Result<Box<dyn IommuDomain>, IommuError> {
        if self.fail_alloc.load(Ordering::Relaxed) {
            return Err(IommuError::DomainAlloc(group));
        }
        let state = Arc::new(MockDomainState {
            maps: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
            freed: AtomicBool::new(false),
        });
        self.allocated.fetch_add(1, Ordering::Relaxed);
        *self.last_domain.lock().unwrap() = Some(state.clone());
        Ok(Box::new(MockDomain { state }))
    }
}

// ---------------------------------------------------------------------------
// Address-space event source

#[derive(Default)]
pub struct MockAspace {
    listeners: Mutex<Vec<Arc<dyn AspaceListener>>>,
    fail_subscribe: AtomicBool,
}

impl MockAspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::Relaxed);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Deliver `event` to every subscribed listener, in subscription order.
    pub fn fire(&self, event: &AspaceEvent) -> Vec<EventDisposition> {
        let listeners = self.listeners.lock().unwrap().clone();
        listeners
            .iter()
            .map(|listener| listener.on_aspace_event(event))
            .collect()
    }
}

impl AspaceEventSource for MockAspace {
    fn subscribe(&self, listener: Arc<dyn AspaceListener>) -> Result<(), SubscribeError> {
        if self.fail_subscribe.load(Ordering::Relaxed) {
            return Err(SubscribeError);
        }
        self.listeners.lock().unwrap().push(listener);
        Ok(())
    }

    fn unsubscribe(&self, listener: &Arc<dyn AspaceListener>) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|subscribed| !Arc::ptr_eq(subscribed, listener));
    }
}

// ---------------------------------------------------------------------------
// Full platform bundle

/// All four collaborator mocks plus a [`HostServices`] view of them.
pub struct MockPlatform {
    pub intc: Arc<MockIntc>,
    pub devices: Arc<MockRegistry>,
    pub iommu: Arc<MockIommu>,
    pub aspace: Arc<MockAspace>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::with_registry(MockRegistry::default())
    }

    pub fn with_registry(devices: MockRegistry) -> Self {
        Self {
            intc: Arc::new(MockIntc::new()),
            devices: Arc::new(devices),
            iommu: Arc::new(MockIommu::new()),
            aspace: Arc::new(MockAspace::new()),
        }
    }

    pub fn services(&self) -> HostServices {
        HostServices {
            intc: self.intc.clone(),
            devices: self.devices.clone(),
            iommu: self.iommu.clone(),
            aspace: self.aspace.clone(),
        }
    }
}
