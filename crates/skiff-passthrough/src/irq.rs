//! Host→guest IRQ routing.
//!
//! The router runs in host interrupt context: it does nothing beyond a
//! table lookup and two virtual-line emulation calls, and never blocks or
//! allocates. The mapping table is built once at probe time and read-only
//! for the assignment's lifetime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use skiff_platform::{
    Guest, HostInterruptController, HostIrq, HostIrqHandler, IrqHandled, IrqTrigger,
};
use tracing::warn;

use crate::error::PassthroughError;

/// One host→guest interrupt mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqMappingEntry {
    pub host_irq: HostIrq,
    pub trigger: IrqTrigger,
    pub guest_irq: u32,
}

/// Forwards firing host IRQs onto the guest's virtual interrupt lines.
pub struct IrqRouter {
    guest: Arc<dyn Guest>,
    entries: Arc<[IrqMappingEntry]>,
    misses: AtomicU64,
}

impl IrqRouter {
    pub(crate) fn new(guest: Arc<dyn Guest>, entries: Arc<[IrqMappingEntry]>) -> Self {
        Self {
            guest,
            entries,
            misses: AtomicU64::new(0),
        }
    }

    /// Number of firings for which no table entry existed.
    ///
    /// Misses are swallowed (the line is ours, so the dispatcher is always
    /// told "handled"), which would otherwise leave a misconfigured table
    /// invisible.
    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl HostIrqHandler for IrqRouter {
    fn handle(&self, irq: HostIrq) -> IrqHandled {
        let Some(entry) = self.entries.iter().find(|e| e.host_irq == irq) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return IrqHandled::Handled;
        };

        // Deassert then assert: the falling edge clears any still-high level
        // from an unacknowledged earlier delivery, so the rise below is
        // always a detectable edge. A rejected half must not suppress the
        // other half or the handled result.
        if let Err(err) = self.guest.emulate_irq_level(entry.guest_irq, false) {
            warn!(
                guest = self.guest.name(),
                guest_irq = entry.guest_irq,
                "emulate level 0 failed: {err}"
            );
        }
        if let Err(err) = self.guest.emulate_irq_level(entry.guest_irq, true) {
            warn!(
                guest = self.guest.name(),
                guest_irq = entry.guest_irq,
                "emulate level 1 failed: {err}"
            );
        }

        IrqHandled::Handled
    }
}

/// A claimed host IRQ line: trigger configured, routed mark set, handler
/// registered. Dropping the guard unregisters the handler and returns the
/// line to generic dispatch.
pub(crate) struct RoutedIrq {
    intc: Arc<dyn HostInterruptController>,
    irq: HostIrq,
    handler: Arc<dyn HostIrqHandler>,
}

impl RoutedIrq {
    /// Claim `entry.host_irq` in the order the host controller requires:
    /// trigger type, routed mark, then handler registration. A registration
    /// failure releases the routed mark before reporting, so the caller
    /// never unwinds a half-claimed line.
    pub fn claim(
        intc: &Arc<dyn HostInterruptController>,
        entry: &IrqMappingEntry,
        owner: &str,
        handler: Arc<dyn HostIrqHandler>,
    ) -> Result<Self, PassthroughError> {
        let irq = entry.host_irq;
        let setup = |source| PassthroughError::IrqSetup { irq, source };

        intc.set_trigger(irq, entry.trigger).map_err(setup)?;
        intc.mark_routed(irq).map_err(setup)?;
        if let Err(source) = intc.register_handler(irq, owner, handler.clone()) {
            intc.unmark_routed(irq);
            return Err(setup(source));
        }

        Ok(Self {
            intc: intc.clone(),
            irq,
            handler,
        })
    }
}

impl Drop for RoutedIrq {
    fn drop(&mut self) {
        // Handler first: the line must stop firing into the router before
        // the routed claim (and later the table) goes away.
        self.intc.unregister_handler(self.irq, &self.handler);
        self.intc.unmark_routed(self.irq);
    }
}
