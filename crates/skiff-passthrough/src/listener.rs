//! Deferred wiring driven by guest address-space initialization.
//!
//! IRQ translations and IOMMU mappings both need the guest's region table,
//! which does not exist yet when the emulator is probed. The listener waits
//! for the framework's "address space initialized" event for its own guest
//! and then performs both actions once. A repeat event (not expected under
//! a correct guest lifecycle) re-runs them; both are idempotent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use skiff_platform::{
    AspaceEvent, AspaceEventKind, AspaceEventSource, AspaceListener, EventDisposition,
};
use tracing::{debug, warn};

use crate::emulator::AssignmentShared;
use crate::error::PassthroughError;

/// One-shot listener tied to a single assignment.
///
/// Holds a weak back-reference: the assignment owns the listener's
/// subscription, never the other way around, so teardown cannot deadlock on
/// a reference cycle and a late event after removal is simply ignored.
pub(crate) struct AspaceInitListener {
    shared: Weak<AssignmentShared>,
    fired: AtomicBool,
}

impl AspaceInitListener {
    pub fn new(shared: Weak<AssignmentShared>) -> Self {
        Self {
            shared,
            fired: AtomicBool::new(false),
        }
    }

    /// Whether the deferred wiring has run at least once.
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl AspaceListener for AspaceInitListener {
    fn on_aspace_event(&self, event: &AspaceEvent) -> EventDisposition {
        if event.kind != AspaceEventKind::Initialized {
            return EventDisposition::Ignored;
        }
        let Some(shared) = self.shared.upgrade() else {
            // The assignment is already gone; a stale delivery.
            return EventDisposition::Ignored;
        };
        if !Arc::ptr_eq(&event.guest, &shared.guest) {
            return EventDisposition::Ignored;
        }

        for entry in shared.entries.iter() {
            if let Err(err) = shared
                .guest
                .register_host2guest_irq(entry.guest_irq, entry.host_irq)
            {
                warn!(
                    assignment = shared.name.as_str(),
                    host_irq = entry.host_irq,
                    guest_irq = entry.guest_irq,
                    "host2guest translation registration failed: {err}"
                );
            }
        }

        if let Some(binding) = &shared.binding {
            binding.map_guest_regions(shared.guest.as_ref());
        }

        debug!(
            assignment = shared.name.as_str(),
            irqs = shared.entries.len(),
            "address space initialized, pass-through wiring complete"
        );
        self.fired.store(true, Ordering::Release);
        EventDisposition::Handled
    }
}

/// An installed subscription; dropping it unsubscribes the listener.
pub(crate) struct AspaceSubscription {
    source: Arc<dyn AspaceEventSource>,
    listener: Arc<dyn AspaceListener>,
}

impl AspaceSubscription {
    pub fn subscribe(
        source: &Arc<dyn AspaceEventSource>,
        listener: Arc<dyn AspaceListener>,
    ) -> Result<Self, PassthroughError> {
        source
            .subscribe(listener.clone())
            .map_err(|_| PassthroughError::Subscribe)?;
        Ok(Self {
            source: source.clone(),
            listener,
        })
    }
}

impl Drop for AspaceSubscription {
    fn drop(&mut self) {
        self.source.unsubscribe(&self.listener);
    }
}
