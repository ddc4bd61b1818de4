//! Host interrupt controller contract.
//!
//! Device models that forward physical interrupts claim host IRQ lines from
//! the controller: they set the trigger mode, mark the line *routed* (which
//! excludes it from generic host dispatch), and install a handler that runs
//! in host interrupt context.

use std::sync::Arc;

use bitflags::bitflags;
use thiserror::Error;

/// A host (physical) interrupt line number.
pub type HostIrq = u32;

bitflags! {
    /// Trigger/polarity configuration for a host interrupt line.
    ///
    /// The encoding matches the raw cells found in device-tree interrupt
    /// specifiers, so configuration values decode with
    /// [`IrqTrigger::from_bits`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqTrigger: u32 {
        const EDGE_RISING = 1 << 0;
        const EDGE_FALLING = 1 << 1;
        const LEVEL_HIGH = 1 << 2;
        const LEVEL_LOW = 1 << 3;
    }
}

impl IrqTrigger {
    pub const EDGE_BOTH: IrqTrigger = IrqTrigger::EDGE_RISING.union(IrqTrigger::EDGE_FALLING);
}

/// Return value of a host IRQ handler, reported back to the dispatcher.
///
/// A handler that owns the line must report [`IrqHandled::Handled`] even
/// when it chooses to do nothing; reporting [`IrqHandled::None`] makes the
/// dispatcher treat the interrupt as spurious/unhandled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqHandled {
    Handled,
    None,
}

/// A handler invoked in host interrupt context when a registered line fires.
///
/// Handlers must not block or allocate; they run with the host dispatcher's
/// constraints.
pub trait HostIrqHandler: Send + Sync {
    fn handle(&self, irq: HostIrq) -> IrqHandled;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostIrqError {
    #[error("host irq {0} does not exist")]
    InvalidIrq(HostIrq),

    #[error("host irq {0} does not support the requested trigger mode")]
    UnsupportedTrigger(HostIrq),

    #[error("host irq {0} is already routed")]
    AlreadyRouted(HostIrq),

    #[error("host irq {0} already has a registered handler")]
    HandlerConflict(HostIrq),
}

/// The host interrupt controller.
pub trait HostInterruptController: Send + Sync {
    fn set_trigger(&self, irq: HostIrq, trigger: IrqTrigger) -> Result<(), HostIrqError>;

    /// Claim `irq` for direct routing, excluding it from generic dispatch.
    fn mark_routed(&self, irq: HostIrq) -> Result<(), HostIrqError>;

    /// Release a routed claim. Infallible: teardown paths must always be
    /// able to return the line to generic dispatch.
    fn unmark_routed(&self, irq: HostIrq);

    /// Install `handler` on `irq`. `name` identifies the owner in
    /// diagnostics.
    fn register_handler(
        &self,
        irq: HostIrq,
        name: &str,
        handler: Arc<dyn HostIrqHandler>,
    ) -> Result<(), HostIrqError>;

    /// Remove a previously installed handler. Identified by pointer equality
    /// on `handler`; unknown registrations are ignored.
    fn unregister_handler(&self, irq: HostIrq, handler: &Arc<dyn HostIrqHandler>);
}
