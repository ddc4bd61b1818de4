//! Guest address-space lifecycle events.
//!
//! The framework constructs a guest's address space some time after device
//! models are probed. Models that must defer work until the region table
//! exists subscribe here and react to [`AspaceEventKind::Initialized`].

use std::sync::Arc;

use thiserror::Error;

use crate::guest::Guest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspaceEventKind {
    /// The guest's address space has been fully constructed.
    Initialized,
    /// The guest's address space is being torn down.
    Deinitialized,
}

/// An address-space lifecycle event, tagged with the guest it concerns.
#[derive(Clone)]
pub struct AspaceEvent {
    pub guest: Arc<dyn Guest>,
    pub kind: AspaceEventKind,
}

/// A listener's verdict on a delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// The event was of interest and acted upon.
    Handled,
    /// The event was not of interest to this listener.
    Ignored,
}

/// Receives address-space events for every guest; listeners filter.
pub trait AspaceListener: Send + Sync {
    fn on_aspace_event(&self, event: &AspaceEvent) -> EventDisposition;
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("address-space event source rejected the subscription")]
pub struct SubscribeError;

/// The event source. Listener identity is `Arc` pointer identity.
pub trait AspaceEventSource: Send + Sync {
    fn subscribe(&self, listener: Arc<dyn AspaceListener>) -> Result<(), SubscribeError>;

    /// Unknown listeners are ignored; unsubscription must always succeed so
    /// teardown paths cannot fail.
    fn unsubscribe(&self, listener: &Arc<dyn AspaceListener>);
}
