//! Device emulator registry.
//!
//! The host framework owns one [`EmulatorRegistry`], emulator crates
//! register into it at startup, and the framework dispatches device-tree
//! nodes through [`EmulatorRegistry::probe_device`]. The registry is an
//! explicit object handed to emulator factory functions; there is no
//! process-global registration.

use std::sync::Arc;

use thiserror::Error;

use crate::devtree::DeviceNode;
use crate::guest::Guest;

#[derive(Debug, Error)]
pub enum EmuError {
    #[error("an emulator named {0:?} is already registered")]
    DuplicateEmulator(String),

    #[error("no emulator matches node {node:?} (type {node_type:?})")]
    NoMatchingEmulator { node: String, node_type: String },

    #[error("device has no emulator state (already removed or never probed)")]
    NoDeviceState,

    #[error("probe failed")]
    Probe(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EmuError {
    pub fn probe(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        EmuError::Probe(Box::new(err))
    }
}

/// One row of an emulator's device-tree match table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMatch {
    pub node_type: &'static str,
    pub compatible: &'static str,
}

impl NodeMatch {
    pub fn matches(&self, node: &DeviceNode) -> bool {
        node.node_type() == self.node_type && node.is_compatible(self.compatible)
    }
}

/// A device emulator: matches nodes and produces per-device state.
pub trait Emulator: Send + Sync {
    fn name(&self) -> &str;

    fn match_table(&self) -> &[NodeMatch];

    fn probe(
        &self,
        guest: Arc<dyn Guest>,
        node: &DeviceNode,
    ) -> Result<Box<dyn EmulatedDevice>, EmuError>;
}

/// Per-device emulator state produced by a successful probe.
///
/// Removal is `Drop`: dropping the box must release every resource the
/// probe acquired.
pub trait EmulatedDevice: Send {
    fn reset(&mut self) -> Result<(), EmuError>;
}

/// Owns the emulator state for one probed device.
///
/// The handle keeps the state as an `Option` so `remove` can be called
/// through the framework's lifecycle path and report (rather than fault on)
/// a device that has no state.
pub struct EmulatedDeviceHandle {
    emulator: String,
    state: Option<Box<dyn EmulatedDevice>>,
}

impl EmulatedDeviceHandle {
    /// Name of the emulator that produced this device.
    pub fn emulator(&self) -> &str {
        &self.emulator
    }

    pub fn reset(&mut self) -> Result<(), EmuError> {
        match self.state.as_mut() {
            Some(state) => state.reset(),
            None => Err(EmuError::NoDeviceState),
        }
    }

    /// Tear the device down, releasing everything its probe acquired.
    pub fn remove(&mut self) -> Result<(), EmuError> {
        match self.state.take() {
            Some(state) => {
                drop(state);
                Ok(())
            }
            None => Err(EmuError::NoDeviceState),
        }
    }
}

/// Registry of device emulators, keyed by device-tree match tables.
#[derive(Default)]
pub struct EmulatorRegistry {
    emulators: Vec<Arc<dyn Emulator>>,
}

impl EmulatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, emulator: Arc<dyn Emulator>) -> Result<(), EmuError> {
        if self.emulators.iter().any(|e| e.name() == emulator.name()) {
            return Err(EmuError::DuplicateEmulator(emulator.name().to_owned()));
        }
        self.emulators.push(emulator);
        Ok(())
    }

    /// Returns whether an emulator with `name` was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.emulators.len();
        self.emulators.retain(|e| e.name() != name);
        self.emulators.len() != before
    }

    pub fn find_for_node(&self, node: &DeviceNode) -> Option<&Arc<dyn Emulator>> {
        self.emulators
            .iter()
            .find(|e| e.match_table().iter().any(|m| m.matches(node)))
    }

    /// Probe `node` for `guest` with the first matching emulator.
    pub fn probe_device(
        &self,
        guest: Arc<dyn Guest>,
        node: &DeviceNode,
    ) -> Result<EmulatedDeviceHandle, EmuError> {
        let emulator = self
            .find_for_node(node)
            .ok_or_else(|| EmuError::NoMatchingEmulator {
                node: node.name().to_owned(),
                node_type: node.node_type().to_owned(),
            })?;

        let state = emulator.probe(guest, node)?;
        Ok(EmulatedDeviceHandle {
            emulator: emulator.name().to_owned(),
            state: Some(state),
        })
    }
}
