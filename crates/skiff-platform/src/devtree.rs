//! In-memory device-tree nodes.
//!
//! Device models are configured from a device-tree-shaped description: a
//! named, typed node carrying `compatible` strings and typed properties.
//! This is the read side only; the host framework builds nodes from whatever
//! firmware/configuration source it has.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DevtreeError {
    #[error("node has no property {0:?}")]
    MissingProperty(String),

    #[error("property {key:?} index {index} out of range (len {len})")]
    IndexOutOfRange {
        key: String,
        index: usize,
        len: usize,
    },

    #[error("property {0:?} is not a u32 list")]
    NotAU32List(String),
}

/// A property value attached to a [`DeviceNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    /// A list of 32-bit cells (`<0x10 0x4 ...>` in DTS notation).
    U32List(Vec<u32>),
    /// A string property.
    Str(String),
}

/// A single device-tree node: name, type, `compatible` list, and properties.
///
/// Nodes are immutable once built; the builder methods consume and return
/// `self` so test fixtures and host frameworks can construct them inline.
#[derive(Debug, Clone)]
pub struct DeviceNode {
    name: String,
    node_type: String,
    compatible: Vec<String>,
    props: BTreeMap<String, PropValue>,
}

impl DeviceNode {
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: node_type.into(),
            compatible: Vec::new(),
            props: BTreeMap::new(),
        }
    }

    pub fn with_compatible(mut self, compatible: impl Into<String>) -> Self {
        self.compatible.push(compatible.into());
        self
    }

    pub fn with_u32s(mut self, key: impl Into<String>, cells: impl Into<Vec<u32>>) -> Self {
        self.props
            .insert(key.into(), PropValue::U32List(cells.into()));
        self
    }

    pub fn with_str(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), PropValue::Str(value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn is_compatible(&self, value: &str) -> bool {
        self.compatible.iter().any(|c| c == value)
    }

    /// Number of 32-bit cells in `key`, or 0 if the property is absent or
    /// not a u32 list.
    pub fn u32_cells(&self, key: &str) -> usize {
        match self.props.get(key) {
            Some(PropValue::U32List(cells)) => cells.len(),
            _ => 0,
        }
    }

    /// Read the cell at `index` from the u32-list property `key`.
    pub fn u32_at(&self, key: &str, index: usize) -> Result<u32, DevtreeError> {
        match self.props.get(key) {
            None => Err(DevtreeError::MissingProperty(key.to_owned())),
            Some(PropValue::U32List(cells)) => {
                cells
                    .get(index)
                    .copied()
                    .ok_or_else(|| DevtreeError::IndexOutOfRange {
                        key: key.to_owned(),
                        index,
                        len: cells.len(),
                    })
            }
            Some(_) => Err(DevtreeError::NotAU32List(key.to_owned())),
        }
    }

    /// Read the string property `key`. Absent or non-string properties read
    /// as `None`; optional configuration keys are probed this way.
    pub fn string(&self, key: &str) -> Option<&str> {
        match self.props.get(key) {
            Some(PropValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}
