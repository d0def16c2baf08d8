//! digitaljs Circuit Model
//!
//! This module converts a Yosys netlist into the JSON circuit description
//! that `digitaljs.Circuit` consumes in the browser. Conversion goes through
//! the [`ModelAdapter`] trait in three fixed steps:
//!
//! 1. `convert` - netlist to devices and connectors
//! 2. `attach_io_ui` - buttons, lamps and number widgets on top-level ports
//! 3. `transform` - structural simplification of the device graph
//!
//! [`DigitalJsAdapter`] is the native implementation.

pub mod convert;
pub mod io_ui;
pub mod transform;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::netlist::{Netlist, NetlistError};

/// Errors that can occur during circuit adaptation
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Netlist(#[from] NetlistError),

    #[error("No top module: {0}")]
    NoTopModule(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Unsupported cell type {kind} (cell {cell} in module {module})")]
    UnsupportedCell {
        module: String,
        cell: String,
        kind: String,
    },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// digitaljs device types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeviceKind {
    Input,
    Output,
    Constant,
    Repeater,
    Not,
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Xnor,
    AndReduce,
    OrReduce,
    XorReduce,
    NorReduce,
    XnorReduce,
    Negation,
    UnaryPlus,
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Modulo,
    Power,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    ShiftLeft,
    ShiftRight,
    Mux,
    Mux1Hot,
    Demux,
    Memory,
    Dff,
    BusGroup,
    BusSlice,
    ZeroExtend,
    SignExtend,
    Subcircuit,
    Button,
    Lamp,
    NumEntry,
    NumDisplay,
    Clock,
}

impl DeviceKind {
    /// The negated gate a trailing `Not` folds into.
    pub fn negated(self) -> Option<DeviceKind> {
        match self {
            DeviceKind::And => Some(DeviceKind::Nand),
            DeviceKind::Or => Some(DeviceKind::Nor),
            DeviceKind::Xor => Some(DeviceKind::Xnor),
            _ => None,
        }
    }
}

/// Bit widths: one width for the whole device, or one per port group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Bits {
    Width(usize),
    Ports(IndexMap<String, usize>),
}

impl Bits {
    pub fn ports<const N: usize>(entries: [(&str, usize); N]) -> Self {
        Bits::Ports(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn width(&self) -> Option<usize> {
        match self {
            Bits::Width(w) => Some(*w),
            Bits::Ports(_) => None,
        }
    }
}

/// One digitaljs device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    #[serde(rename = "type")]
    pub kind: DeviceKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Port name for Input/Output devices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net: Option<String>,

    /// Port position for Input/Output devices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bits: Option<Bits>,

    /// Subcircuit name for `Subcircuit` devices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub celltype: Option<String>,

    /// Type-specific settings (`signed`, `polarity`, `slice`, `constant`, ...)
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Device {
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            label: None,
            net: None,
            order: None,
            bits: None,
            celltype: None,
            params: Map::new(),
        }
    }

    pub fn with_bits(mut self, bits: Bits) -> Self {
        self.bits = Some(bits);
        self
    }

    pub fn with_width(self, width: usize) -> Self {
        self.with_bits(Bits::Width(width))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }
}

/// A device port reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub id: String,
    pub port: String,
}

impl Endpoint {
    pub fn new(id: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            port: port.into(),
        }
    }
}

/// A wire from an output port to an input port
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connector {
    pub from: Endpoint,
    pub to: Endpoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A digitaljs circuit: devices, wires and the definitions of subcircuits
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Circuit {
    pub devices: IndexMap<String, Device>,
    pub connectors: Vec<Connector>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub subcircuits: IndexMap<String, Circuit>,
}

impl Circuit {
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Devices of one kind, in insertion order.
    pub fn devices_of(&self, kind: DeviceKind) -> impl Iterator<Item = (&str, &Device)> {
        self.devices
            .iter()
            .filter(move |(_, d)| d.kind == kind)
            .map(|(id, d)| (id.as_str(), d))
    }

    /// Connectors that end at a given device.
    pub fn inputs_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Connector> + 'a {
        self.connectors.iter().filter(move |c| c.to.id == id)
    }
}

/// Trait for turning a netlist into a digitaljs circuit model
pub trait ModelAdapter {
    /// Netlist to circuit model.
    fn convert(&self, netlist: &Netlist) -> Result<Circuit, AdapterError>;

    /// Attach the default IO widgets to the top-level ports.
    fn attach_io_ui(&self, circuit: Circuit) -> Circuit;

    /// Structural simplification pass.
    fn transform(&self, circuit: Circuit) -> Result<Circuit, AdapterError>;

    /// Run the three steps in order, each on the previous step's output.
    fn adapt(&self, netlist: &Netlist) -> Result<Circuit, AdapterError> {
        let circuit = self.convert(netlist)?;
        let circuit = self.attach_io_ui(circuit);
        self.transform(circuit)
    }
}

/// Native netlist -> digitaljs adapter
#[derive(Debug, Clone, Default)]
pub struct DigitalJsAdapter;

impl DigitalJsAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ModelAdapter for DigitalJsAdapter {
    fn convert(&self, netlist: &Netlist) -> Result<Circuit, AdapterError> {
        convert::netlist_to_circuit(netlist)
    }

    fn attach_io_ui(&self, mut circuit: Circuit) -> Circuit {
        io_ui::attach_io_ui(&mut circuit);
        circuit
    }

    fn transform(&self, mut circuit: Circuit) -> Result<Circuit, AdapterError> {
        let stats = transform::simplify(&mut circuit);
        tracing::debug!(
            "Transform bypassed {} repeaters and folded {} negations",
            stats.repeaters_bypassed,
            stats.negations_folded
        );
        Ok(circuit)
    }
}
