//! Yosys JSON netlist handling
//!
//! The netlist is owned by the synthesis tool, so it is kept as an untyped
//! `serde_json::Value`. Key order is preserved and integers keep their exact
//! digits, which matters when the document is embedded back into a page.
//! The [`schema`] views give typed read-only access for the digitaljs adapter.

pub mod loader;
pub mod schema;
pub mod scopeinfo;

use serde_json::{Map, Value};
use thiserror::Error;

pub use schema::{BitRef, CellView, ConstBit, ModuleView, PortDirection, PortView};
pub use scopeinfo::SCOPE_INFO_CELL_TYPE;

/// Errors raised while loading or inspecting a netlist
#[derive(Debug, Error)]
pub enum NetlistError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid netlist: {0}")]
    InvalidShape(String),
}

/// A parsed Yosys netlist.
///
/// Always holds a JSON object with a `modules` object inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Netlist {
    value: Value,
}

impl Netlist {
    /// Wrap an already parsed JSON document.
    pub fn from_value(value: Value) -> Result<Self, NetlistError> {
        match value.get("modules") {
            Some(Value::Object(_)) => Ok(Self { value }),
            Some(other) => Err(NetlistError::InvalidShape(format!(
                "`modules` must be an object, found {}",
                json_kind(other)
            ))),
            None => Err(NetlistError::InvalidShape(
                "missing top-level `modules` object".to_string(),
            )),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Number of modules in the design.
    pub fn module_count(&self) -> usize {
        self.modules_map().len()
    }

    /// Iterate over all modules in document order.
    pub fn modules(&self) -> impl Iterator<Item = ModuleView<'_>> {
        self.modules_map()
            .iter()
            .map(|(name, value)| ModuleView::new(name, value))
    }

    /// Look up a module by name.
    pub fn module(&self, name: &str) -> Option<ModuleView<'_>> {
        self.modules_map()
            .get_key_value(name)
            .map(|(name, value)| ModuleView::new(name, value))
    }

    /// Whether a cell type names another module of this design.
    pub fn is_module(&self, name: &str) -> bool {
        self.modules_map().contains_key(name)
    }

    fn modules_map(&self) -> &Map<String, Value> {
        match self.value.get("modules") {
            Some(Value::Object(modules)) => modules,
            // from_value guarantees the shape and nothing hands out &mut Value
            _ => unreachable!("netlist without modules object"),
        }
    }

    pub(crate) fn modules_map_mut(&mut self) -> &mut Map<String, Value> {
        match self.value.get_mut("modules") {
            Some(Value::Object(modules)) => modules,
            _ => unreachable!("netlist without modules object"),
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
