//! Scope-info cell removal
//!
//! Yosys emits `$scopeinfo` cells to remember the source hierarchy of a
//! flattened design. They carry no connectivity and neither digitaljs nor
//! netlistsvg know the cell type, so they are dropped before rendering.

use serde_json::Value;

use super::Netlist;

/// Cell type of the hierarchy annotation pseudo-cells.
pub const SCOPE_INFO_CELL_TYPE: &str = "$scopeinfo";

impl Netlist {
    /// Remove every `$scopeinfo` cell from every module.
    ///
    /// Only the module -> cell level is inspected. All other cells keep their
    /// contents and relative order. Returns the number of removed cells.
    pub fn strip_scope_info(&mut self) -> usize {
        let mut removed = 0;

        for (module_name, module) in self.modules_map_mut().iter_mut() {
            let Some(Value::Object(cells)) = module.get_mut("cells") else {
                continue;
            };

            let before = cells.len();
            cells.retain(|_, cell| !is_scope_info(cell));
            let dropped = before - cells.len();

            if dropped > 0 {
                tracing::debug!("Removed {} scope-info cells from module {}", dropped, module_name);
            }
            removed += dropped;
        }

        removed
    }
}

fn is_scope_info(cell: &Value) -> bool {
    cell.get("type").and_then(Value::as_str) == Some(SCOPE_INFO_CELL_TYPE)
}
