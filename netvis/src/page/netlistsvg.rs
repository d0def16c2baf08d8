//! netlistsvg render options
//!
//! Passed verbatim as the last argument of `netlistsvg.render`. The defaults
//! draw every submodule collapsed and render the whole design, not a single
//! chosen top module.

use serde::Serialize;

/// How deep netlistsvg expands module instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyMode {
    Off,
    Level,
    All,
    Modules,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpandModules {
    pub types: Vec<String>,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyOptions {
    pub enable: HierarchyMode,
    pub expand_level: u32,
    pub expand_modules: ExpandModules,
}

impl Default for HierarchyOptions {
    fn default() -> Self {
        Self {
            enable: HierarchyMode::All,
            expand_level: 0,
            expand_modules: ExpandModules::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopOptions {
    pub enable: bool,
    pub module: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetlistSvgOptions {
    pub hierarchy: HierarchyOptions,
    pub top: TopOptions,
}
