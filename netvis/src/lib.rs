//! netvis - Yosys netlist to standalone HTML diagram renderer
//!
//! This library turns a JSON netlist produced by Yosys (`write_json`) into a
//! single HTML page that displays the circuit, either as an interactive
//! digitaljs simulation or as a static netlistsvg schematic. The page carries
//! an export button that downloads the rendered SVG and prints the
//! `rsvg-convert` command that rasterizes it to PNG.
//!
//! # Quick Start
//!
//! ```no_run
//! use netvis::prelude::*;
//!
//! let json = std::fs::read_to_string("adder.json").unwrap();
//! let netlist: Netlist = json.parse().unwrap();
//! let options = RenderOptions::new("adder", "/tmp/out", Engine::NetlistSvg);
//!
//! let html = NetvisCore::render_page(netlist, &options).unwrap();
//! println!("{}", html);
//! ```
//!
//! # Pipeline
//!
//! - **Load**: parse the JSON document and check its `modules` mapping
//! - **Filter**: drop `$scopeinfo` pseudo-cells
//! - **Adapt** (digitaljs only): netlist -> circuit model -> IO widgets -> simplified
//! - **Render**: embed the data in the page template and write it out

pub mod core;
pub mod digitaljs;
pub mod embed;
pub mod engine;
pub mod netlist;
pub mod page;

// Re-export main types
pub use crate::core::{NetvisCore, NetvisError, RenderOptions};
pub use digitaljs::{AdapterError, Circuit, DigitalJsAdapter, ModelAdapter};
pub use engine::Engine;
pub use netlist::{Netlist, NetlistError};
pub use page::{NetlistSvgOptions, PageLayout, PageRenderer};

/// Parse a netlist and strip its scope-info cells (convenience wrapper).
pub fn load_netlist(json: &str) -> Result<Netlist, NetvisError> {
    let mut netlist: Netlist = json.parse()?;
    netlist.strip_scope_info();
    Ok(netlist)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Circuit, DigitalJsAdapter, Engine, ModelAdapter, Netlist, NetvisCore, NetvisError,
        PageLayout, RenderOptions,
    };
}
