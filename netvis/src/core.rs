//! Rendering pipeline shared by both command-line entry points.
//! read -> filter -> (adapt) -> render -> single write

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::digitaljs::{AdapterError, DigitalJsAdapter, ModelAdapter};
use crate::embed::{to_script_json, to_script_literal};
use crate::engine::Engine;
use crate::netlist::{Netlist, NetlistError};
use crate::page::{NetlistSvgOptions, PageLayout, PageRenderer, PageRequest, DEFAULT_ASSET_ROOT};

#[derive(Debug, thiserror::Error)]
pub enum NetvisError {
    #[error("unknown engine {name:?}, expected {expected}")]
    UnsupportedEngine { name: String, expected: String },
    #[error(transparent)]
    Netlist(#[from] NetlistError),
    #[error("Circuit conversion failed: {0}")]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options for one page render.
#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// File name stem used for the exported `.svg` and `.png`
    pub filename: String,
    pub downloads_dir: String,
    pub engine: Engine,
    pub layout: PageLayout,
    /// Where the page loads the engine's script bundles from
    pub asset_root: String,
    pub netlistsvg: NetlistSvgOptions,
}

impl RenderOptions {
    pub fn new(filename: impl Into<String>, downloads_dir: impl Into<String>, engine: Engine) -> Self {
        Self {
            filename: filename.into(),
            downloads_dir: downloads_dir.into(),
            engine,
            layout: PageLayout::Split,
            asset_root: DEFAULT_ASSET_ROOT.to_string(),
            netlistsvg: NetlistSvgOptions::default(),
        }
    }

    /// Fixed digitaljs page with the single load handler.
    pub fn digitaljs(filename: impl Into<String>, downloads_dir: impl Into<String>) -> Self {
        Self {
            layout: PageLayout::Combined,
            ..Self::new(filename, downloads_dir, Engine::DigitalJs)
        }
    }

    pub fn with_asset_root(mut self, asset_root: impl Into<String>) -> Self {
        self.asset_root = asset_root.into();
        self
    }

    fn renderer(&self) -> PageRenderer {
        PageRenderer {
            asset_root: self.asset_root.clone(),
            layout: self.layout,
            netlistsvg: self.netlistsvg.clone(),
        }
    }
}

/// Page rendering API used by the CLI entry points.
pub struct NetvisCore;

impl NetvisCore {
    /// Render a netlist into a complete HTML document.
    pub fn render_page(netlist: Netlist, options: &RenderOptions) -> Result<String, NetvisError> {
        Self::render_page_with(netlist, options, &DigitalJsAdapter::new())
    }

    /// Same as [`NetvisCore::render_page`] with a caller-supplied model adapter.
    /// The adapter is only consulted for the digitaljs engine.
    pub fn render_page_with(
        mut netlist: Netlist,
        options: &RenderOptions,
        adapter: &dyn ModelAdapter,
    ) -> Result<String, NetvisError> {
        let removed = netlist.strip_scope_info();
        tracing::debug!("Removed {} scope-info cells", removed);

        let data = if options.engine.needs_model_adapter() {
            let circuit = adapter.adapt(&netlist)?;
            tracing::info!(
                "Converted netlist into {} devices and {} connectors",
                circuit.device_count(),
                circuit.connectors.len()
            );
            to_script_literal(&circuit)?
        } else {
            to_script_json(netlist.as_value())
        };

        let request = PageRequest {
            filename: &options.filename,
            downloads_dir: &options.downloads_dir,
            engine: options.engine,
            data: &data,
        };
        Ok(options.renderer().render(&request)?)
    }

    /// Read a netlist to its end, render it, and write the page in one go.
    ///
    /// Nothing is written unless the whole document rendered.
    pub async fn render_to_writer<R, W>(
        reader: R,
        writer: &mut W,
        options: &RenderOptions,
    ) -> Result<(), NetvisError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let netlist = Netlist::read_from(reader).await?;
        let html = Self::render_page(netlist, options)?;

        writer.write_all(html.as_bytes()).await?;
        writer.flush().await?;
        tracing::debug!("Wrote {} bytes of HTML", html.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digitaljs::Circuit;
    use serde_json::json;

    fn adder() -> Netlist {
        Netlist::from_value(json!({
            "creator": "Yosys 0.40",
            "modules": {
                "adder": {
                    "attributes": { "top": "00000000000000000000000000000001" },
                    "ports": {
                        "a": { "direction": "input", "bits": [ 2, 3 ] },
                        "b": { "direction": "input", "bits": [ 4, 5 ] },
                        "y": { "direction": "output", "bits": [ 6, 7 ] }
                    },
                    "cells": {
                        "$scopeinfo$adder.v:1$1": { "type": "$scopeinfo", "parameters": {} },
                        "$add$adder.v:5$2": {
                            "type": "$add",
                            "parameters": { "A_SIGNED": 0, "A_WIDTH": 2, "B_SIGNED": 0, "B_WIDTH": 2, "Y_WIDTH": 2 },
                            "port_directions": { "A": "input", "B": "input", "Y": "output" },
                            "connections": { "A": [ 2, 3 ], "B": [ 4, 5 ], "Y": [ 6, 7 ] }
                        }
                    },
                    "netnames": {}
                }
            }
        }))
        .unwrap()
    }

    struct Untouchable;

    impl ModelAdapter for Untouchable {
        fn convert(&self, _netlist: &Netlist) -> Result<Circuit, AdapterError> {
            panic!("netlistsvg must not convert");
        }

        fn attach_io_ui(&self, _circuit: Circuit) -> Circuit {
            panic!("netlistsvg must not attach IO widgets");
        }

        fn transform(&self, _circuit: Circuit) -> Result<Circuit, AdapterError> {
            panic!("netlistsvg must not transform");
        }
    }

    #[test]
    fn test_netlistsvg_skips_adapter_and_scope_info() {
        let options = RenderOptions::new("adder", "/tmp/out", Engine::NetlistSvg);
        let html = NetvisCore::render_page_with(adder(), &options, &Untouchable).unwrap();

        assert!(html.contains("netlistsvg.render("));
        assert!(html.contains("$add$adder.v:5$2"));
        assert!(!html.contains("$scopeinfo"));
        assert!(html.contains(r#""creator":"Yosys 0.40""#));
    }

    #[test]
    fn test_digitaljs_embeds_circuit_model() {
        let options = RenderOptions::new("adder", "/tmp/out", Engine::DigitalJs);
        let html = NetvisCore::render_page(adder(), &options).unwrap();

        assert!(html.contains("new digitaljs.Circuit({\"devices\":{"));
        assert!(html.contains(r#""type":"Addition""#));
        assert!(html.contains(r#""type":"NumEntry""#));
        assert!(html.contains(r#""type":"NumDisplay""#));
        assert!(!html.contains("$scopeinfo"));
    }

    #[test]
    fn test_fixed_digitaljs_options() {
        let options = RenderOptions::digitaljs("adder", "/tmp/out").with_asset_root("/srv/js");
        assert_eq!(options.engine, Engine::DigitalJs);
        assert_eq!(options.layout, PageLayout::Combined);

        let html = NetvisCore::render_page(adder(), &options).unwrap();
        assert!(html.contains(r#"src="/srv/js/digitaljs/dist/main.js""#));
        assert!(html.contains(r#"id="export_png""#));
    }

    #[test]
    fn test_unsupported_cell_surfaces_as_adapter_error() {
        let netlist = Netlist::from_value(json!({
            "modules": {
                "top": {
                    "attributes": { "top": 1 },
                    "ports": {},
                    "cells": { "u0": { "type": "$mystery", "connections": {} } }
                }
            }
        }))
        .unwrap();
        let options = RenderOptions::new("top", "/tmp", Engine::DigitalJs);

        let err = NetvisCore::render_page(netlist, &options).unwrap_err();
        assert!(matches!(err, NetvisError::Adapter(AdapterError::UnsupportedCell { .. })));
    }

    #[tokio::test]
    async fn test_render_to_writer_writes_whole_document() {
        let input = serde_json::to_vec(adder().as_value()).unwrap();
        let options = RenderOptions::new("adder", "/tmp/out", Engine::NetlistSvg);
        let mut out = Vec::new();

        NetvisCore::render_to_writer(input.as_slice(), &mut out, &options)
            .await
            .unwrap();

        let html = String::from_utf8(out).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[tokio::test]
    async fn test_malformed_input_writes_nothing() {
        let options = RenderOptions::new("adder", "/tmp/out", Engine::NetlistSvg);
        let mut out = Vec::new();

        let err = NetvisCore::render_to_writer(&b"{ \"modules\": "[..], &mut out, &options)
            .await
            .unwrap_err();

        assert!(matches!(err, NetvisError::Netlist(NetlistError::Json(_))));
        assert!(out.is_empty());
    }
}
