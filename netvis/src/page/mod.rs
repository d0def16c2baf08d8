//! HTML page rendering
//!
//! The page loads the engine's script bundle, builds the diagram from the
//! embedded data once the document has loaded, and wires up the export
//! button. Nothing is interactive before the `load` event.

pub mod export;
pub mod netlistsvg;
pub mod templates;

use crate::embed::{js_string, to_script_literal};
use crate::engine::Engine;

pub use export::{zoom_factor, RasterizeCommand, MAX_SVG_DIMENSION};
pub use netlistsvg::{HierarchyMode, NetlistSvgOptions};

use templates::{fill, html_escape};

/// Default location of the `node_modules` tree holding the engine bundles.
pub const DEFAULT_ASSET_ROOT: &str = "./node_modules";

/// How the page scripts are arranged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageLayout {
    /// Separate `load` handlers for the diagram and the export button,
    /// which downloads the SVG ("Export to .svg").
    #[default]
    Split,
    /// One `load` handler that wires the export button and then starts the
    /// diagram, with the button labelled "Export to .png".
    Combined,
}

impl PageLayout {
    pub fn button_id(self) -> &'static str {
        match self {
            PageLayout::Split => "export",
            PageLayout::Combined => "export_png",
        }
    }

    pub fn button_label(self) -> &'static str {
        match self {
            PageLayout::Split => "Export to .svg",
            PageLayout::Combined => "Export to .png",
        }
    }
}

/// What to put on one page
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    /// File name stem for the downloaded SVG and the PNG command
    pub filename: &'a str,
    /// Directory the rasterize command reads from and writes to
    pub downloads_dir: &'a str,
    pub engine: Engine,
    /// Script-safe JSON: the circuit model for digitaljs, the netlist for netlistsvg
    pub data: &'a str,
}

/// Renders complete HTML documents
#[derive(Debug, Clone)]
pub struct PageRenderer {
    pub asset_root: String,
    pub layout: PageLayout,
    pub netlistsvg: NetlistSvgOptions,
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self {
            asset_root: DEFAULT_ASSET_ROOT.to_string(),
            layout: PageLayout::default(),
            netlistsvg: NetlistSvgOptions::default(),
        }
    }
}

impl PageRenderer {
    pub fn new(asset_root: impl Into<String>, layout: PageLayout) -> Self {
        Self {
            asset_root: asset_root.into(),
            layout,
            ..Default::default()
        }
    }

    pub fn render(&self, request: &PageRequest<'_>) -> Result<String, serde_json::Error> {
        let init = self.engine_init(request)?;
        let export = self.export_handler(request);
        let is_async = request.engine == Engine::NetlistSvg;

        let mut scripts: String = self
            .script_sources(request.engine)
            .iter()
            .map(|src| fill(templates::SCRIPT_SRC, &[("SRC", &html_escape(src))]))
            .collect();

        match self.layout {
            PageLayout::Split => {
                scripts.push_str(&on_load(&init, is_async));
                scripts.push_str(&on_load(&export, false));
            }
            PageLayout::Combined => {
                scripts.push_str(&on_load(&format!("{}\n{}", export, init), is_async));
            }
        }

        Ok(fill(
            templates::DOCUMENT,
            &[
                ("TITLE", &html_escape(request.filename)),
                ("SCRIPTS", &scripts),
                ("BUTTON_ID", self.layout.button_id()),
                ("BUTTON_LABEL", self.layout.button_label()),
            ],
        ))
    }

    /// Script bundles the engine needs, in load order.
    pub fn script_sources(&self, engine: Engine) -> Vec<String> {
        let root = self.asset_root.trim_end_matches('/');
        match engine {
            Engine::DigitalJs => vec![format!("{}/digitaljs/dist/main.js", root)],
            Engine::NetlistSvg => vec![
                format!("{}/elkjs/lib/elk.bundled.js", root),
                format!("{}/netlistsvg/built/netlistsvg.bundle.js", root),
            ],
        }
    }

    fn engine_init(&self, request: &PageRequest<'_>) -> Result<String, serde_json::Error> {
        Ok(match request.engine {
            Engine::DigitalJs => fill(templates::DIGITALJS_INIT, &[("DATA", request.data)]),
            Engine::NetlistSvg => {
                let options = to_script_literal(&self.netlistsvg)?;
                fill(
                    templates::NETLISTSVG_INIT,
                    &[("DATA", request.data), ("OPTIONS", &options)],
                )
            }
        })
    }

    fn export_handler(&self, request: &PageRequest<'_>) -> String {
        let command = RasterizeCommand::new(request.downloads_dir, request.filename);
        let svg_name = format!("{}.svg", request.filename);

        fill(
            templates::EXPORT_HANDLER,
            &[
                ("BUTTON_ID", &js_string(self.layout.button_id())),
                ("MAX_DIMENSION", &MAX_SVG_DIMENSION.to_string()),
                ("RASTERIZE_PREFIX", &js_string(&command.prefix())),
                ("RASTERIZE_SUFFIX", &js_string(&command.suffix())),
                ("SVG_NAME", &js_string(&svg_name)),
            ],
        )
    }
}

fn on_load(body: &str, is_async: bool) -> String {
    fill(
        templates::ON_LOAD,
        &[("ASYNC", if is_async { "async " } else { "" }), ("BODY", body)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(engine: Engine) -> PageRequest<'static> {
        PageRequest {
            filename: "adder",
            downloads_dir: "/tmp/out",
            engine,
            data: r#"{"devices":{}}"#,
        }
    }

    #[test]
    fn test_split_digitaljs_page() {
        let html = PageRenderer::default().render(&request(Engine::DigitalJs)).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"src="./node_modules/digitaljs/dist/main.js""#));
        assert!(html.contains(r#"new digitaljs.Circuit({"devices":{}}, "#));
        assert!(html.contains(r#"<button id="export">Export to .svg</button>"#));
        assert!(html.contains(r#"document.getElementById("export")"#));
        assert_eq!(html.matches("addEventListener(\"load\"").count(), 2);
        assert!(!html.contains("netlistsvg"));
        assert!(!html.contains("@@"));
    }

    #[test]
    fn test_netlistsvg_page_is_async_with_options() {
        let html = PageRenderer::new("../../vis/node_modules/", PageLayout::Split)
            .render(&request(Engine::NetlistSvg))
            .unwrap();

        assert!(html.contains(r#"src="../../vis/node_modules/elkjs/lib/elk.bundled.js""#));
        assert!(html.contains(r#"src="../../vis/node_modules/netlistsvg/built/netlistsvg.bundle.js""#));
        assert!(html.contains(r#"addEventListener("load", async () => {"#));
        assert!(html.contains(r#""expandLevel":0"#));
        assert!(html.contains(r#""top":{"enable":false,"module":""}"#));
        let elk = html.find("elk.bundled.js").unwrap();
        let bundle = html.find("netlistsvg.bundle.js").unwrap();
        assert!(elk < bundle);
    }

    #[test]
    fn test_combined_layout_wires_export_before_start() {
        let html = PageRenderer::new(DEFAULT_ASSET_ROOT, PageLayout::Combined)
            .render(&request(Engine::DigitalJs))
            .unwrap();

        assert_eq!(html.matches("addEventListener(\"load\"").count(), 1);
        assert!(html.contains(r#"<button id="export_png">Export to .png</button>"#));
        let wire = html.find(r#"getElementById("export_png")"#).unwrap();
        let start = html.find("circuit.start()").unwrap();
        assert!(wire < start);
    }

    #[test]
    fn test_export_handler_text() {
        let html = PageRenderer::default().render(&request(Engine::DigitalJs)).unwrap();

        assert!(html.contains(
            r#"rasterizeCommand.innerText = "rsvg-convert --output '/tmp/out/adder.png' " + zoom + "'/tmp/out/adder.svg'";"#
        ));
        assert!(html.contains("if (width > 32767 || height > 32767)"));
        assert!(html.contains("zoom = `--zoom ${ 32767 / Math.max(width, height) } `;"));
        assert!(html.contains(r#"anchor.download = "adder.svg";"#));
        assert!(html.contains(r#"svg.setAttribute("width", `${ width }px`);"#));
    }

    #[test]
    fn test_export_handler_follows_rasterize_rules() {
        let html = PageRenderer::default().render(&request(Engine::DigitalJs)).unwrap();
        let command = RasterizeCommand::new("/tmp/out", "adder");

        assert!(html.contains(&format!(
            "{} + zoom + {}",
            js_string(&command.prefix()),
            js_string(&command.suffix())
        )));
        assert!(html.contains(&format!(
            "if (width > {0} || height > {0})",
            MAX_SVG_DIMENSION
        )));
        assert!(html.contains(&format!(
            "zoom = `--zoom ${{ {} / Math.max(width, height) }} `;",
            MAX_SVG_DIMENSION
        )));

        // Same text the page assembles for small and oversized drawings
        assert_eq!(
            command.for_size(100, 200),
            format!("{}{}", command.prefix(), command.suffix())
        );
        let zoom = zoom_factor(40000, 10000).unwrap();
        assert_eq!(
            command.for_size(40000, 10000),
            format!("{}--zoom {} {}", command.prefix(), zoom, command.suffix())
        );
    }

    #[test]
    fn test_hostile_filename_is_escaped() {
        let req = PageRequest {
            filename: "</script><b>",
            ..request(Engine::DigitalJs)
        };
        let html = PageRenderer::default().render(&req).unwrap();

        assert!(html.contains("<title>&lt;/script&gt;&lt;b&gt;</title>"));
        assert_eq!(html.matches("</script>").count(), 3);
    }
}
