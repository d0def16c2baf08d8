//! Shared plumbing for the `netvis` and `netvis-digitaljs` binaries.
//!
//! Both read a Yosys JSON netlist from stdin and write one HTML page to
//! stdout. Logs and errors go to stderr.

use clap::{Args, ValueEnum};
use netvis::{Engine, NetvisCore, RenderOptions};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the stderr log subscriber (`RUST_LOG`, default `warn`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Arguments common to both entry points
#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    /// File name stem for the exported SVG and PNG
    #[arg(value_name = "FILENAME")]
    pub filename: String,

    /// Directory the browser saves downloads into
    #[arg(value_name = "DOWNLOADS_DIRECTORY")]
    pub downloads_dir: String,
}

#[derive(Args, Debug, Clone)]
pub struct AssetArgs {
    /// Directory holding the digitaljs / elkjs / netlistsvg bundles
    #[arg(long, value_name = "PATH", default_value = netvis::page::DEFAULT_ASSET_ROOT)]
    pub asset_root: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    /// Interactive simulation (digitaljs)
    Digitaljs,
    /// Static schematic (netlistsvg)
    Netlistsvg,
}

impl From<EngineArg> for Engine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Digitaljs => Engine::DigitalJs,
            EngineArg::Netlistsvg => Engine::NetlistSvg,
        }
    }
}

/// Render stdin to stdout. Returns the process exit code.
pub async fn run(options: RenderOptions) -> i32 {
    tracing::info!(
        "Rendering {} page for {} (downloads: {})",
        options.engine,
        options.filename,
        options.downloads_dir
    );

    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    match NetvisCore::render_to_writer(stdin, &mut stdout, &options).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}
