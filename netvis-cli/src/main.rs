//! netvis - render a Yosys JSON netlist from stdin as an HTML page on stdout.

use clap::Parser;
use netvis::RenderOptions;
use netvis_cli::{init_logging, run, AssetArgs, EngineArg, PageArgs};
use std::process;

#[derive(Parser)]
#[command(name = "netvis")]
#[command(about = "Render a Yosys JSON netlist (stdin) as a digitaljs or netlistsvg HTML page (stdout)", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    page: PageArgs,

    /// Rendering engine
    #[arg(value_enum, value_name = "ENGINE")]
    engine: EngineArg,

    #[command(flatten)]
    assets: AssetArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let mut options = RenderOptions::new(cli.page.filename, cli.page.downloads_dir, cli.engine.into());
    options.asset_root = cli.assets.asset_root;

    process::exit(run(options).await);
}
