//! netvis-digitaljs - interactive digitaljs page with PNG export.

use clap::Parser;
use netvis::RenderOptions;
use netvis_cli::{init_logging, run, AssetArgs, PageArgs};
use std::process;

#[derive(Parser)]
#[command(name = "netvis-digitaljs")]
#[command(about = "Render a Yosys JSON netlist (stdin) as an interactive digitaljs HTML page (stdout)", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    page: PageArgs,

    #[command(flatten)]
    assets: AssetArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let options = RenderOptions::digitaljs(cli.page.filename, cli.page.downloads_dir)
        .with_asset_root(cli.assets.asset_root);

    process::exit(run(options).await);
}
