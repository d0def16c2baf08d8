//! Render a netlist file to an HTML page and print a short summary.

use netvis::prelude::*;
use std::path::Path;

fn main() -> Result<(), NetvisError> {
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .unwrap_or_else(|| "tests/fixtures/adder.json".to_string());
    let engine: Engine = args.next().as_deref().unwrap_or("netlistsvg").parse()?;
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example render_file [path/to/netlist.json] [digitaljs|netlistsvg]");
        std::process::exit(1);
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("netlist")
        .to_string();
    let netlist: Netlist = std::fs::read_to_string(path)?.parse()?;

    println!("Netlist: {}", path.display());
    println!("Modules: {}", netlist.module_count());
    if engine == Engine::DigitalJs {
        let circuit = DigitalJsAdapter::new().adapt(&netlist)?;
        println!("Devices: {}", circuit.device_count());
        println!("Connectors: {}", circuit.connectors.len());
        println!("Subcircuits: {}", circuit.subcircuits.len());
    }

    let options = RenderOptions::new(stem.clone(), "/tmp", engine);
    let html = NetvisCore::render_page(netlist, &options)?;
    let out = std::env::temp_dir().join(format!("{}.html", stem));
    std::fs::write(&out, html)?;
    println!("Page written to {}", out.display());

    Ok(())
}
