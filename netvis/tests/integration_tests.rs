//! Integration tests for the netvis library

use netvis::prelude::*;
use netvis::digitaljs::DeviceKind;
use netvis::load_netlist;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fixture(name: &str) -> Netlist {
    let json = std::fs::read_to_string(fixture_path(name)).expect("Fixture should exist");
    json.parse().expect("Fixture should parse")
}

fn cell_types(netlist: &Netlist) -> Vec<String> {
    netlist
        .modules()
        .flat_map(|m| m.cells().map(|c| c.kind().to_string()).collect::<Vec<_>>())
        .collect()
}

#[test]
fn test_scope_info_filter_on_fixtures() {
    for name in ["adder.json", "hierarchy.json", "bigint.json", "counter.json"] {
        let mut netlist = fixture(name);
        let before = cell_types(&netlist);
        let removed = netlist.strip_scope_info();
        let after = cell_types(&netlist);

        assert_eq!(removed, 1, "{} has one scope-info cell", name);
        assert!(!after.iter().any(|t| t == "$scopeinfo"));
        let expected: Vec<_> = before.into_iter().filter(|t| t != "$scopeinfo").collect();
        assert_eq!(after, expected, "Other cells keep their order in {}", name);
    }
}

#[test]
fn test_load_netlist_filters() {
    let json = std::fs::read_to_string(fixture_path("adder.json")).unwrap();
    let netlist = load_netlist(&json).unwrap();
    assert_eq!(cell_types(&netlist), vec!["$add"]);
}

#[test]
fn test_netlistsvg_page_from_fixture() {
    let options = RenderOptions::new("adder", "/home/user/Downloads", Engine::NetlistSvg);
    let html = NetvisCore::render_page(fixture("adder.json"), &options).unwrap();

    assert!(html.contains("netlistsvg.render(netlistsvg.digitalSkin, {"));
    assert!(html.contains(r#""$add$adder.v:5$2""#));
    assert!(!html.contains("$scopeinfo"));
    assert!(html.contains("rsvg-convert --output '/home/user/Downloads/adder.png' "));
    assert!(html.contains(r#"<button id="export">Export to .svg</button>"#));
}

#[test]
fn test_extended_integers_become_strings() {
    let options = RenderOptions::new("wide", "/tmp", Engine::NetlistSvg);
    let html = NetvisCore::render_page(fixture("bigint.json"), &options).unwrap();

    assert!(html.contains(r#""SEED":"123456789012345678901234567890""#));
    assert!(html.contains(r#""weight":"9007199254740993""#));
    assert!(html.contains(r#""top":1"#));
    // Only present in the removed scope-info cell
    assert!(!html.contains("18446744073709551616"));
}

#[test]
fn test_digitaljs_hierarchy() {
    let netlist = load_netlist(&std::fs::read_to_string(fixture_path("hierarchy.json")).unwrap())
        .unwrap();
    let circuit = DigitalJsAdapter::new().adapt(&netlist).unwrap();

    let kinds: Vec<_> = circuit.devices.values().map(|d| d.kind).collect();
    assert!(kinds.contains(&DeviceKind::Clock));
    assert!(kinds.contains(&DeviceKind::Button));
    assert!(kinds.contains(&DeviceKind::Lamp));
    assert!(kinds.contains(&DeviceKind::Dff));

    let (_, instance) = circuit.devices_of(DeviceKind::Subcircuit).next().unwrap();
    assert_eq!(instance.celltype.as_deref(), Some("inverter"));
    assert_eq!(instance.label.as_deref(), Some("u_inv"));

    let inverter = &circuit.subcircuits["inverter"];
    assert_eq!(inverter.devices_of(DeviceKind::Input).count(), 1);
    assert_eq!(inverter.devices_of(DeviceKind::Output).count(), 1);
    assert_eq!(inverter.devices_of(DeviceKind::Not).count(), 1);
}

#[test]
fn test_digitaljs_page_from_fixture() {
    let options = RenderOptions::digitaljs("top", "/tmp/out");
    let html = NetvisCore::render_page(fixture("hierarchy.json"), &options).unwrap();

    assert!(html.contains("new digitaljs.Circuit("));
    assert!(html.contains(r#""subcircuits":{"inverter":"#));
    assert!(html.contains(r#"<button id="export_png">Export to .png</button>"#));
    assert!(!html.contains("netlistsvg"));
}

#[test]
fn test_digitaljs_counter_with_sync_reset() {
    let netlist = load_netlist(&std::fs::read_to_string(fixture_path("counter.json")).unwrap())
        .unwrap();
    let circuit = DigitalJsAdapter::new().adapt(&netlist).unwrap();

    let (_, state) = circuit.devices_of(DeviceKind::Dff).next().unwrap();
    assert_eq!(state.params["polarity"]["srst"], true);
    assert_eq!(state.params["srst_value"], "0000");
    let (_, select) = circuit.devices_of(DeviceKind::ShiftRight).next().unwrap();
    assert_eq!(select.params["fillx"], true);
    assert_eq!(circuit.devices_of(DeviceKind::Addition).count(), 1);
    assert!(circuit.devices_of(DeviceKind::Clock).next().is_some());

    let options = RenderOptions::digitaljs("counter", "/tmp/out");
    let html = NetvisCore::render_page(fixture("counter.json"), &options).unwrap();
    assert!(html.contains("new digitaljs.Circuit("));
    assert!(html.contains(r#""srst_value":"0000""#));
    assert!(html.contains(r#""fillx":true"#));
    assert!(!html.contains("$scopeinfo"));
}

#[test]
fn test_unknown_engine_is_rejected() {
    let err = "graphviz".parse::<Engine>().unwrap_err();
    assert!(matches!(err, NetvisError::UnsupportedEngine { .. }));
    assert!(err.to_string().contains("graphviz"));
}
