//! Netlist -> digitaljs conversion
//!
//! Every module port becomes an `Input`/`Output` device and every cell a
//! device of the matching digitaljs type. Wiring is resolved per bit once all
//! devices exist: an input whose bits equal a driver's output vector gets a
//! direct connector, anything else is assembled from `BusSlice`, `Constant`
//! and `BusGroup` devices.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::{json, Value};

use super::{AdapterError, Bits, Circuit, Connector, Device, DeviceKind, Endpoint};
use crate::netlist::schema::parse_param_u64;
use crate::netlist::{BitRef, CellView, ConstBit, ModuleView, Netlist, PortDirection};

/// Convert the design rooted at the top module.
pub fn netlist_to_circuit(netlist: &Netlist) -> Result<Circuit, AdapterError> {
    let top = find_top_module(netlist)?;
    tracing::info!("Converting top module {} to a digitaljs circuit", top.name());

    let mut converter = Converter {
        netlist,
        subcircuits: IndexMap::new(),
        in_progress: HashSet::new(),
    };
    let mut circuit = converter.convert_module(top)?;
    circuit.subcircuits = converter.subcircuits;
    Ok(circuit)
}

/// Pick the module to display.
///
/// A module with a non-zero `top` attribute wins, then a lone module, then
/// the single module no other module instantiates.
pub fn find_top_module(netlist: &Netlist) -> Result<ModuleView<'_>, AdapterError> {
    if let Some(top) = netlist.modules().find(|m| m.is_top()) {
        return Ok(top);
    }

    let modules: Vec<_> = netlist.modules().collect();
    match modules.len() {
        0 => return Err(AdapterError::NoTopModule("netlist has no modules".to_string())),
        1 => return Ok(modules[0]),
        _ => {}
    }

    let instantiated: HashSet<&str> = modules
        .iter()
        .flat_map(|m| m.cells())
        .map(|c| c.kind())
        .filter(|kind| netlist.is_module(kind))
        .collect();
    let roots: Vec<_> = modules
        .into_iter()
        .filter(|m| !instantiated.contains(m.name()))
        .collect();

    match roots.as_slice() {
        [root] => Ok(*root),
        [] => Err(AdapterError::NoTopModule(
            "every module is instantiated by another one".to_string(),
        )),
        _ => Err(AdapterError::NoTopModule(format!(
            "ambiguous roots: {}",
            roots.iter().map(|m| m.name()).collect::<Vec<_>>().join(", ")
        ))),
    }
}

struct Converter<'a> {
    netlist: &'a Netlist,
    subcircuits: IndexMap<String, Circuit>,
    in_progress: HashSet<String>,
}

impl<'a> Converter<'a> {
    fn convert_module(&mut self, module: ModuleView<'a>) -> Result<Circuit, AdapterError> {
        self.in_progress.insert(module.name().to_string());

        let mut builder = ModuleBuilder::new(module)?;
        let mut inputs = 0;
        let mut outputs = 0;

        for port in module.ports()? {
            match port.direction {
                PortDirection::Input => {
                    let mut device = Device::new(DeviceKind::Input).with_width(port.bits.len());
                    device.net = Some(port.name.to_string());
                    device.order = Some(inputs);
                    inputs += 1;
                    let id = builder.add_device(device);
                    builder.drive(&id, "out", &port.bits);
                }
                PortDirection::Output => {
                    let mut device = Device::new(DeviceKind::Output).with_width(port.bits.len());
                    device.net = Some(port.name.to_string());
                    device.order = Some(outputs);
                    outputs += 1;
                    let id = builder.add_device(device);
                    builder.consume(&id, "in", port.bits);
                }
                PortDirection::InOut => {
                    return Err(AdapterError::InvalidData(format!(
                        "inout port {}.{} cannot be simulated",
                        module.name(),
                        port.name
                    )));
                }
            }
        }

        let mut memories: IndexMap<&str, Vec<CellView<'a>>> = IndexMap::new();
        for cell in module.cells() {
            if self.netlist.is_module(cell.kind()) {
                self.convert_instance(&mut builder, module, cell)?;
            } else if is_memory_port(cell.kind()) {
                let memid = cell.param_str("MEMID").ok_or_else(|| {
                    AdapterError::MissingField(format!("MEMID of cell {} ({})", cell.name(), cell.kind()))
                })?;
                memories.entry(memid).or_default().push(cell);
            } else {
                convert_cell(&mut builder, module, cell)?;
            }
        }
        for (memid, cells) in memories {
            MemorySpec::from_port_cells(module, memid, &cells)?.add_to(&mut builder, memory_label(memid))?;
        }

        self.in_progress.remove(module.name());
        Ok(builder.finish())
    }

    fn convert_instance(
        &mut self,
        builder: &mut ModuleBuilder,
        parent: ModuleView<'a>,
        cell: CellView<'a>,
    ) -> Result<(), AdapterError> {
        let celltype = cell.kind();
        if self.in_progress.contains(celltype) {
            return Err(AdapterError::InvalidData(format!(
                "module {} instantiates itself through {}",
                celltype,
                parent.name()
            )));
        }

        let callee = self
            .netlist
            .module(celltype)
            .ok_or_else(|| AdapterError::UnknownModule(celltype.to_string()))?;
        if !self.subcircuits.contains_key(celltype) {
            let definition = self.convert_module(callee)?;
            self.subcircuits.insert(celltype.to_string(), definition);
        }

        let mut device = Device::new(DeviceKind::Subcircuit);
        device.celltype = Some(celltype.to_string());
        device.label = Some(cell.name().to_string());
        let id = builder.add_device(device);

        let callee_ports = callee.ports()?;
        for port in cell.port_names() {
            let bits = cell.connection(port)?.unwrap_or_default();
            let direction = cell
                .port_direction(port)
                .or_else(|| callee_ports.iter().find(|p| p.name == port).map(|p| p.direction))
                .ok_or_else(|| {
                    AdapterError::MissingField(format!(
                        "direction of port {} on instance {}",
                        port,
                        cell.name()
                    ))
                })?;
            match direction {
                PortDirection::Input => builder.consume(&id, port, bits),
                PortDirection::Output => builder.drive(&id, port, &bits),
                PortDirection::InOut => {
                    return Err(AdapterError::InvalidData(format!(
                        "inout port {} on instance {}",
                        port,
                        cell.name()
                    )))
                }
            }
        }
        Ok(())
    }
}

fn convert_cell(
    b: &mut ModuleBuilder,
    module: ModuleView<'_>,
    cell: CellView<'_>,
) -> Result<(), AdapterError> {
    let kind = cell.kind();
    let unsupported = || AdapterError::UnsupportedCell {
        module: module.name().to_string(),
        cell: cell.name().to_string(),
        kind: kind.to_string(),
    };

    match kind {
        // Word-level unary
        "$not" => {
            let y = conn(&cell, "Y")?;
            let id = b.add_device(labelled(Device::new(DeviceKind::Not).with_width(y.len()), &cell));
            b.consume_extended(&id, "in", conn(&cell, "A")?, y.len(), cell.param_bool("A_SIGNED"));
            b.drive(&id, "out", &y);
        }
        "$neg" | "$pos" => {
            let a = conn(&cell, "A")?;
            let y = conn(&cell, "Y")?;
            let device_kind = if kind == "$neg" { DeviceKind::Negation } else { DeviceKind::UnaryPlus };
            let device = Device::new(device_kind)
                .with_bits(Bits::ports([("in", a.len()), ("out", y.len())]))
                .with_param("signed", json!(cell.param_bool("A_SIGNED")));
            let id = b.add_device(labelled(device, &cell));
            b.consume(&id, "in", a);
            b.drive(&id, "out", &y);
        }

        // Word-level bitwise
        "$and" | "$or" | "$xor" | "$xnor" => {
            let device_kind = match kind {
                "$and" => DeviceKind::And,
                "$or" => DeviceKind::Or,
                "$xor" => DeviceKind::Xor,
                _ => DeviceKind::Xnor,
            };
            let y = conn(&cell, "Y")?;
            let id = b.add_device(labelled(Device::new(device_kind).with_width(y.len()), &cell));
            b.consume_extended(&id, "in1", conn(&cell, "A")?, y.len(), cell.param_bool("A_SIGNED"));
            b.consume_extended(&id, "in2", conn(&cell, "B")?, y.len(), cell.param_bool("B_SIGNED"));
            b.drive(&id, "out", &y);
        }

        // Fine-grained gates
        "$_NOT_" | "$_BUF_" => {
            let device_kind = if kind == "$_NOT_" { DeviceKind::Not } else { DeviceKind::Repeater };
            let id = b.add_device(labelled(Device::new(device_kind).with_width(1), &cell));
            b.consume(&id, "in", conn(&cell, "A")?);
            b.drive(&id, "out", &conn(&cell, "Y")?);
        }
        "$_AND_" | "$_OR_" | "$_XOR_" | "$_NAND_" | "$_NOR_" | "$_XNOR_" => {
            let device_kind = match kind {
                "$_AND_" => DeviceKind::And,
                "$_OR_" => DeviceKind::Or,
                "$_XOR_" => DeviceKind::Xor,
                "$_NAND_" => DeviceKind::Nand,
                "$_NOR_" => DeviceKind::Nor,
                _ => DeviceKind::Xnor,
            };
            let id = b.add_device(labelled(Device::new(device_kind).with_width(1), &cell));
            b.consume(&id, "in1", conn(&cell, "A")?);
            b.consume(&id, "in2", conn(&cell, "B")?);
            b.drive(&id, "out", &conn(&cell, "Y")?);
        }
        "$_ANDNOT_" | "$_ORNOT_" => {
            // A & ~B and A | ~B
            let inverter = b.add_device(Device::new(DeviceKind::Not).with_width(1));
            b.consume(&inverter, "in", conn(&cell, "B")?);
            let device_kind = if kind == "$_ANDNOT_" { DeviceKind::And } else { DeviceKind::Or };
            let id = b.add_device(labelled(Device::new(device_kind).with_width(1), &cell));
            b.consume(&id, "in1", conn(&cell, "A")?);
            b.connect(Endpoint::new(inverter, "out"), Endpoint::new(id.clone(), "in2"), None);
            b.drive(&id, "out", &conn(&cell, "Y")?);
        }
        "$_MUX_" => {
            let device = Device::new(DeviceKind::Mux).with_bits(Bits::ports([("in", 1), ("sel", 1)]));
            let id = b.add_device(labelled(device, &cell));
            b.consume(&id, "in0", conn(&cell, "A")?);
            b.consume(&id, "in1", conn(&cell, "B")?);
            b.consume(&id, "sel", conn(&cell, "S")?);
            b.drive(&id, "out", &conn(&cell, "Y")?);
        }

        // Reductions
        "$reduce_and" | "$reduce_or" | "$reduce_xor" | "$reduce_xnor" | "$reduce_bool"
        | "$logic_not" => {
            let device_kind = match kind {
                "$reduce_and" => DeviceKind::AndReduce,
                "$reduce_or" | "$reduce_bool" => DeviceKind::OrReduce,
                "$reduce_xor" => DeviceKind::XorReduce,
                "$reduce_xnor" => DeviceKind::XnorReduce,
                _ => DeviceKind::NorReduce,
            };
            let a = conn(&cell, "A")?;
            let id = b.add_device(labelled(Device::new(device_kind).with_width(a.len()), &cell));
            b.consume(&id, "in", a);
            b.drive_bool(&id, "out", &conn(&cell, "Y")?);
        }
        "$logic_and" | "$logic_or" => {
            let device_kind = if kind == "$logic_and" { DeviceKind::And } else { DeviceKind::Or };
            let id = b.add_device(labelled(Device::new(device_kind).with_width(1), &cell));
            b.consume_bool(&id, "in1", conn(&cell, "A")?);
            b.consume_bool(&id, "in2", conn(&cell, "B")?);
            b.drive_bool(&id, "out", &conn(&cell, "Y")?);
        }

        // Arithmetic
        "$add" | "$sub" | "$mul" | "$div" | "$mod" | "$pow" => {
            let device_kind = match kind {
                "$add" => DeviceKind::Addition,
                "$sub" => DeviceKind::Subtraction,
                "$mul" => DeviceKind::Multiplication,
                "$div" => DeviceKind::Division,
                "$mod" => DeviceKind::Modulo,
                _ => DeviceKind::Power,
            };
            binary_arith(b, &cell, Device::new(device_kind), true, false)?;
        }
        "$shl" | "$shr" | "$sshl" | "$sshr" => {
            let device_kind = if kind == "$shl" || kind == "$sshl" {
                DeviceKind::ShiftLeft
            } else {
                DeviceKind::ShiftRight
            };
            let arithmetic = kind == "$sshr" || kind == "$sshl";
            let a_signed = arithmetic && cell.param_bool("A_SIGNED");
            let device = Device::new(device_kind)
                .with_param(
                    "signed",
                    json!({ "in1": a_signed, "in2": cell.param_bool("B_SIGNED"), "out": a_signed }),
                )
                .with_param("fillx", json!(false));
            binary_arith(b, &cell, device, true, true)?;
        }
        "$shift" | "$shiftx" => {
            // Right shift by a possibly signed amount; $shiftx shifts in x.
            let a_signed = kind == "$shift" && cell.param_bool("A_SIGNED");
            let device = Device::new(DeviceKind::ShiftRight)
                .with_param(
                    "signed",
                    json!({ "in1": a_signed, "in2": cell.param_bool("B_SIGNED"), "out": a_signed }),
                )
                .with_param("fillx", json!(kind == "$shiftx"));
            binary_arith(b, &cell, device, true, true)?;
        }

        // Comparisons
        "$lt" | "$le" | "$eq" | "$eqx" | "$ne" | "$nex" | "$ge" | "$gt" => {
            let device_kind = match kind {
                "$lt" => DeviceKind::Lt,
                "$le" => DeviceKind::Le,
                "$eq" | "$eqx" => DeviceKind::Eq,
                "$ne" | "$nex" => DeviceKind::Ne,
                "$ge" => DeviceKind::Ge,
                _ => DeviceKind::Gt,
            };
            binary_arith(b, &cell, Device::new(device_kind), false, false)?;
        }

        // Multiplexers
        "$mux" => {
            let y = conn(&cell, "Y")?;
            let device = Device::new(DeviceKind::Mux).with_bits(Bits::ports([("in", y.len()), ("sel", 1)]));
            let id = b.add_device(labelled(device, &cell));
            b.consume(&id, "in0", conn(&cell, "A")?);
            b.consume(&id, "in1", conn(&cell, "B")?);
            b.consume(&id, "sel", conn(&cell, "S")?);
            b.drive(&id, "out", &y);
        }
        "$pmux" => {
            let y = conn(&cell, "Y")?;
            let s = conn(&cell, "S")?;
            let bb = conn(&cell, "B")?;
            let width = y.len();
            if width == 0 || bb.len() != width * s.len() {
                return Err(AdapterError::InvalidData(format!(
                    "$pmux {} has {} B bits for {} cases of width {}",
                    cell.name(),
                    bb.len(),
                    s.len(),
                    width
                )));
            }
            let device = Device::new(DeviceKind::Mux1Hot)
                .with_bits(Bits::ports([("in", width), ("sel", s.len())]));
            let id = b.add_device(labelled(device, &cell));
            b.consume(&id, "in0", conn(&cell, "A")?);
            for (i, case) in bb.chunks(width).enumerate() {
                b.consume(&id, &format!("in{}", i + 1), case.to_vec());
            }
            b.consume(&id, "sel", s);
            b.drive(&id, "out", &y);
        }

        "$bmux" => {
            let a = conn(&cell, "A")?;
            let s = conn(&cell, "S")?;
            let y = conn(&cell, "Y")?;
            let width = y.len();
            if width == 0 || selected_width(a.len(), s.len()) != Some(width) {
                return Err(AdapterError::InvalidData(format!(
                    "$bmux {} has {} A bits for {} select bits and width {}",
                    cell.name(),
                    a.len(),
                    s.len(),
                    width
                )));
            }
            let device = Device::new(DeviceKind::Mux).with_bits(Bits::ports([("in", width), ("sel", s.len())]));
            let id = b.add_device(labelled(device, &cell));
            for (i, case) in a.chunks(width).enumerate() {
                b.consume(&id, &format!("in{}", i), case.to_vec());
            }
            b.consume(&id, "sel", s);
            b.drive(&id, "out", &y);
        }
        "$demux" => {
            let a = conn(&cell, "A")?;
            let s = conn(&cell, "S")?;
            let y = conn(&cell, "Y")?;
            let width = a.len();
            if width == 0 || selected_width(y.len(), s.len()) != Some(width) {
                return Err(AdapterError::InvalidData(format!(
                    "$demux {} has {} Y bits for {} select bits and width {}",
                    cell.name(),
                    y.len(),
                    s.len(),
                    width
                )));
            }
            let device = Device::new(DeviceKind::Demux).with_bits(Bits::ports([("in", width), ("sel", s.len())]));
            let id = b.add_device(labelled(device, &cell));
            b.consume(&id, "in", a);
            b.consume(&id, "sel", s);
            for (i, case) in y.chunks(width).enumerate() {
                b.drive(&id, &format!("out{}", i), case);
            }
        }

        // Memories
        "$mem" | "$mem_v2" => {
            let label = cell.param_str("MEMID").and_then(memory_label);
            MemorySpec::from_mem_cell(&cell)?.add_to(b, label)?;
        }
        "$lut" => MemorySpec::from_lut(&cell)?.add_to(b, labelled_name(&cell))?,

        // Storage: word-level flip-flops and latches, then the fine-grained ones
        _ => {
            let width = cell.connection("Q")?.map_or(0, |q| q.len());
            let (spec, ports) = match DffSpec::word_level(&cell, width) {
                Some(spec) => (spec, &WORD_LEVEL_PORTS),
                None => (DffSpec::fine_grained(kind).ok_or_else(unsupported)?, &FINE_GRAINED_PORTS),
            };
            spec.add_to(b, &cell, ports)?;
        }
    }

    Ok(())
}

/// Width of one case when `total` bits are split by a `sel_bits` wide selector.
fn selected_width(total: usize, sel_bits: usize) -> Option<usize> {
    let cases = 1usize.checked_shl(u32::try_from(sel_bits).ok()?)?;
    (total % cases == 0).then(|| total / cases)
}

/// Which optional controls a flip-flop or latch has, with their polarities
#[derive(Debug, Default, PartialEq)]
struct DffSpec {
    clock: Option<bool>,
    arst: Option<(bool, Option<String>)>,
    srst: Option<(bool, Option<String>)>,
    enable: Option<bool>,
    /// Sync reset only acts while enabled (`$sdffce`)
    enable_srst: bool,
    aload: Option<bool>,
    set_clr: Option<(bool, bool)>,
}

/// Cell port names of each control
struct DffPorts {
    clk: &'static str,
    arst: &'static str,
    srst: &'static str,
    en: &'static str,
    aload: &'static str,
    set: &'static str,
    clr: &'static str,
}

const WORD_LEVEL_PORTS: DffPorts = DffPorts {
    clk: "CLK",
    arst: "ARST",
    srst: "SRST",
    en: "EN",
    aload: "ALOAD",
    set: "SET",
    clr: "CLR",
};

const FINE_GRAINED_PORTS: DffPorts = DffPorts {
    clk: "C",
    arst: "R",
    srst: "R",
    en: "E",
    aload: "L",
    set: "S",
    clr: "R",
};

impl DffSpec {
    /// `$dff`, `$adff`, `$sdff`, `$aldff`, `$dffsr` and their enable variants, plus latches.
    fn word_level(cell: &CellView<'_>, width: usize) -> Option<Self> {
        let kind = cell.kind();
        if !matches!(
            kind,
            "$dff" | "$dffe" | "$adff" | "$adffe" | "$sdff" | "$sdffe" | "$sdffce" | "$aldff"
                | "$aldffe" | "$dffsr" | "$dffsre" | "$dlatch" | "$adlatch"
        ) {
            return None;
        }

        let mut spec = DffSpec::default();
        if kind.contains("dff") {
            spec.clock = Some(cell.param_bool("CLK_POLARITY"));
        }
        if matches!(kind, "$adff" | "$adffe" | "$adlatch") {
            spec.arst = Some((cell.param_bool("ARST_POLARITY"), cell.param_bits("ARST_VALUE", width)));
        }
        if kind.starts_with("$sdff") {
            spec.srst = Some((cell.param_bool("SRST_POLARITY"), cell.param_bits("SRST_VALUE", width)));
            spec.enable_srst = kind == "$sdffce";
        }
        if kind.ends_with('e') || kind.contains("latch") {
            spec.enable = Some(cell.param_bool("EN_POLARITY"));
        }
        if kind.starts_with("$aldff") {
            spec.aload = Some(cell.param_bool("ALOAD_POLARITY"));
        }
        if kind.starts_with("$dffsr") {
            spec.set_clr = Some((cell.param_bool("SET_POLARITY"), cell.param_bool("CLR_POLARITY")));
        }
        Some(spec)
    }

    /// Single-bit cells whose polarities and reset value are spelled in the
    /// type name, e.g. `$_SDFFE_PN0P_` (clock, reset, reset value, enable).
    fn fine_grained(kind: &str) -> Option<Self> {
        let body = kind.strip_prefix("$_")?.strip_suffix('_')?;
        let (family, flags) = body.split_once('_')?;
        let f = flags.as_bytes();
        let pol = |i: usize| match f.get(i) {
            Some(b'P') => Some(true),
            Some(b'N') => Some(false),
            _ => None,
        };
        let value = |i: usize| match f.get(i) {
            Some(b'0') => Some(Some("0".to_string())),
            Some(b'1') => Some(Some("1".to_string())),
            _ => None,
        };

        let mut spec = DffSpec::default();
        match (family, f.len()) {
            ("DFF", 1) => spec.clock = Some(pol(0)?),
            ("DFF", 3) => {
                spec.clock = Some(pol(0)?);
                spec.arst = Some((pol(1)?, value(2)?));
            }
            ("DFFE", 2) => {
                spec.clock = Some(pol(0)?);
                spec.enable = Some(pol(1)?);
            }
            ("DFFE", 4) => {
                spec.clock = Some(pol(0)?);
                spec.arst = Some((pol(1)?, value(2)?));
                spec.enable = Some(pol(3)?);
            }
            ("SDFF", 3) => {
                spec.clock = Some(pol(0)?);
                spec.srst = Some((pol(1)?, value(2)?));
            }
            ("SDFFE", 4) | ("SDFFCE", 4) => {
                spec.clock = Some(pol(0)?);
                spec.srst = Some((pol(1)?, value(2)?));
                spec.enable = Some(pol(3)?);
                spec.enable_srst = family == "SDFFCE";
            }
            ("DFFSR", 3) | ("DFFSRE", 4) => {
                spec.clock = Some(pol(0)?);
                spec.set_clr = Some((pol(1)?, pol(2)?));
                if family == "DFFSRE" {
                    spec.enable = Some(pol(3)?);
                }
            }
            ("ALDFF", 2) | ("ALDFFE", 3) => {
                spec.clock = Some(pol(0)?);
                spec.aload = Some(pol(1)?);
                if family == "ALDFFE" {
                    spec.enable = Some(pol(2)?);
                }
            }
            ("DLATCH", 1) => spec.enable = Some(pol(0)?),
            ("DLATCH", 3) => {
                spec.enable = Some(pol(0)?);
                spec.arst = Some((pol(1)?, value(2)?));
            }
            _ => return None,
        }
        Some(spec)
    }

    fn add_to(self, b: &mut ModuleBuilder, cell: &CellView<'_>, ports: &DffPorts) -> Result<(), AdapterError> {
        let q = conn(cell, "Q")?;
        let mut device = Device::new(DeviceKind::Dff).with_width(q.len());
        let mut polarity = serde_json::Map::new();

        if let Some(clock) = self.clock {
            polarity.insert("clock".to_string(), json!(clock));
        }
        if let Some((arst, value)) = &self.arst {
            polarity.insert("arst".to_string(), json!(arst));
            if let Some(value) = value {
                device = device.with_param("arst_value", Value::String(value.clone()));
            }
        }
        if let Some((srst, value)) = &self.srst {
            polarity.insert("srst".to_string(), json!(srst));
            if let Some(value) = value {
                device = device.with_param("srst_value", Value::String(value.clone()));
            }
        }
        if let Some(enable) = self.enable {
            polarity.insert("enable".to_string(), json!(enable));
        }
        if let Some(aload) = self.aload {
            polarity.insert("aload".to_string(), json!(aload));
        }
        if let Some((set, clr)) = self.set_clr {
            polarity.insert("set".to_string(), json!(set));
            polarity.insert("clr".to_string(), json!(clr));
        }
        if self.enable_srst {
            device = device.with_param("enable_srst", json!(true));
        }

        let id = b.add_device(labelled(device.with_param("polarity", Value::Object(polarity)), cell));
        if self.clock.is_some() {
            b.consume(&id, "clk", conn(cell, ports.clk)?);
        }
        if self.arst.is_some() {
            b.consume(&id, "arst", conn(cell, ports.arst)?);
        }
        if self.srst.is_some() {
            b.consume(&id, "srst", conn(cell, ports.srst)?);
        }
        if self.enable.is_some() {
            b.consume(&id, "en", conn(cell, ports.en)?);
        }
        if self.aload.is_some() {
            b.consume(&id, "aload", conn(cell, ports.aload)?);
            b.consume(&id, "ad", conn(cell, "AD")?);
        }
        if self.set_clr.is_some() {
            b.consume(&id, "set", conn(cell, ports.set)?);
            b.consume(&id, "clr", conn(cell, ports.clr)?);
        }
        b.consume(&id, "in", conn(cell, "D")?);
        b.drive(&id, "out", &q);
        Ok(())
    }
}

fn is_memory_port(kind: &str) -> bool {
    matches!(
        kind,
        "$memrd" | "$memrd_v2" | "$memwr" | "$memwr_v2" | "$meminit" | "$meminit_v2"
    )
}

/// `\name` memories are user-named; `$...` ones are generated.
fn memory_label(memid: &str) -> Option<&str> {
    memid.strip_prefix('\\')
}

#[derive(Debug)]
struct ReadPort {
    /// Clock polarity of a synchronous port
    clock: Option<bool>,
    transparent: bool,
    clk: Vec<BitRef>,
    en: Vec<BitRef>,
    addr: Vec<BitRef>,
    data: Vec<BitRef>,
}

#[derive(Debug)]
struct WritePort {
    clock: Option<bool>,
    clk: Vec<BitRef>,
    en: Vec<BitRef>,
    addr: Vec<BitRef>,
    data: Vec<BitRef>,
}

/// A memory gathered from `$mem_v2`, from `$memrd`/`$memwr`/`$meminit`
/// cells sharing one `MEMID`, or from a `$lut` read as a ROM
#[derive(Debug, Default)]
struct MemorySpec {
    width: usize,
    abits: usize,
    size: usize,
    offset: i64,
    /// Initial contents per word, MSB first, `x` where unset
    init: Vec<String>,
    read: Vec<ReadPort>,
    write: Vec<WritePort>,
}

impl MemorySpec {
    fn from_mem_cell(cell: &CellView<'_>) -> Result<Self, AdapterError> {
        let width = param_usize(cell, "WIDTH")?;
        let abits = param_usize(cell, "ABITS")?;
        let size = param_usize(cell, "SIZE")?;
        let rd_ports = param_usize(cell, "RD_PORTS")?;
        let wr_ports = param_usize(cell, "WR_PORTS")?;
        let init = cell.param_bits("INIT", width.saturating_mul(size)).unwrap_or_default();

        let mut read = Vec::with_capacity(rd_ports);
        for i in 0..rd_ports {
            let transparent = if cell.parameter("RD_TRANSPARENCY_MASK").is_some() {
                (0..wr_ports).any(|w| bit_flag(cell, "RD_TRANSPARENCY_MASK", rd_ports * wr_ports, i * wr_ports + w))
            } else {
                bit_flag(cell, "RD_TRANSPARENT", rd_ports, i)
            };
            read.push(ReadPort {
                clock: bit_flag(cell, "RD_CLK_ENABLE", rd_ports, i)
                    .then(|| bit_flag(cell, "RD_CLK_POLARITY", rd_ports, i)),
                transparent,
                clk: port_slice(cell, "RD_CLK", i, 1)?,
                en: port_slice(cell, "RD_EN", i, 1).unwrap_or_else(|_| vec![BitRef::Const(ConstBit::One)]),
                addr: port_slice(cell, "RD_ADDR", i, abits)?,
                data: port_slice(cell, "RD_DATA", i, width)?,
            });
        }

        let mut write = Vec::with_capacity(wr_ports);
        for i in 0..wr_ports {
            write.push(WritePort {
                clock: bit_flag(cell, "WR_CLK_ENABLE", wr_ports, i)
                    .then(|| bit_flag(cell, "WR_CLK_POLARITY", wr_ports, i)),
                clk: port_slice(cell, "WR_CLK", i, 1)?,
                en: port_slice(cell, "WR_EN", i, width)?,
                addr: port_slice(cell, "WR_ADDR", i, abits)?,
                data: port_slice(cell, "WR_DATA", i, width)?,
            });
        }

        Ok(Self {
            width,
            abits,
            size,
            offset: cell.param_u64("OFFSET").and_then(|o| i64::try_from(o).ok()).unwrap_or(0),
            init: init_words(&init, width, size),
            read,
            write,
        })
    }

    fn from_port_cells(module: ModuleView<'_>, memid: &str, cells: &[CellView<'_>]) -> Result<Self, AdapterError> {
        let info = module.memory(memid).ok_or_else(|| {
            AdapterError::MissingField(format!("memory {} in module {}", memid, module.name()))
        })?;
        let field = |key: &str| {
            info.get(key)
                .and_then(parse_param_u64)
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| AdapterError::MissingField(format!("{} of memory {}", key, memid)))
        };
        let width = field("width")?;
        let size = field("size")?;

        let mut memory = MemorySpec {
            width,
            abits: address_bits(size),
            size,
            offset: info.get("start_offset").and_then(Value::as_i64).unwrap_or(0),
            init: vec!["x".repeat(width); size],
            ..Default::default()
        };

        for cell in cells {
            let clock = cell.param_bool("CLK_ENABLE").then(|| cell.param_bool("CLK_POLARITY"));
            let kind = cell.kind();
            // $meminit addresses are usually 32 bits wide whatever the memory size
            if kind.starts_with("$memrd") || kind.starts_with("$memwr") {
                if let Some(abits) = cell.param_u64("ABITS").and_then(|a| usize::try_from(a).ok()) {
                    memory.abits = memory.abits.max(abits);
                }
            }
            match kind {
                "$memrd" | "$memrd_v2" => memory.read.push(ReadPort {
                    clock,
                    transparent: cell.param_bool("TRANSPARENT")
                        || cell.param_bits("TRANSPARENCY_MASK", 1).is_some_and(|m| m.contains('1')),
                    clk: conn(cell, "CLK")?,
                    en: conn(cell, "EN")?,
                    addr: conn(cell, "ADDR")?,
                    data: conn(cell, "DATA")?,
                }),
                "$memwr" | "$memwr_v2" => memory.write.push(WritePort {
                    clock,
                    clk: conn(cell, "CLK")?,
                    en: conn(cell, "EN")?,
                    addr: conn(cell, "ADDR")?,
                    data: conn(cell, "DATA")?,
                }),
                _ => memory.apply_init(cell)?,
            }
        }
        Ok(memory)
    }

    /// A `$lut` as a one-bit ROM addressed by its inputs.
    fn from_lut(cell: &CellView<'_>) -> Result<Self, AdapterError> {
        let a = conn(cell, "A")?;
        let size = u32::try_from(a.len())
            .ok()
            .filter(|&n| n <= MAX_LUT_INPUTS)
            .map(|n| 1usize << n)
            .ok_or_else(|| AdapterError::InvalidData(format!("$lut {} has {} inputs", cell.name(), a.len())))?;
        let lut = cell.param_bits("LUT", size).unwrap_or_default();

        Ok(Self {
            width: 1,
            abits: a.len(),
            size,
            offset: 0,
            init: init_words(&lut, 1, size),
            read: vec![ReadPort {
                clock: None,
                transparent: false,
                clk: Vec::new(),
                en: Vec::new(),
                addr: a,
                data: conn(cell, "Y")?,
            }],
            write: Vec::new(),
        })
    }

    /// Copy a `$meminit` block into the initial contents.
    fn apply_init(&mut self, cell: &CellView<'_>) -> Result<(), AdapterError> {
        let not_constant = || {
            AdapterError::InvalidData(format!("address of {} ({}) is not constant", cell.name(), cell.kind()))
        };
        let addr = conn(cell, "ADDR")?
            .iter()
            .rev()
            .try_fold(0i64, |acc, bit| {
                let digit = match bit {
                    BitRef::Const(ConstBit::Zero) => 0,
                    BitRef::Const(ConstBit::One) => 1,
                    _ => return None,
                };
                acc.checked_mul(2)?.checked_add(digit)
            })
            .ok_or_else(not_constant)?;
        let Some(start) = addr.checked_sub(self.offset).and_then(|a| usize::try_from(a).ok()) else {
            tracing::warn!("Initializer {} lies below memory offset {}", cell.name(), self.offset);
            return Ok(());
        };

        for (k, word) in conn(cell, "DATA")?.chunks(self.width.max(1)).enumerate() {
            if let Some(slot) = self.init.get_mut(start + k) {
                *slot = word
                    .iter()
                    .rev()
                    .map(|bit| match bit {
                        BitRef::Const(c) => c.as_char(),
                        BitRef::Net(_) => 'x',
                    })
                    .collect();
            }
        }
        Ok(())
    }

    /// Initial words up to the last one with a known bit.
    fn memdata(&self) -> Option<Vec<&str>> {
        let used = self.init.iter().rposition(|word| word.chars().any(|c| c != 'x'))? + 1;
        Some(self.init[..used].iter().map(String::as_str).collect())
    }

    fn add_to(self, b: &mut ModuleBuilder, label: Option<&str>) -> Result<(), AdapterError> {
        let rdports: Vec<Value> = self
            .read
            .iter()
            .map(|port| match port.clock {
                Some(polarity) if port.transparent => {
                    json!({ "clock_polarity": polarity, "enable_polarity": true, "transparent": true })
                }
                Some(polarity) => json!({ "clock_polarity": polarity, "enable_polarity": true }),
                None => json!({}),
            })
            .collect();
        let wrports: Vec<Value> = self
            .write
            .iter()
            .map(|port| match port.clock {
                Some(polarity) => json!({ "clock_polarity": polarity, "enable_polarity": true }),
                None => json!({ "enable_polarity": true }),
            })
            .collect();

        let mut device = Device::new(DeviceKind::Memory)
            .with_width(self.width)
            .with_param("abits", json!(self.abits))
            .with_param("words", json!(self.size))
            .with_param("offset", json!(self.offset))
            .with_param("rdports", Value::Array(rdports))
            .with_param("wrports", Value::Array(wrports));
        if let Some(memdata) = self.memdata() {
            device = device.with_param("memdata", json!(memdata));
        }
        if let Some(label) = label {
            device = device.with_label(label);
        }
        let id = b.add_device(device);

        for (i, port) in self.read.into_iter().enumerate() {
            if port.clock.is_some() {
                b.consume(&id, &format!("rd{}clk", i), port.clk);
                b.consume(&id, &format!("rd{}en", i), port.en);
            }
            b.consume_extended(&id, &format!("rd{}addr", i), port.addr, self.abits, false);
            b.drive(&id, &format!("rd{}data", i), &port.data);
        }
        for (i, port) in self.write.into_iter().enumerate() {
            // digitaljs enables a whole word at a time
            let en = common_bit(&port.en).ok_or_else(|| {
                AdapterError::InvalidData(format!("write port {} of memory {} has per-bit enables", i, id))
            })?;
            if port.clock.is_some() {
                b.consume(&id, &format!("wr{}clk", i), port.clk);
            }
            b.consume(&id, &format!("wr{}en", i), vec![en]);
            b.consume_extended(&id, &format!("wr{}addr", i), port.addr, self.abits, false);
            b.consume(&id, &format!("wr{}data", i), port.data);
        }
        Ok(())
    }
}

const MAX_LUT_INPUTS: u32 = 16;

fn param_usize(cell: &CellView<'_>, name: &str) -> Result<usize, AdapterError> {
    cell.param_u64(name)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| {
            AdapterError::MissingField(format!("parameter {} of cell {} ({})", name, cell.name(), cell.kind()))
        })
}

/// Bit `index` of a per-port flag parameter.
fn bit_flag(cell: &CellView<'_>, name: &str, count: usize, index: usize) -> bool {
    cell.param_bits(name, count)
        .and_then(|bits| {
            let pos = bits.len().checked_sub(index + 1)?;
            bits.as_bytes().get(pos).copied()
        })
        == Some(b'1')
}

/// Bits `index * width ..` of a port shared by several memory ports.
fn port_slice(cell: &CellView<'_>, port: &str, index: usize, width: usize) -> Result<Vec<BitRef>, AdapterError> {
    let bits = cell.connection(port)?.unwrap_or_default();
    bits.get(index * width..(index + 1) * width)
        .map(<[BitRef]>::to_vec)
        .ok_or_else(|| {
            AdapterError::InvalidData(format!(
                "port {} of memory cell {} has {} bits, too few for port {} of width {}",
                port,
                cell.name(),
                bits.len(),
                index,
                width
            ))
        })
}

/// Split an MSB-first `size * width` bit string into words, word 0 taken
/// from the low end. Missing bits read as `x`.
fn init_words(bits: &str, width: usize, size: usize) -> Vec<String> {
    let bits = bits.as_bytes();
    (0..size)
        .map(|word| {
            (0..width)
                .rev()
                .map(|j| {
                    let pos = bits.len().checked_sub(word * width + j + 1);
                    pos.and_then(|p| bits.get(p)).map_or('x', |&c| char::from(c))
                })
                .collect()
        })
        .collect()
}

fn address_bits(size: usize) -> usize {
    (usize::BITS - size.saturating_sub(1).leading_zeros()) as usize
}

fn common_bit(bits: &[BitRef]) -> Option<BitRef> {
    let (first, rest) = bits.split_first()?;
    rest.iter().all(|bit| bit == first).then_some(*first)
}

/// Two-operand device with `in1`/`in2` and an `out` port.
///
/// Comparisons drive a single result bit; the rest of Y is tied to zero.
fn binary_arith(
    b: &mut ModuleBuilder,
    cell: &CellView<'_>,
    device: Device,
    full_output: bool,
    keep_signed: bool,
) -> Result<(), AdapterError> {
    let a = conn(cell, "A")?;
    let bb = conn(cell, "B")?;
    let y = conn(cell, "Y")?;

    let mut device = if full_output {
        device.with_bits(Bits::ports([("in1", a.len()), ("in2", bb.len()), ("out", y.len())]))
    } else {
        device.with_bits(Bits::ports([("in1", a.len()), ("in2", bb.len())]))
    };
    if !keep_signed {
        device = device.with_param(
            "signed",
            json!({ "in1": cell.param_bool("A_SIGNED"), "in2": cell.param_bool("B_SIGNED") }),
        );
    }

    let id = b.add_device(labelled(device, cell));
    b.consume(&id, "in1", a);
    b.consume(&id, "in2", bb);
    if full_output {
        b.drive(&id, "out", &y);
    } else {
        b.drive_bool(&id, "out", &y);
    }
    Ok(())
}

fn conn(cell: &CellView<'_>, port: &str) -> Result<Vec<BitRef>, AdapterError> {
    cell.connection(port)?.ok_or_else(|| {
        AdapterError::MissingField(format!("port {} of cell {} ({})", port, cell.name(), cell.kind()))
    })
}

/// User-named cells keep their name as the device label.
fn labelled_name<'a>(cell: &CellView<'a>) -> Option<&'a str> {
    Some(cell.name()).filter(|name| !name.starts_with('$'))
}

fn labelled(device: Device, cell: &CellView<'_>) -> Device {
    match labelled_name(cell) {
        Some(name) => device.with_label(name),
        None => device,
    }
}

/// Where one bit comes from
#[derive(Debug, Clone)]
enum BitSource {
    Port { endpoint: Endpoint, index: usize, width: usize },
    Const(ConstBit),
}

/// A run of consecutive bits from one source
#[derive(Debug)]
enum Segment {
    Port { endpoint: Endpoint, first: usize, count: usize, width: usize },
    Const(Vec<ConstBit>),
}

impl Segment {
    fn len(&self) -> usize {
        match self {
            Segment::Port { count, .. } => *count,
            Segment::Const(bits) => bits.len(),
        }
    }
}

/// Per-module device and wiring accumulator
struct ModuleBuilder {
    circuit: Circuit,
    next_id: usize,
    drivers: HashMap<u64, BitSource>,
    outputs: HashMap<Vec<BitRef>, Endpoint>,
    pending: Vec<(Endpoint, Vec<BitRef>)>,
    net_names: HashMap<Vec<BitRef>, String>,
    module: String,
}

impl ModuleBuilder {
    fn new(module: ModuleView<'_>) -> Result<Self, AdapterError> {
        // First visible name wins; generated names only fill gaps.
        let mut named: HashMap<Vec<BitRef>, (String, bool)> = HashMap::new();
        for (name, bits, hidden) in module.netnames()? {
            if bits.is_empty() {
                continue;
            }
            let replace = match named.get(&bits) {
                None => true,
                Some((_, was_hidden)) => *was_hidden && !hidden,
            };
            if replace {
                named.insert(bits, (name.to_string(), hidden));
            }
        }

        Ok(Self {
            circuit: Circuit::default(),
            next_id: 0,
            drivers: HashMap::new(),
            outputs: HashMap::new(),
            pending: Vec::new(),
            net_names: named.into_iter().map(|(bits, (name, _))| (bits, name)).collect(),
            module: module.name().to_string(),
        })
    }

    fn add_device(&mut self, device: Device) -> String {
        let id = format!("dev{}", self.next_id);
        self.next_id += 1;
        self.circuit.devices.insert(id.clone(), device);
        id
    }

    /// Record `bits` as driven by output `port` of device `id`.
    fn drive(&mut self, id: &str, port: &str, bits: &[BitRef]) {
        let endpoint = Endpoint::new(id, port);
        for (index, bit) in bits.iter().enumerate() {
            if let Some(net) = bit.net() {
                let source = BitSource::Port {
                    endpoint: endpoint.clone(),
                    index,
                    width: bits.len(),
                };
                if self.drivers.insert(net, source).is_some() {
                    tracing::warn!("Net bit {} in module {} has several drivers", net, self.module);
                }
            }
        }
        self.outputs.insert(bits.to_vec(), endpoint);
    }

    /// Drive the first bit of `bits` from a 1-bit port and tie the rest to 0.
    fn drive_bool(&mut self, id: &str, port: &str, bits: &[BitRef]) {
        let Some((first, rest)) = bits.split_first() else {
            return;
        };
        self.drive(id, port, std::slice::from_ref(first));
        for net in rest.iter().filter_map(|bit| bit.net()) {
            self.drivers.insert(net, BitSource::Const(ConstBit::Zero));
        }
    }

    /// Request `bits` at input `port` of device `id`; wired up in `finish`.
    fn consume(&mut self, id: &str, port: &str, bits: Vec<BitRef>) {
        self.pending.push((Endpoint::new(id, port), bits));
    }

    /// Like `consume`, but sized to `width` through an extender or truncation.
    fn consume_extended(&mut self, id: &str, port: &str, mut bits: Vec<BitRef>, width: usize, signed: bool) {
        if bits.len() >= width {
            bits.truncate(width);
            self.consume(id, port, bits);
            return;
        }

        let kind = if signed { DeviceKind::SignExtend } else { DeviceKind::ZeroExtend };
        let extender = Device::new(kind).with_param("extend", json!({ "input": bits.len(), "output": width }));
        let ext_id = self.add_device(extender);
        self.consume(&ext_id, "in", bits);
        self.connect(Endpoint::new(ext_id, "out"), Endpoint::new(id, port), None);
    }

    /// Reduce a vector to one bit with `OrReduce` when it is wider than 1.
    fn consume_bool(&mut self, id: &str, port: &str, bits: Vec<BitRef>) {
        if bits.len() <= 1 {
            self.consume(id, port, bits);
            return;
        }
        let reduce_id = self.add_device(Device::new(DeviceKind::OrReduce).with_width(bits.len()));
        self.consume(&reduce_id, "in", bits);
        self.connect(Endpoint::new(reduce_id, "out"), Endpoint::new(id, port), None);
    }

    fn connect(&mut self, from: Endpoint, to: Endpoint, name: Option<String>) {
        self.circuit.connectors.push(Connector { from, to, name });
    }

    fn finish(mut self) -> Circuit {
        let pending = std::mem::take(&mut self.pending);
        for (target, bits) in pending {
            if bits.is_empty() {
                continue;
            }
            let source = self.source_for(&bits);
            let name = self.net_names.get(&bits).cloned();
            self.connect(source, target, name);
        }
        self.circuit
    }

    /// An output endpoint carrying exactly `bits`, synthesizing glue devices as needed.
    fn source_for(&mut self, bits: &[BitRef]) -> Endpoint {
        if let Some(endpoint) = self.outputs.get(bits) {
            return endpoint.clone();
        }

        let mut segments = self.segments(bits);
        let endpoint = if segments.len() == 1 {
            let segment = segments.remove(0);
            self.segment_source(segment)
        } else {
            let groups: Vec<usize> = segments.iter().map(Segment::len).collect();
            let group_id = self.add_device(
                Device::new(DeviceKind::BusGroup).with_param("groups", json!(groups)),
            );
            let mut offset = 0;
            for (i, segment) in segments.into_iter().enumerate() {
                let piece = bits[offset..offset + segment.len()].to_vec();
                offset += segment.len();
                let from = self.segment_source(segment);
                let name = self.net_names.get(&piece).cloned();
                self.connect(from, Endpoint::new(group_id.clone(), format!("in{}", i)), name);
            }
            Endpoint::new(group_id, "out")
        };

        self.outputs.insert(bits.to_vec(), endpoint.clone());
        endpoint
    }

    fn segment_source(&mut self, segment: Segment) -> Endpoint {
        match segment {
            Segment::Port { endpoint, first, count, width } if first == 0 && count == width => endpoint,
            Segment::Port { endpoint, first, count, width } => {
                let slice = Device::new(DeviceKind::BusSlice)
                    .with_param("slice", json!({ "first": first, "count": count, "total": width }));
                let slice_id = self.add_device(slice);
                self.connect(endpoint, Endpoint::new(slice_id.clone(), "in"), None);
                Endpoint::new(slice_id, "out")
            }
            Segment::Const(bits) => {
                // digitaljs constants are written MSB first.
                let text: String = bits.iter().rev().map(|b| b.as_char()).collect();
                let constant = Device::new(DeviceKind::Constant).with_param("constant", Value::String(text));
                let id = self.add_device(constant);
                Endpoint::new(id, "out")
            }
        }
    }

    /// Split `bits` into maximal runs of consecutive bits from one source.
    fn segments(&self, bits: &[BitRef]) -> Vec<Segment> {
        let mut segments: Vec<Segment> = Vec::new();

        for bit in bits {
            let source = match bit {
                BitRef::Const(c) => BitSource::Const(*c),
                BitRef::Net(net) => match self.drivers.get(net) {
                    Some(source) => source.clone(),
                    None => {
                        tracing::debug!("Net bit {} in module {} is undriven", net, self.module);
                        BitSource::Const(ConstBit::X)
                    }
                },
            };

            let extended = match (segments.last_mut(), &source) {
                (Some(Segment::Const(run)), BitSource::Const(c)) => {
                    run.push(*c);
                    true
                }
                (
                    Some(Segment::Port { endpoint, first, count, .. }),
                    BitSource::Port { endpoint: e, index, .. },
                ) if endpoint == e && *first + *count == *index => {
                    *count += 1;
                    true
                }
                _ => false,
            };
            if extended {
                continue;
            }

            segments.push(match source {
                BitSource::Const(c) => Segment::Const(vec![c]),
                BitSource::Port { endpoint, index, width } => Segment::Port {
                    endpoint,
                    first: index,
                    count: 1,
                    width,
                },
            });
        }

        segments
    }
}
