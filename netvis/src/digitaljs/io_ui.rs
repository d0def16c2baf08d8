//! Default IO widgets for the top-level ports.
//!
//! digitaljs draws plain `Input`/`Output` devices as bare pins; replacing
//! them with buttons, lamps and number fields makes the page usable as a
//! simulator. Subcircuit definitions keep plain IO devices, which is what
//! digitaljs maps instance ports onto.

use serde_json::json;

use super::{Circuit, DeviceKind};

/// Inputs with these names become free-running clocks.
const CLOCK_NAMES: [&str; 2] = ["clk", "clock"];

/// Clock half-period in simulation ticks.
const CLOCK_PROPAGATION: u64 = 100;

pub fn attach_io_ui(circuit: &mut Circuit) {
    for device in circuit.devices.values_mut() {
        if !matches!(device.kind, DeviceKind::Input | DeviceKind::Output) {
            continue;
        }
        device.label = device.net.clone();

        let width = device.bits.as_ref().and_then(|b| b.width()).unwrap_or(1);
        device.kind = match device.kind {
            DeviceKind::Input
                if width == 1
                    && device
                        .label
                        .as_deref()
                        .is_some_and(|l| CLOCK_NAMES.contains(&l)) =>
            {
                device.bits = None;
                device
                    .params
                    .insert("propagation".to_string(), json!(CLOCK_PROPAGATION));
                DeviceKind::Clock
            }
            DeviceKind::Input if width == 1 => DeviceKind::Button,
            DeviceKind::Input => DeviceKind::NumEntry,
            _ if width == 1 => DeviceKind::Lamp,
            _ => DeviceKind::NumDisplay,
        };
    }
}
