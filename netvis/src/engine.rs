//! Rendering engine selection

use std::fmt;
use std::str::FromStr;

use crate::core::NetvisError;

/// The in-browser library that draws the circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    /// Interactive simulation view. Needs the netlist adapted to a circuit model.
    DigitalJs,
    /// Static schematic view drawn straight from the netlist.
    NetlistSvg,
}

impl Engine {
    pub const ALL: [Engine; 2] = [Engine::DigitalJs, Engine::NetlistSvg];

    pub fn as_str(self) -> &'static str {
        match self {
            Engine::DigitalJs => "digitaljs",
            Engine::NetlistSvg => "netlistsvg",
        }
    }

    /// Whether the engine consumes a digitaljs circuit model instead of the netlist.
    pub fn needs_model_adapter(self) -> bool {
        matches!(self, Engine::DigitalJs)
    }

    /// Accepted names, quoted and comma separated.
    pub fn expected_names() -> String {
        Self::ALL
            .iter()
            .map(|e| format!("\"{}\"", e.as_str()))
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = NetvisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| NetvisError::UnsupportedEngine {
                name: s.to_string(),
                expected: Self::expected_names(),
            })
    }
}
