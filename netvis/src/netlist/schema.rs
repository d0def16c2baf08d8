//! Read-only typed views over Yosys JSON modules, ports and cells.
//!
//! Yosys writes bit references as integers (net ids) or the strings `"0"`,
//! `"1"`, `"x"` and `"z"`. Parameters are either integers or binary strings,
//! most significant bit first.

use serde_json::{Map, Value};

use super::{json_kind, NetlistError};

/// A constant bit in a signal vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstBit {
    Zero,
    One,
    X,
    Z,
}

impl ConstBit {
    pub fn as_char(self) -> char {
        match self {
            ConstBit::Zero => '0',
            ConstBit::One => '1',
            ConstBit::X => 'x',
            ConstBit::Z => 'z',
        }
    }
}

/// One bit of a signal: either a net id or a constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitRef {
    Net(u64),
    Const(ConstBit),
}

impl BitRef {
    pub fn parse(value: &Value) -> Result<Self, NetlistError> {
        match value {
            Value::Number(n) => n.as_u64().map(BitRef::Net).ok_or_else(|| {
                NetlistError::InvalidShape(format!("bit index {} is not a net id", n))
            }),
            Value::String(s) => match s.as_str() {
                "0" => Ok(BitRef::Const(ConstBit::Zero)),
                "1" => Ok(BitRef::Const(ConstBit::One)),
                "x" => Ok(BitRef::Const(ConstBit::X)),
                "z" => Ok(BitRef::Const(ConstBit::Z)),
                other => Err(NetlistError::InvalidShape(format!(
                    "unknown constant bit {:?}",
                    other
                ))),
            },
            other => Err(NetlistError::InvalidShape(format!(
                "bit must be a number or a string, found {}",
                json_kind(other)
            ))),
        }
    }

    pub fn net(self) -> Option<u64> {
        match self {
            BitRef::Net(id) => Some(id),
            BitRef::Const(_) => None,
        }
    }
}

fn parse_bits(value: &Value, what: &str) -> Result<Vec<BitRef>, NetlistError> {
    let Value::Array(bits) = value else {
        return Err(NetlistError::InvalidShape(format!(
            "{} must be an array of bits, found {}",
            what,
            json_kind(value)
        )));
    };
    bits.iter().map(BitRef::parse).collect()
}

/// Port direction as written by Yosys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
    InOut,
}

impl PortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "input" => Some(PortDirection::Input),
            "output" => Some(PortDirection::Output),
            "inout" => Some(PortDirection::InOut),
            _ => None,
        }
    }
}

/// A module port with its bit vector (LSB first)
#[derive(Debug, Clone, PartialEq)]
pub struct PortView<'a> {
    pub name: &'a str,
    pub direction: PortDirection,
    pub bits: Vec<BitRef>,
}

/// Borrowed view of one module
#[derive(Debug, Clone, Copy)]
pub struct ModuleView<'a> {
    name: &'a str,
    value: &'a Value,
}

impl<'a> ModuleView<'a> {
    pub(crate) fn new(name: &'a str, value: &'a Value) -> Self {
        Self { name, value }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&'a Value> {
        self.value.get("attributes").and_then(|a| a.get(key))
    }

    /// Yosys marks the top module with a non-zero `top` attribute.
    pub fn is_top(&self) -> bool {
        self.attribute("top").and_then(parse_param_u64).unwrap_or(0) != 0
    }

    /// Ports in declaration order.
    pub fn ports(&self) -> Result<Vec<PortView<'a>>, NetlistError> {
        let Some(ports) = self.value.get("ports").and_then(Value::as_object) else {
            return Ok(Vec::new());
        };

        ports
            .iter()
            .map(|(name, port)| {
                let direction = port
                    .get("direction")
                    .and_then(Value::as_str)
                    .and_then(PortDirection::parse)
                    .ok_or_else(|| {
                        NetlistError::InvalidShape(format!(
                            "port {}.{} has no valid direction",
                            self.name, name
                        ))
                    })?;
                let bits = port
                    .get("bits")
                    .map(|b| parse_bits(b, "port bits"))
                    .transpose()?
                    .unwrap_or_default();
                Ok(PortView {
                    name: name.as_str(),
                    direction,
                    bits,
                })
            })
            .collect()
    }

    /// Cells in document order.
    pub fn cells(&self) -> impl Iterator<Item = CellView<'a>> {
        self.value
            .get("cells")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|cells| cells.iter())
            .map(|(name, value)| CellView {
                name: name.as_str(),
                value,
            })
    }

    /// Entry of the `memories` section, which sizes `$memrd`/`$memwr` cells
    /// sharing one `MEMID`.
    pub fn memory(&self, id: &str) -> Option<&'a Value> {
        self.value.get("memories").and_then(|m| m.get(id))
    }

    /// Named nets as (name, bits, hidden) triples.
    pub fn netnames(&self) -> Result<Vec<(&'a str, Vec<BitRef>, bool)>, NetlistError> {
        let Some(netnames) = self.value.get("netnames").and_then(Value::as_object) else {
            return Ok(Vec::new());
        };

        netnames
            .iter()
            .map(|(name, net)| {
                let bits = net
                    .get("bits")
                    .map(|b| parse_bits(b, "netname bits"))
                    .transpose()?
                    .unwrap_or_default();
                let hidden = net.get("hide_name").and_then(parse_param_u64).unwrap_or(0) != 0;
                Ok((name.as_str(), bits, hidden))
            })
            .collect()
    }
}

/// Borrowed view of one cell
#[derive(Debug, Clone, Copy)]
pub struct CellView<'a> {
    name: &'a str,
    value: &'a Value,
}

impl<'a> CellView<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn kind(&self) -> &'a str {
        self.value.get("type").and_then(Value::as_str).unwrap_or("")
    }

    pub fn parameter(&self, name: &str) -> Option<&'a Value> {
        self.value.get("parameters").and_then(|p| p.get(name))
    }

    /// Integer parameter, or `None` when absent or not an integer.
    pub fn param_u64(&self, name: &str) -> Option<u64> {
        self.parameter(name).and_then(parse_param_u64)
    }

    pub fn param_str(&self, name: &str) -> Option<&'a str> {
        self.parameter(name).and_then(Value::as_str)
    }

    pub fn param_bool(&self, name: &str) -> bool {
        self.param_u64(name).unwrap_or(0) != 0
    }

    /// Constant parameter as a bit string, MSB first.
    pub fn param_bits(&self, name: &str, width: usize) -> Option<String> {
        match self.parameter(name)? {
            Value::String(s) if is_bit_string(s) => Some(s.clone()),
            Value::Number(n) => n.as_u64().map(|v| {
                let digits = format!("{:b}", v);
                if digits.len() >= width {
                    digits[digits.len() - width..].to_string()
                } else {
                    format!("{}{}", "0".repeat(width - digits.len()), digits)
                }
            }),
            _ => None,
        }
    }

    fn connections_map(&self) -> Option<&'a Map<String, Value>> {
        self.value.get("connections").and_then(Value::as_object)
    }

    /// Port names in the order Yosys wrote them.
    pub fn port_names(&self) -> Vec<&'a str> {
        self.connections_map()
            .map(|c| c.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn connection(&self, port: &str) -> Result<Option<Vec<BitRef>>, NetlistError> {
        self.connections_map()
            .and_then(|c| c.get(port))
            .map(|bits| parse_bits(bits, "cell connection"))
            .transpose()
    }

    pub fn port_direction(&self, port: &str) -> Option<PortDirection> {
        self.value
            .get("port_directions")
            .and_then(|d| d.get(port))
            .and_then(Value::as_str)
            .and_then(PortDirection::parse)
    }
}

fn is_bit_string(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| matches!(c, '0' | '1' | 'x' | 'z'))
}

/// Parse an integer-valued parameter or attribute.
///
/// Binary strings wider than 64 bits keep their low 64 bits.
pub fn parse_param_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c == '0' || c == '1') => {
            let low = if s.len() > 64 { &s[s.len() - 64..] } else { s.as_str() };
            u64::from_str_radix(low, 2).ok()
        }
        _ => None,
    }
}
