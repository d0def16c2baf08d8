//! Netlist loading from strings, byte buffers and readers.

use std::io::Read;
use std::str::FromStr;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{Netlist, NetlistError};

impl FromStr for Netlist {
    type Err = NetlistError;

    fn from_str(json: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }
}

impl Netlist {
    /// Parse a netlist from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, NetlistError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Read a whole netlist document from a blocking reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, NetlistError> {
        let value: Value = serde_json::from_reader(reader)?;
        Self::from_value(value)
    }

    /// Read the input to its end, then parse it.
    ///
    /// Nothing is parsed before the stream is exhausted, so a truncated pipe
    /// surfaces as a JSON error rather than a partially read design.
    pub async fn read_from<R>(mut reader: R) -> Result<Self, NetlistError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = Vec::new();
        let read = reader.read_to_end(&mut buffer).await?;
        tracing::debug!("Read {} bytes of netlist JSON", read);
        Self::from_slice(&buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"{
        "creator": "Yosys 0.40",
        "modules": {
            "top": {
                "attributes": { "top": "00000000000000000000000000000001" },
                "ports": { "a": { "direction": "input", "bits": [ 2 ] } },
                "cells": {}
            }
        }
    }"#;

    #[test]
    fn test_parse_from_str() {
        let netlist: Netlist = SMALL.parse().expect("Should parse");
        assert_eq!(netlist.module_count(), 1);
        assert_eq!(netlist.as_value()["creator"], "Yosys 0.40");
    }

    #[test]
    fn test_malformed_json_is_a_json_error() {
        let err = "{ \"modules\": ".parse::<Netlist>().unwrap_err();
        assert!(matches!(err, NetlistError::Json(_)));
    }

    #[test]
    fn test_from_reader_matches_from_slice() {
        let a = Netlist::from_reader(SMALL.as_bytes()).unwrap();
        let b = Netlist::from_slice(SMALL.as_bytes()).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_read_from_async_reader() {
        let netlist = Netlist::read_from(SMALL.as_bytes()).await.unwrap();
        assert!(netlist.module("top").is_some());
    }

    #[test]
    fn test_huge_integers_keep_their_digits() {
        let json = r#"{ "modules": { "m": { "parameters": { "P": 123456789012345678901234567890 } } } }"#;
        let netlist: Netlist = json.parse().unwrap();
        let text = serde_json::to_string(netlist.as_value()).unwrap();
        assert!(text.contains("123456789012345678901234567890"));
    }
}
