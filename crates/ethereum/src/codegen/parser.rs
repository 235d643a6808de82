//! Ethereum ABI parser
//!
//! Reads contract ABI JSON documents and keeps the event definitions. Every
//! other item kind (functions, constructors, errors, fallback and receive) is
//! skipped since it never produces stored data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use abi_schema_core::{Error, Result};

/// Events declared by one contract ABI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractAbi {
    /// Contract events in declaration order
    pub events: Vec<AbiEvent>,
    /// Number of non-event items that were skipped
    pub skipped_items: usize,
}

/// ABI event definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiEvent {
    /// Event name
    pub name: String,
    /// Event inputs
    pub inputs: Vec<AbiParameter>,
    /// Whether event is anonymous
    pub anonymous: bool,
}

/// ABI parameter definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiParameter {
    /// Parameter name, possibly empty
    pub name: String,
    /// Raw parameter type (e.g., uint256, address[], tuple[3])
    pub param_type: String,
    /// Internal type (for structs and custom types)
    pub internal_type: Option<String>,
    /// Components (for tuples and structs)
    pub components: Option<Vec<AbiParameter>>,
    /// Whether parameter is indexed
    pub indexed: bool,
}

/// Ethereum ABI parser
pub struct AbiParser;

impl AbiParser {
    /// Create a new parser instance
    pub fn new() -> Self {
        Self
    }

    /// Parse an Ethereum ABI file
    pub fn parse_file<P: AsRef<std::path::Path>>(&self, file_path: P) -> Result<ContractAbi> {
        let file_path = file_path.as_ref();
        let content = std::fs::read_to_string(file_path).map_err(|e| {
            Error::parse(format!("Failed to read ABI file {}: {}", file_path.display(), e))
        })?;
        self.parse_content(&content)
    }

    /// Parse Ethereum ABI from JSON content
    pub fn parse_content(&self, content: &str) -> Result<ContractAbi> {
        let value: Value = serde_json::from_str(content)?;
        self.parse_abi(&value)
    }

    /// Parse ABI from JSON value
    ///
    /// Accepts either a bare item array or an artifact object with an `abi` field,
    /// which is how Hardhat and Foundry write their build output.
    pub fn parse_abi(&self, value: &Value) -> Result<ContractAbi> {
        let abi_array = value
            .as_array()
            .or_else(|| value.get("abi").and_then(|v| v.as_array()))
            .ok_or_else(|| Error::parse("ABI must be an array"))?;

        let mut abi = ContractAbi::default();

        for item in abi_array {
            let item_type = item.get("type").and_then(|v| v.as_str()).unwrap_or("function");

            if item_type == "event" {
                abi.events.push(Self::parse_event(item)?);
            } else {
                abi.skipped_items += 1;
            }
        }

        debug!(
            "Parsed ABI with {} events ({} other items skipped)",
            abi.events.len(),
            abi.skipped_items
        );

        Ok(abi)
    }

    /// Parse an event from ABI
    fn parse_event(value: &Value) -> Result<AbiEvent> {
        let name = value
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::parse("Event must have a name"))?
            .to_string();

        let inputs = value
            .get("inputs")
            .and_then(|v| v.as_array())
            .map(|arr| Self::parse_parameters(arr, &name))
            .transpose()?
            .unwrap_or_default();

        let anonymous = value.get("anonymous").and_then(|v| v.as_bool()).unwrap_or(false);

        Ok(AbiEvent {
            name,
            inputs,
            anonymous,
        })
    }

    /// Parse event parameters and their tuple components
    fn parse_parameters(array: &[Value], owner: &str) -> Result<Vec<AbiParameter>> {
        let mut parameters = Vec::with_capacity(array.len());

        for param in array {
            let name = param.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();

            let param_type = param
                .get("type")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::parse(format!("Parameter of '{}' must have a type", owner)))?
                .to_string();

            let internal_type = param
                .get("internalType")
                .and_then(|v| v.as_str())
                .map(String::from);

            let indexed = param.get("indexed").and_then(|v| v.as_bool()).unwrap_or(false);

            let components = if param_type.starts_with("tuple") {
                param
                    .get("components")
                    .and_then(|v| v.as_array())
                    .map(|arr| Self::parse_parameters(arr, owner))
                    .transpose()?
            } else {
                None
            };

            parameters.push(AbiParameter {
                name,
                param_type,
                internal_type,
                components,
                indexed,
            });
        }

        Ok(parameters)
    }
}

impl Default for AbiParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_events_are_kept() {
        let abi = AbiParser::new()
            .parse_content(
                r#"[
                  {"type": "constructor", "inputs": []},
                  {"type": "function", "name": "totalSupply", "inputs": [], "outputs": []},
                  {"type": "error", "name": "Unauthorized", "inputs": []},
                  {"type": "event", "name": "Paused", "inputs": [], "anonymous": false}
                ]"#,
            )
            .unwrap();

        assert_eq!(abi.events.len(), 1);
        assert_eq!(abi.events[0].name, "Paused");
        assert_eq!(abi.skipped_items, 3);
    }

    #[test]
    fn test_nested_components_are_parsed() {
        let abi = AbiParser::new()
            .parse_content(
                r#"[{
                  "type": "event",
                  "name": "OrderFilled",
                  "inputs": [{
                    "name": "order",
                    "type": "tuple",
                    "indexed": false,
                    "internalType": "struct Order",
                    "components": [
                      {"name": "maker", "type": "address"},
                      {"name": "legs", "type": "tuple[]", "components": [
                        {"name": "amount", "type": "uint256"}
                      ]}
                    ]
                  }]
                }]"#,
            )
            .unwrap();

        let order = &abi.events[0].inputs[0];
        assert_eq!(order.internal_type.as_deref(), Some("struct Order"));
        let components = order.components.as_ref().unwrap();
        assert_eq!(components.len(), 2);
        assert_eq!(components[1].components.as_ref().unwrap()[0].name, "amount");
    }

    #[test]
    fn test_artifact_object_is_accepted() {
        let abi = AbiParser::new()
            .parse_content(r#"{"contractName": "Token", "abi": [{"type": "event", "name": "Ping", "inputs": []}]}"#)
            .unwrap();
        assert_eq!(abi.events.len(), 1);
    }

    #[test]
    fn test_malformed_documents_fail() {
        let parser = AbiParser::new();
        assert!(parser.parse_content(r#"{"not": "an abi"}"#).is_err());
        assert!(parser.parse_content(r#"[{"type": "event", "inputs": []}]"#).is_err());
        assert!(parser
            .parse_content(r#"[{"type": "event", "name": "X", "inputs": [{"name": "a"}]}]"#)
            .is_err());
    }
}
