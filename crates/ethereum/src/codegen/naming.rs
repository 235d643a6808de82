//! Deterministic names for generated entities
//!
//! Every name is a pure function of a field name and the event fingerprint, so
//! a parent and its child compute the same identifiers independently. No
//! registry is consulted.

use std::fmt;

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use abi_schema_core::config::{MAX_FINGERPRINT_WIDTH, MIN_FINGERPRINT_WIDTH};
use abi_schema_core::{Error, Result};

use super::event::EventDescriptor;

/// Joins the semantic part of a name and the fingerprint
pub const NAME_SEPARATOR: &str = "_";

/// Short hex hash of an event's canonical signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash outputs for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSignature {
    /// `Name(type,...)` with tuples expanded
    pub canonical: String,
    /// Full Keccak-256 of the canonical signature, `0x`-prefixed
    pub topic: String,
    pub fingerprint: Fingerprint,
}

/// Keccak-256 based signature hasher with a fixed fingerprint width
#[derive(Debug, Clone)]
pub struct SignatureHasher {
    width: usize,
}

impl SignatureHasher {
    /// Create a hasher producing fingerprints of `width` hex characters
    pub fn new(width: usize) -> Result<Self> {
        if !(MIN_FINGERPRINT_WIDTH..=MAX_FINGERPRINT_WIDTH).contains(&width) {
            return Err(Error::config(format!(
                "Fingerprint width must be between {} and {}, got {}",
                MIN_FINGERPRINT_WIDTH, MAX_FINGERPRINT_WIDTH, width
            )));
        }
        Ok(Self { width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Hash an event's canonical signature
    pub fn sign(&self, event: &EventDescriptor) -> EventSignature {
        let canonical = event.canonical_signature();
        let digest = hex::encode(Keccak256::digest(canonical.as_bytes()));

        EventSignature {
            fingerprint: Fingerprint(digest[..self.width].to_string()),
            topic: format!("0x{}", digest),
            canonical,
        }
    }
}

/// Entity (type) name: PascalCase field name plus fingerprint
pub fn entity_name(field_name: &str, fingerprint: &Fingerprint) -> String {
    format!("{}{}{}", field_name.to_case(Case::Pascal), NAME_SEPARATOR, fingerprint)
}

/// Table name: snake_case field name plus fingerprint
pub fn table_name(field_name: &str, fingerprint: &Fingerprint) -> String {
    format!("{}{}{}", field_name.to_case(Case::Snake), NAME_SEPARATOR, fingerprint)
}

/// Column name for a field
pub fn column_name(field_name: &str) -> String {
    field_name.to_case(Case::Snake)
}

/// Column on a child table holding its parent's identity
pub fn back_reference_column(parent_table: &str) -> String {
    format!("{}_id", parent_table)
}

/// Foreign key constraint from a child table to its parent
pub fn foreign_key_name(child_table: &str, parent_table: &str) -> String {
    format!("fk_{}_{}", child_table, parent_table)
}

/// Index supporting a foreign key column
pub fn index_name(table: &str, column: &str) -> String {
    format!("idx_{}_{}", table, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::event::FieldDescriptor;
    use crate::codegen::types::classify;

    fn fingerprint(s: &str) -> Fingerprint {
        Fingerprint(s.to_string())
    }

    fn transfer() -> EventDescriptor {
        let field = |name: &str, ty: &str| FieldDescriptor {
            name: name.to_string(),
            ty: classify(ty).unwrap(),
            components: Vec::new(),
            indexed: false,
        };
        EventDescriptor {
            name: "Transfer".to_string(),
            fields: vec![field("from", "address"), field("to", "address"), field("value", "uint256")],
            anonymous: false,
        }
    }

    #[test]
    fn test_names_follow_case_conventions() {
        let fp = fingerprint("ddf252ad");
        assert_eq!(entity_name("tokenIds", &fp), "TokenIds_ddf252ad");
        assert_eq!(table_name("tokenIds", &fp), "token_ids_ddf252ad");
        assert_eq!(column_name("tokenId"), "token_id");
        assert_eq!(back_reference_column("transfer_ddf252ad"), "transfer_ddf252ad_id");
    }

    #[test]
    fn test_same_inputs_same_names() {
        let fp = fingerprint("0a1b2c3d");
        assert_eq!(table_name("order", &fp), table_name("order", &fp.clone()));
        assert_eq!(entity_name("order", &fp), entity_name("order", &fp.clone()));
    }

    #[test]
    fn test_different_fingerprints_different_names() {
        let a = fingerprint("0a1b2c3d");
        let b = fingerprint("0a1b2c3e");
        assert_ne!(table_name("order", &a), table_name("order", &b));
        assert_ne!(entity_name("order", &a), entity_name("order", &b));
    }

    #[test]
    fn test_transfer_topic_matches_erc20() {
        let hasher = SignatureHasher::new(8).unwrap();
        let signature = hasher.sign(&transfer());

        assert_eq!(signature.canonical, "Transfer(address,address,uint256)");
        assert_eq!(
            signature.topic,
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
        assert_eq!(signature.fingerprint.as_str(), "ddf252ad");
    }

    #[test]
    fn test_fingerprint_width_is_fixed() {
        let hasher = SignatureHasher::new(12).unwrap();
        assert_eq!(hasher.sign(&transfer()).fingerprint.as_str().len(), 12);
        assert!(SignatureHasher::new(2).is_err());
        assert!(SignatureHasher::new(65).is_err());
    }
}
