//! Event topic registry
//!
//! Maps each fingerprint to the event it identifies and the contracts that
//! declare it. The registry is written next to the generated entities so an
//! indexer can route incoming logs to the right tables.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use abi_schema_core::{Error, Result};

use super::naming::{EventSignature, Fingerprint};

/// One registered event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEntry {
    pub event_name: String,
    pub signature: String,
    /// Full `topic0` value, `0x`-prefixed
    pub topic: String,
    pub contracts: BTreeSet<String>,
}

/// Fingerprint to event mapping for a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicRegistry {
    entries: BTreeMap<Fingerprint, TopicEntry>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `contract` declares the event with this signature
    ///
    /// Re-recording the same fingerprint adds the contract to the existing
    /// entry. A fingerprint already held by a different signature is a
    /// collision, which only happens with short fingerprint widths.
    pub fn record(&mut self, contract: &str, event_name: &str, signature: &EventSignature) -> Result<()> {
        let entry = self
            .entries
            .entry(signature.fingerprint.clone())
            .or_insert_with(|| TopicEntry {
                event_name: event_name.to_string(),
                signature: signature.canonical.clone(),
                topic: signature.topic.clone(),
                contracts: BTreeSet::new(),
            });

        if entry.signature != signature.canonical {
            return Err(Error::collision(
                signature.fingerprint.as_str(),
                format!(
                    "fingerprint shared by {} and {}",
                    entry.signature, signature.canonical
                ),
            ));
        }

        entry.contracts.insert(contract.to_string());
        Ok(())
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&TopicEntry> {
        self.entries.get(fingerprint)
    }

    /// Find the entry for a full `topic0` value
    pub fn find_topic(&self, topic: &str) -> Option<(&Fingerprint, &TopicEntry)> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.topic.eq_ignore_ascii_case(topic))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &TopicEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty-printed JSON document keyed by fingerprint
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
