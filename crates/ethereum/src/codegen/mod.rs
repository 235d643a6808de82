//! Event schema generation for Ethereum contracts
//!
//! Contracts are processed one at a time through [`SchemaCodegen`]: each event
//! is classified, hashed, decomposed into an entity tree and merged into a
//! shared forest. The forest then feeds entity source rendering, the topic
//! registry and, in the storage crate, migration synthesis.

pub mod columns;
pub mod event;
pub mod generator;
pub mod graph;
pub mod naming;
pub mod parser;
pub mod schema;
pub mod templates;
pub mod topics;
pub mod types;


use tracing::{debug, info};

use abi_schema_core::{ContractSource, Error, GeneratorConfig, Result};

pub use event::{EventDescriptor, FieldDescriptor};
pub use generator::{EntitySource, EntitySourceGenerator};
pub use graph::{EntityForest, EntityGraphBuilder, EntityNode, EventGraph, Insertion, NodeId};
pub use naming::{EventSignature, Fingerprint, SignatureHasher};
pub use parser::{AbiParser, ContractAbi};
pub use schema::{table_definitions, TableDefinition};
pub use topics::{TopicEntry, TopicRegistry};
pub use types::{classify, Cardinality, TypeDescriptor};

/// What processing one contract produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSummary {
    pub contract: String,
    pub events: usize,
    /// Events that added new entities
    pub inserted: usize,
    /// Events already generated for an earlier contract
    pub deduplicated: usize,
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct GeneratedSchema {
    pub forest: EntityForest,
    pub topics: TopicRegistry,
    pub entities: Vec<EntitySource>,
    pub entities_index: String,
}

/// Run-wide schema generation state
pub struct SchemaCodegen {
    config: GeneratorConfig,
    hasher: Option<SignatureHasher>,
    builder: EntityGraphBuilder,
    forest: EntityForest,
    topics: TopicRegistry,
}

impl SchemaCodegen {
    pub fn new(config: GeneratorConfig) -> Self {
        let builder = EntityGraphBuilder::new(config.max_nesting_depth);
        Self {
            config,
            hasher: None,
            builder,
            forest: EntityForest::new(),
            topics: TopicRegistry::new(),
        }
    }

    /// Validate the configuration and set up the signature hasher
    ///
    /// Must run before any contract is processed.
    pub fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        self.hasher = Some(SignatureHasher::new(self.config.fingerprint_width)?);
        info!(
            "Schema generator initialized (fingerprint width {}, max depth {})",
            self.config.fingerprint_width, self.config.max_nesting_depth
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.hasher.is_some()
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn forest(&self) -> &EntityForest {
        &self.forest
    }

    pub fn topics(&self) -> &TopicRegistry {
        &self.topics
    }

    /// Read and process a contract ABI file
    pub fn process_file(&mut self, source: &ContractSource) -> Result<ContractSummary> {
        let abi = AbiParser::new()
            .parse_file(&source.abi_path)
            .map_err(|e| e.in_contract(&source.name))?;
        self.process_contract(&source.name, &abi)
    }

    /// Add every event of one contract to the forest and topic registry
    ///
    /// All events are classified and built before anything is merged, so an
    /// unsupported type leaves the run state untouched.
    pub fn process_contract(&mut self, contract: &str, abi: &ContractAbi) -> Result<ContractSummary> {
        let hasher = self
            .hasher
            .as_ref()
            .ok_or_else(|| Error::NotInitialized("signature hasher".to_string()))?;

        info!("Processing contract {} ({} events)", contract, abi.events.len());

        let mut built = Vec::with_capacity(abi.events.len());
        for abi_event in &abi.events {
            let event = EventDescriptor::from_abi(abi_event).map_err(|e| e.in_contract(contract))?;
            let signature = hasher.sign(&event);
            let graph = self
                .builder
                .build(&event, &signature)
                .map_err(|e| e.in_contract(contract))?;
            built.push((event.name, signature, graph));
        }

        let mut summary = ContractSummary {
            contract: contract.to_string(),
            events: built.len(),
            inserted: 0,
            deduplicated: 0,
        };

        for (event_name, signature, graph) in built {
            match self.forest.insert(graph).map_err(|e| e.in_contract(contract))? {
                Insertion::Inserted(_) => summary.inserted += 1,
                Insertion::Deduplicated(_) => {
                    debug!("{} already generated as {}", signature.canonical, signature.fingerprint);
                    summary.deduplicated += 1;
                }
            }
            self.topics
                .record(contract, &event_name, &signature)
                .map_err(|e| e.in_contract(contract))?;
        }

        info!(
            "Contract {}: {} new events, {} shared with earlier contracts",
            contract, summary.inserted, summary.deduplicated
        );

        Ok(summary)
    }

    /// Render entity sources for everything processed so far
    pub fn render_entities(&self) -> Result<(Vec<EntitySource>, String)> {
        let generator = EntitySourceGenerator::new()?;
        let entities = generator.render_all(&self.forest)?;
        let index = generator.render_index(&self.forest)?;
        Ok((entities, index))
    }

    /// Render entities and hand over the run's results
    pub fn finish(self) -> Result<GeneratedSchema> {
        let (entities, entities_index) = self.render_entities()?;
        info!(
            "Generated {} entities for {} events",
            entities.len(),
            self.topics.len()
        );
        Ok(GeneratedSchema {
            forest: self.forest,
            topics: self.topics,
            entities,
            entities_index,
        })
    }
}
