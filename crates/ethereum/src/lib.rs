//! Ethereum event ABI decomposition
//!
//! Turns contract event definitions into a deterministic graph of relational
//! entities: one root per event, one child per struct or array field. Names
//! carry a short fingerprint of the event signature so that events from many
//! contracts can share one schema without clashing.

pub mod codegen;

pub use codegen::{
    classify, table_definitions, AbiParser, ContractAbi, ContractSummary, EntityForest, EntityNode,
    EntitySource, Fingerprint, GeneratedSchema, SchemaCodegen, TableDefinition, TopicEntry,
    TopicRegistry, TypeDescriptor,
};
