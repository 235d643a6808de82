//! Migration synthesis for generated event schemas
//!
//! Table definitions are materialized in a disposable in-memory database, the
//! resulting schema is read back, and every statement is qualified with the
//! target schema before it is written out as a forward and reverse script.

pub mod migrations;

pub use migrations::{
    synthesize, EngineProvider, MigrationScript, MigrationSynthesizer, SchemaDiff, SchemaEngine,
    SchemaTarget,
};
pub use migrations::sqlite::{SqliteEngineProvider, SqliteSchemaEngine};
