//! Migration synthesis
//!
//! A [`MigrationSynthesizer`] asks its [`EngineProvider`] for a fresh
//! [`SchemaEngine`], applies the forest's table definitions, reads back the
//! forward and reverse statements, and shuts the engine down whether or not
//! anything failed. The statements are then qualified with the target schema.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use abi_schema_core::Result;
use abi_schema_ethereum::codegen::schema::{table_definitions, TableDefinition};
use abi_schema_ethereum::codegen::EntityForest;

pub mod ddl;
pub mod rewrite;
pub mod sqlite;

use sqlite::SqliteEngineProvider;

/// Stands in for the schema name when it is only known at deploy time
pub const SCHEMA_PLACEHOLDER: &str = "__abi_schema_target__";

/// Migration name used when none is configured
pub const DEFAULT_MIGRATION_NAME: &str = "event_schema";

/// Statements read back from a schema engine, unqualified
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Creation statements in dependency order
    pub forward: Vec<String>,
    /// Drop statements, dependents first
    pub reverse: Vec<String>,
}

/// A disposable database used to validate and introspect DDL
#[async_trait]
pub trait SchemaEngine: Send {
    /// Apply table definitions and report the resulting statements
    async fn apply_schema(&mut self, tables: &[TableDefinition]) -> Result<SchemaDiff>;

    /// Release every resource held by the engine
    async fn shutdown(&mut self) -> Result<()>;
}

/// Starts schema engines
#[async_trait]
pub trait EngineProvider: Send + Sync {
    async fn start(&self) -> Result<Box<dyn SchemaEngine>>;
}

/// Where the generated tables live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaTarget {
    /// A literal schema name
    Fixed(String),
    /// An environment variable holding the schema name
    Variable(String),
}

impl SchemaTarget {
    pub fn new(schema_name: impl Into<String>, variable: bool) -> Self {
        if variable {
            SchemaTarget::Variable(schema_name.into())
        } else {
            SchemaTarget::Fixed(schema_name.into())
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, SchemaTarget::Variable(_))
    }

    /// Name written into statements before resolution
    fn qualifier(&self) -> &str {
        match self {
            SchemaTarget::Fixed(name) => name,
            SchemaTarget::Variable(_) => SCHEMA_PLACEHOLDER,
        }
    }

    /// Schema as it appears in the emitted script
    pub fn reference(&self) -> String {
        match self {
            SchemaTarget::Fixed(name) => name.clone(),
            SchemaTarget::Variable(variable) => format!("${{{}}}", variable),
        }
    }

    /// Substitute the placeholder in a qualified statement
    pub fn resolve(&self, statement: &str) -> String {
        match self {
            SchemaTarget::Fixed(_) => statement.to_string(),
            SchemaTarget::Variable(_) => statement.replace(SCHEMA_PLACEHOLDER, &self.reference()),
        }
    }
}

/// A versioned forward and reverse script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    pub version: String,
    pub name: String,
    pub target: SchemaTarget,
    /// Creates the target schema
    pub preamble: String,
    pub forward: Vec<String>,
    pub reverse: Vec<String>,
}

impl MigrationScript {
    /// `<version>_<name>.sql`
    pub fn file_name(&self) -> String {
        format!("{}_{}.sql", self.version, self.name)
    }

    /// Statements to apply, schema creation first
    pub fn up(&self) -> Vec<String> {
        std::iter::once(&self.preamble)
            .chain(&self.forward)
            .map(|statement| self.target.resolve(statement))
            .collect()
    }

    /// Statements to revert, dependents first
    pub fn down(&self) -> Vec<String> {
        self.reverse.iter().map(|statement| self.target.resolve(statement)).collect()
    }

    /// Script text with `migrate:up` and `migrate:down` sections
    pub fn render(&self) -> String {
        let mut out = format!("-- {}\n", self.file_name());
        if self.target.is_variable() {
            out.push_str(&format!(
                "-- Schema is read from {} when the script runs\n",
                self.target.reference()
            ));
        }

        out.push_str("\n-- migrate:up\n");
        for statement in self.up() {
            out.push_str(&statement);
            out.push_str(";\n\n");
        }

        out.push_str("-- migrate:down\n");
        for statement in self.down() {
            out.push_str(&statement);
            out.push_str(";\n");
        }

        out
    }
}

/// Turns an entity forest into a migration script
pub struct MigrationSynthesizer<P> {
    provider: P,
    target: SchemaTarget,
    name: String,
    version: Option<String>,
}

impl<P: EngineProvider> MigrationSynthesizer<P> {
    pub fn new(provider: P, target: SchemaTarget) -> Self {
        Self {
            provider,
            target,
            name: DEFAULT_MIGRATION_NAME.to_string(),
            version: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pin the version instead of using the current UTC timestamp
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Synthesize the migration for every table of the forest
    pub async fn synthesize(&self, forest: &EntityForest) -> Result<MigrationScript> {
        self.synthesize_tables(&table_definitions(forest)).await
    }

    /// Synthesize the migration for explicit table definitions
    pub async fn synthesize_tables(&self, tables: &[TableDefinition]) -> Result<MigrationScript> {
        let mut engine = self.provider.start().await?;
        debug!("Schema engine started for {} tables", tables.len());

        let applied = engine.apply_schema(tables).await;
        let shutdown = engine.shutdown().await;

        let diff = match (applied, shutdown) {
            (Ok(diff), Ok(())) => diff,
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(shutdown_error)) => {
                warn!("Schema engine shutdown also failed: {}", shutdown_error);
                return Err(e);
            }
        };

        let qualifier = self.target.qualifier();
        let script = MigrationScript {
            version: self
                .version
                .clone()
                .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%d%H%M%S").to_string()),
            name: self.name.clone(),
            target: self.target.clone(),
            preamble: format!("CREATE SCHEMA IF NOT EXISTS {}", ddl::quote(qualifier)),
            forward: rewrite::qualify_all(&diff.forward, qualifier),
            reverse: rewrite::qualify_all(&diff.reverse, qualifier),
        };

        info!(
            "Synthesized migration {} ({} forward, {} reverse statements)",
            script.file_name(),
            script.forward.len(),
            script.reverse.len()
        );

        Ok(script)
    }
}

/// Synthesize a migration using a disposable in-memory SQLite engine
pub async fn synthesize(
    forest: &EntityForest,
    schema_name: &str,
    variable_schema: bool,
) -> Result<MigrationScript> {
    MigrationSynthesizer::new(
        SqliteEngineProvider::new(),
        SchemaTarget::new(schema_name, variable_schema),
    )
    .synthesize(forest)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(target: SchemaTarget) -> MigrationScript {
        let qualifier = target.qualifier().to_string();
        MigrationScript {
            version: "20240101000000".to_string(),
            name: "event_schema".to_string(),
            preamble: format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", qualifier),
            forward: vec![format!("CREATE TABLE \"{}\".\"a\" (\"id\" integer)", qualifier)],
            reverse: vec![format!("DROP TABLE \"{}\".\"a\"", qualifier)],
            target,
        }
    }

    #[test]
    fn test_fixed_schema_render() {
        let rendered = script(SchemaTarget::new("events", false)).render();

        assert!(rendered.starts_with("-- 20240101000000_event_schema.sql\n"));
        assert!(rendered.contains("-- migrate:up\nCREATE SCHEMA IF NOT EXISTS \"events\";\n"));
        assert!(rendered.contains("CREATE TABLE \"events\".\"a\" (\"id\" integer);"));
        assert!(rendered.contains("-- migrate:down\nDROP TABLE \"events\".\"a\";\n"));
    }

    #[test]
    fn test_variable_schema_render() {
        let script = script(SchemaTarget::new("INDEXER_SCHEMA", true));
        let rendered = script.render();

        assert!(!rendered.contains(SCHEMA_PLACEHOLDER));
        assert!(rendered.contains("CREATE SCHEMA IF NOT EXISTS \"${INDEXER_SCHEMA}\""));
        assert_eq!(script.down(), ["DROP TABLE \"${INDEXER_SCHEMA}\".\"a\""]);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            script(SchemaTarget::new("events", false)).file_name(),
            "20240101000000_event_schema.sql"
        );
    }
}
