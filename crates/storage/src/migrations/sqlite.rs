//! In-memory SQLite schema engine
//!
//! Each engine owns a single-connection pool on a private `sqlite::memory:`
//! database with foreign keys enforced. The connection never idles out, since
//! closing it would discard the database.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use abi_schema_core::{Error, Result};
use abi_schema_ethereum::codegen::schema::TableDefinition;

use super::{ddl, rewrite, EngineProvider, SchemaDiff, SchemaEngine};

const MEMORY_URL: &str = "sqlite::memory:";

/// Starts a fresh in-memory database per synthesis
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteEngineProvider;

impl SqliteEngineProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EngineProvider for SqliteEngineProvider {
    async fn start(&self) -> Result<Box<dyn SchemaEngine>> {
        let options = SqliteConnectOptions::from_str(MEMORY_URL)
            .map_err(|e| Error::engine(format!("Invalid engine URL: {}", e)))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| Error::engine(format!("Failed to start in-memory database: {}", e)))?;

        Ok(Box::new(SqliteSchemaEngine { pool }))
    }
}

/// Prefix for engine-side table names
const ALIAS_PREFIX: &str = "t_";

/// Engine-side names for the generated tables
///
/// SQLite reserves every object name starting with `sqlite_`, so tables are
/// created under a prefixed alias and renamed back when read.
struct TableAliases {
    originals: HashMap<String, String>,
}

impl TableAliases {
    fn new(tables: &[TableDefinition]) -> Self {
        Self {
            originals: tables
                .iter()
                .map(|table| (alias(&table.name), table.name.clone()))
                .collect(),
        }
    }

    fn original<'a>(&'a self, alias: &str) -> Option<&'a str> {
        self.originals.get(alias).map(String::as_str)
    }

    /// Rewrite a stored statement of `alias`'s table with the original names
    fn restore(&self, statement: &str, alias: &str, original: &str) -> String {
        let statement = rewrite::rename_tables(statement, &|table| {
            ddl::quote(self.original(table).unwrap_or(table))
        });
        statement.replace(&primary_key_clause(alias), &primary_key_clause(original))
    }
}

fn alias(table_name: &str) -> String {
    format!("{}{}", ALIAS_PREFIX, table_name)
}

fn primary_key_clause(table_name: &str) -> String {
    format!("CONSTRAINT {} PRIMARY KEY", ddl::quote(&ddl::primary_key_name(table_name)))
}

fn aliased(table: &TableDefinition) -> TableDefinition {
    let mut table = table.clone();
    table.name = alias(&table.name);
    for fk in &mut table.foreign_keys {
        fk.references_table = alias(&fk.references_table);
    }
    table
}

/// Schema engine backed by one in-memory SQLite connection
pub struct SqliteSchemaEngine {
    pool: SqlitePool,
}

impl SqliteSchemaEngine {
    /// Every stored statement of the generated tables, in creation order
    async fn forward_statements(&self, aliases: &TableAliases) -> Result<Vec<String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT tbl_name, sql FROM sqlite_master \
             WHERE sql IS NOT NULL \
             ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::engine(format!("Failed to read schema: {}", e)))?;

        Ok(rows
            .into_iter()
            .filter_map(|(table, sql)| {
                let original = aliases.original(&table)?;
                Some(aliases.restore(&sql, &table, original))
            })
            .collect())
    }

    /// Drop statements ordered so no table is dropped while another references it
    async fn reverse_statements(&self, aliases: &TableAliases) -> Result<Vec<String>> {
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::engine(format!("Failed to list tables: {}", e)))?;

        let references: Vec<(String, String)> = sqlx::query_as(
            "SELECT m.name, p.\"table\" FROM sqlite_master AS m, pragma_foreign_key_list(m.name) AS p \
             WHERE m.type = 'table'",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::engine(format!("Failed to read foreign keys: {}", e)))?;

        let tables: Vec<String> = tables
            .iter()
            .filter_map(|(name,)| aliases.original(name).map(str::to_string))
            .collect();
        let references: Vec<(String, String)> = references
            .iter()
            .filter_map(|(child, parent)| {
                Some((
                    aliases.original(child)?.to_string(),
                    aliases.original(parent)?.to_string(),
                ))
            })
            .collect();

        let order = drop_order(&tables, &references)?;
        Ok(order.iter().map(|table| ddl::drop_table(table)).collect())
    }
}

/// Order tables for dropping, dependents before the tables they reference
///
/// Among tables that can be dropped, the most recently created goes first.
pub(crate) fn drop_order(tables: &[String], references: &[(String, String)]) -> Result<Vec<String>> {
    // parent -> children still present
    let mut dependents: HashMap<&str, HashSet<&str>> = HashMap::new();
    for (child, parent) in references {
        if child != parent {
            dependents.entry(parent.as_str()).or_default().insert(child.as_str());
        }
    }

    let mut remaining: Vec<&str> = tables.iter().map(String::as_str).collect();
    let mut order = Vec::with_capacity(tables.len());

    while !remaining.is_empty() {
        let position = remaining
            .iter()
            .rposition(|table| dependents.get(table).map_or(true, HashSet::is_empty))
            .ok_or_else(|| Error::engine("Foreign key cycle between generated tables"))?;

        let table = remaining.remove(position);
        for children in dependents.values_mut() {
            children.remove(table);
        }
        order.push(table.to_string());
    }

    Ok(order)
}

#[async_trait]
impl SchemaEngine for SqliteSchemaEngine {
    async fn apply_schema(&mut self, tables: &[TableDefinition]) -> Result<SchemaDiff> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::engine(format!("Failed to begin transaction: {}", e)))?;

        let aliases = TableAliases::new(tables);
        for definition in tables {
            let table = aliased(definition);
            sqlx::query(&ddl::create_table(&table))
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::engine(format!("Failed to create table {}: {}", definition.name, e)))?;

            for index in &table.indexes {
                sqlx::query(&ddl::create_index(&table, index))
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| Error::engine(format!("Failed to create index {}: {}", index.name, e)))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| Error::engine(format!("Failed to commit schema: {}", e)))?;

        debug!("Applied {} tables to the schema engine", tables.len());

        Ok(SchemaDiff {
            forward: self.forward_statements(&aliases).await?,
            reverse: self.reverse_statements(&aliases).await?,
        })
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.pool.close().await;
        debug!("Schema engine closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn edge(child: &str, parent: &str) -> (String, String) {
        (child.to_string(), parent.to_string())
    }

    #[test]
    fn test_children_dropped_before_parents() {
        let tables = names(&["root", "child", "grandchild", "other"]);
        let references = vec![edge("child", "root"), edge("grandchild", "child")];

        let order = drop_order(&tables, &references).unwrap();
        assert_eq!(order, ["other", "grandchild", "child", "root"]);
    }

    #[test]
    fn test_cycle_is_an_error() {
        let tables = names(&["a", "b"]);
        let references = vec![edge("a", "b"), edge("b", "a")];
        assert!(matches!(drop_order(&tables, &references), Err(Error::EngineInitialization(_))));
    }

    fn table(name: &str, parent: Option<&str>) -> TableDefinition {
        use abi_schema_ethereum::codegen::schema::{
            ColumnDefinition, ForeignKeyDefinition, IndexDefinition, ReferentialAction,
        };

        let mut columns = vec![ColumnDefinition {
            name: "id".to_string(),
            sql_type: "SERIAL".to_string(),
            nullable: false,
        }];
        let mut foreign_keys = Vec::new();
        let mut indexes = Vec::new();
        if let Some(parent) = parent {
            let column = format!("{}_id", parent);
            columns.push(ColumnDefinition {
                name: column.clone(),
                sql_type: "integer".to_string(),
                nullable: false,
            });
            foreign_keys.push(ForeignKeyDefinition {
                name: format!("fk_{}_{}", name, parent),
                column: column.clone(),
                references_table: parent.to_string(),
                references_column: "id".to_string(),
                on_delete: ReferentialAction::Cascade,
            });
            indexes.push(IndexDefinition {
                name: format!("idx_{}_{}", name, column),
                column,
            });
        }

        TableDefinition {
            name: name.to_string(),
            columns,
            primary_key: "id".to_string(),
            foreign_keys,
            indexes,
        }
    }

    #[tokio::test]
    async fn test_reserved_prefixes_round_trip() {
        let tables = [
            table("sqlite_synced_60248e94", None),
            table("sqlitex_d0dcd61f", Some("sqlite_synced_60248e94")),
        ];

        let mut engine = SqliteEngineProvider::new().start().await.unwrap();
        let diff = engine.apply_schema(&tables).await.unwrap();
        engine.shutdown().await.unwrap();

        assert_eq!(diff.forward.len(), 3);
        assert!(diff.forward[0].starts_with("CREATE TABLE \"sqlite_synced_60248e94\" ("));
        assert!(diff.forward[0].contains("CONSTRAINT \"pk_sqlite_synced_60248e94\" PRIMARY KEY"));
        assert!(diff.forward[1].starts_with("CREATE TABLE \"sqlitex_d0dcd61f\" ("));
        assert!(diff.forward[1].contains("REFERENCES \"sqlite_synced_60248e94\" (\"id\")"));
        assert!(diff.forward[2].contains(" ON \"sqlitex_d0dcd61f\" "));
        assert!(diff.forward.iter().all(|s| !s.contains("\"t_sqlite")));
        assert_eq!(
            diff.reverse,
            ["DROP TABLE \"sqlitex_d0dcd61f\"", "DROP TABLE \"sqlite_synced_60248e94\""]
        );
    }

    #[tokio::test]
    async fn test_engine_round_trip() {
        let mut engine = SqliteEngineProvider::new().start().await.unwrap();
        let diff = engine.apply_schema(&[]).await.unwrap();
        assert!(diff.forward.is_empty());
        assert!(diff.reverse.is_empty());
        engine.shutdown().await.unwrap();
    }
}
