//! Portable DDL rendering
//!
//! The statements use only types and syntax that both SQLite and PostgreSQL
//! accept, so the disposable engine can validate exactly what the target
//! database will later run. Identifiers are always double quoted.

use abi_schema_ethereum::codegen::schema::{ForeignKeyDefinition, IndexDefinition, TableDefinition};

/// Double-quote an identifier
pub fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Name of a table's primary key constraint
pub fn primary_key_name(table_name: &str) -> String {
    format!("pk_{}", table_name)
}

fn foreign_key_clause(fk: &ForeignKeyDefinition) -> String {
    format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
        quote(&fk.name),
        quote(&fk.column),
        quote(&fk.references_table),
        quote(&fk.references_column),
        fk.on_delete.as_sql()
    )
}

/// `CREATE TABLE` for one definition, constraints inline
pub fn create_table(table: &TableDefinition) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|column| {
            let null = if column.nullable { "NULL" } else { "NOT NULL" };
            format!("    {} {} {}", quote(&column.name), column.sql_type, null)
        })
        .collect();

    lines.push(format!(
        "    CONSTRAINT {} PRIMARY KEY ({})",
        quote(&primary_key_name(&table.name)),
        quote(&table.primary_key)
    ));
    lines.extend(table.foreign_keys.iter().map(|fk| format!("    {}", foreign_key_clause(fk))));

    format!("CREATE TABLE {} (\n{}\n)", quote(&table.name), lines.join(",\n"))
}

/// `CREATE INDEX` for one index of a table
pub fn create_index(table: &TableDefinition, index: &IndexDefinition) -> String {
    format!(
        "CREATE INDEX {} ON {} ({})",
        quote(&index.name),
        quote(&table.name),
        quote(&index.column)
    )
}

/// `DROP TABLE` for a table name
pub fn drop_table(table_name: &str) -> String {
    format!("DROP TABLE {}", quote(table_name))
}
