//! Relational table definitions derived from the entity forest
//!
//! These are plain descriptions of tables, columns and constraints with no
//! dialect attached. Rendering them as DDL is the migration synthesizer's job.

use serde::{Deserialize, Serialize};

use super::graph::{EntityForest, EntityNode, NodeKind, BLOCKCHAIN_EVENT_FIELDS, ID_COLUMN};
use super::naming;

/// SQL type of a root's identity
pub const GLOBAL_ID_TYPE: &str = "character varying";

/// SQL type of a child's generated identity
pub const SERIAL_ID_TYPE: &str = "SERIAL";

/// SQL type of a column referencing a child's identity
pub const SERIAL_REFERENCE_TYPE: &str = "integer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    Cascade,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    pub name: String,
    pub column: String,
    pub references_table: String,
    pub references_column: String,
    pub on_delete: ReferentialAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub column: String,
}

/// One table to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: String,
    pub foreign_keys: Vec<ForeignKeyDefinition>,
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }
}

fn required(name: &str, sql_type: &str) -> ColumnDefinition {
    ColumnDefinition {
        name: name.to_string(),
        sql_type: sql_type.to_string(),
        nullable: false,
    }
}

fn identity_type(node: &EntityNode) -> &'static str {
    if node.is_root() {
        GLOBAL_ID_TYPE
    } else {
        SERIAL_REFERENCE_TYPE
    }
}

/// Describe one node's table
pub fn table_definition(forest: &EntityForest, node: &EntityNode) -> TableDefinition {
    let mut columns = Vec::with_capacity(node.columns.len() + BLOCKCHAIN_EVENT_FIELDS.len() + 1);
    let mut foreign_keys = Vec::new();
    let mut indexes = Vec::new();

    match &node.kind {
        NodeKind::Root(_) => {
            columns.push(required(ID_COLUMN, GLOBAL_ID_TYPE));
            columns.extend(BLOCKCHAIN_EVENT_FIELDS.iter().map(|f| required(f.name, f.sql_type)));
        }
        NodeKind::Child(back_reference) => {
            let parent = forest.node(back_reference.parent);
            columns.push(required(ID_COLUMN, SERIAL_ID_TYPE));
            columns.push(required(&back_reference.column_name, identity_type(parent)));
            foreign_keys.push(ForeignKeyDefinition {
                name: back_reference.constraint_name.clone(),
                column: back_reference.column_name.clone(),
                references_table: parent.table_name.clone(),
                references_column: ID_COLUMN.to_string(),
                on_delete: ReferentialAction::Cascade,
            });
            indexes.push(IndexDefinition {
                name: naming::index_name(&node.table_name, &back_reference.column_name),
                column: back_reference.column_name.clone(),
            });
        }
    }

    columns.extend(node.columns.iter().map(|column| ColumnDefinition {
        name: column.column_name.clone(),
        sql_type: column.spec.sql_type(),
        nullable: column.spec.nullable,
    }));

    TableDefinition {
        name: node.table_name.clone(),
        columns,
        primary_key: ID_COLUMN.to_string(),
        foreign_keys,
        indexes,
    }
}

/// Describe every table of the forest, parents before children
pub fn table_definitions(forest: &EntityForest) -> Vec<TableDefinition> {
    forest
        .nodes()
        .iter()
        .map(|node| table_definition(forest, node))
        .collect()
}
