//! Entity source generator
//!
//! Renders one Rust struct per entity node plus a module index. Field types
//! follow the column mapping: decimals become `BigDecimal`, text becomes
//! `String`, and relations become `Vec` or `Option` of the child entity.

use serde::Serialize;
use tracing::debug;

use abi_schema_core::Result;

use super::graph::{EntityForest, EntityNode, BLOCKCHAIN_EVENT_FIELDS};
use super::templates::{TemplateManager, ENTITIES_MOD_TEMPLATE, ENTITY_TEMPLATE};
use super::types::Cardinality;

/// File name of the generated module index
pub const ENTITIES_MOD_FILE: &str = "mod.rs";

const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do", "dyn", "else",
    "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in", "let", "loop", "macro", "match",
    "mod", "move", "mut", "override", "priv", "pub", "ref", "return", "static", "struct", "trait", "true",
    "try", "type", "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be written as raw identifiers
const RESERVED_PATH_KEYWORDS: &[&str] = &["crate", "self", "super", "Self"];

/// Generated source for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySource {
    pub module_name: String,
    pub entity_name: String,
    pub file_name: String,
    pub source: String,
}

#[derive(Serialize)]
struct RootData<'a> {
    signature: &'a str,
    topic: &'a str,
}

#[derive(Serialize)]
struct BackReferenceData {
    field: String,
    rust_type: &'static str,
}

#[derive(Serialize)]
struct ColumnData {
    field: String,
    rust_type: &'static str,
    abi_type: String,
}

#[derive(Serialize)]
struct RelationData<'a> {
    field: String,
    entity: &'a str,
    many: bool,
}

#[derive(Serialize)]
struct ImportData<'a> {
    module: &'a str,
    entity: &'a str,
}

#[derive(Serialize)]
struct EntityData<'a> {
    entity_name: &'a str,
    table_name: &'a str,
    path: &'a str,
    root: Option<RootData<'a>>,
    back_reference: Option<BackReferenceData>,
    columns: Vec<ColumnData>,
    relations: Vec<RelationData<'a>>,
    imports: Vec<ImportData<'a>>,
    uses_big_decimal: bool,
}

#[derive(Serialize)]
struct ModuleData<'a> {
    module: &'a str,
    entity: &'a str,
}

#[derive(Serialize)]
struct BaseFieldData {
    name: &'static str,
    rust_type: &'static str,
}

#[derive(Serialize)]
struct IndexData<'a> {
    modules: Vec<ModuleData<'a>>,
    base_fields: Vec<BaseFieldData>,
}

/// Escape a field name that collides with a Rust keyword
pub fn rust_field_name(name: &str) -> String {
    if RESERVED_PATH_KEYWORDS.contains(&name) {
        format!("{}_", name)
    } else if RUST_KEYWORDS.contains(&name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}

/// Renders entity sources from the forest
pub struct EntitySourceGenerator {
    templates: TemplateManager,
}

impl EntitySourceGenerator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            templates: TemplateManager::new()?,
        })
    }

    /// Render the struct for one node
    pub fn render_entity(&self, forest: &EntityForest, node: &EntityNode) -> Result<EntitySource> {
        let back_reference = node.back_reference().map(|back_reference| {
            let parent = forest.node(back_reference.parent);
            BackReferenceData {
                field: rust_field_name(&back_reference.column_name),
                rust_type: if parent.is_root() { "String" } else { "i32" },
            }
        });

        let columns: Vec<ColumnData> = node
            .columns
            .iter()
            .map(|column| ColumnData {
                field: rust_field_name(&column.column_name),
                rust_type: column.spec.rust_type(),
                abi_type: column.abi_type.to_string(),
            })
            .collect();

        let mut relations = Vec::with_capacity(node.children.len());
        let mut imports = Vec::with_capacity(node.children.len());
        for (relation, child) in forest.children(node.id) {
            relations.push(RelationData {
                field: rust_field_name(&relation.property_name),
                entity: &child.entity_name,
                many: relation.cardinality == Cardinality::OneToMany,
            });
            imports.push(ImportData {
                module: &child.table_name,
                entity: &child.entity_name,
            });
        }

        let data = EntityData {
            entity_name: &node.entity_name,
            table_name: &node.table_name,
            path: &node.path,
            root: node.root_event().map(|event| RootData {
                signature: &event.signature,
                topic: &event.topic,
            }),
            back_reference,
            uses_big_decimal: columns.iter().any(|c| c.rust_type == "BigDecimal"),
            columns,
            relations,
            imports,
        };

        let source = self.templates.render(ENTITY_TEMPLATE, &data)?;
        debug!("Rendered entity {}", node.entity_name);

        Ok(EntitySource {
            module_name: node.table_name.clone(),
            entity_name: node.entity_name.clone(),
            file_name: format!("{}.rs", node.table_name),
            source,
        })
    }

    /// Render every entity, parents before children
    pub fn render_all(&self, forest: &EntityForest) -> Result<Vec<EntitySource>> {
        forest
            .nodes()
            .iter()
            .map(|node| self.render_entity(forest, node))
            .collect()
    }

    /// Render the module index declaring every entity module
    pub fn render_index(&self, forest: &EntityForest) -> Result<String> {
        let data = IndexData {
            modules: forest
                .nodes()
                .iter()
                .map(|node| ModuleData {
                    module: &node.table_name,
                    entity: &node.entity_name,
                })
                .collect(),
            base_fields: BLOCKCHAIN_EVENT_FIELDS
                .iter()
                .map(|field| BaseFieldData {
                    name: field.name,
                    rust_type: field.rust_type,
                })
                .collect(),
        };

        self.templates.render(ENTITIES_MOD_TEMPLATE, &data)
    }
}
