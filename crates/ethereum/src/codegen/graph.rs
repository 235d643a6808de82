//! Entity graph construction
//!
//! Each event becomes a tree of entity nodes. The root stores the event's
//! primitive fields; every tuple or array field becomes a child node related
//! back to its parent. Trees are first built into a scratch [`EventGraph`] and
//! then merged into the run-wide [`EntityForest`], which rejects table name
//! clashes and folds identical events declared by several contracts.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`], so a child's
//! back reference to its parent never forms an ownership cycle.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use abi_schema_core::{Error, Result};

use super::columns::{map_column, ColumnSpec};
use super::event::{unsupported, EventDescriptor, FieldDescriptor};
use super::naming::{self, EventSignature, Fingerprint};
use super::types::{Cardinality, TypeDescriptor};

/// Identity column present on every table
pub const ID_COLUMN: &str = "id";

/// A column every root inherits from the common blockchain event shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseField {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub rust_type: &'static str,
}

/// Columns every root carries besides its global identity
pub const BLOCKCHAIN_EVENT_FIELDS: [BaseField; 4] = [
    BaseField {
        name: "block_hash",
        sql_type: "character varying(66)",
        rust_type: "String",
    },
    BaseField {
        name: "transaction_hash",
        sql_type: "character varying(66)",
        rust_type: "String",
    },
    BaseField {
        name: "log_index",
        sql_type: "integer",
        rust_type: "i32",
    },
    BaseField {
        name: "transaction_index",
        sql_type: "integer",
        rust_type: "i32",
    },
];

/// Index of a node in its graph or forest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Semantic name plus event fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityIdentity {
    pub semantic_name: String,
    pub fingerprint: Fingerprint,
}

/// A primitive field stored as a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub field_name: String,
    pub column_name: String,
    pub abi_type: TypeDescriptor,
    pub spec: ColumnSpec,
}

/// Edge from a node to one of its children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub field_name: String,
    /// Field name on the generated entity
    pub property_name: String,
    pub child: NodeId,
    pub cardinality: Cardinality,
}

/// Link from a child to its parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackReference {
    pub parent: NodeId,
    pub column_name: String,
    pub constraint_name: String,
    pub cardinality: Cardinality,
}

/// Event metadata carried by a root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootEvent {
    pub event_name: String,
    pub signature: String,
    pub topic: String,
    pub anonymous: bool,
}

/// How a node's identity is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    /// Derived from the blockchain event (globally unique string)
    Global,
    /// Generated serial, unique within the table only
    LocalSerial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root(RootEvent),
    Child(BackReference),
}

/// One generated entity and its table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityNode {
    pub id: NodeId,
    pub identity: EntityIdentity,
    pub entity_name: String,
    pub table_name: String,
    /// Dotted path of the field this node was built from
    pub path: String,
    pub kind: NodeKind,
    pub columns: Vec<Column>,
    pub children: Vec<Relation>,
}

impl EntityNode {
    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root(_))
    }

    pub fn root_event(&self) -> Option<&RootEvent> {
        match &self.kind {
            NodeKind::Root(event) => Some(event),
            NodeKind::Child(_) => None,
        }
    }

    pub fn back_reference(&self) -> Option<&BackReference> {
        match &self.kind {
            NodeKind::Root(_) => None,
            NodeKind::Child(back_reference) => Some(back_reference),
        }
    }

    pub fn identity_kind(&self) -> IdentityKind {
        if self.is_root() {
            IdentityKind::Global
        } else {
            IdentityKind::LocalSerial
        }
    }

    /// Every column name the node's table carries, identity first
    pub fn column_names(&self) -> Vec<&str> {
        let mut names = vec![ID_COLUMN];
        match &self.kind {
            NodeKind::Root(_) => names.extend(BLOCKCHAIN_EVENT_FIELDS.iter().map(|f| f.name)),
            NodeKind::Child(back_reference) => names.push(&back_reference.column_name),
        }
        names.extend(self.columns.iter().map(|c| c.column_name.as_str()));
        names
    }

    fn rebase(&mut self, offset: usize) {
        self.id = NodeId(self.id.0 + offset);
        for relation in &mut self.children {
            relation.child = NodeId(relation.child.0 + offset);
        }
        if let NodeKind::Child(back_reference) = &mut self.kind {
            back_reference.parent = NodeId(back_reference.parent.0 + offset);
        }
    }
}

/// The nodes built from a single event, root first
#[derive(Debug, Clone)]
pub struct EventGraph {
    nodes: Vec<EntityNode>,
}

impl EventGraph {
    pub fn root(&self) -> &EntityNode {
        &self.nodes[0]
    }

    pub fn nodes(&self) -> &[EntityNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &EntityNode {
        &self.nodes[id.0]
    }

    fn push(&mut self, identity: EntityIdentity, path: String, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(EntityNode {
            id,
            entity_name: naming::entity_name(&identity.semantic_name, &identity.fingerprint),
            table_name: naming::table_name(&identity.semantic_name, &identity.fingerprint),
            identity,
            path,
            kind,
            columns: Vec::new(),
            children: Vec::new(),
        });
        id
    }

    fn check_unique_tables(&self) -> Result<()> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for node in &self.nodes {
            if let Some(other) = seen.insert(&node.table_name, &node.path) {
                return Err(Error::collision(
                    &node.table_name,
                    format!("both {} and {} map to this table", other, node.path),
                ));
            }
        }
        Ok(())
    }
}

/// Turns classified events into entity trees
#[derive(Debug, Clone)]
pub struct EntityGraphBuilder {
    max_depth: usize,
}

impl EntityGraphBuilder {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Build the entity tree for one event
    pub fn build(&self, event: &EventDescriptor, signature: &EventSignature) -> Result<EventGraph> {
        let mut graph = EventGraph { nodes: Vec::new() };

        let root = graph.push(
            EntityIdentity {
                semantic_name: event.name.clone(),
                fingerprint: signature.fingerprint.clone(),
            },
            event.name.clone(),
            NodeKind::Root(RootEvent {
                event_name: event.name.clone(),
                signature: signature.canonical.clone(),
                topic: signature.topic.clone(),
                anonymous: event.anonymous,
            }),
        );

        self.populate(&mut graph, root, &event.fields, &signature.fingerprint, 0)?;
        graph.check_unique_tables()?;

        debug!(
            "Built {} entities for {} ({})",
            graph.nodes.len(),
            event.name,
            signature.fingerprint
        );

        Ok(graph)
    }

    /// Add a child node for a tuple or array field and fill it recursively
    fn build_child(
        &self,
        graph: &mut EventGraph,
        field: &FieldDescriptor,
        fingerprint: &Fingerprint,
        parent: NodeId,
        cardinality: Cardinality,
        depth: usize,
    ) -> Result<NodeId> {
        let path = format!("{}.{}", graph.node(parent).path, field.name);
        if depth > self.max_depth {
            return Err(Error::NestingTooDeep {
                path,
                limit: self.max_depth,
            });
        }

        let element;
        let fields: &[FieldDescriptor] = if field.ty.is_tuple() {
            &field.components
        } else {
            element = [FieldDescriptor::array_element(&field.ty)];
            &element
        };

        let parent_table = graph.node(parent).table_name.clone();
        let child_table = naming::table_name(&field.name, fingerprint);
        let back_reference = BackReference {
            parent,
            column_name: naming::back_reference_column(&parent_table),
            constraint_name: naming::foreign_key_name(&child_table, &parent_table),
            cardinality,
        };

        let child = graph.push(
            EntityIdentity {
                semantic_name: field.name.clone(),
                fingerprint: fingerprint.clone(),
            },
            path,
            NodeKind::Child(back_reference),
        );

        self.populate(graph, child, fields, fingerprint, depth)?;
        Ok(child)
    }

    fn populate(
        &self,
        graph: &mut EventGraph,
        node: NodeId,
        fields: &[FieldDescriptor],
        fingerprint: &Fingerprint,
        depth: usize,
    ) -> Result<()> {
        let mut taken: HashSet<String> = graph
            .node(node)
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        for field in fields {
            let name = naming::column_name(&field.name);
            let path = format!("{}.{}", graph.node(node).path, field.name);
            if !taken.insert(name.clone()) {
                return Err(Error::collision(
                    &name,
                    format!("{} clashes with another field of {}", path, graph.node(node).table_name),
                ));
            }

            match field.ty.relation_cardinality() {
                Some(cardinality) => {
                    let child = self.build_child(graph, field, fingerprint, node, cardinality, depth + 1)?;
                    graph.nodes[node.0].children.push(Relation {
                        field_name: field.name.clone(),
                        property_name: name,
                        child,
                        cardinality,
                    });
                }
                None => {
                    let spec = map_column(&field.ty)
                        .map_err(|reason| unsupported(&path, &field.ty.to_string(), reason))?;
                    graph.nodes[node.0].columns.push(Column {
                        field_name: field.name.clone(),
                        column_name: name,
                        abi_type: field.ty,
                        spec,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Outcome of merging one event graph into the forest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Inserted(NodeId),
    /// An identical event was already present
    Deduplicated(NodeId),
}

impl Insertion {
    pub fn root(self) -> NodeId {
        match self {
            Insertion::Inserted(id) | Insertion::Deduplicated(id) => id,
        }
    }
}

/// Every entity of a run, stored parent before child
#[derive(Debug, Clone, Default)]
pub struct EntityForest {
    nodes: Vec<EntityNode>,
    roots: Vec<NodeId>,
    tables: HashMap<String, NodeId>,
}

impl EntityForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an event graph
    ///
    /// A root whose table already exists is folded into the existing tree when
    /// both trees have the same shape, and reported as a collision otherwise.
    pub fn insert(&mut self, graph: EventGraph) -> Result<Insertion> {
        let root_table = &graph.root().table_name;
        if let Some(&existing) = self.tables.get(root_table) {
            if self.same_shape(existing, &graph, NodeId(0)) {
                return Ok(Insertion::Deduplicated(existing));
            }
            return Err(Error::collision(
                root_table,
                format!("{} differs from the entity already generated for this table", graph.root().path),
            ));
        }

        for node in &graph.nodes {
            if let Some(existing) = self.tables.get(&node.table_name) {
                return Err(Error::collision(
                    &node.table_name,
                    format!("{} clashes with {}", node.path, self.nodes[existing.0].path),
                ));
            }
        }

        let offset = self.nodes.len();
        for mut node in graph.nodes {
            node.rebase(offset);
            self.tables.insert(node.table_name.clone(), node.id);
            self.nodes.push(node);
        }

        let root = NodeId(offset);
        self.roots.push(root);
        Ok(Insertion::Inserted(root))
    }

    fn same_shape(&self, existing: NodeId, graph: &EventGraph, local: NodeId) -> bool {
        let a = &self.nodes[existing.0];
        let b = graph.node(local);

        let kinds_match = match (&a.kind, &b.kind) {
            (NodeKind::Root(x), NodeKind::Root(y)) => x == y,
            (NodeKind::Child(x), NodeKind::Child(y)) => {
                x.column_name == y.column_name
                    && x.constraint_name == y.constraint_name
                    && x.cardinality == y.cardinality
            }
            _ => false,
        };

        kinds_match
            && a.identity == b.identity
            && a.table_name == b.table_name
            && a.entity_name == b.entity_name
            && a.columns == b.columns
            && a.children.len() == b.children.len()
            && a.children.iter().zip(&b.children).all(|(x, y)| {
                x.field_name == y.field_name
                    && x.cardinality == y.cardinality
                    && self.same_shape(x.child, graph, y.child)
            })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &EntityNode {
        &self.nodes[id.0]
    }

    /// All nodes, every parent before its children
    pub fn nodes(&self) -> &[EntityNode] {
        &self.nodes
    }

    pub fn roots(&self) -> impl Iterator<Item = &EntityNode> {
        self.roots.iter().map(|id| &self.nodes[id.0])
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (&Relation, &EntityNode)> {
        self.nodes[id.0]
            .children
            .iter()
            .map(|relation| (relation, &self.nodes[relation.child.0]))
    }

    pub fn parent(&self, id: NodeId) -> Option<&EntityNode> {
        self.nodes[id.0]
            .back_reference()
            .map(|back_reference| &self.nodes[back_reference.parent.0])
    }

    pub fn find_table(&self, table_name: &str) -> Option<&EntityNode> {
        self.tables.get(table_name).map(|id| &self.nodes[id.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::naming::SignatureHasher;
    use crate::codegen::parser::AbiParser;

    fn graph_with_depth(json: &str, max_depth: usize) -> Result<EventGraph> {
        let abi = AbiParser::new().parse_content(json)?;
        let event = EventDescriptor::from_abi(&abi.events[0])?;
        let signature = SignatureHasher::new(8)?.sign(&event);
        EntityGraphBuilder::new(max_depth).build(&event, &signature)
    }

    fn graph(json: &str) -> Result<EventGraph> {
        graph_with_depth(json, 32)
    }

    const ORDER: &str = r#"[{"type": "event", "name": "OrderPlaced", "inputs": [
        {"name": "maker", "type": "address"},
        {"name": "order", "type": "tuple", "components": [
            {"name": "price", "type": "uint128"},
            {"name": "legs", "type": "tuple[]", "components": [
                {"name": "asset", "type": "address"},
                {"name": "amount", "type": "int64"}
            ]}
        ]},
        {"name": "tags", "type": "bytes32[]"}
    ]}]"#;

    #[test]
    fn test_tree_shape() {
        let graph = graph(ORDER).unwrap();
        assert_eq!(graph.nodes().len(), 4);

        let root = graph.root();
        assert!(root.is_root());
        assert_eq!(root.columns.len(), 1);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].cardinality, Cardinality::OneToOne);
        assert_eq!(root.children[1].cardinality, Cardinality::OneToMany);

        let order = graph.node(root.children[0].child);
        assert_eq!(order.columns[0].column_name, "price");
        let legs = graph.node(order.children[0].child);
        assert_eq!(legs.columns.len(), 2);
        assert_eq!(legs.back_reference().unwrap().parent, order.id);
    }

    #[test]
    fn test_primitive_array_gets_value_column() {
        let graph = graph(ORDER).unwrap();
        let tags = graph.node(graph.root().children[1].child);

        assert_eq!(tags.columns.len(), 1);
        assert_eq!(tags.columns[0].column_name, "value");
        assert_eq!(tags.columns[0].spec.sql_type(), "character varying(66)");
        assert_eq!(tags.identity_kind(), IdentityKind::LocalSerial);
    }

    #[test]
    fn test_names_share_the_event_fingerprint() {
        let graph = graph(ORDER).unwrap();
        let fingerprint = graph.root().identity.fingerprint.clone();

        for node in graph.nodes() {
            assert_eq!(node.identity.fingerprint, fingerprint);
            assert!(node.table_name.ends_with(&format!("_{}", fingerprint)));
        }

        let order = graph.node(graph.root().children[0].child);
        let back_reference = order.back_reference().unwrap();
        assert_eq!(back_reference.column_name, format!("{}_id", graph.root().table_name));
        assert_eq!(
            back_reference.constraint_name,
            format!("fk_{}_{}", order.table_name, graph.root().table_name)
        );
    }

    #[test]
    fn test_reserved_column_names_collide() {
        let err = graph(
            r#"[{"type": "event", "name": "Logged", "inputs": [{"name": "blockHash", "type": "bytes32"}]}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NameCollision { ref name, .. } if name == "block_hash"));
    }

    #[test]
    fn test_same_field_name_at_two_levels_collides() {
        let err = graph(
            r#"[{"type": "event", "name": "Nested", "inputs": [
                {"name": "inner", "type": "tuple", "components": [
                    {"name": "inner", "type": "tuple", "components": [{"name": "x", "type": "bool"}]}
                ]}
            ]}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NameCollision { .. }));
    }

    #[test]
    fn test_depth_limit() {
        assert!(graph_with_depth(ORDER, 2).is_ok());
        match graph_with_depth(ORDER, 1).unwrap_err() {
            Error::NestingTooDeep { path, limit } => {
                assert_eq!(path, "OrderPlaced.order.legs");
                assert_eq!(limit, 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_forest_deduplicates_identical_events() {
        let mut forest = EntityForest::new();
        let first = forest.insert(graph(ORDER).unwrap()).unwrap();
        let second = forest.insert(graph(ORDER).unwrap()).unwrap();

        assert!(matches!(first, Insertion::Inserted(_)));
        assert_eq!(second, Insertion::Deduplicated(first.root()));
        assert_eq!(forest.len(), 4);
        assert_eq!(forest.roots().count(), 1);
    }

    #[test]
    fn test_forest_rebases_node_ids() {
        let mut forest = EntityForest::new();
        forest
            .insert(graph(r#"[{"type": "event", "name": "Ping", "inputs": []}]"#).unwrap())
            .unwrap();
        let root = forest.insert(graph(ORDER).unwrap()).unwrap().root();

        assert_eq!(root.index(), 1);
        for (relation, child) in forest.children(root) {
            assert_eq!(child.id, relation.child);
            assert_eq!(forest.parent(child.id).unwrap().id, root);
        }
        // Parents always precede their children
        for node in forest.nodes() {
            if let Some(parent) = forest.parent(node.id) {
                assert!(parent.id < node.id);
            }
        }
    }
}
