use crate::ir::{
    ClassKind, ClassNode, Field, Method, Model, RelationKind, Relationship, assign_edge_ids,
};
use crate::theme::{DEFAULT_NODE_POSITION, styled_package};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// One class as reported by a source-code extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub associations: Vec<String>,
    #[serde(default)]
    pub aggregations: Vec<String>,
    #[serde(default)]
    pub compositions: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub methods: Vec<Method>,
    #[serde(default)]
    pub is_abstract: bool,
}

impl ClassRecord {
    fn class_kind(&self) -> ClassKind {
        match self.kind.as_str() {
            "annotation" => ClassKind::Interface,
            other => ClassKind::from_keyword(other).unwrap_or_default(),
        }
    }

    /// Outgoing relationships in record order, minus self references, repeats,
    /// and dependencies already expressed by a stronger link.
    fn relations(&self) -> Vec<(RelationKind, &str)> {
        let mut out: Vec<(RelationKind, &str)> = Vec::new();
        let strong: HashSet<&str> = self
            .associations
            .iter()
            .chain(&self.aggregations)
            .chain(&self.compositions)
            .map(String::as_str)
            .collect();

        let lists: [(RelationKind, Vec<&str>); 6] = [
            (RelationKind::Extends, self.extends.iter().map(String::as_str).collect()),
            (RelationKind::Implements, self.implements.iter().map(String::as_str).collect()),
            (RelationKind::Association, self.associations.iter().map(String::as_str).collect()),
            (RelationKind::Aggregation, self.aggregations.iter().map(String::as_str).collect()),
            (RelationKind::Composition, self.compositions.iter().map(String::as_str).collect()),
            (
                RelationKind::Dependency,
                self.dependencies
                    .iter()
                    .map(String::as_str)
                    .filter(|dep| !strong.contains(dep))
                    .collect(),
            ),
        ];

        for (kind, targets) in lists {
            let mut seen: HashSet<&str> = HashSet::new();
            for target in targets {
                if target == self.name || !seen.insert(target) {
                    continue;
                }
                out.push((kind, target));
            }
        }
        out
    }
}

/// Builds a model from extractor records, converging on the parser's node and edge shape.
pub fn model_from_records(records: &[ClassRecord]) -> Model {
    let mut model = Model::new();

    for record in records {
        if let Some(package) = record.package.as_deref() {
            if model.package_named(package).is_none() {
                let index = model.packages.len();
                model.packages.push(styled_package(package, index));
            }
        }

        let kind = record.class_kind();
        let mut node = ClassNode::new(&record.name, kind);
        node.is_abstract = record.is_abstract && kind == ClassKind::Class;
        node.fields = record.fields.clone();
        node.methods = record.methods.clone();
        node.package = record.package.clone();
        node.position = DEFAULT_NODE_POSITION;

        if let Some(existing) = model.nodes.iter().position(|n| n.id == node.id) {
            debug!(name = %node.id, "duplicate record replaces earlier one");
            model.nodes.remove(existing);
        }
        model.nodes.push(node);
    }

    let known: HashSet<&str> = model.nodes.iter().map(|node| node.id.as_str()).collect();
    let mut edges: Vec<Relationship> = Vec::new();
    // Only the last record for a duplicated name contributes edges.
    let mut seen: HashSet<&str> = HashSet::new();
    let mut surviving: Vec<&ClassRecord> = Vec::new();
    for record in records.iter().rev() {
        if seen.insert(record.name.as_str()) {
            surviving.push(record);
        }
    }
    surviving.reverse();

    for record in surviving {
        for (kind, target) in record.relations() {
            if !known.contains(target) {
                debug!(source = %record.name, target = %target, "dropping record relation to unknown class");
                continue;
            }
            edges.push(Relationship::new(&record.name, target, kind));
        }
    }
    assign_edge_ids(&mut edges);
    model.edges = edges;
    model
}
