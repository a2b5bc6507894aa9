use crate::ir::{ClassKind, ClassNode, Model, RelationKind, Relationship};
use std::collections::BTreeSet;

/// Exports the model as a PlantUML class diagram.
pub fn render_plantuml(model: &Model, title: Option<&str>) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(match title {
        Some(title) => format!("@startuml {title}"),
        None => "@startuml".to_string(),
    });
    lines.push(String::new());

    lines.push("skinparam shadowing false".to_string());
    lines.push("skinparam class {".to_string());
    lines.push("    BackgroundColor white".to_string());
    lines.push("    ArrowColor #263238".to_string());
    lines.push("    BorderColor #263238".to_string());
    lines.push("}".to_string());
    lines.push("skinparam packageStyle rectangle".to_string());

    let mut groups: Vec<(&str, Vec<&ClassNode>)> = Vec::new();
    let mut loose: Vec<&ClassNode> = Vec::new();
    for node in &model.nodes {
        let Some(package) = node.package.as_deref() else {
            loose.push(node);
            continue;
        };
        match groups.iter_mut().find(|(name, _)| *name == package) {
            Some((_, members)) => members.push(node),
            None => groups.push((package, vec![node])),
        }
    }

    let total = model.nodes.len();
    let density = total as f32 / groups.len().max(1) as f32;
    if groups.len() >= 4 || density > 5.0 {
        lines.push("left to right direction".to_string());
    } else {
        lines.push("top to bottom direction".to_string());
    }

    let (mut nodesep, mut ranksep) = (50, 60);
    if total > 15 {
        nodesep += 30;
        ranksep += 40;
    }
    lines.push(format!("skinparam nodesep {nodesep}"));
    lines.push(format!("skinparam ranksep {ranksep}"));
    lines.push("skinparam linetype polyline".to_string());
    lines.push(String::new());

    for (name, members) in &mut groups {
        members.sort_by(|a, b| a.id.cmp(&b.id));
        lines.push(format!("  package \"{name}\" {{"));
        for node in members.iter() {
            write_class(&mut lines, node);
        }
        lines.push("  }".to_string());
        lines.push(String::new());
    }

    loose.sort_by(|a, b| a.id.cmp(&b.id));
    for node in loose {
        write_class(&mut lines, node);
    }

    let relations: BTreeSet<String> = model.resolved_edges().map(relation_line).collect();
    if !relations.is_empty() {
        lines.push(String::new());
        lines.push("' Relationships".to_string());
        lines.extend(relations);
    }

    lines.push("@enduml".to_string());
    lines.join("\n")
}

fn write_class(lines: &mut Vec<String>, node: &ClassNode) {
    let header = if node.is_abstract && node.kind == ClassKind::Class {
        format!("abstract class {}", node.id)
    } else {
        format!("{} {}", node.kind.keyword(), node.id)
    };
    lines.push(format!("    {header} {{"));
    for field in &node.fields {
        let prefix = if field.is_static { "{static} " } else { "" };
        lines.push(format!(
            "      {}{prefix}{} : {}",
            field.visibility.symbol(),
            field.name,
            field.type_name
        ));
    }
    for method in &node.methods {
        let prefix = if method.is_static { "{static} " } else { "" };
        lines.push(format!(
            "      {}{prefix}{}({}) : {}",
            method.visibility.symbol(),
            method.name,
            method.parameters.join(", "),
            method.return_type
        ));
    }
    lines.push("    }".to_string());
}

fn relation_line(edge: &Relationship) -> String {
    let (source, target) = (&edge.source, &edge.target);
    match edge.kind {
        RelationKind::Extends => format!("{target} <|-- {source}"),
        RelationKind::Implements => format!("{target} <|.. {source}"),
        RelationKind::Association => format!("{source} --> {target}"),
        RelationKind::Aggregation => format!("{source} o-- {target}"),
        RelationKind::Composition => format!("{source} *-- {target}"),
        RelationKind::Dependency => format!("{source} ..> {target}"),
    }
}
