use crate::ir::{ClassKind, ClassNode, Field, Method, Model, Visibility};
use std::collections::HashSet;

const INDENT: &str = "    ";

/// Renders a model as canonical AML text.
///
/// Packages come first in model order, each as a `namespace` block holding its
/// nodes, followed by package-less nodes and a `// Relationships` section.
/// Default annotations (`[+]`) are omitted and identical relationship lines are
/// written once. Edges whose endpoints are not declared nodes are skipped.
pub fn generate_aml(model: &Model) -> String {
    let mut lines: Vec<String> = Vec::new();

    let mut groups: Vec<(String, Vec<&ClassNode>)> = model
        .packages
        .iter()
        .map(|pkg| (pkg.name.clone(), Vec::new()))
        .collect();
    let mut top_level: Vec<&ClassNode> = Vec::new();

    for node in &model.nodes {
        let Some(package) = node.package.as_deref() else {
            top_level.push(node);
            continue;
        };
        match groups.iter_mut().find(|(name, _)| name == package) {
            Some((_, members)) => members.push(node),
            None => groups.push((package.to_string(), vec![node])),
        }
    }

    for (name, members) in &groups {
        lines.push(format!("namespace {name} {{"));
        for node in members {
            render_class(&mut lines, node, INDENT);
            lines.push(String::new());
        }
        if !members.is_empty() {
            lines.pop();
        }
        lines.push("}".to_string());
        lines.push(String::new());
    }

    for node in top_level {
        render_class(&mut lines, node, "");
        lines.push(String::new());
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut relations: Vec<String> = Vec::new();
    for edge in model.resolved_edges() {
        let line = format!("{} {} {}", edge.source, edge.kind.operator(), edge.target);
        if seen.insert(line.clone()) {
            relations.push(line);
        }
    }
    if !relations.is_empty() {
        lines.push("// Relationships".to_string());
        lines.extend(relations);
    }

    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn render_class(lines: &mut Vec<String>, node: &ClassNode, indent: &str) {
    let prefix = if node.is_abstract && node.kind == ClassKind::Class {
        "abstract "
    } else {
        ""
    };
    lines.push(format!("{indent}{prefix}{} {} {{", node.kind.keyword(), node.id));
    for field in &node.fields {
        lines.push(format!("{indent}{INDENT}{}", render_field(field)));
    }
    for method in &node.methods {
        lines.push(format!("{indent}{INDENT}{}", render_method(method)));
    }
    lines.push(format!("{indent}}}"));
}

fn annotations(visibility: Visibility, is_static: bool) -> String {
    let mut out = String::new();
    if visibility != Visibility::Public {
        out.push_str(&format!(" [{}]", visibility.symbol()));
    }
    if is_static {
        out.push_str(" static");
    }
    out
}

/// Fields without a type, such as enum constants, are written as a bare name.
pub fn render_field(field: &Field) -> String {
    if field.type_name.is_empty() {
        return format!("{}{}", field.name, annotations(field.visibility, field.is_static));
    }
    format!(
        "{}: {}{}",
        field.name,
        field.type_name,
        annotations(field.visibility, field.is_static)
    )
}

pub fn render_method(method: &Method) -> String {
    format!(
        "{}({}): {}{}",
        method.name,
        method.parameters.join(", "),
        method.return_type,
        annotations(method.visibility, method.is_static)
    )
}
