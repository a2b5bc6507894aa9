use crate::ir::{
    ClassKind, ClassNode, Field, Method, Model, PackageNode, RelationKind, Relationship,
    Visibility, assign_edge_ids,
};
use crate::theme::{DEFAULT_NODE_POSITION, styled_package};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, trace};

static NAMESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^namespace\s+([\w.]+)\s*\{$").unwrap());
static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(abstract)\s+)?(class|interface|enum)\s+(\w+)\s*\{$").unwrap()
});
static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+)(?:\s*:\s*(.*?))?(?:\s+\[([-+#~])\])?(?:\s+(static))?$").unwrap()
});
static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+)\s*\(([^)]*)\)\s*:\s*(.+?)(?:\s+\[([-+#~])\])?(?:\s+(static))?$").unwrap()
});
static RELATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<source>[\w.]+)\s+(?P<op>--\|>|\.\.\|>|\.\.>|o--|\*--|->|--)\s+(?P<target>[\w.]+)(?:\s+\[type:\s*(?P<kind>\w+)\s*\])?$",
    )
    .unwrap()
});

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("class `{class}` is bound to package `{package}` which was never opened")]
    DanglingPackage { class: String, package: String },
}

/// A relationship line as written, before its endpoints are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRelation {
    pub source: String,
    pub target: String,
    pub operator: String,
    pub explicit_kind: Option<String>,
    pub kind: RelationKind,
    pub line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedAml {
    pub packages: Vec<PackageNode>,
    pub nodes: Vec<ClassNode>,
    pub relations: Vec<RawRelation>,
    /// Names declared more than once; the last declaration was kept.
    pub duplicates: Vec<String>,
}

impl ParsedAml {
    /// Resolves relationships against the declared nodes and assigns edge ids.
    pub fn into_model(self) -> Model {
        let known: HashSet<&str> = self.nodes.iter().map(|node| node.id.as_str()).collect();
        let mut edges = Vec::with_capacity(self.relations.len());
        for relation in &self.relations {
            if !known.contains(relation.source.as_str()) || !known.contains(relation.target.as_str()) {
                debug!(
                    source = %relation.source,
                    target = %relation.target,
                    line = relation.line + 1,
                    "dropping relationship with unresolved endpoint"
                );
                continue;
            }
            edges.push(Relationship::new(&relation.source, &relation.target, relation.kind));
        }
        assign_edge_ids(&mut edges);
        Model {
            packages: self.packages,
            nodes: self.nodes,
            edges,
        }
    }
}

/// Parses AML text and resolves it into a model.
pub fn parse(input: &str) -> Result<Model, ParseError> {
    parse_aml(input).map(ParsedAml::into_model)
}

/// Scope state for one parse call: the innermost open package and class.
#[derive(Debug, Default)]
struct ScopeCursor {
    package: Option<String>,
    class: Option<String>,
}

impl ScopeCursor {
    fn close(&mut self) {
        if self.class.take().is_none() {
            self.package = None;
        }
    }
}

pub fn parse_aml(input: &str) -> Result<ParsedAml, ParseError> {
    let mut parsed = ParsedAml::default();
    let mut cursor = ScopeCursor::default();

    for (line_no, line) in logical_lines(input) {
        if let Some(caps) = NAMESPACE_RE.captures(&line) {
            let name = caps[1].to_string();
            if parsed.packages.iter().all(|pkg| pkg.name != name) {
                let index = parsed.packages.len();
                parsed.packages.push(styled_package(&name, index));
            }
            cursor.package = Some(name);
            cursor.class = None;
            continue;
        }

        if let Some(caps) = CLASS_RE.captures(&line) {
            let node = class_from_captures(&caps, cursor.package.clone());
            if let Some(existing) = parsed.nodes.iter().position(|n| n.id == node.id) {
                debug!(name = %node.id, line = line_no + 1, "duplicate declaration replaces earlier one");
                parsed.nodes.remove(existing);
                parsed.duplicates.push(node.id.clone());
            }
            cursor.class = Some(node.id.clone());
            parsed.nodes.push(node);
            continue;
        }

        if line == "}" {
            cursor.close();
            continue;
        }

        if let Some(class_id) = cursor.class.as_deref() {
            let Some(node) = parsed.nodes.iter_mut().rev().find(|n| n.id == class_id) else {
                continue;
            };
            if let Some(field) = parse_field(&line) {
                node.fields.push(field);
            } else if let Some(method) = parse_method(&line) {
                node.methods.push(method);
            } else {
                trace!(line = line_no + 1, text = %line, "skipping unrecognized member line");
            }
            continue;
        }

        if let Some(relation) = parse_relation(&line, line_no) {
            parsed.relations.push(relation);
            continue;
        }

        trace!(line = line_no + 1, text = %line, "skipping unrecognized line");
    }

    for node in &parsed.nodes {
        if let Some(package) = &node.package {
            if parsed.packages.iter().all(|pkg| &pkg.name != package) {
                return Err(ParseError::DanglingPackage {
                    class: node.id.clone(),
                    package: package.clone(),
                });
            }
        }
    }

    Ok(parsed)
}

/// Splits input into trimmed logical lines, breaking after every `{` and around every `}`.
/// Comment and blank lines are dropped; line numbers refer to the physical line.
fn logical_lines(input: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    for (line_no, raw_line) in input.lines().enumerate() {
        let line = strip_trailing_comment(raw_line.trim());
        if line.is_empty() {
            continue;
        }
        let mut current = String::new();
        for ch in line.chars() {
            match ch {
                '{' => {
                    current.push('{');
                    flush_logical(&mut out, line_no, &mut current);
                }
                '}' => {
                    flush_logical(&mut out, line_no, &mut current);
                    out.push((line_no, "}".to_string()));
                }
                _ => current.push(ch),
            }
        }
        flush_logical(&mut out, line_no, &mut current);
    }
    out
}

fn flush_logical(out: &mut Vec<(usize, String)>, line_no: usize, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        out.push((line_no, trimmed.to_string()));
    }
    current.clear();
}

fn strip_trailing_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => line[..idx].trim_end(),
        None => line,
    }
}

fn class_from_captures(caps: &Captures<'_>, package: Option<String>) -> ClassNode {
    let kind = ClassKind::from_keyword(&caps[2]).unwrap_or_default();
    let mut node = ClassNode::new(&caps[3], kind);
    node.is_abstract = caps.get(1).is_some() && kind == ClassKind::Class;
    node.package = package;
    node.position = DEFAULT_NODE_POSITION;
    node
}

fn parse_visibility(caps: &Captures<'_>, idx: usize) -> Visibility {
    caps.get(idx)
        .and_then(|m| Visibility::from_symbol(m.as_str()))
        .unwrap_or_default()
}

fn parse_field(line: &str) -> Option<Field> {
    let caps = FIELD_RE.captures(line)?;
    Some(Field {
        name: caps[1].to_string(),
        type_name: caps.get(2).map_or("", |m| m.as_str().trim()).to_string(),
        visibility: parse_visibility(&caps, 3),
        is_static: caps.get(4).is_some(),
    })
}

fn parse_method(line: &str) -> Option<Method> {
    let caps = METHOD_RE.captures(line)?;
    Some(Method {
        name: caps[1].to_string(),
        parameters: split_parameters(&caps[2]),
        return_type: caps[3].trim().to_string(),
        visibility: parse_visibility(&caps, 4),
        is_static: caps.get(5).is_some(),
    })
}

/// Splits a parameter list on commas that are not nested inside `<...>`.
fn split_parameters(raw: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in raw.chars() {
        match ch {
            '<' => {
                depth += 1;
                current.push(ch);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                let param = current.trim();
                if !param.is_empty() {
                    params.push(param.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    let param = current.trim();
    if !param.is_empty() {
        params.push(param.to_string());
    }
    params
}

fn parse_relation(line: &str, line_no: usize) -> Option<RawRelation> {
    let caps = RELATION_RE.captures(line)?;
    let operator = caps["op"].to_string();
    let explicit_kind = caps.name("kind").map(|m| m.as_str().to_string());
    let kind = explicit_kind
        .as_deref()
        .and_then(RelationKind::from_keyword)
        .or_else(|| RelationKind::from_operator(&operator))?;
    Some(RawRelation {
        source: caps["source"].to_string(),
        target: caps["target"].to_string(),
        operator,
        explicit_kind,
        kind,
        line: line_no,
    })
}
