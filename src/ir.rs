use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TB")]
    TopDown,
    #[serde(rename = "LR")]
    LeftRight,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "TD" | "TB" => Some(Self::TopDown),
            "LR" => Some(Self::LeftRight),
            _ => None,
        }
    }

    pub fn rankdir(self) -> &'static str {
        match self {
            Self::TopDown => "TB",
            Self::LeftRight => "LR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn half(self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn clamp_min(self, min: Size) -> Size {
        Size::new(self.width.max(min.width), self.height.max(min.height))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Enum,
}

impl ClassKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "enum" => Some(Self::Enum),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Enum => "enum",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub enum Visibility {
    #[default]
    #[serde(rename = "+")]
    Public,
    #[serde(rename = "-")]
    Private,
    #[serde(rename = "#")]
    Protected,
    #[serde(rename = "~")]
    Package,
}

impl Visibility {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Self::Public),
            "-" => Some(Self::Private),
            "#" => Some(Self::Protected),
            "~" => Some(Self::Package),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Public => "+",
            Self::Private => "-",
            Self::Protected => "#",
            Self::Package => "~",
        }
    }
}

/// Empty, missing or unrecognised symbols read as public.
impl<'de> Deserialize<'de> for Visibility {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let symbol = Option::<String>::deserialize(deserializer)?;
        Ok(symbol
            .as_deref()
            .and_then(|s| Self::from_symbol(s.trim()))
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            visibility: Visibility::Public,
            is_static: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    pub return_type: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

impl Method {
    pub fn new(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: return_type.into(),
            visibility: Visibility::Public,
            is_static: false,
        }
    }
}

/// Per-node font size overrides. `None` leaves the renderer default in place.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FontSizes {
    pub header: Option<f32>,
    pub fields: Option<f32>,
    pub methods: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageNode {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub position: Point,
    pub size: Size,
    pub font_size: Option<f32>,
}

impl PackageNode {
    pub fn new(name: &str, position: Point, size: Size) -> Self {
        Self {
            id: Self::id_for(name),
            name: name.to_string(),
            color: None,
            position,
            size,
            font_size: None,
        }
    }

    pub fn id_for(name: &str) -> String {
        format!("pkg-{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassNode {
    pub id: String,
    pub kind: ClassKind,
    pub is_abstract: bool,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    /// Owning package name. Lookup only; the package list owns packages.
    pub package: Option<String>,
    /// Relative to the owning package's top-left when `package` is set.
    pub position: Point,
    pub font: FontSizes,
    pub color: Option<String>,
}

impl ClassNode {
    pub fn new(id: &str, kind: ClassKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            is_abstract: false,
            fields: Vec::new(),
            methods: Vec::new(),
            package: None,
            position: Point::default(),
            font: FontSizes::default(),
            color: None,
        }
    }

    pub fn package_id(&self) -> Option<String> {
        self.package.as_deref().map(PackageNode::id_for)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Extends,
    Implements,
    Association,
    Aggregation,
    Composition,
    Dependency,
}

impl RelationKind {
    pub const ALL: [RelationKind; 6] = [
        Self::Extends,
        Self::Implements,
        Self::Association,
        Self::Aggregation,
        Self::Composition,
        Self::Dependency,
    ];

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "extends" | "inheritance" => Some(Self::Extends),
            "implements" | "realization" => Some(Self::Implements),
            "association" => Some(Self::Association),
            "aggregation" => Some(Self::Aggregation),
            "composition" => Some(Self::Composition),
            "dependency" => Some(Self::Dependency),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Extends => "extends",
            Self::Implements => "implements",
            Self::Association => "association",
            Self::Aggregation => "aggregation",
            Self::Composition => "composition",
            Self::Dependency => "dependency",
        }
    }

    /// Kind implied by a relationship operator when no explicit type is given.
    pub fn from_operator(operator: &str) -> Option<Self> {
        match operator {
            "--|>" => Some(Self::Extends),
            "..|>" => Some(Self::Implements),
            "o--" => Some(Self::Aggregation),
            "*--" => Some(Self::Composition),
            "..>" => Some(Self::Dependency),
            "--" | "->" => Some(Self::Association),
            _ => None,
        }
    }

    /// Operator the generator writes for this kind.
    pub fn operator(self) -> &'static str {
        match self {
            Self::Extends => "--|>",
            Self::Implements => "..|>",
            Self::Association => "->",
            Self::Aggregation => "o--",
            Self::Composition => "*--",
            Self::Dependency => "..>",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
    pub waypoints: Vec<Point>,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

impl Relationship {
    /// Creates an edge with an empty id; call [`assign_edge_ids`] once the edge list is final.
    pub fn new(source: &str, target: &str, kind: RelationKind) -> Self {
        Self {
            id: String::new(),
            source: source.to_string(),
            target: target.to_string(),
            kind,
            waypoints: Vec::new(),
            source_handle: None,
            target_handle: None,
        }
    }
}

pub fn edge_id(source: &str, kind: RelationKind, target: &str, index: usize) -> String {
    format!("e-{source}-{}-{target}-{index}", kind.keyword())
}

/// Numbers edges per `(source, kind)` in list order and derives their ids.
pub fn assign_edge_ids(edges: &mut [Relationship]) {
    let mut counters: HashMap<(String, RelationKind), usize> = HashMap::new();
    for edge in edges.iter_mut() {
        let counter = counters
            .entry((edge.source.clone(), edge.kind))
            .or_insert(0);
        edge.id = edge_id(&edge.source, edge.kind, &edge.target, *counter);
        *counter += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    pub packages: Vec<PackageNode>,
    pub nodes: Vec<ClassNode>,
    pub edges: Vec<Relationship>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&ClassNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut ClassNode> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    pub fn package(&self, id: &str) -> Option<&PackageNode> {
        self.packages.iter().find(|pkg| pkg.id == id)
    }

    pub fn package_mut(&mut self, id: &str) -> Option<&mut PackageNode> {
        self.packages.iter_mut().find(|pkg| pkg.id == id)
    }

    pub fn package_named(&self, name: &str) -> Option<&PackageNode> {
        self.packages.iter().find(|pkg| pkg.name == name)
    }

    pub fn edge(&self, id: &str) -> Option<&Relationship> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut Relationship> {
        self.edges.iter_mut().find(|edge| edge.id == id)
    }

    pub fn renumber_edges(&mut self) {
        assign_edge_ids(&mut self.edges);
    }

    /// Edges whose endpoints both name known class nodes, in model order.
    pub fn resolved_edges(&self) -> impl Iterator<Item = &Relationship> {
        self.edges
            .iter()
            .filter(|edge| self.node(&edge.source).is_some() && self.node(&edge.target).is_some())
    }

    pub fn structure(&self) -> Structure {
        let mut packages: Vec<String> = self.packages.iter().map(|pkg| pkg.name.clone()).collect();
        packages.sort();
        packages.dedup();

        let mut nodes: Vec<NodeStructure> = self
            .nodes
            .iter()
            .map(|node| NodeStructure {
                id: node.id.clone(),
                kind: node.kind,
                is_abstract: node.is_abstract,
                fields: node.fields.clone(),
                methods: node.methods.clone(),
                package: node.package.clone(),
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let edges: BTreeSet<(String, RelationKind, String)> = self
            .resolved_edges()
            .map(|edge| (edge.source.clone(), edge.kind, edge.target.clone()))
            .collect();

        Structure {
            packages,
            nodes,
            edges: edges.into_iter().collect(),
        }
    }
}

/// Order-insensitive structural content of a model: everything AML text can express.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Structure {
    pub packages: Vec<String>,
    pub nodes: Vec<NodeStructure>,
    pub edges: Vec<(String, RelationKind, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStructure {
    pub id: String,
    pub kind: ClassKind,
    pub is_abstract: bool,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub package: Option<String>,
}
