use crate::ir::{PackageNode, Point, Size};

/// Package fills, assigned cyclically in package-creation order.
pub const PACKAGE_PALETTE: [&str; 8] = [
    "rgba(219, 234, 254, 0.7)",
    "rgba(220, 252, 231, 0.7)",
    "rgba(254, 249, 195, 0.7)",
    "rgba(255, 228, 230, 0.7)",
    "rgba(243, 232, 255, 0.7)",
    "rgba(255, 237, 213, 0.7)",
    "rgba(241, 245, 249, 0.7)",
    "rgba(255, 255, 255, 0.9)",
];

pub const DEFAULT_PACKAGE_SIZE: Size = Size::new(500.0, 400.0);
pub const DEFAULT_NODE_POSITION: Point = Point::new(50.0, 50.0);

pub fn palette_color(index: usize) -> &'static str {
    PACKAGE_PALETTE[index % PACKAGE_PALETTE.len()]
}

/// Provisional position for the `index`-th package, staggered along x.
pub fn staggered_package_position(index: usize) -> Point {
    Point::new(50.0 + index as f32 * 100.0, 50.0)
}

/// A fresh package styled for its creation order.
pub fn styled_package(name: &str, index: usize) -> PackageNode {
    let mut package = PackageNode::new(name, staggered_package_position(index), DEFAULT_PACKAGE_SIZE);
    package.color = Some(palette_color(index).to_string());
    package
}
