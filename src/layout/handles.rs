use crate::ir::Point;

/// Connection-point ids on a class box. Each side carries three slots; the
/// suffixed variant of a handle flips its role.
pub const SOURCE_HANDLES: [&str; 12] = [
    "t1-s", "t2-s", "t3-s", "b1", "b2", "b3", "l1", "l2", "l3", "r1", "r2", "r3",
];
pub const TARGET_HANDLES: [&str; 12] = [
    "t1", "t2", "t3", "b1-t", "b2-t", "b3-t", "l1-t", "l2-t", "l3-t", "r1-t", "r2-t", "r3-t",
];

pub fn is_source_handle(id: &str) -> bool {
    SOURCE_HANDLES.contains(&id)
}

pub fn is_target_handle(id: &str) -> bool {
    TARGET_HANDLES.contains(&id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlePair {
    Rightward,
    Leftward,
    Downward,
    Upward,
}

impl HandlePair {
    pub fn source_handle(self) -> &'static str {
        match self {
            Self::Rightward => "r2",
            Self::Leftward => "l2",
            Self::Downward => "b2",
            Self::Upward => "t2-s",
        }
    }

    pub fn target_handle(self) -> &'static str {
        match self {
            Self::Rightward => "l2-t",
            Self::Leftward => "r2-t",
            Self::Downward => "t2",
            Self::Upward => "b2-t",
        }
    }
}

/// Picks the middle handles facing each other along the dominant axis.
/// Ties on `|dx| == |dy|` go vertical.
pub fn select_handles(source: Point, target: Point) -> HandlePair {
    let dx = target.x - source.x;
    let dy = target.y - source.y;
    if dx.abs() > dy.abs() {
        if dx > 0.0 {
            HandlePair::Rightward
        } else {
            HandlePair::Leftward
        }
    } else if dy > 0.0 {
        HandlePair::Downward
    } else {
        HandlePair::Upward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(dx: f32, dy: f32) -> (&'static str, &'static str) {
        let pair = select_handles(Point::new(100.0, 100.0), Point::new(100.0 + dx, 100.0 + dy));
        (pair.source_handle(), pair.target_handle())
    }

    #[test]
    fn dominant_axis_decides_side() {
        assert_eq!(pick(120.0, 10.0), ("r2", "l2-t"));
        assert_eq!(pick(-120.0, 10.0), ("l2", "r2-t"));
        assert_eq!(pick(10.0, 120.0), ("b2", "t2"));
        assert_eq!(pick(10.0, -5.0), ("t2-s", "b2-t"));
    }

    #[test]
    fn diagonal_and_coincident_go_vertical() {
        assert_eq!(pick(50.0, 50.0), ("b2", "t2"));
        assert_eq!(pick(0.0, 0.0), ("t2-s", "b2-t"));
    }

    #[test]
    fn selected_handles_belong_to_catalogue() {
        for pair in [
            HandlePair::Rightward,
            HandlePair::Leftward,
            HandlePair::Downward,
            HandlePair::Upward,
        ] {
            assert!(is_source_handle(pair.source_handle()));
            assert!(is_target_handle(pair.target_handle()));
        }
        assert!(!is_source_handle("t2"));
        assert!(!is_target_handle("x9"));
    }
}
