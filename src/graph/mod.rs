//! Graph model: the hierarchical graph exchanged between codecs, the layout
//! harness and version modules.
//!
//! DESIGN
//! ======
//! A rooted tree: every `GraphNode` owns its ports, child nodes, contained
//! edges and labels, and labels own labels recursively. Edges never hold
//! pointers into the tree. Their endpoints are `ShapeRef` paths (child indices
//! from the root plus an optional port index), so a graph can be cloned,
//! serialized and compared structurally without any shared ownership.
//!
//! Layout always runs on a private clone. The caller's instance is never
//! mutated.

pub mod identity;
pub mod properties;

use serde::{Deserialize, Serialize};

pub use properties::{Properties, PropertyValue};

// =============================================================================
// GEOMETRY
// =============================================================================

/// A coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Position and size of a shape. A width or height `<= 0` means "not yet sized".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// `true` when either dimension is non-zero.
    #[must_use]
    pub fn has_size(&self) -> bool {
        self.width > 0.0 || self.height > 0.0
    }
}

// =============================================================================
// ELEMENTS
// =============================================================================

/// A text label. Labels may carry labels of their own.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphLabel {
    pub identifier: Option<String>,
    pub text: String,
    pub bounds: Bounds,
    pub properties: Properties,
    pub labels: Vec<GraphLabel>,
}

impl GraphLabel {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }
}

/// A port on the border of a node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphPort {
    pub identifier: Option<String>,
    pub bounds: Bounds,
    pub properties: Properties,
    pub labels: Vec<GraphLabel>,
}

impl GraphPort {
    #[must_use]
    pub fn named(identifier: impl Into<String>) -> Self {
        Self { identifier: Some(identifier.into()), ..Self::default() }
    }
}

/// Reference to an edge endpoint: a node addressed by its child-index path
/// from the root (empty path = the root), optionally narrowed to one of its ports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ShapeRef {
    pub node: Vec<usize>,
    pub port: Option<usize>,
}

impl ShapeRef {
    #[must_use]
    pub fn node(path: impl Into<Vec<usize>>) -> Self {
        Self { node: path.into(), port: None }
    }

    #[must_use]
    pub fn port(path: impl Into<Vec<usize>>, port: usize) -> Self {
        Self { node: path.into(), port: Some(port) }
    }
}

/// One routed piece of an edge: start point, ordered bend points, end point.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeSection {
    pub identifier: Option<String>,
    pub start: Point,
    pub bend_points: Vec<Point>,
    pub end: Point,
}

/// An edge contained in a node. Exactly one source and one target makes it a
/// simple edge; anything else is a hyperedge.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphEdge {
    pub identifier: Option<String>,
    pub sources: Vec<ShapeRef>,
    pub targets: Vec<ShapeRef>,
    pub sections: Vec<EdgeSection>,
    pub properties: Properties,
    pub labels: Vec<GraphLabel>,
}

impl GraphEdge {
    #[must_use]
    pub fn new(sources: Vec<ShapeRef>, targets: Vec<ShapeRef>) -> Self {
        Self { sources, targets, ..Self::default() }
    }

    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.sources.len() == 1 && self.targets.len() == 1
    }
}

/// A node. The root of a graph is a `GraphNode` as well.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphNode {
    pub identifier: Option<String>,
    pub bounds: Bounds,
    pub properties: Properties,
    pub labels: Vec<GraphLabel>,
    pub ports: Vec<GraphPort>,
    pub children: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphNode {
    #[must_use]
    pub fn named(identifier: impl Into<String>) -> Self {
        Self { identifier: Some(identifier.into()), ..Self::default() }
    }

    /// Follow a child-index path down from this node.
    #[must_use]
    pub fn node_at(&self, path: &[usize]) -> Option<&GraphNode> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get(index))
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut GraphNode> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get_mut(index))
    }

    /// Bounds of the node or port an endpoint refers to.
    #[must_use]
    pub fn shape_bounds(&self, shape: &ShapeRef) -> Option<Bounds> {
        let node = self.node_at(&shape.node)?;
        match shape.port {
            Some(port) => node.ports.get(port).map(|p| p.bounds),
            None => Some(node.bounds),
        }
    }

    /// `true` when every edge endpoint in the tree resolves.
    #[must_use]
    pub fn references_resolve(&self) -> bool {
        fn walk(root: &GraphNode, node: &GraphNode) -> bool {
            node.edges
                .iter()
                .flat_map(|e| e.sources.iter().chain(&e.targets))
                .all(|r| root.shape_bounds(r).is_some())
                && node.children.iter().all(|c| walk(root, c))
        }
        walk(self, self)
    }

    /// Number of nodes in the subtree below this node (the node itself excluded).
    #[must_use]
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
