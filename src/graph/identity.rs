//! Externally visible element identifiers.
//!
//! Walk up the containment chain; at each level use the explicit identifier
//! when present, otherwise `<feature>#<ordinal>`; join levels with `.`. The
//! root uses its own identifier or the literal `graph`.

use super::{GraphNode, ShapeRef};

pub const ROOT_ID: &str = "graph";
pub const LEVEL_SEPARATOR: &str = ".";
pub const ORDINAL_SEPARATOR: &str = "#";

/// The containing collection an element lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Children,
    Ports,
    ContainedEdges,
    Labels,
}

impl Feature {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Children => "children",
            Self::Ports => "ports",
            Self::ContainedEdges => "containedEdges",
            Self::Labels => "labels",
        }
    }
}

#[must_use]
pub fn root_id(root: &GraphNode) -> String {
    root.identifier
        .clone()
        .unwrap_or_else(|| ROOT_ID.to_owned())
}

/// Identifier of an element at `index` in `feature` of the element `parent_id`.
#[must_use]
pub fn child_id(parent_id: &str, explicit: Option<&str>, feature: Feature, index: usize) -> String {
    match explicit {
        Some(id) => format!("{parent_id}{LEVEL_SEPARATOR}{id}"),
        None => format!("{parent_id}{LEVEL_SEPARATOR}{}{ORDINAL_SEPARATOR}{index}", feature.name()),
    }
}

/// Identifier of the node at `path` below `root`.
#[must_use]
pub fn node_id(root: &GraphNode, path: &[usize]) -> Option<String> {
    let mut id = root_id(root);
    let mut node = root;
    for &index in path {
        node = node.children.get(index)?;
        id = child_id(&id, node.identifier.as_deref(), Feature::Children, index);
    }
    Some(id)
}

/// Identifier of the node or port an edge endpoint refers to.
#[must_use]
pub fn shape_id(root: &GraphNode, shape: &ShapeRef) -> Option<String> {
    let id = node_id(root, &shape.node)?;
    match shape.port {
        None => Some(id),
        Some(index) => {
            let port = root.node_at(&shape.node)?.ports.get(index)?;
            Some(child_id(&id, port.identifier.as_deref(), Feature::Ports, index))
        }
    }
}
