//! Default sizing applied to the private copy before layout, so that every
//! element entering an engine has a usable bounding box.
//!
//! Label sizes are a fixed per-character estimate, not font metrics.

use crate::graph::{GraphLabel, GraphNode};

pub const DEFAULT_PORT_SIZE: f64 = 5.0;
pub const DEFAULT_NODE_SIZE: f64 = 30.0;
pub const LABEL_CHAR_WIDTH: f64 = 9.0;
pub const LABEL_HEIGHT: f64 = 16.0;

/// Size the ports, child nodes and labels below `parent`. The parent's own
/// bounds are left alone, so the root keeps whatever size it came with.
pub fn apply_defaults(parent: &mut GraphNode) {
    for port in &mut parent.ports {
        if port.bounds.width <= 0.0 {
            port.bounds.width = DEFAULT_PORT_SIZE;
        }
        if port.bounds.height <= 0.0 {
            port.bounds.height = DEFAULT_PORT_SIZE;
        }
        size_labels(&mut port.labels);
    }
    for node in &mut parent.children {
        if node.bounds.width <= 0.0 {
            node.bounds.width = DEFAULT_NODE_SIZE;
        }
        if node.bounds.height <= 0.0 {
            node.bounds.height = DEFAULT_NODE_SIZE;
        }
        size_labels(&mut node.labels);
        apply_defaults(node);
    }
    for edge in &mut parent.edges {
        size_labels(&mut edge.labels);
    }
}

fn size_labels(labels: &mut [GraphLabel]) {
    for label in labels {
        if label.text.is_empty() {
            continue;
        }
        if label.bounds.width <= 0.0 {
            #[allow(clippy::cast_precision_loss)]
            let chars = label.text.chars().count() as f64;
            label.bounds.width = chars * LABEL_CHAR_WIDTH;
        }
        if label.bounds.height <= 0.0 {
            label.bounds.height = LABEL_HEIGHT;
        }
    }
}
