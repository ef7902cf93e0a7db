//! Diagram model: the typed output tree handed to rendering clients.
//!
//! Serialized as camelCase JSON. `children` is absent until the first child is
//! attached, and an absent list is distinct from an empty one.

use serde::{Deserialize, Serialize};

use crate::graph::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Graph,
    Node,
    Port,
    Edge,
    Label,
    Junction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramElement {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_points: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<DiagramElement>>,
}

impl DiagramElement {
    #[must_use]
    pub fn new(kind: ElementKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            text: None,
            position: None,
            size: None,
            source_id: None,
            target_id: None,
            routing_points: None,
            children: None,
        }
    }

    #[must_use]
    pub fn label(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::new(ElementKind::Label, id) }
    }

    #[must_use]
    pub fn edge(id: impl Into<String>, source_id: String, target_id: String) -> Self {
        Self {
            source_id: Some(source_id),
            target_id: Some(target_id),
            routing_points: Some(Vec::new()),
            ..Self::new(ElementKind::Edge, id)
        }
    }

    /// Append a child, creating the child list on first use.
    pub fn add_child(&mut self, child: DiagramElement) {
        self.children.get_or_insert_with(Vec::new).push(child);
    }

    #[must_use]
    pub fn children(&self) -> &[DiagramElement] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Depth-first search by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&DiagramElement> {
        if self.id == id {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.find(id))
    }
}

#[cfg(test)]
#[path = "diagram_test.rs"]
mod tests;
