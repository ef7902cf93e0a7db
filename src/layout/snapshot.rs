//! Diagnostic snapshot of a graph, embedded in timeout errors for postmortem
//! inspection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError, GraphFormat};
use crate::graph::GraphNode;

pub const TIMEOUT_TAG: &str = "TIMEOUT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedGraph {
    pub tag: String,
    pub format: String,
    pub graph: String,
}

impl LoggedGraph {
    /// Serialize `graph` in the tree format under `tag`.
    ///
    /// # Errors
    ///
    /// Propagates encoder failures.
    pub fn capture(graph: &GraphNode, tag: &str) -> Result<Self, CodecError> {
        Ok(Self {
            tag: tag.to_owned(),
            format: GraphFormat::Elkg.tag().to_owned(),
            graph: codec::encode(graph, GraphFormat::Elkg)?,
        })
    }

    /// Decode the captured graph again.
    ///
    /// # Errors
    ///
    /// Returns `CodecError` for an unknown format tag or undecodable text.
    pub fn restore(&self) -> Result<GraphNode, CodecError> {
        codec::decode(&self.graph, codec::format_for_tag(&self.format)?)
    }
}

impl fmt::Display for LoggedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
