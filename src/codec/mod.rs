//! Format codec: bidirectional converters between the graph model and the
//! supported textual formats.
//!
//! DESIGN
//! ======
//! The format set is closed: `elkt` (keyword notation), `elkg` (XML tree
//! serialization) and `json`. Decoders never panic or return opaque errors;
//! every failure is a `CodecError` classified as malformed input, unsupported
//! format, or internal codec failure. Parsers that recover from errors record
//! one `Diagnostic` per problem (message + position) and the decode fails with
//! all of them at once.
//!
//! Cause chains are ordered innermost first.

pub mod elkg;
pub mod elkt;
pub mod json;

use std::fmt;

use serde::Serialize;

use crate::error::ErrorCode;
use crate::graph::GraphNode;

// =============================================================================
// FORMATS
// =============================================================================

/// Content type used for error bodies.
pub const ERROR_CONTENT_TYPE: &str = "application/json";

/// Deepest element nesting a decoder accepts, the same limit `serde_json`
/// applies to `json` input.
pub const MAX_NESTING: usize = 128;

/// The supported interchange formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphFormat {
    Elkt,
    Elkg,
    Json,
}

impl GraphFormat {
    pub const ALL: [GraphFormat; 3] = [GraphFormat::Elkt, GraphFormat::Elkg, GraphFormat::Json];

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.tag() == tag)
    }

    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Elkt => "elkt",
            Self::Elkg => "elkg",
            Self::Json => "json",
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Elkt => "text/plain",
            Self::Elkg => "application/xml",
            Self::Json => "application/json",
        }
    }
}

impl fmt::Display for GraphFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// `true` when `content_type` names one of the format content types or the
/// error content type. Media-type parameters are ignored.
#[must_use]
pub fn is_known_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();
    media_type.eq_ignore_ascii_case(ERROR_CONTENT_TYPE)
        || GraphFormat::ALL
            .iter()
            .any(|f| media_type.eq_ignore_ascii_case(f.content_type()))
}

// =============================================================================
// DIAGNOSTICS
// =============================================================================

/// One recorded parse problem. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    #[serde(rename = "startLineNumber")]
    pub line: u32,
    #[serde(rename = "startColumn")]
    pub column: u32,
    #[serde(rename = "endLineNumber", skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(rename = "endColumn", skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
}

impl Diagnostic {
    #[must_use]
    pub fn at(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self { message: message.into(), line, column, end_line: None, end_column: None }
    }

    #[must_use]
    pub fn spanning(message: impl Into<String>, start: (u32, u32), end: (u32, u32)) -> Self {
        Self {
            message: message.into(),
            line: start.0,
            column: start.1,
            end_line: Some(end.0),
            end_column: Some(end.1),
        }
    }
}

/// One link of a failure chain: a class-like tag plus a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cause {
    pub tag: String,
    pub message: String,
}

impl Cause {
    #[must_use]
    pub fn new(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self { tag: tag.into(), message: message.into() }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tag, self.message)
    }
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The input text could not be turned into a graph.
    #[error("malformed {format} input")]
    Malformed { format: GraphFormat, diagnostics: Vec<Diagnostic>, causes: Vec<Cause> },

    /// The format tag is not one of the supported formats.
    #[error("unsupported graph format '{0}'")]
    UnsupportedFormat(String),

    /// The codec itself failed, e.g. a graph that the target format cannot express.
    #[error("{format} codec failure: {message}")]
    Internal { format: GraphFormat, message: String, causes: Vec<Cause> },
}

impl CodecError {
    #[must_use]
    pub fn with_diagnostics(format: GraphFormat, diagnostics: Vec<Diagnostic>) -> Self {
        Self::Malformed { format, diagnostics, causes: Vec::new() }
    }

    #[must_use]
    pub fn with_causes(format: GraphFormat, causes: Vec<Cause>) -> Self {
        Self::Malformed { format, diagnostics: Vec::new(), causes }
    }

    #[must_use]
    pub fn internal(format: GraphFormat, message: impl Into<String>) -> Self {
        let message = message.into();
        let causes = vec![Cause::new("EncodeError", message.clone())];
        Self::Internal { format, message, causes }
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Malformed { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }

    /// Failure chain rendered as `tag: message`, innermost first.
    #[must_use]
    pub fn cause_messages(&self) -> Vec<String> {
        match self {
            Self::Malformed { causes, .. } | Self::Internal { causes, .. } => {
                causes.iter().map(ToString::to_string).collect()
            }
            Self::UnsupportedFormat(_) => vec![format!("UnsupportedFormat: {self}")],
        }
    }
}

impl ErrorCode for CodecError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "E_MALFORMED_INPUT",
            Self::UnsupportedFormat(_) => "E_UNSUPPORTED_FORMAT",
            Self::Internal { .. } => "E_CODEC_INTERNAL",
        }
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Resolve a format tag.
///
/// # Errors
///
/// Returns `CodecError::UnsupportedFormat` for tags outside the closed set.
pub fn format_for_tag(tag: &str) -> Result<GraphFormat, CodecError> {
    GraphFormat::from_tag(tag).ok_or_else(|| CodecError::UnsupportedFormat(tag.to_owned()))
}

/// Decode `text` in `format` into a graph.
///
/// # Errors
///
/// Returns `CodecError::Malformed` with diagnostics or a cause chain when the
/// text cannot be decoded.
pub fn decode(text: &str, format: GraphFormat) -> Result<GraphNode, CodecError> {
    match format {
        GraphFormat::Elkt => elkt::decode(text),
        GraphFormat::Elkg => elkg::decode(text),
        GraphFormat::Json => json::decode(text),
    }
}

/// Encode `graph` into `format`.
///
/// # Errors
///
/// Returns `CodecError::Internal` when the graph cannot be expressed in `format`.
pub fn encode(graph: &GraphNode, format: GraphFormat) -> Result<String, CodecError> {
    match format {
        GraphFormat::Elkt => elkt::encode(graph),
        GraphFormat::Elkg => elkg::encode(graph),
        GraphFormat::Json => json::encode(graph),
    }
}

/// Convert text between formats. Identical formats return the text untouched
/// without running any parser.
///
/// # Errors
///
/// Propagates decode and encode failures.
pub fn transcode(text: &str, from: GraphFormat, to: GraphFormat) -> Result<String, CodecError> {
    if from == to {
        return Ok(text.to_owned());
    }
    let graph = decode(text, from)?;
    encode(&graph, to)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
