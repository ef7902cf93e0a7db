//! Wire protocol between the host and out-of-process version modules.
//!
//! A module is an executable:
//!
//! - `<module> --handshake` prints [`PROTOCOL_VERSION`] and exits 0.
//! - `<module>` with no arguments reads one graph in the tree format from
//!   stdin, lays it out, writes the laid-out graph to stdout and exits 0.
//!
//! Stdout carries only protocol output; modules log to stderr.

use std::io::{Read, Write};

use crate::codec::{self, CodecError, GraphFormat};
use crate::error::ErrorCode;
use crate::layout::engine::{CancelToken, EngineError, LayoutEngine};

pub const HANDSHAKE_FLAG: &str = "--handshake";
pub const PROTOCOL_VERSION: &str = "elk-layout-module/1";

/// The tree serialization round-trips option values exactly.
pub const WIRE_FORMAT: GraphFormat = GraphFormat::Elkg;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unexpected arguments: {0}")]
    Usage(String),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ErrorCode for ProtocolError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Usage(_) => "E_MODULE_USAGE",
            Self::Io(_) => "E_MODULE_IO",
            Self::Codec(e) => e.error_code(),
            Self::Engine(e) => e.error_code(),
        }
    }
}

/// Lay out one serialized graph.
///
/// # Errors
///
/// Returns `ProtocolError` when the text does not decode, the engine fails,
/// or the result cannot be encoded.
pub fn layout_text(engine: &dyn LayoutEngine, input: &str) -> Result<String, ProtocolError> {
    let mut graph = codec::decode(input, WIRE_FORMAT)?;
    engine.layout(&mut graph, &CancelToken::new())?;
    Ok(codec::encode(&graph, WIRE_FORMAT)?)
}

/// Module side of the protocol for the given command-line arguments
/// (program name excluded).
///
/// # Errors
///
/// Returns `ProtocolError::Usage` for unknown arguments and propagates I/O,
/// codec and engine failures.
pub fn serve(
    engine: &dyn LayoutEngine,
    args: &[String],
    mut input: impl Read,
    mut output: impl Write,
) -> Result<(), ProtocolError> {
    match args {
        [] => {
            let mut text = String::new();
            input.read_to_string(&mut text)?;
            let laid_out = layout_text(engine, &text)?;
            output.write_all(laid_out.as_bytes())?;
        }
        [flag] if flag == HANDSHAKE_FLAG => writeln!(output, "{PROTOCOL_VERSION}")?,
        other => return Err(ProtocolError::Usage(other.join(" "))),
    }
    output.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
