//! Adapter from one out-of-process version module to `layout(graph) -> Option<graph>`.
//!
//! Each call spawns a fresh module process, pipes the graph through it in the
//! wire format and decodes the answer. Every failure on the far side of the
//! process boundary collapses to `None`; the reason is logged here.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tracing::{debug, warn};

use super::protocol::{HANDSHAKE_FLAG, PROTOCOL_VERSION, WIRE_FORMAT};
use super::{ModuleLoadError, VersionModule};
use crate::codec;
use crate::graph::GraphNode;

#[derive(Debug, Clone)]
pub struct ModuleBridge {
    label: String,
    program: PathBuf,
}

impl ModuleBridge {
    /// Check that `program` exists and speaks the module protocol.
    ///
    /// # Errors
    ///
    /// Returns `ModuleLoadError` when the file is missing, cannot be started,
    /// does not answer the handshake in time, or answers with anything other
    /// than the expected protocol version.
    pub async fn load(label: &str, program: &Path, handshake_timeout: Duration) -> Result<Self, ModuleLoadError> {
        if !program.is_file() {
            return Err(ModuleLoadError::Missing(program.to_path_buf()));
        }

        let child = Command::new(program)
            .arg(HANDSHAKE_FLAG)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ModuleLoadError::Spawn { path: program.to_path_buf(), source: e })?;

        let output = tokio::time::timeout(handshake_timeout, child.wait_with_output())
            .await
            .map_err(|_| ModuleLoadError::HandshakeTimeout(program.to_path_buf()))?
            .map_err(|e| ModuleLoadError::Spawn { path: program.to_path_buf(), source: e })?;

        let answer = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if !output.status.success() || answer != PROTOCOL_VERSION {
            return Err(ModuleLoadError::Handshake { path: program.to_path_buf(), answer });
        }

        Ok(Self { label: label.to_owned(), program: program.to_path_buf() })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn input_pipe(&self, stdin: Option<ChildStdin>) -> Option<ChildStdin> {
        if stdin.is_none() {
            warn!(version = %self.label, "layout module has no input pipe");
        }
        stdin
    }

    async fn invoke(&self, input: String) -> Option<String> {
        let mut child = match Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(version = %self.label, error = %e, "layout module failed to start");
                return None;
            }
        };

        let mut stdin = self.input_pipe(child.stdin.take())?;
        let write = async move {
            let written = stdin.write_all(input.as_bytes()).await;
            // Dropping stdin closes the pipe so the module sees end of input.
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!(version = %self.label, error = %e, "layout module did not complete");
                return None;
            }
        };
        if let Err(e) = written {
            warn!(version = %self.label, error = %e, "layout module closed its input early");
        }
        if !output.status.success() {
            warn!(
                version = %self.label,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "layout module failed"
            );
            return None;
        }
        if output.stdout.is_empty() {
            warn!(version = %self.label, "layout module returned no graph");
            return None;
        }
        match String::from_utf8(output.stdout) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(version = %self.label, error = %e, "layout module returned invalid utf-8");
                None
            }
        }
    }
}

#[async_trait]
impl VersionModule for ModuleBridge {
    async fn layout(&self, graph: &GraphNode) -> Option<GraphNode> {
        let input = match codec::encode(graph, WIRE_FORMAT) {
            Ok(text) => text,
            Err(e) => {
                warn!(version = %self.label, error = %e, "graph could not be serialized for layout module");
                return None;
            }
        };
        debug!(version = %self.label, bytes = input.len(), "invoking layout module");

        let output = self.invoke(input).await?;
        match codec::decode(&output, WIRE_FORMAT) {
            Ok(graph) => Some(graph),
            Err(e) => {
                warn!(version = %self.label, error = %e, "layout module output could not be read");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod tests;
