//! Layout execution harness.
//!
//! DESIGN
//! ======
//! `generate` never touches the caller's graph. It works on a private copy:
//!
//! 1. clone, then size every unsized port, node and label (`defaults`)
//! 2. dispatch on the engine selector: `"current"` runs the built-in engine on
//!    a dedicated thread, any other selector must name a registered version
//!    module, which runs in its own process
//! 3. wait at most `timeout` (5 seconds); on expiry the run is cancelled and
//!    the error carries a snapshot of the prepared graph
//! 4. project the laid-out copy into the diagram model (`project`)
//!
//! Failures after dispatch become an error diagram so that a session always
//! has something to render. An unknown selector is returned as an error
//! instead, since it points at a deployment mismatch.
//!
//! Cancellation of the built-in engine is cooperative. An engine that ignores
//! its token keeps its thread until it finishes on its own; version modules
//! have no such gap because their process is killed.

pub mod defaults;
pub mod engine;
pub mod project;
pub mod snapshot;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::diagram::{DiagramElement, ElementKind};
use crate::error::ErrorCode;
use crate::graph::identity;
use crate::graph::{GraphNode, Point};
use crate::modules::{VersionModule, VersionRegistry};
use engine::{CancelToken, LayeredEngine, LayoutEngine};
use snapshot::{LoggedGraph, TIMEOUT_TAG};

/// Selector reserved for the built-in engine.
pub const CURRENT_ENGINE: &str = "current";
pub const LAYOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Id of the label inside an error diagram.
pub const ERROR_LABEL_ID: &str = "error";
const ERROR_LABEL_POSITION: Point = Point { x: 20.0, y: 20.0 };

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("{0}")]
    UnsupportedConfiguration(String),
    #[error("Layout timed out after {}.\nGraph input: {snapshot}", describe(.timeout))]
    Timeout { timeout: Duration, snapshot: LoggedGraph },
    #[error("{0}")]
    Failed(String),
}

impl ErrorCode for LayoutError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedConfiguration(_) => "E_UNSUPPORTED_CONFIGURATION",
            Self::Timeout { .. } => "E_LAYOUT_TIMEOUT",
            Self::Failed(_) => "E_LAYOUT_FAILED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

fn describe(timeout: &Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        format!("{} seconds", timeout.as_secs())
    } else {
        format!("{} milliseconds", timeout.as_millis())
    }
}

/// Cancels the run however the wait ends, including when the caller's future
/// is dropped mid-wait.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

enum Dispatch {
    Current,
    Module(Arc<dyn VersionModule>),
}

// =============================================================================
// HARNESS
// =============================================================================

#[derive(Clone)]
pub struct LayoutHarness {
    registry: Arc<VersionRegistry>,
    engine: Arc<dyn LayoutEngine>,
    timeout: Duration,
}

impl LayoutHarness {
    /// Harness with the built-in layered engine and the standard timeout.
    #[must_use]
    pub fn new(registry: Arc<VersionRegistry>) -> Self {
        Self { registry, engine: Arc::new(LayeredEngine), timeout: LAYOUT_TIMEOUT }
    }

    /// Replace the engine behind `"current"`.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn LayoutEngine>) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    /// Every selector this harness accepts, `"current"` first.
    #[must_use]
    pub fn selectors(&self) -> Vec<String> {
        let mut selectors = vec![CURRENT_ENGINE.to_owned()];
        selectors.extend(self.registry.labels());
        selectors
    }

    /// Check that `selector` names the built-in engine or a registered module.
    ///
    /// # Errors
    ///
    /// Returns `LayoutError::UnsupportedConfiguration` for unknown selectors.
    pub fn check_selector(&self, selector: &str) -> Result<(), LayoutError> {
        self.resolve(selector).map(|_| ())
    }

    fn resolve(&self, selector: &str) -> Result<Dispatch, LayoutError> {
        if selector == CURRENT_ENGINE {
            return Ok(Dispatch::Current);
        }
        self.registry
            .get(selector)
            .map(Dispatch::Module)
            .ok_or_else(|| LayoutError::UnsupportedConfiguration(format!("Unknown layouter version: {selector}.")))
    }

    /// Lay out a private, default-sized copy of `graph` with the selected engine.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedConfiguration` for an unknown selector, `Timeout`
    /// when the run exceeds the time budget, and `Failed` for any other
    /// failure of the run.
    pub async fn layout(&self, graph: &GraphNode, selector: &str) -> Result<GraphNode, LayoutError> {
        let dispatch = self.resolve(selector)?;

        let mut prepared = graph.clone();
        defaults::apply_defaults(&mut prepared);
        debug!(version = selector, nodes = prepared.descendant_count(), "starting layout");

        match dispatch {
            Dispatch::Current => self.run_engine(prepared).await,
            Dispatch::Module(module) => self.run_module(module, prepared, selector).await,
        }
    }

    async fn run_engine(&self, prepared: GraphNode) -> Result<GraphNode, LayoutError> {
        let cancel = CancelToken::new();
        let _guard = CancelOnDrop(cancel.clone());
        let (tx, rx) = oneshot::channel();

        let engine = Arc::clone(&self.engine);
        let token = cancel.clone();
        let mut working = prepared.clone();
        std::thread::Builder::new()
            .name("layout".into())
            .spawn(move || {
                let result = engine.layout(&mut working, &token).map(|()| working);
                // The receiver is gone when the harness already gave up.
                let _ = tx.send(result);
            })
            .map_err(|e| LayoutError::Failed(format!("Layout thread could not be started: {e}")))?;

        match tokio::time::timeout(self.timeout, rx).await {
            Err(_) => Err(self.timed_out(&prepared)),
            Ok(Err(_)) => Err(LayoutError::Failed("Layout thread terminated unexpectedly.".into())),
            Ok(Ok(Err(e))) => Err(LayoutError::Failed(e.to_string())),
            Ok(Ok(Ok(laid_out))) => Ok(laid_out),
        }
    }

    async fn run_module(
        &self,
        module: Arc<dyn VersionModule>,
        prepared: GraphNode,
        selector: &str,
    ) -> Result<GraphNode, LayoutError> {
        let input = prepared.clone();
        let handle = tokio::spawn(async move { module.layout(&input).await });
        let abort = handle.abort_handle();

        let outcome = tokio::time::timeout(self.timeout, handle).await;
        // Aborting drops the module call, and with it the child process.
        abort.abort();

        match outcome {
            Err(_) => Err(self.timed_out(&prepared)),
            Ok(Err(e)) => Err(LayoutError::Failed(format!("Layout failed for version {selector}: {e}"))),
            Ok(Ok(None)) => Err(LayoutError::Failed(format!("Layout failed for version {selector}."))),
            Ok(Ok(Some(laid_out))) => Ok(laid_out),
        }
    }

    fn timed_out(&self, prepared: &GraphNode) -> LayoutError {
        match LoggedGraph::capture(prepared, TIMEOUT_TAG) {
            Ok(snapshot) => LayoutError::Timeout { timeout: self.timeout, snapshot },
            Err(e) => LayoutError::Failed(format!(
                "Layout timed out after {}. The graph could not be captured: {e}",
                describe(&self.timeout)
            )),
        }
    }

    /// Lay out `graph` and project it into a diagram rooted at the graph's id.
    /// Layout and projection failures are logged and rendered as an error
    /// diagram.
    ///
    /// # Errors
    ///
    /// Only `UnsupportedConfiguration` is returned as an error.
    pub async fn generate(&self, graph: &GraphNode, selector: &str) -> Result<DiagramElement, LayoutError> {
        let root_id = identity::root_id(graph);
        let result = self.layout(graph, selector).await.and_then(|laid_out| {
            project::project(&laid_out, &root_id).map_err(|e| LayoutError::Failed(e.to_string()))
        });

        match result {
            Ok(diagram) => Ok(diagram),
            Err(e @ LayoutError::UnsupportedConfiguration(_)) => Err(e),
            Err(e) => {
                error!(version = selector, code = e.error_code(), error = %e, "layout failed");
                Ok(error_diagram(&root_id, &e))
            }
        }
    }
}

impl fmt::Debug for LayoutHarness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutHarness")
            .field("versions", &self.registry.labels())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Diagram holding a single label that describes `error`.
#[must_use]
pub fn error_diagram(root_id: &str, error: &impl ErrorCode) -> DiagramElement {
    let mut label = DiagramElement::label(ERROR_LABEL_ID, format!("{}: {error}", error.error_code()));
    label.position = Some(ERROR_LABEL_POSITION);
    let mut root = DiagramElement::new(ElementKind::Graph, root_id);
    root.add_child(label);
    root
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
