//! Version module registry.
//!
//! DESIGN
//! ======
//! A version module is one pinned build of the layout algorithm, run as its
//! own executable so that two builds never share a process. The registry is
//! built once at startup from the configured module locations and is read-only
//! afterwards; lookups need no locking.
//!
//! A module's label is its file name up to the last `-`, so
//! `/opt/elk/0.9.1-20240101` serves selector `0.9.1`. Modules that are missing
//! or fail the handshake are skipped with a warning; the rest stay usable.

pub mod bridge;
pub mod protocol;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::ErrorCode;
use crate::graph::GraphNode;
use bridge::ModuleBridge;

/// Uniform operation of every version module. `None` covers every failure on
/// the module side; implementations log the reason.
#[async_trait]
pub trait VersionModule: Send + Sync {
    async fn layout(&self, graph: &GraphNode) -> Option<GraphNode>;
}

#[derive(Debug, thiserror::Error)]
pub enum ModuleLoadError {
    #[error("module not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("module {} could not be started: {source}", .path.display())]
    Spawn { path: PathBuf, source: std::io::Error },
    #[error("module {} answered the handshake with '{answer}'", .path.display())]
    Handshake { path: PathBuf, answer: String },
    #[error("module {} did not answer the handshake in time", .0.display())]
    HandshakeTimeout(PathBuf),
}

impl ErrorCode for ModuleLoadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing(_) => "E_MODULE_MISSING",
            Self::Spawn { .. } => "E_MODULE_SPAWN",
            Self::Handshake { .. } => "E_MODULE_HANDSHAKE",
            Self::HandshakeTimeout(_) => "E_MODULE_HANDSHAKE_TIMEOUT",
        }
    }
}

/// Version label for a module location: the file name up to its last `-`, or
/// the whole file name when it has none.
#[must_use]
pub fn version_label(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let label = name.rsplit_once('-').map_or(name, |(head, _)| head);
    if label.is_empty() { None } else { Some(label.to_owned()) }
}

#[derive(Default)]
pub struct VersionRegistry {
    modules: BTreeMap<String, Arc<dyn VersionModule>>,
}

impl VersionRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry over already-constructed modules; used by tests and embedders.
    #[must_use]
    pub fn from_modules(modules: impl IntoIterator<Item = (String, Arc<dyn VersionModule>)>) -> Self {
        Self { modules: modules.into_iter().collect() }
    }

    /// Load one module per location. Locations that fail to load are logged and
    /// skipped; when two locations share a label the first one wins.
    pub async fn load(locations: &[PathBuf], handshake_timeout: Duration) -> Self {
        if locations.is_empty() {
            warn!("No layout modules configured. Make sure LAYOUT_MODULES is set properly.");
            return Self::empty();
        }

        let mut modules: BTreeMap<String, Arc<dyn VersionModule>> = BTreeMap::new();
        for location in locations {
            let Some(label) = version_label(location) else {
                warn!(path = %location.display(), "cannot derive a version label; module skipped");
                continue;
            };
            if modules.contains_key(&label) {
                warn!(path = %location.display(), version = %label, "duplicate version label; module skipped");
                continue;
            }
            match ModuleBridge::load(&label, location, handshake_timeout).await {
                Ok(bridge) => {
                    modules.insert(label, Arc::new(bridge));
                }
                Err(e) => {
                    warn!(path = %location.display(), error = %e, code = e.error_code(), "layout module skipped");
                }
            }
        }

        let registry = Self { modules };
        info!(versions = ?registry.labels(), "ELK layout versions found");
        registry
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<Arc<dyn VersionModule>> {
        self.modules.get(label).cloned()
    }

    /// Labels in sorted order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
