//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is built once in `main` and injected into Axum handlers via the
//! `State` extractor. It owns the layout harness, which in turn shares the
//! version registry. Nothing in it is mutated after startup, so cloning is
//! just reference counting and handlers need no locks.

use std::sync::Arc;

use crate::layout::LayoutHarness;
use crate::modules::VersionRegistry;

#[derive(Clone, Debug)]
pub struct AppState {
    pub harness: LayoutHarness,
}

impl AppState {
    #[must_use]
    pub fn new(registry: VersionRegistry) -> Self {
        Self { harness: LayoutHarness::new(Arc::new(registry)) }
    }

    #[must_use]
    pub fn with_harness(harness: LayoutHarness) -> Self {
        Self { harness }
    }
}
