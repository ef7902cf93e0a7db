//! Diagram layout service.
//!
//! Decodes graphs from the `elkt`, `elkg` and `json` interchange formats,
//! lays them out with the built-in engine or a pinned out-of-process version
//! module, and renders the result as a diagram model for clients.

pub mod codec;
pub mod config;
pub mod conversion;
pub mod diagram;
pub mod error;
pub mod graph;
pub mod layout;
pub mod modules;
pub mod routes;
pub mod state;
