//! WebSocket diagram session at `/elkgraph`.
//!
//! DESIGN
//! ======
//! Each connection owns one `DiagramSession`: the last graph the client sent
//! and the engine selector in use (initially `current`). Actions are JSON
//! objects tagged by `kind`:
//!
//! - client → server: `requestModel {format, graph}`, `versionChange {version}`
//! - server → client: `setModel {newRoot}`, `error {message, type, ...}`
//!
//! `DiagramSession::handle` is pure business logic and returns the action to
//! send back, if any; the socket loop only does transport.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::codec::{self, GraphFormat};
use crate::conversion::{ErrorBody, FailureKind, LOAD_FAILED};
use crate::diagram::DiagramElement;
use crate::graph::GraphNode;
use crate::layout::{CURRENT_ENGINE, LayoutHarness};
use crate::state::AppState;

// =============================================================================
// ACTIONS
// =============================================================================

fn default_format() -> String {
    GraphFormat::Json.tag().to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClientAction {
    RequestModel {
        #[serde(default = "default_format")]
        format: String,
        graph: String,
    },
    VersionChange {
        version: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ServerAction {
    SetModel {
        #[serde(rename = "newRoot")]
        new_root: DiagramElement,
    },
    Error(ErrorBody),
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug)]
pub struct DiagramSession {
    id: Uuid,
    version: String,
    graph: Option<GraphNode>,
}

impl Default for DiagramSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagramSession {
    #[must_use]
    pub fn new() -> Self {
        Self { id: Uuid::new_v4(), version: CURRENT_ENGINE.to_owned(), graph: None }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Apply one client action and return the reply, if any.
    pub async fn handle(&mut self, harness: &LayoutHarness, action: ClientAction) -> Option<ServerAction> {
        match action {
            ClientAction::RequestModel { format, graph } => {
                let format = match codec::format_for_tag(&format) {
                    Ok(format) => format,
                    Err(e) => return Some(ServerAction::Error(ErrorBody::new(FailureKind::Request, e.to_string()))),
                };
                match codec::decode(&graph, format) {
                    Ok(graph) => {
                        self.graph = Some(graph);
                        Some(self.render(harness).await)
                    }
                    Err(e) => {
                        info!(session = %self.id, %format, error = %e, "{LOAD_FAILED}");
                        Some(ServerAction::Error(ErrorBody::from_codec(FailureKind::Input, LOAD_FAILED, &e)))
                    }
                }
            }
            ClientAction::VersionChange { version } => {
                if let Err(e) = harness.check_selector(&version) {
                    warn!(session = %self.id, %version, error = %e, "version change rejected");
                    return Some(ServerAction::Error(ErrorBody::new(FailureKind::Configuration, e.to_string())));
                }
                self.version = version;
                if self.graph.is_none() {
                    return None;
                }
                Some(self.render(harness).await)
            }
        }
    }

    async fn render(&self, harness: &LayoutHarness) -> ServerAction {
        let Some(graph) = &self.graph else {
            return ServerAction::Error(ErrorBody::new(FailureKind::Request, "No model has been requested."));
        };
        match harness.generate(graph, &self.version).await {
            Ok(new_root) => ServerAction::SetModel { new_root },
            Err(e) => {
                warn!(session = %self.id, version = %self.version, error = %e, "layout rejected");
                ServerAction::Error(ErrorBody::new(FailureKind::Configuration, e.to_string()))
            }
        }
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let mut session = DiagramSession::new();
    info!(session = %session.id(), "ws: client connected");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let Some(reply) = process_inbound_text(&state.harness, &mut session, text.as_str()).await else {
                    continue;
                };
                if send_action(&mut socket, &reply).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!(session = %session.id(), "ws: client disconnected");
}

/// Parse and process one inbound text message.
async fn process_inbound_text(harness: &LayoutHarness, session: &mut DiagramSession, text: &str) -> Option<ServerAction> {
    match serde_json::from_str::<ClientAction>(text) {
        Ok(action) => session.handle(harness, action).await,
        Err(e) => {
            warn!(session = %session.id(), error = %e, "ws: invalid inbound action");
            Some(ServerAction::Error(ErrorBody::new(FailureKind::Request, format!("invalid action: {e}"))))
        }
    }
}

async fn send_action(socket: &mut WebSocket, action: &ServerAction) -> Result<(), ()> {
    let json = match serde_json::to_string(action) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize action");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
