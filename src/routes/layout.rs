//! Stateless layout endpoints.
//!
//! - `POST /layout?format=<tag>&version=<selector>`: graph text in, diagram
//!   JSON out. `format` defaults to `json`, `version` to `current`.
//! - `GET /versions`: every accepted selector, `current` first.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::info;

use crate::codec::{self, GraphFormat};
use crate::conversion::{ErrorBody, FailureKind, LOAD_FAILED};
use crate::error::ErrorCode;
use crate::layout::CURRENT_ENGINE;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LayoutParams {
    pub format: Option<String>,
    pub version: Option<String>,
}

fn bad_request(body: ErrorBody) -> Response {
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

pub async fn layout(State(state): State<AppState>, Query(params): Query<LayoutParams>, body: String) -> Response {
    let tag = params.format.as_deref().unwrap_or(GraphFormat::Json.tag());
    let Some(format) = GraphFormat::from_tag(tag) else {
        return bad_request(ErrorBody::new(FailureKind::Request, format!("Unknown graph format '{tag}'.")));
    };
    let version = params.version.as_deref().unwrap_or(CURRENT_ENGINE);

    let graph = match codec::decode(&body, format) {
        Ok(graph) => graph,
        Err(e) => {
            info!(%format, code = e.error_code(), error = %e, "{LOAD_FAILED}");
            return bad_request(ErrorBody::from_codec(FailureKind::Input, LOAD_FAILED, &e));
        }
    };

    match state.harness.generate(&graph, version).await {
        Ok(diagram) => Json(diagram).into_response(),
        Err(e) => bad_request(ErrorBody::new(FailureKind::Configuration, e.to_string())),
    }
}

pub async fn versions(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.harness.selectors())
}

#[cfg(test)]
#[path = "layout_test.rs"]
mod tests;
