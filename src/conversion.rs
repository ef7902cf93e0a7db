//! Graph conversion request handling.
//!
//! Checks run in a fixed order and the first violation wins:
//!
//! 1. the `Content-Type` must be one of the format content types or the error
//!    content type (406 otherwise)
//! 2. `inFormat` must be present
//! 3. `outFormat` must be present
//! 4. both formats must be known
//!
//! Only then is the body converted. Decode failures are reported as `input`
//! failures and encode failures as `output` failures, both with status 400.

use axum::http::StatusCode;
use serde::Serialize;
use tracing::info;

use crate::codec::{self, CodecError, Diagnostic, GraphFormat};
use crate::error::ErrorCode;

pub const LOAD_FAILED: &str = "Failed to load input graph.";
pub const SERIALIZE_FAILED: &str = "Failed to serialize converted graph.";

/// Classification carried in the `type` field of an error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Request,
    Input,
    Output,
    Configuration,
}

/// JSON error body shared by the HTTP endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: FailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<Diagnostic>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causes: Option<Vec<String>>,
}

impl ErrorBody {
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind, diagnostics: None, causes: None }
    }

    /// Body for a codec failure, carrying whichever of diagnostics and cause
    /// chain the failure recorded.
    #[must_use]
    pub fn from_codec(kind: FailureKind, message: impl Into<String>, error: &CodecError) -> Self {
        let diagnostics = error.diagnostics();
        let causes = error.cause_messages();
        Self {
            diagnostics: (!diagnostics.is_empty()).then(|| diagnostics.to_vec()),
            causes: (!causes.is_empty()).then_some(causes),
            ..Self::new(kind, message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFailure {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ConversionFailure {
    fn request(status: StatusCode, message: String) -> Self {
        Self { status, body: ErrorBody::new(FailureKind::Request, message) }
    }
}

/// One conversion request as received from the transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionRequest<'a> {
    pub content_type: Option<&'a str>,
    pub in_format: Option<&'a str>,
    pub out_format: Option<&'a str>,
    pub body: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub content_type: &'static str,
    pub body: String,
}

/// Validate the request envelope and resolve both formats.
///
/// # Errors
///
/// Returns a `request` failure for the first violated check.
pub fn check_request(request: &ConversionRequest<'_>) -> Result<(GraphFormat, GraphFormat), ConversionFailure> {
    let content_type = request.content_type.unwrap_or_default();
    if !codec::is_known_content_type(content_type) {
        return Err(ConversionFailure::request(
            StatusCode::NOT_ACCEPTABLE,
            format!("Unsupported content type: '{content_type}'."),
        ));
    }
    let Some(in_format) = request.in_format else {
        return Err(ConversionFailure::request(StatusCode::BAD_REQUEST, "Missing specification of 'inFormat'.".into()));
    };
    let Some(out_format) = request.out_format else {
        return Err(ConversionFailure::request(StatusCode::BAD_REQUEST, "Missing specification of 'outFormat'.".into()));
    };
    let resolve = |tag: &str| {
        GraphFormat::from_tag(tag).ok_or_else(|| {
            ConversionFailure::request(StatusCode::BAD_REQUEST, format!("Unknown graph format '{tag}'."))
        })
    };
    Ok((resolve(in_format)?, resolve(out_format)?))
}

/// Run a conversion request end to end.
///
/// # Errors
///
/// Returns a `ConversionFailure` carrying the status and error body to send.
pub fn convert(request: &ConversionRequest<'_>) -> Result<Converted, ConversionFailure> {
    let (from, to) = check_request(request)?;
    if from == to {
        return Ok(Converted { content_type: to.content_type(), body: request.body.to_owned() });
    }

    let graph = codec::decode(request.body, from).map_err(|e| {
        info!(format = %from, code = e.error_code(), error = %e, "{LOAD_FAILED}");
        ConversionFailure {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody::from_codec(FailureKind::Input, LOAD_FAILED, &e),
        }
    })?;
    let body = codec::encode(&graph, to).map_err(|e| {
        info!(format = %to, code = e.error_code(), error = %e, "{SERIALIZE_FAILED}");
        ConversionFailure {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody::from_codec(FailureKind::Output, SERIALIZE_FAILED, &e),
        }
    })?;
    Ok(Converted { content_type: to.content_type(), body })
}

#[cfg(test)]
#[path = "conversion_test.rs"]
mod tests;
