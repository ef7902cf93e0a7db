//! `POST /conversion?inFormat=..&outFormat=..` with the graph text as body.

use axum::Json;
use axum::extract::Query;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::conversion::{self, ConversionRequest};

#[derive(Debug, Default, Deserialize)]
pub struct ConversionParams {
    #[serde(rename = "inFormat")]
    pub in_format: Option<String>,
    #[serde(rename = "outFormat")]
    pub out_format: Option<String>,
}

pub async fn convert(Query(params): Query<ConversionParams>, headers: HeaderMap, body: String) -> Response {
    let request = ConversionRequest {
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        in_format: params.in_format.as_deref(),
        out_format: params.out_format.as_deref(),
        body: &body,
    };

    match conversion::convert(&request) {
        Ok(converted) => ([(header::CONTENT_TYPE, converted.content_type)], converted.body).into_response(),
        Err(failure) => (failure.status, Json(failure.body)).into_response(),
    }
}

#[cfg(test)]
#[path = "conversion_test.rs"]
mod tests;
