// HTTP response utilities for chart documents
use axum::{
    body::Body,
    http::{HeaderValue, Response, StatusCode, header},
};

const SVG_CONTENT_TYPE: &str = "image/svg+xml";

/// SVG document response; compression is left to the router's compression layer
pub fn svg_response(document: String) -> Result<Response<Body>, StatusCode> {
    let length = HeaderValue::from_str(&document.len().to_string()).map_err(|e| {
        tracing::error!("Invalid content length header: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, SVG_CONTENT_TYPE)
        .header(header::CONTENT_LENGTH, length)
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(document))
        .map_err(|e| {
            tracing::error!("Response build error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
