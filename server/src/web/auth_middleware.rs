use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::app_state::AppState;

/// Extractor that checks the `Authorization: Bearer <secret>` header against
/// the configured ingest secret. Passes every request when no secret is set.
pub struct IngestAuth;

impl FromRequestParts<Arc<AppState>> for IngestAuth {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if state.ingest_secret.is_empty() {
            return Ok(IngestAuth);
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| (StatusCode::UNAUTHORIZED, "Missing bearer token").into_response())?;

        if token != state.ingest_secret {
            return Err((StatusCode::UNAUTHORIZED, "Invalid bearer token").into_response());
        }

        Ok(IngestAuth)
    }
}
