//! Token-gated retrieval of stored attachments.
//!
//! Only meaningful with disk storage, where uploaded images have no
//! publicly reachable URL. Bucket deployments hand out object URLs
//! directly and never hit this route.

use crate::auth::{extract_token, require_admin};
use crate::errors::{Error, Result};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;

use crate::AppState;

pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response> {
    let token = extract_token(&query, &headers);
    require_admin(state.config.admin_token.as_deref(), token.as_deref())?;

    let file = query
        .get("file")
        .map(String::as_str)
        .filter(|f| !f.is_empty())
        .ok_or(Error::BadRequest {
            message: "Parámetro \"file\" requerido".to_string(),
        })?;

    let bytes = state.storage.retrieve(file).await?;

    let content_type = mime_guess::from_path(file).first_or_octet_stream();
    Ok((
        [(header::CONTENT_TYPE, content_type.to_string())],
        bytes,
    )
        .into_response())
}
