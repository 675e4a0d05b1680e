//! Multipart endpoint receiving a portability submission.
//!
//! The form carries a JSON `data` field plus two ID-card images. The
//! images arrive under `ineFrente`/`ineReverso`, with `frente`/`reverso`
//! accepted as aliases for older form builds.

use crate::api::ClientMeta;
use crate::errors::{Error, Result};
use crate::intake::{self, IntakeResponse, Submission, UploadedImage};
use axum::extract::{Multipart, State};
use axum::Json;
use bytes::BytesMut;
use serde_json::Value;

use crate::AppState;

const ALLOWED_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/jpg", "image/webp"];

pub async fn submit(
    State(state): State<AppState>,
    meta: ClientMeta,
    mut multipart: Multipart,
) -> Result<Json<IntakeResponse>> {
    let max_file_size = state.config.limits.max_file_size;

    let mut data_raw: Option<String> = None;
    let mut ine_frente: Option<UploadedImage> = None;
    let mut frente_alias: Option<UploadedImage> = None;
    let mut ine_reverso: Option<UploadedImage> = None;
    let mut reverso_alias: Option<UploadedImage> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {}", e),
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "data" => {
                data_raw = Some(field.text().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read data field: {}", e),
                })?);
            }
            "ineFrente" | "frente" | "ineReverso" | "reverso" => {
                let image = read_image(field, max_file_size).await?;
                match field_name.as_str() {
                    "ineFrente" => ine_frente = Some(image),
                    "frente" => frente_alias = Some(image),
                    "ineReverso" => ine_reverso = Some(image),
                    _ => reverso_alias = Some(image),
                }
            }
            other => {
                tracing::debug!(field = other, "Ignoring unexpected multipart field");
            }
        }
    }

    let data: Value = serde_json::from_str(data_raw.as_deref().unwrap_or("{}")).map_err(|e| {
        Error::MalformedPayload {
            message: e.to_string(),
        }
    })?;

    let frente = ine_frente.or(frente_alias).ok_or(Error::MissingAttachment)?;
    let reverso = ine_reverso.or(reverso_alias).ok_or(Error::MissingAttachment)?;

    let submission = Submission {
        data,
        frente,
        reverso,
        client_ip: meta.ip,
        user_agent: meta.user_agent,
    };

    let response = intake::process(
        state.records.as_ref(),
        state.storage.as_ref(),
        &state.mailer,
        submission,
    )
    .await?;

    Ok(Json(response))
}

/// Drains one file field, rejecting disallowed MIME types before reading
/// any bytes and aborting as soon as the size limit is exceeded.
async fn read_image(
    mut field: axum::extract::multipart::Field<'_>,
    max_file_size: u64,
) -> Result<UploadedImage> {
    let content_type = field.content_type().unwrap_or("").to_ascii_lowercase();
    if !ALLOWED_TYPES.contains(&content_type.as_str()) {
        return Err(Error::UnsupportedMediaType { mime: content_type });
    }

    let filename = field.file_name().unwrap_or("archivo").to_string();

    let mut bytes = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to read file chunk: {}", e),
    })? {
        if bytes.len() as u64 + chunk.len() as u64 > max_file_size {
            return Err(Error::FileTooLarge {
                limit_bytes: max_file_size,
            });
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(UploadedImage {
        filename,
        content_type,
        bytes: bytes.freeze(),
    })
}
