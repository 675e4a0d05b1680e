//! The request-intake pipeline.
//!
//! Orchestrates one submission end to end: store both identity-document
//! images, persist the record to obtain the folio, then send the operations
//! and customer emails. Storage and persistence failures abort the request;
//! email failures are captured per channel and never fail the intake.

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::db::handlers::RecordStore;
use crate::db::models::portability::NewPortability;
use crate::errors::{Error, Result};
use crate::notify::{EmailMessage, Mailer, SendOutcome};
use crate::storage::BlobStorage;
use crate::templates;
use crate::text::{field_text, sanitize};

/// One uploaded identity-document image.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// A decoded multipart submission, ready for the pipeline.
#[derive(Debug)]
pub struct Submission {
    pub data: Value,
    pub frente: UploadedImage,
    pub reverso: UploadedImage,
    pub client_ip: String,
    pub user_agent: String,
}

/// Result of one email channel. `resp` carries the provider response on
/// success; `error` carries the message on failure.
#[derive(Debug, Serialize)]
pub struct ChannelOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelOutcome {
    fn from_send(result: Result<SendOutcome>) -> Self {
        match result {
            Ok(SendOutcome::Sent(resp)) => Self {
                ok: true,
                resp: Some(resp),
                error: None,
            },
            // A skipped send is not a failure; it is reported so operators can
            // tell "no key configured" apart from "provider rejected us"
            Ok(SendOutcome::Skipped) => Self {
                ok: true,
                resp: Some(json!({ "skipped": true })),
                error: None,
            },
            Err(e) => Self {
                ok: false,
                resp: None,
                error: Some(e.user_message()),
            },
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            resp: None,
            error: Some(message.into()),
        }
    }
}

/// Per-channel email outcomes.
#[derive(Debug, Serialize)]
pub struct EmailStatus {
    pub mesa: ChannelOutcome,
    pub cliente: ChannelOutcome,
}

#[derive(Debug, Serialize)]
pub struct AttachmentPair {
    pub frente: String,
    pub reverso: String,
}

/// Aggregated intake result returned to the client.
#[derive(Debug, Serialize)]
pub struct IntakeResponse {
    pub ok: bool,
    pub folio: i64,
    pub carpeta: String,
    pub files: AttachmentPair,
    pub urls: AttachmentPair,
    #[serde(rename = "emailStatus")]
    pub email_status: EmailStatus,
}

/// Storage folder key for one submission: timestamp plus the sanitized
/// phone-to-port number, with an optional backend-provided suffix.
pub fn folder_key(data: &Value, at: chrono::DateTime<Utc>, suffix: Option<String>) -> String {
    let ts = at.to_rfc3339_opts(SecondsFormat::Millis, true).replace([':', '.'], "-");
    let numero = match sanitize(&field_text(data, "numeroPortar")) {
        s if s.is_empty() => "sin-numero".to_string(),
        s => s,
    };
    match suffix {
        Some(sfx) => format!("portas/{ts}-{numero}-{sfx}"),
        None => format!("portas/{ts}-{numero}"),
    }
}

/// Run the full pipeline for one submission.
#[instrument(skip_all, fields(numero_portar = %field_text(&submission.data, "numeroPortar")))]
pub async fn process(
    records: &dyn RecordStore,
    storage: &dyn BlobStorage,
    mailer: &Mailer,
    submission: Submission,
) -> Result<IntakeResponse> {
    let data = &submission.data;
    let created_at = Utc::now();

    // 1) destination folder in storage
    let carpeta = folder_key(data, created_at, storage.folder_suffix());

    // 2) store both attachments; any failure aborts before persistence
    let frente_path = storage.object_path(&carpeta, "ine-frente", &submission.frente.filename);
    let reverso_path = storage.object_path(&carpeta, "ine-reverso", &submission.reverso.filename);

    let frente = storage
        .store(&frente_path, &submission.frente.content_type, submission.frente.bytes.clone())
        .await?;
    let reverso = storage
        .store(&reverso_path, &submission.reverso.content_type, submission.reverso.bytes.clone())
        .await?;

    // 3) persist the record; the generated id is the folio
    let row = NewPortability::from_submission(data, &submission.user_agent, &carpeta, &frente.url, &reverso.url);
    let folio = records.insert(&row).await.map_err(|source| Error::Persistence { source })?;
    tracing::info!(folio, carpeta = %carpeta, "Portability request persisted");

    // 4) operations email, full data dump
    let ops_html = templates::ops_email_html(
        data,
        &templates::OpsEmailContext {
            folio,
            frente_url: &frente.url,
            reverso_url: &reverso.url,
            created_at,
            client_ip: &submission.client_ip,
            user_agent: &submission.user_agent,
        },
    );
    let mesa_result = mailer
        .send(&EmailMessage {
            to: vec![mailer.mesa_recipient().to_string()],
            cc: mailer.cc_operaciones().map(str::to_string),
            reply_to: None,
            subject: format!("Nueva solicitud de portabilidad – Folio {folio}"),
            html: ops_html,
        })
        .await;
    if let Err(e) = &mesa_result {
        tracing::error!(folio, "Operations email failed: {e}");
    }
    let mesa = ChannelOutcome::from_send(mesa_result);

    // 5) customer confirmation, only when an address was supplied
    let cliente_email = field_text(data, "email").trim().to_string();
    let cliente = if cliente_email.is_empty() {
        tracing::warn!(folio, "Customer email empty, skipping confirmation");
        ChannelOutcome::failed("Email vacío")
    } else {
        let html = templates::customer_email_html(data, folio, created_at);
        let result = mailer
            .send(&EmailMessage {
                to: vec![cliente_email],
                cc: None,
                reply_to: Some(mailer.mesa_recipient().to_string()),
                subject: "Hemos recibido tu solicitud de portabilidad".to_string(),
                html,
            })
            .await;
        if let Err(e) = &result {
            tracing::error!(folio, "Customer email failed: {e}");
        }
        ChannelOutcome::from_send(result)
    };

    Ok(IntakeResponse {
        ok: true,
        folio,
        carpeta,
        files: AttachmentPair {
            frente: frente.path,
            reverso: reverso.path,
        },
        urls: AttachmentPair {
            frente: frente.url,
            reverso: reverso.url,
        },
        email_status: EmailStatus { mesa, cliente },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn folder_key_flattens_timestamp_punctuation() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let data = json!({ "numeroPortar": "55 1234 5678" });
        let key = folder_key(&data, at, None);
        assert_eq!(key, "portas/2026-03-14T09-26-53-000Z-55-1234-5678");
    }

    #[test]
    fn folder_key_defaults_missing_number() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let key = folder_key(&json!({}), at, None);
        assert!(key.ends_with("-sin-numero"));
        let key = folder_key(&json!({ "numeroPortar": "???" }), at, Some("ab12cd34".to_string()));
        assert!(key.ends_with("-sin-numero-ab12cd34"));
    }

    #[test]
    fn skipped_send_serializes_as_ok() {
        let outcome = ChannelOutcome::from_send(Ok(SendOutcome::Skipped));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value, json!({ "ok": true, "resp": { "skipped": true } }));
    }

    #[test]
    fn failed_send_serializes_error_only() {
        let outcome = ChannelOutcome::from_send(Err(Error::Notification {
            message: "Email API 400: bad sender".to_string(),
        }));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value, json!({ "ok": false, "error": "Email API 400: bad sender" }));
    }
}
