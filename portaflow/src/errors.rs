use crate::db::errors::DbError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

/// Closed set of error kinds for the intake service.
///
/// Kinds are tagged by the pipeline step that failed; mapping to an HTTP
/// status happens only at the boundary, in [`IntoResponse`]. `Notification`
/// and `MissingRecipient` never surface as a response on the intake path -
/// the pipeline downgrades them to per-channel outcomes.
#[derive(ThisError, Debug)]
pub enum Error {
    /// The multipart `data` field was not valid JSON
    #[error("invalid JSON in 'data' field: {message}")]
    MalformedPayload { message: String },

    /// One or both identity-document images were absent from the request
    #[error("INE frente y reverso son requeridos")]
    MissingAttachment,

    /// Uploaded file declared a MIME type outside the image allow-list
    #[error("Formato no permitido. Usa PNG/JPG/WEBP.")]
    UnsupportedMediaType { mime: String },

    /// A single uploaded file exceeded the per-file size cap
    #[error("file exceeds the {limit_bytes} byte limit")]
    FileTooLarge { limit_bytes: u64 },

    /// Blob write or URL generation failed; aborts before persistence
    #[error("{message}")]
    Storage { message: String },

    /// Record insert failed; aborts before notification
    #[error("Error guardando en base de datos")]
    Persistence {
        #[source]
        source: DbError,
    },

    /// Outbound email had no recipients after blank-filtering
    #[error("Parámetro \"to\" vacío")]
    MissingRecipient,

    /// The email provider rejected a send
    #[error("{message}")]
    Notification { message: String },

    /// Admin token missing or mismatched
    #[error("unauthorized")]
    Unauthorized,

    /// Download path escapes the storage root
    #[error("invalid file path")]
    InvalidPath,

    /// A required configuration value is not set
    #[error("{what} not set")]
    ConfigurationMissing { what: &'static str },

    /// Requested resource not found
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Invalid request data outside the taxonomy above (e.g. multipart decode)
    #[error("{message}")]
    BadRequest { message: String },

    /// Database operation error outside the persistence step
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MalformedPayload { .. }
            | Error::MissingAttachment
            | Error::UnsupportedMediaType { .. }
            | Error::FileTooLarge { .. }
            | Error::InvalidPath
            | Error::MissingRecipient
            | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Storage { .. }
            | Error::Persistence { .. }
            | Error::Notification { .. }
            | Error::ConfigurationMissing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::MalformedPayload { message } => format!("JSON inválido en el campo data: {message}"),
            Error::MissingAttachment => "INE frente y reverso son requeridos".to_string(),
            Error::UnsupportedMediaType { .. } => "Formato no permitido. Usa PNG/JPG/WEBP.".to_string(),
            Error::FileTooLarge { limit_bytes } => {
                format!("Archivo demasiado grande (máximo {} MB)", limit_bytes / (1024 * 1024))
            }
            Error::Storage { message } => message.clone(),
            Error::Persistence { .. } => "Error guardando en base de datos".to_string(),
            Error::MissingRecipient => "Parámetro \"to\" vacío".to_string(),
            Error::Notification { message } => message.clone(),
            Error::Unauthorized => "unauthorized".to_string(),
            Error::InvalidPath => "invalid file path".to_string(),
            Error::ConfigurationMissing { what } => format!("{what} not set"),
            Error::NotFound { resource } => format!("{resource} not found"),
            Error::BadRequest { message } => message.clone(),
            Error::Database(_) | Error::Other(_) => "Server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details - level tiered by severity
        match &self {
            Error::Storage { .. }
            | Error::Persistence { .. }
            | Error::ConfigurationMissing { .. }
            | Error::Database(_)
            | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Notification { .. } | Error::MissingRecipient => {
                tracing::warn!("Notification error: {}", self);
            }
            Error::Unauthorized | Error::InvalidPath => {
                tracing::info!("Rejected request: {}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = json!({ "ok": false, "error": self.user_message() });
        (status, Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
