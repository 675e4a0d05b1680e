//! Intake backend for mobile-plan portability requests.
//!
//! A single multipart endpoint receives the applicant's form data plus
//! both sides of their ID card, stores the images (object storage or
//! local disk), persists a row whose generated id becomes the folio, and
//! notifies both the operations desk and the applicant by email.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod intake;
pub mod notify;
pub mod storage;
pub mod telemetry;
pub mod templates;
pub mod text;

pub use config::Config;

use crate::config::CorsOrigin;
use crate::db::handlers::{PostgresRecordStore, RecordStore};
use crate::notify::Mailer;
use crate::storage::BlobStorage;
use axum::extract::DefaultBodyLimit;
use axum::http::{self, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{instrument, Level};

/// Headroom above the per-file limit for the JSON field and multipart framing.
const BODY_LIMIT_BYTES: usize = 32 * 1024 * 1024;

/// Shared application state handed to every handler.
#[derive(Clone, bon::Builder)]
pub struct AppState {
    pub config: Config,
    pub records: Arc<dyn RecordStore>,
    pub storage: Arc<dyn BlobStorage>,
    pub mailer: Arc<Mailer>,
    #[builder(default = Instant::now())]
    pub started_at: Instant,
}

/// Embedded migrations, run at startup before the listener binds.
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE, http::header::AUTHORIZATION]);

    // A wildcard entry cannot go into an origin list; validation already
    // rejects wildcard together with credentials
    let has_wildcard = config
        .cors
        .allowed_origins
        .iter()
        .any(|origin| matches!(origin, CorsOrigin::Wildcard));
    if has_wildcard {
        cors = cors.allow_origin(Any);
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        cors = cors
            .allow_origin(origins)
            .allow_credentials(config.cors.allow_credentials);
    }

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// # Errors
///
/// Returns an error if the configured CORS origins do not form valid
/// header values.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route("/health", get(api::handlers::health::health))
        .route("/api/health", get(api::handlers::health::api_health))
        .route("/admin/health", get(api::handlers::health::admin_health))
        .route("/admin/download", get(api::handlers::download::download))
        .route("/api/portabilidad", post(api::handlers::intake::submit))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state);

    Ok(router)
}

/// Fully wired application, ready to serve.
pub struct Application {
    config: Config,
    router: Router,
    pool: PgPool,
}

impl Application {
    /// Connect to the database, run migrations, and wire up storage,
    /// the mailer, and the router.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.database.url, &config.database.pool).await?;
        migrator().run(&pool).await?;

        let storage = storage::create_blob_storage(&config).await?;
        let records: Arc<dyn RecordStore> = Arc::new(PostgresRecordStore::new(pool.clone()));
        let mailer = Arc::new(Mailer::new(config.email.clone()));

        let state = AppState::builder()
            .config(config.clone())
            .records(records)
            .storage(storage)
            .mailer(mailer)
            .build();
        let router = build_router(state)?;

        Ok(Self { config, router, pool })
    }

    /// Bind the listener and serve until the shutdown future resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(environment = %self.config.environment, %addr, "Listening");

        axum::serve(
            listener,
            self.router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        self.pool.close().await;
        Ok(())
    }
}
