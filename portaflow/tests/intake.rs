//! End-to-end tests driving the router with local-disk storage, an
//! in-memory record store, and a stubbed email provider.

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use portaflow::config::{Config, StorageConfig};
use portaflow::db::errors::DbError;
use portaflow::db::handlers::RecordStore;
use portaflow::db::models::portability::NewPortability;
use bytes::Bytes;
use portaflow::errors::Error as ServiceError;
use portaflow::notify::Mailer;
use portaflow::storage::{BlobStorage, LocalDiskStorage, StoredAttachment};
use portaflow::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADMIN_TOKEN: &str = "secreto-admin";

#[derive(Default)]
struct InMemoryRecordStore {
    rows: Mutex<Vec<NewPortability>>,
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, request: &NewPortability) -> Result<i64, DbError> {
        let mut rows = self.rows.lock().unwrap();
        rows.push(request.clone());
        Ok(rows.len() as i64)
    }
}

struct FailingRecordStore;

#[async_trait::async_trait]
impl RecordStore for FailingRecordStore {
    async fn insert(&self, _request: &NewPortability) -> Result<i64, DbError> {
        Err(DbError::Other(anyhow::anyhow!("connection refused")))
    }
}

struct FailingBlobStorage;

#[async_trait::async_trait]
impl BlobStorage for FailingBlobStorage {
    async fn store(&self, _path: &str, _content_type: &str, _content: Bytes) -> Result<StoredAttachment, ServiceError> {
        Err(ServiceError::Storage {
            message: "Error subiendo archivo a Storage".to_string(),
        })
    }

    async fn retrieve(&self, path: &str) -> Result<Vec<u8>, ServiceError> {
        Err(ServiceError::NotFound {
            resource: format!("file {path}"),
        })
    }
}

struct TestApp {
    server: TestServer,
    email: MockServer,
    _uploads: TempDir,
}

async fn spawn(
    records: Arc<dyn RecordStore>,
    api_key: Option<&str>,
    max_file_size: u64,
    admin_token: Option<&str>,
) -> TestApp {
    let email = MockServer::start().await;
    let uploads = TempDir::new().unwrap();
    let base_url = Url::parse("http://localhost:5174").unwrap();

    let mut config = Config::default();
    config.admin_token = admin_token.map(str::to_string);
    config.limits.max_file_size = max_file_size;
    config.storage = StorageConfig::Disk {
        root: uploads.path().to_path_buf(),
        public_base_url: base_url.clone(),
    };
    config.email.api_url = Url::parse(&format!("{}/v3/smtp/email", email.uri())).unwrap();
    config.email.api_key = api_key.map(str::to_string);
    config.email.mesa_recipient = "mesa@example.com".to_string();

    let storage = LocalDiskStorage::new(
        uploads.path().to_path_buf(),
        base_url,
        admin_token.unwrap_or(ADMIN_TOKEN).to_string(),
    )
    .await
    .unwrap();
    let mailer = Arc::new(Mailer::new(config.email.clone()));

    let state = AppState::builder()
        .config(config)
        .records(records)
        .storage(Arc::new(storage))
        .mailer(mailer)
        .build();

    let server = TestServer::new(build_router(state).unwrap()).unwrap();
    TestApp {
        server,
        email,
        _uploads: uploads,
    }
}

fn sample_data() -> String {
    json!({
        "nombreCompleto": "Ana María López",
        "email": "ana@example.com",
        "numeroPortar": "55 1234 5678",
        "nip": "8842",
        "numeroContacto": "55 8765 4321",
        "planElegido": "Plan 10GB",
        "calle": "Av. Reforma",
        "numeroExterior": "100",
        "codigoPostal": "06600",
        "descripcionVivienda": "Casa azul, portón negro",
        "aceptaTyC": true,
    })
    .to_string()
}

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3];

fn png_part(filename: &str) -> Part {
    Part::bytes(PNG_BYTES).file_name(filename).mime_type("image/png")
}

fn accepting_email_mock() -> Mock {
    Mock::given(method("POST"))
        .and(path("/v3/smtp/email"))
        .and(header("api-key", "test-key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "messageId": "msg-1" })))
}

#[tokio::test]
async fn full_submission_persists_stores_and_notifies() {
    let records = Arc::new(InMemoryRecordStore::default());
    let app = spawn(records.clone(), Some("test-key"), 15 * 1024 * 1024, Some(ADMIN_TOKEN)).await;

    accepting_email_mock().expect(2).mount(&app.email).await;

    let response = app
        .server
        .post("/api/portabilidad")
        .multipart(
            MultipartForm::new()
                .add_text("data", sample_data())
                .add_part("ineFrente", png_part("ine frente.png"))
                .add_part("ineReverso", png_part("reverso.png")),
        )
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["folio"], json!(1));

    let carpeta = body["carpeta"].as_str().unwrap();
    assert!(carpeta.starts_with("portas/"), "carpeta: {carpeta}");
    assert!(carpeta.contains("55-1234-5678"), "carpeta: {carpeta}");

    let frente_file = body["files"]["frente"].as_str().unwrap();
    assert!(frente_file.starts_with(carpeta), "file outside folder: {frente_file}");
    assert!(frente_file.contains("ine-frente"), "file: {frente_file}");
    let frente_url = body["urls"]["frente"].as_str().unwrap();
    assert!(frente_url.contains("/admin/download?file="), "url: {frente_url}");

    assert_eq!(body["emailStatus"]["mesa"]["ok"], json!(true));
    assert_eq!(body["emailStatus"]["mesa"]["resp"]["messageId"], json!("msg-1"));
    assert_eq!(body["emailStatus"]["cliente"]["ok"], json!(true));

    // persisted row carries the submission and the storage folder
    {
        let rows = records.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].numero_portar, "55 1234 5678");
        assert_eq!(rows[0].email, "ana@example.com");
        assert_eq!(rows[0].origen, "landing-movistar");
        assert_eq!(rows[0].storage_carpeta, carpeta);
        assert!(rows[0].acepta_tyc);
    }

    // operations email goes to the desk, confirmation to the applicant
    let requests = app.email.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let mesa: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(mesa["to"][0]["email"], json!("mesa@example.com"));
    assert!(mesa["subject"].as_str().unwrap().contains("Folio 1"));
    let cliente: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(cliente["to"][0]["email"], json!("ana@example.com"));
    assert_eq!(cliente["replyTo"]["email"], json!("mesa@example.com"));

    // stored image is retrievable through the token-gated download route
    let download = app
        .server
        .get("/admin/download")
        .add_query_param("file", frente_file)
        .add_query_param("token", ADMIN_TOKEN)
        .await;
    download.assert_status_ok();
    assert_eq!(download.as_bytes().as_ref(), PNG_BYTES);
}

#[tokio::test]
async fn accepts_legacy_field_aliases_and_skips_sends_without_key() {
    let records = Arc::new(InMemoryRecordStore::default());
    let app = spawn(records.clone(), None, 15 * 1024 * 1024, Some(ADMIN_TOKEN)).await;

    let response = app
        .server
        .post("/api/portabilidad")
        .multipart(
            MultipartForm::new()
                .add_text("data", sample_data())
                .add_part("frente", png_part("f.png"))
                .add_part("reverso", png_part("r.png")),
        )
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["emailStatus"]["mesa"]["ok"], json!(true));
    assert_eq!(body["emailStatus"]["mesa"]["resp"]["skipped"], json!(true));
    assert_eq!(body["emailStatus"]["cliente"]["resp"]["skipped"], json!(true));
    assert_eq!(records.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn each_submission_gets_a_fresh_folio() {
    let records = Arc::new(InMemoryRecordStore::default());
    let app = spawn(records.clone(), None, 15 * 1024 * 1024, Some(ADMIN_TOKEN)).await;

    for expected_folio in 1..=3 {
        let response = app
            .server
            .post("/api/portabilidad")
            .multipart(
                MultipartForm::new()
                    .add_text("data", sample_data())
                    .add_part("ineFrente", png_part("f.png"))
                    .add_part("ineReverso", png_part("r.png")),
            )
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["folio"], json!(expected_folio));
    }
}

#[tokio::test]
async fn rejects_single_image() {
    let records = Arc::new(InMemoryRecordStore::default());
    let app = spawn(records.clone(), Some("test-key"), 15 * 1024 * 1024, Some(ADMIN_TOKEN)).await;

    let response = app
        .server
        .post("/api/portabilidad")
        .multipart(
            MultipartForm::new()
                .add_text("data", sample_data())
                .add_part("ineFrente", png_part("f.png")),
        )
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["error"], json!("INE frente y reverso son requeridos"));
    assert!(records.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rejects_malformed_data_field() {
    let app = spawn(
        Arc::new(InMemoryRecordStore::default()),
        Some("test-key"),
        15 * 1024 * 1024,
        Some(ADMIN_TOKEN),
    )
    .await;

    let response = app
        .server
        .post("/api/portabilidad")
        .multipart(
            MultipartForm::new()
                .add_text("data", "{not json")
                .add_part("ineFrente", png_part("f.png"))
                .add_part("ineReverso", png_part("r.png")),
        )
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().starts_with("JSON inválido"));
}

#[tokio::test]
async fn rejects_non_image_upload() {
    let app = spawn(
        Arc::new(InMemoryRecordStore::default()),
        Some("test-key"),
        15 * 1024 * 1024,
        Some(ADMIN_TOKEN),
    )
    .await;

    let pdf = Part::bytes(b"%PDF-1.4".as_slice())
        .file_name("ine.pdf")
        .mime_type("application/pdf");
    let response = app
        .server
        .post("/api/portabilidad")
        .multipart(
            MultipartForm::new()
                .add_text("data", sample_data())
                .add_part("ineFrente", pdf)
                .add_part("ineReverso", png_part("r.png")),
        )
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"], json!("Formato no permitido. Usa PNG/JPG/WEBP."));
}

#[tokio::test]
async fn rejects_oversized_upload() {
    let app = spawn(
        Arc::new(InMemoryRecordStore::default()),
        Some("test-key"),
        64,
        Some(ADMIN_TOKEN),
    )
    .await;

    let big = Part::bytes(vec![0u8; 256]).file_name("f.png").mime_type("image/png");
    let response = app
        .server
        .post("/api/portabilidad")
        .multipart(
            MultipartForm::new()
                .add_text("data", sample_data())
                .add_part("ineFrente", big)
                .add_part("ineReverso", png_part("r.png")),
        )
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().starts_with("Archivo demasiado grande"));
}

#[tokio::test]
async fn insert_failure_aborts_before_any_email() {
    let app = spawn(
        Arc::new(FailingRecordStore),
        Some("test-key"),
        15 * 1024 * 1024,
        Some(ADMIN_TOKEN),
    )
    .await;

    accepting_email_mock().expect(0).mount(&app.email).await;

    let response = app
        .server
        .post("/api/portabilidad")
        .multipart(
            MultipartForm::new()
                .add_text("data", sample_data())
                .add_part("ineFrente", png_part("f.png"))
                .add_part("ineReverso", png_part("r.png")),
        )
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], json!("Error guardando en base de datos"));
}

#[tokio::test]
async fn storage_failure_aborts_before_persistence_and_email() {
    let records = Arc::new(InMemoryRecordStore::default());
    let email = MockServer::start().await;

    let mut config = Config::default();
    config.email.api_url = Url::parse(&format!("{}/v3/smtp/email", email.uri())).unwrap();
    config.email.api_key = Some("test-key".to_string());
    config.email.mesa_recipient = "mesa@example.com".to_string();
    let mailer = Arc::new(Mailer::new(config.email.clone()));

    let state = AppState::builder()
        .config(config)
        .records(records.clone() as Arc<dyn RecordStore>)
        .storage(Arc::new(FailingBlobStorage))
        .mailer(mailer)
        .build();
    let server = TestServer::new(build_router(state).unwrap()).unwrap();

    accepting_email_mock().expect(0).mount(&email).await;

    let response = server
        .post("/api/portabilidad")
        .multipart(
            MultipartForm::new()
                .add_text("data", sample_data())
                .add_part("ineFrente", png_part("f.png"))
                .add_part("ineReverso", png_part("r.png")),
        )
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["error"], json!("Error subiendo archivo a Storage"));
    assert!(records.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn provider_rejection_never_fails_the_intake() {
    let records = Arc::new(InMemoryRecordStore::default());
    let app = spawn(records.clone(), Some("test-key"), 15 * 1024 * 1024, Some(ADMIN_TOKEN)).await;

    Mock::given(method("POST"))
        .and(path("/v3/smtp/email"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad sender"))
        .expect(2)
        .mount(&app.email)
        .await;

    let response = app
        .server
        .post("/api/portabilidad")
        .multipart(
            MultipartForm::new()
                .add_text("data", sample_data())
                .add_part("ineFrente", png_part("f.png"))
                .add_part("ineReverso", png_part("r.png")),
        )
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["folio"], json!(1));
    assert_eq!(body["emailStatus"]["mesa"]["ok"], json!(false));
    assert!(body["emailStatus"]["mesa"]["error"].as_str().unwrap().contains("400"));
    assert_eq!(body["emailStatus"]["cliente"]["ok"], json!(false));
    assert_eq!(records.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn health_routes_respond() {
    let app = spawn(
        Arc::new(InMemoryRecordStore::default()),
        None,
        15 * 1024 * 1024,
        Some(ADMIN_TOKEN),
    )
    .await;

    let health = app.server.get("/health").await;
    health.assert_status_ok();
    let body: Value = health.json();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["env"], json!("dev"));

    let api_health = app.server.get("/api/health").await;
    api_health.assert_status_ok();
    assert_eq!(api_health.text(), "ok");
}

#[tokio::test]
async fn admin_health_requires_the_token() {
    let app = spawn(
        Arc::new(InMemoryRecordStore::default()),
        None,
        15 * 1024 * 1024,
        Some(ADMIN_TOKEN),
    )
    .await;

    app.server.get("/admin/health").await.assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .get("/admin/health")
        .add_query_param("token", "wrong")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let ok = app
        .server
        .get("/admin/health")
        .add_header("x-admin-token", ADMIN_TOKEN)
        .await;
    ok.assert_status_ok();
    let body: Value = ok.json();
    assert_eq!(body["ok"], json!(true));
    assert!(body["pid"].as_u64().unwrap() > 0);

    let bearer = app
        .server
        .get("/admin/health")
        .add_header("authorization", format!("Bearer {ADMIN_TOKEN}"))
        .await;
    bearer.assert_status_ok();
}

#[tokio::test]
async fn admin_routes_unusable_without_configured_token() {
    let app = spawn(
        Arc::new(InMemoryRecordStore::default()),
        None,
        15 * 1024 * 1024,
        None,
    )
    .await;

    let response = app
        .server
        .get("/admin/health")
        .add_query_param("token", "anything")
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn download_rejects_path_traversal() {
    let app = spawn(
        Arc::new(InMemoryRecordStore::default()),
        None,
        15 * 1024 * 1024,
        Some(ADMIN_TOKEN),
    )
    .await;

    let response = app
        .server
        .get("/admin/download")
        .add_query_param("file", "../../etc/passwd")
        .add_query_param("token", ADMIN_TOKEN)
        .await;
    response.assert_status_bad_request();

    let missing = app
        .server
        .get("/admin/download")
        .add_query_param("file", "portas/nope/ine-frente-x.png")
        .add_query_param("token", ADMIN_TOKEN)
        .await;
    missing.assert_status_not_found();
}
