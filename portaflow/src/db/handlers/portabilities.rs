//! Database repository for portability requests.

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use crate::db::{errors::Result, models::portability::NewPortability};

pub struct Portabilities<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Portabilities<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a request and return the generated folio.
    #[instrument(skip(self, request), fields(numero_portar = %request.numero_portar), err)]
    pub async fn create(&mut self, request: &NewPortability) -> Result<i64> {
        let folio: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO portabilidades (
                nombre_completo, email, numero_portar, nip, numero_contacto,
                plan_elegido, calle, numero_exterior, codigo_postal,
                descripcion_vivienda, acepta_tyc, origen, user_agent,
                ine_frente_url, ine_reverso_url, storage_carpeta
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id
            "#,
        )
        .bind(&request.nombre_completo)
        .bind(&request.email)
        .bind(&request.numero_portar)
        .bind(&request.nip)
        .bind(&request.numero_contacto)
        .bind(&request.plan_elegido)
        .bind(&request.calle)
        .bind(&request.numero_exterior)
        .bind(&request.codigo_postal)
        .bind(&request.descripcion_vivienda)
        .bind(request.acepta_tyc)
        .bind(&request.origen)
        .bind(&request.user_agent)
        .bind(&request.ine_frente_url)
        .bind(&request.ine_reverso_url)
        .bind(&request.storage_carpeta)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(folio)
    }
}

/// Persistence seam for the intake pipeline.
///
/// The production implementation is [`PostgresRecordStore`]; tests substitute
/// an in-memory store so the pipeline runs without a database.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a portability request, returning the generated folio.
    async fn insert(&self, request: &NewPortability) -> Result<i64>;
}

/// [`RecordStore`] backed by a PostgreSQL pool.
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecordStore for PostgresRecordStore {
    async fn insert(&self, request: &NewPortability) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Portabilities::new(&mut conn).create(request).await
    }
}
