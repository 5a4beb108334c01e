// src/db/certificate_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::certificate::{Certificate, CertificateSystem, CertificateSystemInput, CertificateType},
};

// Campos de um certificado novo; a senha já chega cifrada
pub struct NewCertificate<'a> {
    pub company_id: Uuid,
    pub name: &'a str,
    pub entity_name: &'a str,
    pub identifier: &'a str,
    pub certificate_type: CertificateType,
    pub issued_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub encrypted_password: &'a str,
    pub file_path: Option<&'a str>,
    pub created_by: Uuid,
}

#[derive(Default)]
pub struct CertificateChanges<'a> {
    pub name: Option<&'a str>,
    pub entity_name: Option<&'a str>,
    pub identifier: Option<&'a str>,
    pub certificate_type: Option<CertificateType>,
    pub issued_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub encrypted_password: Option<&'a str>,
    pub file_path: Option<&'a str>,
}

#[derive(Clone)]
pub struct CertificateRepository {
    pool: PgPool,
}

impl CertificateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_certificate<'e, E>(
        &self,
        executor: E,
        new_cert: NewCertificate<'_>,
    ) -> Result<Certificate, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let certificate = sqlx::query_as::<_, Certificate>(
            r#"
            INSERT INTO certificates (
                id, company_id, name, entity_name, identifier, certificate_type,
                issued_date, expiration_date, encrypted_password, file_path,
                created_by, updated_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#,
        )
            .bind(Uuid::new_v4())
            .bind(new_cert.company_id)
            .bind(new_cert.name)
            .bind(new_cert.entity_name)
            .bind(new_cert.identifier)
            .bind(new_cert.certificate_type.as_str())
            .bind(new_cert.issued_date)
            .bind(new_cert.expiration_date)
            .bind(new_cert.encrypted_password)
            .bind(new_cert.file_path)
            .bind(new_cert.created_by)
            .fetch_one(executor)
            .await?;

        Ok(certificate)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Certificate>, AppError> {
        let certificate = sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(certificate)
    }

    pub async fn list_by_companies(&self, company_ids: &[Uuid]) -> Result<Vec<Certificate>, AppError> {
        let certificates = sqlx::query_as::<_, Certificate>(
            r#"
            SELECT * FROM certificates
            WHERE company_id = ANY($1)
            ORDER BY expiration_date, name
            "#,
        )
            .bind(company_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(certificates)
    }

    pub async fn update_certificate<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        changes: CertificateChanges<'_>,
        updated_by: Uuid,
    ) -> Result<Option<Certificate>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let certificate = sqlx::query_as::<_, Certificate>(
            r#"
            UPDATE certificates SET
                name = COALESCE($2, name),
                entity_name = COALESCE($3, entity_name),
                identifier = COALESCE($4, identifier),
                certificate_type = COALESCE($5, certificate_type),
                issued_date = COALESCE($6, issued_date),
                expiration_date = COALESCE($7, expiration_date),
                encrypted_password = COALESCE($8, encrypted_password),
                file_path = COALESCE($9, file_path),
                updated_by = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(id)
            .bind(changes.name)
            .bind(changes.entity_name)
            .bind(changes.identifier)
            .bind(changes.certificate_type.map(|t| t.as_str()))
            .bind(changes.issued_date)
            .bind(changes.expiration_date)
            .bind(changes.encrypted_password)
            .bind(changes.file_path)
            .bind(updated_by)
            .fetch_optional(executor)
            .await?;

        Ok(certificate)
    }

    // Os sistemas vinculados caem junto (ON DELETE CASCADE)
    pub async fn delete_certificate(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM certificates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    //  SISTEMAS VINCULADOS
    // =========================================================================

    pub async fn insert_systems<'e, E>(
        &self,
        executor: E,
        certificate_id: Uuid,
        systems: &[CertificateSystemInput],
    ) -> Result<Vec<CertificateSystem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if systems.is_empty() {
            return Ok(Vec::new());
        }

        // Inserção em massa numa única instrução
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO certificate_systems (id, certificate_id, name, url, environment) ",
        );
        builder.push_values(systems, |mut row, system| {
            row.push_bind(Uuid::new_v4())
                .push_bind(certificate_id)
                .push_bind(system.name.clone())
                .push_bind(system.url.clone())
                .push_bind(system.environment.clone());
        });
        builder.push(" RETURNING *");

        let inserted = builder
            .build_query_as::<CertificateSystem>()
            .fetch_all(executor)
            .await?;
        Ok(inserted)
    }

    pub async fn delete_systems<'e, E>(&self, executor: E, certificate_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM certificate_systems WHERE certificate_id = $1")
            .bind(certificate_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn systems_for(&self, certificate_ids: &[Uuid]) -> Result<Vec<CertificateSystem>, AppError> {
        let systems = sqlx::query_as::<_, CertificateSystem>(
            r#"
            SELECT * FROM certificate_systems
            WHERE certificate_id = ANY($1)
            ORDER BY name
            "#,
        )
            .bind(certificate_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(systems)
    }
}
