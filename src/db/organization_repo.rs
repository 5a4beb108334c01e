// src/db/organization_repo.rs

use sqlx::{types::Json, Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::organization::{Organization, OrganizationSettings},
};

#[derive(Clone)]
pub struct OrganizationRepository {
    pool: PgPool,
}

impl OrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_organization<'e, E>(
        &self,
        executor: E,
        name: &str,
        identifier: &str,
        domain: Option<&str>,
    ) -> Result<Organization, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (id, name, identifier, domain)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(identifier)
            .bind(domain)
            .fetch_one(executor)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return AppError::UniqueConstraintViolation(format!(
                            "Organização '{}' já cadastrada.",
                            identifier
                        ));
                    }
                }
                e.into()
            })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        let org = sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(org)
    }

    // Organizações sem linha de configuração usam os valores padrão
    pub async fn get_settings(&self, organization_id: Uuid) -> Result<OrganizationSettings, AppError> {
        let settings = sqlx::query_as::<_, OrganizationSettings>(
            "SELECT * FROM organization_settings WHERE organization_id = $1",
        )
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(settings.unwrap_or_else(|| OrganizationSettings::defaults_for(organization_id)))
    }

    pub async fn upsert_settings(
        &self,
        settings: &OrganizationSettings,
    ) -> Result<OrganizationSettings, AppError> {
        let saved = sqlx::query_as::<_, OrganizationSettings>(
            r#"
            INSERT INTO organization_settings (
                organization_id, password_policy, two_factor_policy,
                session_policy, notification_policy
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (organization_id)
            DO UPDATE SET
                password_policy = EXCLUDED.password_policy,
                two_factor_policy = EXCLUDED.two_factor_policy,
                session_policy = EXCLUDED.session_policy,
                notification_policy = EXCLUDED.notification_policy,
                updated_at = NOW()
            RETURNING *
            "#,
        )
            .bind(settings.organization_id)
            .bind(Json(&settings.password_policy))
            .bind(Json(&settings.two_factor_policy))
            .bind(Json(&settings.session_policy))
            .bind(Json(&settings.notification_policy))
            .fetch_one(&self.pool)
            .await?;

        Ok(saved)
    }
}
