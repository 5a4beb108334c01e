// src/db/company_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::company::Company};

#[derive(Clone)]
pub struct CompanyRepository {
    pool: PgPool,
}

fn map_unique_violation(e: sqlx::Error, identifier: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::UniqueConstraintViolation(format!(
                "Empresa com documento '{}' já cadastrada.",
                identifier
            ));
        }
    }
    e.into()
}

impl CompanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_company<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        name: &str,
        identifier: &str,
    ) -> Result<Company, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (id, organization_id, name, identifier)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
            .bind(Uuid::new_v4())
            .bind(organization_id)
            .bind(name)
            .bind(identifier)
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, identifier))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Company>, AppError> {
        let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(company)
    }

    /// `None` lista as empresas de todas as organizações.
    pub async fn list_by_organization(
        &self,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<Company>, AppError> {
        let companies = sqlx::query_as::<_, Company>(
            r#"
            SELECT * FROM companies
            WHERE ($1::uuid IS NULL OR organization_id = $1)
            ORDER BY name
            "#,
        )
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(companies)
    }

    // Empresas em que o usuário tem `can_view`, restritas à organização dele
    pub async fn list_viewable_by_user(
        &self,
        user_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<Company>, AppError> {
        let companies = sqlx::query_as::<_, Company>(
            r#"
            SELECT c.* FROM companies c
            JOIN user_permissions up ON up.company_id = c.id
            WHERE up.user_id = $1
              AND up.can_view = TRUE
              AND c.organization_id = $2
            ORDER BY c.name
            "#,
        )
            .bind(user_id)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(companies)
    }

    pub async fn update_company(
        &self,
        id: Uuid,
        name: Option<&str>,
        identifier: Option<&str>,
    ) -> Result<Option<Company>, AppError> {
        sqlx::query_as::<_, Company>(
            r#"
            UPDATE companies SET
                name = COALESCE($2, name),
                identifier = COALESCE($3, identifier),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(id)
            .bind(name)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, identifier.unwrap_or("?")))
    }

    // Certificados e permissões caem junto (ON DELETE CASCADE)
    pub async fn delete_company(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
