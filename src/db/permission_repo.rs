// src/db/permission_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::permission::{PermissionFlags, PermissionQuery, UserPermission},
};

#[derive(Clone)]
pub struct PermissionRepository {
    pool: PgPool,
}

impl PermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, user_id: Uuid, company_id: Uuid) -> Result<Option<UserPermission>, AppError> {
        let permission = sqlx::query_as::<_, UserPermission>(
            "SELECT * FROM user_permissions WHERE user_id = $1 AND company_id = $2",
        )
            .bind(user_id)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(permission)
    }

    // UPSERT: a chave (user_id, company_id) garante uma única linha por par
    pub async fn upsert<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        company_id: Uuid,
        flags: PermissionFlags,
    ) -> Result<UserPermission, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let permission = sqlx::query_as::<_, UserPermission>(
            r#"
            INSERT INTO user_permissions (
                user_id, company_id, can_view, can_edit, can_delete, can_view_password
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, company_id)
            DO UPDATE SET
                can_view = EXCLUDED.can_view,
                can_edit = EXCLUDED.can_edit,
                can_delete = EXCLUDED.can_delete,
                can_view_password = EXCLUDED.can_view_password,
                updated_at = NOW()
            RETURNING *
            "#,
        )
            .bind(user_id)
            .bind(company_id)
            .bind(flags.can_view)
            .bind(flags.can_edit)
            .bind(flags.can_delete)
            .bind(flags.can_view_password)
            .fetch_one(executor)
            .await?;
        Ok(permission)
    }

    pub async fn delete(&self, user_id: Uuid, company_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM user_permissions WHERE user_id = $1 AND company_id = $2")
            .bind(user_id)
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Lista as permissões, opcionalmente restritas às empresas de uma organização.
    pub async fn list(
        &self,
        query: &PermissionQuery,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<UserPermission>, AppError> {
        let permissions = sqlx::query_as::<_, UserPermission>(
            r#"
            SELECT up.* FROM user_permissions up
            JOIN companies c ON c.id = up.company_id
            WHERE ($1::uuid IS NULL OR up.user_id = $1)
              AND ($2::uuid IS NULL OR up.company_id = $2)
              AND ($3::uuid IS NULL OR c.organization_id = $3)
            ORDER BY up.updated_at DESC
            "#,
        )
            .bind(query.user_id)
            .bind(query.company_id)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(permissions)
    }
}
