// src/db/dashboard_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        dashboard::{CertificateExpiryRow, UserStats},
        organization::OrganizationSummary,
    },
};

// Consultas agregadas dos painéis administrativos.
// `organization_id = None` significa visão global (system_admin).
#[derive(Clone)]
pub struct DashboardRepository {
    pool: PgPool,
}

impl DashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn user_stats(&self, organization_id: Option<Uuid>) -> Result<UserStats, AppError> {
        let stats = sqlx::query_as::<_, UserStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'active') AS active,
                COUNT(*) FILTER (WHERE status = 'inactive') AS inactive,
                COUNT(*) FILTER (WHERE role = 'system_admin') AS system_admins,
                COUNT(*) FILTER (WHERE role = 'org_admin') AS org_admins,
                COUNT(*) FILTER (WHERE role = 'user') AS users,
                COUNT(*) FILTER (WHERE two_factor_enabled) AS two_factor_enabled
            FROM users
            WHERE ($1::uuid IS NULL OR organization_id = $1)
            "#,
        )
            .bind(organization_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(stats)
    }

    // A situação (válido/vencendo/vencido) é calculada no serviço, não aqui
    pub async fn certificate_expiry_rows(
        &self,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<CertificateExpiryRow>, AppError> {
        let rows = sqlx::query_as::<_, CertificateExpiryRow>(
            r#"
            SELECT
                cert.id,
                cert.name,
                c.name AS company_name,
                cert.certificate_type,
                cert.expiration_date
            FROM certificates cert
            JOIN companies c ON c.id = cert.company_id
            WHERE ($1::uuid IS NULL OR c.organization_id = $1)
            ORDER BY cert.expiration_date
            "#,
        )
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn organization_summaries(&self) -> Result<Vec<OrganizationSummary>, AppError> {
        let rows = sqlx::query_as::<_, OrganizationSummary>(
            r#"
            SELECT
                o.id, o.name, o.identifier, o.plan, o.status, o.created_at,
                (SELECT COUNT(*) FROM users u WHERE u.organization_id = o.id) AS user_count,
                (SELECT COUNT(*) FROM companies c WHERE c.organization_id = o.id) AS company_count,
                (SELECT COUNT(*) FROM certificates cert
                    JOIN companies c ON c.id = cert.company_id
                    WHERE c.organization_id = o.id) AS certificate_count
            FROM organizations o
            ORDER BY o.name
            "#,
        )
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
