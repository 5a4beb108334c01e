// src/db/audit_repo.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::audit::{ActivityLog, LogQuery, NewActivityLog, NewSecurityLog, SecurityLog},
    services::audit_service::AuditSink,
};

#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

// Filtros comuns aos dois tipos de log
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &LogQuery, action_column: &str) {
    if let Some(user_id) = query.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(organization_id) = query.organization_id {
        builder.push(" AND organization_id = ").push_bind(organization_id);
    }
    if let Some(action) = &query.action {
        builder
            .push(format!(" AND {} = ", action_column))
            .push_bind(action.clone());
    }
    if let Some(from) = query.from {
        builder.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        builder.push(" AND created_at <= ").push_bind(to);
    }
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_activity(&self, entry: &NewActivityLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (
                id, user_id, organization_id, company_id, action, entity,
                entity_id, details, ip_address, user_agent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
            .bind(Uuid::new_v4())
            .bind(entry.user_id)
            .bind(entry.organization_id)
            .bind(entry.company_id)
            .bind(entry.action.as_str())
            .bind(entry.entity.as_str())
            .bind(entry.entity_id)
            .bind(&entry.details)
            .bind(entry.ip_address.as_deref())
            .bind(entry.user_agent.as_deref())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_security(&self, entry: &NewSecurityLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO security_logs (
                id, user_id, organization_id, event, details, ip_address, user_agent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
            .bind(Uuid::new_v4())
            .bind(entry.user_id)
            .bind(entry.organization_id)
            .bind(entry.event.as_str())
            .bind(&entry.details)
            .bind(entry.ip_address.as_deref())
            .bind(entry.user_agent.as_deref())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mais recentes primeiro.
    pub async fn query_activity(&self, query: &LogQuery) -> Result<Vec<ActivityLog>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM activity_logs WHERE TRUE");
        push_filters(&mut builder, query, "action");

        if let Some(entity) = &query.entity {
            builder.push(" AND entity = ").push_bind(entity.clone());
        }
        if let Some(entity_id) = query.entity_id {
            builder.push(" AND entity_id = ").push_bind(entity_id);
        }
        if let Some(company_id) = query.company_id {
            builder.push(" AND company_id = ").push_bind(company_id);
        }

        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(query.effective_limit());

        let logs = builder
            .build_query_as::<ActivityLog>()
            .fetch_all(&self.pool)
            .await?;
        Ok(logs)
    }

    /// Mais recentes primeiro.
    pub async fn query_security(&self, query: &LogQuery) -> Result<Vec<SecurityLog>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM security_logs WHERE TRUE");
        push_filters(&mut builder, query, "event");

        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(query.effective_limit());

        let logs = builder
            .build_query_as::<SecurityLog>()
            .fetch_all(&self.pool)
            .await?;
        Ok(logs)
    }
}

#[async_trait]
impl AuditSink for AuditRepository {
    async fn write_activity(&self, entry: &NewActivityLog) -> Result<(), AppError> {
        self.insert_activity(entry).await
    }

    async fn write_security(&self, entry: &NewSecurityLog) -> Result<(), AppError> {
        self.insert_security(entry).await
    }
}
