// src/models/dashboard.rs

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// 1. Usuários por papel e situação
#[derive(Debug, Default, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub system_admins: i64,
    pub org_admins: i64,
    pub users: i64,
    pub two_factor_enabled: i64,
}

// 2. Certificados por situação (calculada na leitura) e tipo
#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStats {
    pub total: i64,
    pub valid: i64,
    pub expiring: i64,
    pub expired: i64,
    pub a1: i64,
    pub a3: i64,
    /// Próximos a vencer, em ordem de validade
    pub upcoming: Vec<UpcomingExpiration>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingExpiration {
    pub certificate_id: Uuid,
    pub name: String,
    pub company_name: String,
    #[schema(value_type = String, format = Date)]
    pub expiration_date: NaiveDate,
    pub days_until_expiration: i64,
}

// Linha crua usada para montar as estatísticas
#[derive(Debug, FromRow)]
pub struct CertificateExpiryRow {
    pub id: Uuid,
    pub name: String,
    pub company_name: String,
    pub certificate_type: String,
    pub expiration_date: NaiveDate,
}
