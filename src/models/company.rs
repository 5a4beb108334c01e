// src/models/company.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    pub organization_id: Uuid,

    #[schema(example = "Acme Comércio Ltda")]
    pub name: String,

    #[schema(example = "12.345.678/0001-99")]
    pub identifier: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompanyPayload {
    #[validate(length(min = 1, message = "O nome da empresa é obrigatório."))]
    pub name: String,

    #[validate(length(min = 11, max = 18, message = "CNPJ/CPF inválido."))]
    pub identifier: String,

    /// Usado apenas por `system_admin`
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCompanyPayload {
    #[validate(length(min = 1, message = "O nome da empresa é obrigatório."))]
    pub name: Option<String>,

    #[validate(length(min = 11, max = 18, message = "CNPJ/CPF inválido."))]
    pub identifier: Option<String>,
}
