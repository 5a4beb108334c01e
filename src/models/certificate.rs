// src/models/certificate.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::UnknownVariant;

/// Dias restantes a partir dos quais o certificado passa a "vencendo".
pub const EXPIRING_THRESHOLD_DAYS: i64 = 30;

// ---
// Enums
// ---

/// A1: arquivo (.pfx) protegido por senha. A3: token/cartão protegido por PIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CertificateType {
    A1,
    A3,
}

impl CertificateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateType::A1 => "A1",
            CertificateType::A3 => "A3",
        }
    }
}

impl TryFrom<String> for CertificateType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "A1" => Ok(CertificateType::A1),
            "A3" => Ok(CertificateType::A3),
            _ => Err(UnknownVariant(value)),
        }
    }
}

/// Situação derivada da data de validade. Nunca é gravada no banco.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Valid,
    Expiring,
    Expired,
}

impl CertificateStatus {
    pub fn from_days_remaining(days: i64) -> Self {
        if days <= 0 {
            CertificateStatus::Expired
        } else if days <= EXPIRING_THRESHOLD_DAYS {
            CertificateStatus::Expiring
        } else {
            CertificateStatus::Valid
        }
    }

    pub fn from_expiration(expiration_date: NaiveDate, today: NaiveDate) -> Self {
        Self::from_days_remaining(days_until(expiration_date, today))
    }
}

pub fn days_until(expiration_date: NaiveDate, today: NaiveDate) -> i64 {
    (expiration_date - today).num_days()
}

// ---
// Certificado (tabela certificates)
// ---
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: Uuid,
    pub company_id: Uuid,

    #[schema(example = "NFe A1")]
    pub name: String,

    #[schema(example = "Acme Comércio Ltda")]
    pub entity_name: String,

    #[schema(example = "12.345.678/0001-99")]
    pub identifier: String,

    #[sqlx(try_from = "String")]
    #[serde(rename = "type")]
    pub certificate_type: CertificateType,

    #[schema(value_type = String, format = Date, example = "2025-01-10")]
    pub issued_date: NaiveDate,

    #[schema(value_type = String, format = Date, example = "2026-01-10")]
    pub expiration_date: NaiveDate,

    // Nunca sai nas respostas: só o endpoint de senha a decifra
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub encrypted_password: String,

    pub file_path: Option<String>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Sistemas que dependem do certificado (tabela certificate_systems)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSystem {
    pub id: Uuid,

    #[schema(ignore)]
    #[serde(skip_serializing)]
    pub certificate_id: Uuid,

    #[schema(example = "Portal NFe SEFAZ")]
    pub name: String,

    #[schema(example = "https://www.nfe.fazenda.gov.br")]
    pub url: Option<String>,

    #[schema(example = "produção")]
    pub environment: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateResponse {
    #[serde(flatten)]
    pub certificate: Certificate,
    pub status: CertificateStatus,
    pub days_until_expiration: i64,
    pub systems: Vec<CertificateSystem>,
}

impl CertificateResponse {
    pub fn build(certificate: Certificate, systems: Vec<CertificateSystem>, today: NaiveDate) -> Self {
        let days = days_until(certificate.expiration_date, today);
        Self {
            status: CertificateStatus::from_days_remaining(days),
            days_until_expiration: days,
            certificate,
            systems,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificatePasswordResponse {
    pub certificate_id: Uuid,
    pub password: String,
}

// ---
// Payloads
// ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSystemInput {
    #[validate(length(min = 1, message = "O nome do sistema é obrigatório."))]
    pub name: String,

    #[validate(url(message = "URL inválida."))]
    pub url: Option<String>,

    pub environment: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCertificatePayload {
    pub company_id: Uuid,

    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,

    #[validate(length(min = 1, message = "O titular é obrigatório."))]
    pub entity_name: String,

    #[validate(length(min = 11, max = 18, message = "CNPJ/CPF inválido."))]
    pub identifier: String,

    #[serde(rename = "type")]
    pub certificate_type: CertificateType,

    #[schema(value_type = String, format = Date)]
    pub issued_date: NaiveDate,

    #[schema(value_type = String, format = Date)]
    pub expiration_date: NaiveDate,

    #[validate(length(min = 1, message = "A senha do certificado é obrigatória."))]
    pub password: String,

    pub file_path: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub systems: Vec<CertificateSystemInput>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCertificatePayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: Option<String>,

    #[validate(length(min = 1, message = "O titular é obrigatório."))]
    pub entity_name: Option<String>,

    #[validate(length(min = 11, max = 18, message = "CNPJ/CPF inválido."))]
    pub identifier: Option<String>,

    #[serde(rename = "type")]
    pub certificate_type: Option<CertificateType>,

    #[schema(value_type = Option<String>, format = Date)]
    pub issued_date: Option<NaiveDate>,

    #[schema(value_type = Option<String>, format = Date)]
    pub expiration_date: Option<NaiveDate>,

    #[validate(length(min = 1, message = "A senha do certificado é obrigatória."))]
    pub password: Option<String>,

    pub file_path: Option<String>,

    #[validate(nested)]
    pub systems: Option<Vec<CertificateSystemInput>>,
}

impl UpdateCertificatePayload {
    /// Nomes dos campos enviados (nunca os valores), para a trilha de auditoria.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() { fields.push("name"); }
        if self.entity_name.is_some() { fields.push("entityName"); }
        if self.identifier.is_some() { fields.push("identifier"); }
        if self.certificate_type.is_some() { fields.push("type"); }
        if self.issued_date.is_some() { fields.push("issuedDate"); }
        if self.expiration_date.is_some() { fields.push("expirationDate"); }
        if self.password.is_some() { fields.push("password"); }
        if self.file_path.is_some() { fields.push("filePath"); }
        if self.systems.is_some() { fields.push("systems"); }
        fields
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CertificateListQuery {
    pub company_id: Option<Uuid>,
    pub status: Option<CertificateStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn status_in(days: i64) -> CertificateStatus {
        CertificateStatus::from_expiration(today() + Duration::days(days), today())
    }

    #[test]
    fn yesterday_is_expired() {
        assert_eq!(status_in(-1), CertificateStatus::Expired);
    }

    #[test]
    fn today_is_expired() {
        assert_eq!(status_in(0), CertificateStatus::Expired);
    }

    #[test]
    fn ten_days_is_expiring() {
        assert_eq!(status_in(10), CertificateStatus::Expiring);
    }

    #[test]
    fn thirty_day_boundary() {
        assert_eq!(status_in(30), CertificateStatus::Expiring);
        assert_eq!(status_in(31), CertificateStatus::Valid);
    }

    #[test]
    fn sixty_days_is_valid() {
        assert_eq!(status_in(60), CertificateStatus::Valid);
    }

    #[test]
    fn changed_fields_lists_names_only() {
        let payload = UpdateCertificatePayload {
            name: Some("Novo nome".into()),
            password: Some("nova-senha".into()),
            ..Default::default()
        };
        assert_eq!(payload.changed_fields(), vec!["name", "password"]);
    }

    #[test]
    fn status_filter_parses_lowercase() {
        let status: CertificateStatus = serde_json::from_str("\"expiring\"").unwrap();
        assert_eq!(status, CertificateStatus::Expiring);
    }
}
