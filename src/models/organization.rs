// src/models/organization.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::auth::{AccountStatus, UserRole};

// ---
// Organização (o "tenant")
// ---
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,

    #[schema(example = "Contabilidade Acme")]
    pub name: String,

    #[schema(example = "12.345.678/0001-99")]
    pub identifier: String,

    pub domain: Option<String>,

    #[schema(example = "free")]
    pub plan: String,

    #[sqlx(try_from = "String")]
    pub status: AccountStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Linha do painel de organizações (system_admin)
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub id: Uuid,
    pub name: String,
    pub identifier: String,
    pub plan: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub user_count: i64,
    pub company_count: i64,
    pub certificate_count: i64,
}

// ---
// Políticas (colunas JSONB de organization_settings)
// ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_number: bool,
    pub require_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 8, require_uppercase: false, require_number: false, require_symbol: false }
    }
}

impl PasswordPolicy {
    /// Devolve a primeira regra não atendida.
    pub fn check(&self, password: &str) -> Result<(), String> {
        if password.chars().count() < self.min_length {
            return Err(format!("mínimo de {} caracteres", self.min_length));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err("ao menos uma letra maiúscula".into());
        }
        if self.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err("ao menos um número".into());
        }
        if self.require_symbol && password.chars().all(|c| c.is_alphanumeric()) {
            return Err("ao menos um símbolo".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TwoFactorPolicy {
    pub required_for_admins: bool,
    pub required_for_all: bool,
}

impl TwoFactorPolicy {
    pub fn applies_to(&self, role: UserRole) -> bool {
        self.required_for_all || (self.required_for_admins && role.has_admin_privileges())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionPolicy {
    pub max_age_hours: i64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self { max_age_hours: 24 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationPolicy {
    pub expiration_warning_days: i64,
    pub email_enabled: bool,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self { expiration_warning_days: 30, email_enabled: false }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSettings {
    #[schema(ignore)]
    #[serde(skip_deserializing)]
    pub organization_id: Uuid,

    #[sqlx(json)]
    pub password_policy: PasswordPolicy,

    #[sqlx(json)]
    pub two_factor_policy: TwoFactorPolicy,

    #[sqlx(json)]
    pub session_policy: SessionPolicy,

    #[sqlx(json)]
    pub notification_policy: NotificationPolicy,

    #[serde(skip_deserializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrganizationSettings {
    pub fn defaults_for(organization_id: Uuid) -> Self {
        Self { organization_id, ..Default::default() }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsPayload {
    pub password_policy: Option<PasswordPolicy>,
    pub two_factor_policy: Option<TwoFactorPolicy>,
    pub session_policy: Option<SessionPolicy>,
    pub notification_policy: Option<NotificationPolicy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_policy_fields_take_defaults() {
        let policy: PasswordPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, PasswordPolicy::default());
        let session: SessionPolicy = serde_json::from_str(r#"{"maxAgeHours": 8}"#).unwrap();
        assert_eq!(session.max_age_hours, 8);
    }

    #[test]
    fn password_policy_reports_first_violation() {
        let policy = PasswordPolicy {
            min_length: 8,
            require_uppercase: true,
            require_number: true,
            require_symbol: true,
        };
        assert!(policy.check("curta").is_err());
        assert!(policy.check("semmaiusculas1!").is_err());
        assert!(policy.check("SemNumero!").is_err());
        assert!(policy.check("SemSimbolo1").is_err());
        assert!(policy.check("Completa1!").is_ok());
    }

    #[test]
    fn two_factor_policy_targets_roles() {
        let admins_only = TwoFactorPolicy { required_for_admins: true, required_for_all: false };
        assert!(admins_only.applies_to(UserRole::OrgAdmin));
        assert!(!admins_only.applies_to(UserRole::User));

        let everyone = TwoFactorPolicy { required_for_admins: false, required_for_all: true };
        assert!(everyone.applies_to(UserRole::User));
        assert!(!TwoFactorPolicy::default().applies_to(UserRole::SystemAdmin));
    }
}
