// src/models/audit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// ---
// Vocabulário da trilha de auditoria
// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityAction {
    Login,
    Logout,
    View,
    Create,
    Update,
    Delete,
    ViewPassword,
    ChangePassword,
    GrantPermission,
    RevokePermission,
    UpdateSettings,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Login => "login",
            ActivityAction::Logout => "logout",
            ActivityAction::View => "view",
            ActivityAction::Create => "create",
            ActivityAction::Update => "update",
            ActivityAction::Delete => "delete",
            ActivityAction::ViewPassword => "view_password",
            ActivityAction::ChangePassword => "change_password",
            ActivityAction::GrantPermission => "grant_permission",
            ActivityAction::RevokePermission => "revoke_permission",
            ActivityAction::UpdateSettings => "update_settings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEntity {
    Certificate,
    Company,
    User,
    Permission,
    Session,
    Organization,
}

impl AuditEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEntity::Certificate => "certificate",
            AuditEntity::Company => "company",
            AuditEntity::User => "user",
            AuditEntity::Permission => "permission",
            AuditEntity::Session => "session",
            AuditEntity::Organization => "organization",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    LoginSuccess,
    LoginFailed,
    AccountLocked,
    Logout,
    TwoFactorVerified,
    TwoFactorFailed,
    TwoFactorEnabled,
    TwoFactorDisabled,
    PasswordChanged,
    SessionTerminated,
}

impl SecurityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEvent::LoginSuccess => "login_success",
            SecurityEvent::LoginFailed => "login_failed",
            SecurityEvent::AccountLocked => "account_locked",
            SecurityEvent::Logout => "logout",
            SecurityEvent::TwoFactorVerified => "two_factor_verified",
            SecurityEvent::TwoFactorFailed => "two_factor_failed",
            SecurityEvent::TwoFactorEnabled => "two_factor_enabled",
            SecurityEvent::TwoFactorDisabled => "two_factor_disabled",
            SecurityEvent::PasswordChanged => "password_changed",
            SecurityEvent::SessionTerminated => "session_terminated",
        }
    }
}

// ---
// Origem da requisição (IP + User-Agent)
// ---
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// ---
// Registros a gravar
// ---

#[derive(Debug, Clone)]
pub struct NewActivityLog {
    pub user_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub action: ActivityAction,
    pub entity: AuditEntity,
    pub entity_id: Option<Uuid>,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewActivityLog {
    pub fn new(action: ActivityAction, entity: AuditEntity, client: &ClientInfo) -> Self {
        Self {
            user_id: None,
            organization_id: None,
            company_id: None,
            action,
            entity,
            entity_id: None,
            details: Value::Object(Default::default()),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        }
    }

    pub fn by(mut self, user_id: Uuid, organization_id: Option<Uuid>) -> Self {
        self.user_id = Some(user_id);
        self.organization_id = organization_id;
        self
    }

    pub fn on(mut self, entity_id: Uuid) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn in_company(mut self, company_id: Uuid) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewSecurityLog {
    pub user_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub event: SecurityEvent,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewSecurityLog {
    pub fn new(event: SecurityEvent, client: &ClientInfo) -> Self {
        Self {
            user_id: None,
            organization_id: None,
            event,
            details: Value::Object(Default::default()),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        }
    }

    pub fn by(mut self, user_id: Uuid, organization_id: Option<Uuid>) -> Self {
        self.user_id = Some(user_id);
        self.organization_id = organization_id;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

// ---
// Registros lidos
// ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    #[schema(example = "view_password")]
    pub action: String,
    #[schema(example = "certificate")]
    pub entity: String,
    pub entity_id: Option<Uuid>,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    #[schema(example = "login_failed")]
    pub event: String,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_LOG_LIMIT: i64 = 100;
pub const MAX_LOG_LIMIT: i64 = 500;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LogQuery {
    pub user_id: Option<Uuid>,
    pub entity: Option<String>,
    pub entity_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    /// `action` para logs de atividade, `event` para logs de segurança
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl LogQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_fills_actor_and_target() {
        let client = ClientInfo { ip_address: Some("10.0.0.1".into()), user_agent: None };
        let user = Uuid::new_v4();
        let cert = Uuid::new_v4();
        let log = NewActivityLog::new(ActivityAction::ViewPassword, AuditEntity::Certificate, &client)
            .by(user, None)
            .on(cert)
            .with_details(json!({ "name": "NFe A1" }));

        assert_eq!(log.user_id, Some(user));
        assert_eq!(log.entity_id, Some(cert));
        assert_eq!(log.action.as_str(), "view_password");
        assert_eq!(log.ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(LogQuery::default().effective_limit(), DEFAULT_LOG_LIMIT);
        let big = LogQuery { limit: Some(10_000), ..Default::default() };
        assert_eq!(big.effective_limit(), MAX_LOG_LIMIT);
        let zero = LogQuery { limit: Some(0), ..Default::default() };
        assert_eq!(zero.effective_limit(), 1);
    }
}
