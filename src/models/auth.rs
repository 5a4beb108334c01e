// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{company::Company, UnknownVariant};

// ---
// Papéis e status
// ---

/// Papel do usuário. `system_admin` enxerga todas as organizações;
/// `org_admin` administra apenas a própria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SystemAdmin,
    OrgAdmin,
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SystemAdmin => "system_admin",
            UserRole::OrgAdmin => "org_admin",
            UserRole::User => "user",
        }
    }

    /// Papéis administrativos ignoram as permissões por empresa.
    pub fn has_admin_privileges(&self) -> bool {
        matches!(self, UserRole::SystemAdmin | UserRole::OrgAdmin)
    }

    pub fn is_system_admin(&self) -> bool {
        matches!(self, UserRole::SystemAdmin)
    }
}

impl TryFrom<String> for UserRole {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "system_admin" => Ok(UserRole::SystemAdmin),
            "org_admin" => Ok(UserRole::OrgAdmin),
            "user" => Ok(UserRole::User),
            _ => Err(UnknownVariant(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl TryFrom<String> for AccountStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            _ => Err(UnknownVariant(value)),
        }
    }
}

// ---
// Usuário (tabela users)
// ---
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,

    #[schema(example = "ana.souza")]
    pub username: String,

    #[schema(example = "ana@acme.com.br")]
    pub email: String,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    pub password_hash: String,

    #[schema(example = "Ana Souza")]
    pub name: String,

    #[sqlx(try_from = "String")]
    pub role: UserRole,

    #[sqlx(try_from = "String")]
    pub status: AccountStatus,

    pub two_factor_enabled: bool,

    #[serde(skip_serializing)]
    pub two_factor_secret: Option<String>,

    #[serde(skip_serializing)]
    pub failed_login_attempts: i32,

    #[serde(skip_serializing)]
    pub last_failed_login_at: Option<DateTime<Utc>>,

    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

// ---
// Sessão do servidor (tabela sessions)
// ---
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub two_factor_authenticated: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// Conteúdo assinado do cookie de sessão
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // ID do usuário
    pub sid: Uuid,  // ID da sessão no banco
    pub exp: usize,
    pub iat: usize,
}

// ---
// Payloads
// ---

// O login aceita usuário ou e-mail; um usuário com '@' poderia se passar pelo e-mail de outra conta
fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.contains('@') || username.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("username");
        err.message = Some("O usuário não pode conter '@' nem espaços.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOrganizationPayload {
    #[validate(length(min = 2, message = "O nome da organização é obrigatório."))]
    #[schema(example = "Contabilidade Acme")]
    pub name: String,

    #[validate(length(min = 11, max = 18, message = "CNPJ/CPF inválido."))]
    #[schema(example = "12.345.678/0001-99")]
    pub identifier: String,

    #[schema(example = "acme.com.br")]
    pub domain: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    #[validate(
        length(min = 3, max = 50, message = "O usuário deve ter entre 3 e 50 caracteres."),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: String,

    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub password: String,

    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,

    #[validate(nested)]
    pub organization: Option<RegisterOrganizationPayload>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    /// Nome de usuário ou e-mail
    #[validate(length(min = 1, message = "Informe o usuário."))]
    pub username: String,

    #[validate(length(min = 1, message = "Informe a senha."))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorCodePayload {
    #[validate(length(equal = 6, message = "O código deve ter 6 dígitos."))]
    #[schema(example = "492039")]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
    #[validate(length(min = 1, message = "Informe a senha atual."))]
    pub current_password: String,

    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[validate(
        length(min = 3, max = 50, message = "O usuário deve ter entre 3 e 50 caracteres."),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: String,

    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub password: String,

    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,

    pub role: Option<UserRole>,

    /// Obrigatório apenas para `system_admin`; os demais usam a própria organização.
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: Option<String>,

    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: Option<String>,

    pub role: Option<UserRole>,
    pub status: Option<AccountStatus>,

    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub password: Option<String>,
}

// ---
// Respostas
// ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionUserResponse {
    pub user: User,
    pub companies: Vec<Company>,
    /// A sessão ainda precisa passar pelo /api/verify-2fa
    pub requires_two_factor: bool,
    pub two_factor_verified: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorSetupResponse {
    pub secret: String,
    pub otpauth_url: String,
    /// QR Code em SVG para apps autenticadores
    pub qr_code_svg: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_roles_have_admin_privileges() {
        assert!(UserRole::SystemAdmin.has_admin_privileges());
        assert!(UserRole::OrgAdmin.has_admin_privileges());
        assert!(!UserRole::User.has_admin_privileges());
        assert!(!UserRole::OrgAdmin.is_system_admin());
    }

    #[test]
    fn roles_round_trip_through_database_text() {
        for role in [UserRole::SystemAdmin, UserRole::OrgAdmin, UserRole::User] {
            assert_eq!(UserRole::try_from(role.as_str().to_string()).unwrap(), role);
        }
        assert!(UserRole::try_from("admin".to_string()).is_err());
    }

    #[test]
    fn usernames_cannot_look_like_emails() {
        let payload = |username: &str| CreateUserPayload {
            username: username.to_string(),
            email: "ana@acme.com.br".to_string(),
            password: "Senha-Forte-123".to_string(),
            name: "Ana Souza".to_string(),
            role: None,
            organization_id: None,
        };

        assert!(payload("ana.souza").validate().is_ok());
        let errors = payload("v@acme.com").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
        assert!(payload("ana souza").validate().is_err());
    }

    #[test]
    fn role_serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&UserRole::OrgAdmin).unwrap(), "\"org_admin\"");
    }
}
