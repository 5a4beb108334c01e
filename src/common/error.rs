// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::{common::i18n::I18nStore, crypto::cipher::CipherError, middleware::i18n::Locale};

// Erros de domínio. Cada variante vira um status HTTP em `to_api_error`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Dados inválidos: {0}")]
    InvalidInput(String),

    #[error("Senha fraca: {0}")]
    WeakPassword(String),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Nome de usuário já existe")]
    UsernameAlreadyExists,

    #[error("Registro duplicado: {0}")]
    UniqueConstraintViolation(String),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Conta inativa")]
    AccountInactive,

    #[error("Conta bloqueada por excesso de tentativas")]
    AccountLocked { retry_after_secs: i64 },

    #[error("Sessão inválida ou ausente")]
    Unauthenticated,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Acesso restrito a administradores")]
    AdminRequired,

    #[error("Autenticação de dois fatores necessária")]
    TwoFactorRequired,

    #[error("Código de verificação inválido")]
    InvalidTwoFactorCode,

    #[error("Autenticação de dois fatores não configurada")]
    TwoFactorNotConfigured,

    #[error("A política da organização exige autenticação de dois fatores")]
    TwoFactorEnforced,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Empresa não encontrada")]
    CompanyNotFound,

    #[error("Certificado não encontrado")]
    CertificateNotFound,

    #[error("Organização não encontrada")]
    OrganizationNotFound,

    #[error("Permissão não encontrada")]
    PermissionNotFound,

    #[error("Muitas requisições")]
    RateLimited { retry_after_secs: u64 },

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro de cifra: {0}")]
    CipherError(#[from] CipherError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

// O erro que de fato vai para o cliente: sempre um JSON com `message`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Map<String, Value>>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), details: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = self.details.unwrap_or_default();
        body.insert("message".to_string(), Value::String(self.message));
        (self.status, Json(Value::Object(body))).into_response()
    }
}

impl AppError {
    /// Chave do catálogo de mensagens (locales/*.json).
    fn message_key(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_failed",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::WeakPassword(_) => "weak_password",
            AppError::EmailAlreadyExists => "email_already_exists",
            AppError::UsernameAlreadyExists => "username_already_exists",
            AppError::UniqueConstraintViolation(_) => "duplicate_record",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::AccountInactive => "account_inactive",
            AppError::AccountLocked { .. } => "account_locked",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::AdminRequired => "admin_required",
            AppError::TwoFactorRequired => "two_factor_required",
            AppError::InvalidTwoFactorCode => "invalid_two_factor_code",
            AppError::TwoFactorNotConfigured => "two_factor_not_configured",
            AppError::TwoFactorEnforced => "two_factor_enforced",
            AppError::UserNotFound => "user_not_found",
            AppError::CompanyNotFound => "company_not_found",
            AppError::CertificateNotFound => "certificate_not_found",
            AppError::OrganizationNotFound => "organization_not_found",
            AppError::PermissionNotFound => "permission_not_found",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::DatabaseError(_)
            | AppError::CipherError(_)
            | AppError::JwtError(_)
            | AppError::InternalServerError(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidInput(_)
            | AppError::WeakPassword(_)
            | AppError::TwoFactorNotConfigured => StatusCode::BAD_REQUEST,
            AppError::EmailAlreadyExists
            | AppError::UsernameAlreadyExists
            | AppError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials
            | AppError::Unauthenticated
            | AppError::InvalidTwoFactorCode => StatusCode::UNAUTHORIZED,
            AppError::AccountInactive
            | AppError::AccountLocked { .. }
            | AppError::Forbidden
            | AppError::AdminRequired
            | AppError::TwoFactorRequired
            | AppError::TwoFactorEnforced => StatusCode::FORBIDDEN,
            AppError::UserNotFound
            | AppError::CompanyNotFound
            | AppError::CertificateNotFound
            | AppError::OrganizationNotFound
            | AppError::PermissionNotFound => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::DatabaseError(_)
            | AppError::CipherError(_)
            | AppError::JwtError(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte o erro interno na resposta pública, traduzida para o idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Detalhe completo só no log do servidor
            tracing::error!("Erro Interno do Servidor: {}", self);
        }

        let key = self.message_key();
        let mut message = store
            .translate(&locale.0, key)
            .map(str::to_string)
            .unwrap_or_else(|| self.to_string());

        // Mensagens com contexto dinâmico levam o detalhe junto
        if let AppError::InvalidInput(detail) | AppError::WeakPassword(detail) = self {
            message = format!("{}: {}", message, detail);
        }

        let mut details = Map::new();
        match self {
            AppError::ValidationError(errors) => {
                let mut fields = Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            let text = e
                                .message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string());
                            Value::String(text)
                        })
                        .collect();
                    fields.insert(field.to_string(), Value::Array(messages));
                }
                details.insert("errors".into(), Value::Object(fields));
            }
            AppError::TwoFactorRequired => {
                details.insert("requiresTwoFactor".into(), json!(true));
            }
            AppError::AccountLocked { retry_after_secs } => {
                details.insert("retryAfter".into(), json!(retry_after_secs));
            }
            AppError::RateLimited { retry_after_secs } => {
                details.insert("retryAfter".into(), json!(retry_after_secs));
            }
            _ => {}
        }

        ApiError {
            status,
            message,
            details: if details.is_empty() { None } else { Some(details) },
        }
    }
}

// Fallback para os pontos sem acesso ao catálogo (middlewares): mensagem em português.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default(), &I18nStore::empty()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(err: AppError) -> ApiError {
        let store = I18nStore::load().expect("catálogo embutido");
        err.to_api_error(&Locale("pt".into()), &store)
    }

    #[test]
    fn two_factor_required_is_a_distinct_forbidden() {
        let api = render(AppError::TwoFactorRequired);
        assert_eq!(api.status, StatusCode::FORBIDDEN);
        let details = api.details.expect("detalhes");
        assert_eq!(details.get("requiresTwoFactor"), Some(&json!(true)));
    }

    #[test]
    fn plain_forbidden_has_no_two_factor_flag() {
        let api = render(AppError::Forbidden);
        assert_eq!(api.status, StatusCode::FORBIDDEN);
        assert!(api.details.is_none());
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let api = render(AppError::RateLimited { retry_after_secs: 42 });
        assert_eq!(api.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(api.details.unwrap().get("retryAfter"), Some(&json!(42)));
    }

    #[test]
    fn internal_errors_hide_details() {
        let api = render(AppError::InternalServerError(anyhow::anyhow!(
            "connection reset by peer at 10.0.0.3"
        )));
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.message.contains("10.0.0.3"));
    }

    #[test]
    fn not_found_variants_map_to_404() {
        for err in [
            AppError::CertificateNotFound,
            AppError::CompanyNotFound,
            AppError::UserNotFound,
            AppError::OrganizationNotFound,
            AppError::PermissionNotFound,
        ] {
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn validation_errors_list_fields() {
        use validator::Validate;

        #[derive(Validate)]
        struct Payload {
            #[validate(length(min = 1, message = "obrigatório"))]
            name: String,
        }

        let errors = Payload { name: String::new() }.validate().unwrap_err();
        let api = render(AppError::ValidationError(errors));
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        let details = api.details.unwrap();
        assert_eq!(details["errors"]["name"], json!(["obrigatório"]));
    }

    #[test]
    fn english_locale_is_translated() {
        let store = I18nStore::load().unwrap();
        let api = AppError::InvalidCredentials.to_api_error(&Locale("en".into()), &store);
        assert_eq!(api.message, "Invalid username or password.");
    }
}
