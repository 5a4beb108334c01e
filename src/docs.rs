// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use crate::handlers;
use crate::middleware::auth::SESSION_COOKIE;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(title = "Gestor de Certificados", description = "API de gestão de certificados digitais A1/A3"),
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::get_me,
        handlers::auth::change_password,

        // --- 2FA ---
        handlers::auth::verify_two_factor,
        handlers::auth::setup_two_factor,
        handlers::auth::enable_two_factor,
        handlers::auth::disable_two_factor,

        // --- Companies ---
        handlers::companies::list_companies,
        handlers::companies::create_company,
        handlers::companies::get_company,
        handlers::companies::update_company,
        handlers::companies::delete_company,

        // --- Certificates ---
        handlers::certificates::list_certificates,
        handlers::certificates::create_certificate,
        handlers::certificates::get_certificate,
        handlers::certificates::update_certificate,
        handlers::certificates::delete_certificate,
        handlers::certificates::reveal_password,

        // --- Users ---
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::delete_user,

        // --- Permissions ---
        handlers::permissions::list_permissions,
        handlers::permissions::set_permission,
        handlers::permissions::revoke_permission,

        // --- Audit ---
        handlers::logs::list_activity_logs,
        handlers::logs::list_security_logs,

        // --- Settings ---
        handlers::settings::get_settings,
        handlers::settings::update_settings,

        // --- Admin ---
        handlers::admin::user_stats,
        handlers::admin::certificate_stats,
        handlers::admin::list_organizations,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::AccountStatus,
            models::auth::User,
            models::auth::RegisterOrganizationPayload,
            models::auth::RegisterPayload,
            models::auth::LoginPayload,
            models::auth::TwoFactorCodePayload,
            models::auth::ChangePasswordPayload,
            models::auth::CreateUserPayload,
            models::auth::UpdateUserPayload,
            models::auth::SessionUserResponse,
            models::auth::TwoFactorSetupResponse,
            models::auth::MessageResponse,

            // --- Companies ---
            models::company::Company,
            models::company::CreateCompanyPayload,
            models::company::UpdateCompanyPayload,

            // --- Certificates ---
            models::certificate::CertificateType,
            models::certificate::CertificateStatus,
            models::certificate::Certificate,
            models::certificate::CertificateSystem,
            models::certificate::CertificateResponse,
            models::certificate::CertificatePasswordResponse,
            models::certificate::CertificateSystemInput,
            models::certificate::CreateCertificatePayload,
            models::certificate::UpdateCertificatePayload,

            // --- Permissions ---
            models::permission::PermissionFlags,
            models::permission::UserPermission,
            models::permission::SetPermissionPayload,

            // --- Audit ---
            models::audit::ActivityLog,
            models::audit::SecurityLog,

            // --- Organization ---
            models::organization::Organization,
            models::organization::OrganizationSummary,
            models::organization::PasswordPolicy,
            models::organization::TwoFactorPolicy,
            models::organization::SessionPolicy,
            models::organization::NotificationPolicy,
            models::organization::OrganizationSettings,
            models::organization::UpdateSettingsPayload,

            // --- Dashboard ---
            models::dashboard::UserStats,
            models::dashboard::CertificateStats,
            models::dashboard::UpcomingExpiration,
        )
    ),
    tags(
        (name = "Auth", description = "Registro, login e sessão"),
        (name = "Two Factor", description = "Autenticação de dois fatores (TOTP)"),
        (name = "Users", description = "Perfil e gestão de usuários"),
        (name = "Companies", description = "Empresas da organização"),
        (name = "Certificates", description = "Certificados digitais A1/A3"),
        (name = "Permissions", description = "Permissões por usuário e empresa"),
        (name = "Audit", description = "Trilhas de atividade e segurança"),
        (name = "Settings", description = "Políticas da organização"),
        (name = "Admin", description = "Indicadores administrativos")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "session_cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/login",
            "/api/verify-2fa",
            "/api/certificates/{id}/password",
            "/api/permissions/{userId}/{companyId}",
            "/api/organization/settings",
            "/api/admin/organizations",
        ] {
            assert!(doc.paths.paths.contains_key(path), "rota ausente: {}", path);
        }
    }

    #[test]
    fn session_cookie_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("session_cookie"));
    }
}
