// src/handlers/admin.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::{
        dashboard::{CertificateStats, UserStats},
        organization::OrganizationSummary,
    },
};

// GET /api/admin/users/stats
#[utoipa::path(
    get,
    path = "/api/admin/users/stats",
    tag = "Admin",
    responses(
        (status = 200, description = "Usuários por papel e situação", body = UserStats),
        (status = 403, description = "Acesso restrito a administradores")
    ),
    security(("session_cookie" = []))
)]
pub async fn user_stats(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let stats = app_state
        .dashboard_service
        .user_stats(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(stats)))
}

// GET /api/admin/certificates/stats
#[utoipa::path(
    get,
    path = "/api/admin/certificates/stats",
    tag = "Admin",
    responses(
        (status = 200, description = "Certificados por situação e tipo, com os próximos vencimentos", body = CertificateStats),
        (status = 403, description = "Acesso restrito a administradores")
    ),
    security(("session_cookie" = []))
)]
pub async fn certificate_stats(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let stats = app_state
        .dashboard_service
        .certificate_stats(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(stats)))
}

// GET /api/admin/organizations
#[utoipa::path(
    get,
    path = "/api/admin/organizations",
    tag = "Admin",
    responses(
        (status = 200, description = "Organizações com contagem de usuários, empresas e certificados", body = Vec<OrganizationSummary>),
        (status = 403, description = "Apenas system_admin")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_organizations(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let organizations = app_state
        .dashboard_service
        .organizations(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(organizations)))
}
