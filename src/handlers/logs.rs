// src/handlers/logs.rs

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        extract::ApiQuery,
        i18n::Locale,
    },
    models::audit::{ActivityLog, LogQuery, SecurityLog},
};

// GET /api/logs
#[utoipa::path(
    get,
    path = "/api/logs",
    tag = "Audit",
    params(LogQuery),
    responses(
        (status = 200, description = "Atividades, mais recentes primeiro", body = Vec<ActivityLog>),
        (status = 403, description = "Acesso restrito a administradores")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_activity_logs(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiQuery(query): ApiQuery<LogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let logs = app_state
        .audit_service
        .query_activity(&user, query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(logs)))
}

// GET /api/security-logs
#[utoipa::path(
    get,
    path = "/api/security-logs",
    tag = "Audit",
    params(LogQuery),
    responses(
        (status = 200, description = "Eventos de segurança, mais recentes primeiro", body = Vec<SecurityLog>),
        (status = 403, description = "Acesso restrito a administradores")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_security_logs(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiQuery(query): ApiQuery<LogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let logs = app_state
        .audit_service
        .query_security(&user, query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(logs)))
}
