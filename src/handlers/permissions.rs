// src/handlers/permissions.rs

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        extract::{ApiJson, ApiPath, ApiQuery},
        i18n::Locale,
    },
    models::{
        audit::ClientInfo,
        permission::{PermissionQuery, SetPermissionPayload, UserPermission},
    },
};

// GET /api/permissions
#[utoipa::path(
    get,
    path = "/api/permissions",
    tag = "Permissions",
    params(PermissionQuery),
    responses(
        (status = 200, description = "Permissões (usuário, empresa) do escopo", body = Vec<UserPermission>),
        (status = 403, description = "Acesso restrito a administradores")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_permissions(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiQuery(query): ApiQuery<PermissionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let permissions = app_state
        .permission_service
        .list_permissions(&user, query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(permissions)))
}

// PUT /api/permissions (cria ou substitui as flags)
#[utoipa::path(
    put,
    path = "/api/permissions",
    tag = "Permissions",
    request_body = SetPermissionPayload,
    responses(
        (status = 200, description = "Permissão gravada", body = UserPermission),
        (status = 400, description = "Usuário e empresa de organizações diferentes"),
        (status = 404, description = "Usuário ou empresa não encontrados")
    ),
    security(("session_cookie" = []))
)]
pub async fn set_permission(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(payload): ApiJson<SetPermissionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let permission = app_state
        .permission_service
        .set_permission(&user, payload, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(permission)))
}

// DELETE /api/permissions/{userId}/{companyId}
#[utoipa::path(
    delete,
    path = "/api/permissions/{userId}/{companyId}",
    tag = "Permissions",
    params(
        ("userId" = Uuid, Path, description = "ID do usuário"),
        ("companyId" = Uuid, Path, description = "ID da empresa")
    ),
    responses(
        (status = 204, description = "Permissão revogada"),
        (status = 404, description = "Empresa ou permissão não encontrada")
    ),
    security(("session_cookie" = []))
)]
pub async fn revoke_permission(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath((user_id, company_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .permission_service
        .revoke_permission(&user, user_id, company_id, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}
