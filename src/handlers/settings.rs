// src/handlers/settings.rs

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        extract::{ApiJson, ApiQuery},
        i18n::Locale,
    },
    models::{
        audit::ClientInfo,
        organization::{OrganizationSettings, UpdateSettingsPayload},
    },
};

// system_admin indica a organização; org_admin usa sempre a própria
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OrganizationQuery {
    pub organization_id: Option<Uuid>,
}

// GET /api/organization/settings
#[utoipa::path(
    get,
    path = "/api/organization/settings",
    tag = "Settings",
    params(OrganizationQuery),
    responses(
        (status = 200, description = "Políticas da organização", body = OrganizationSettings),
        (status = 403, description = "Acesso restrito a administradores"),
        (status = 404, description = "Organização não encontrada")
    ),
    security(("session_cookie" = []))
)]
pub async fn get_settings(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiQuery(query): ApiQuery<OrganizationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = app_state
        .organization_service
        .get_settings(&user, query.organization_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(settings)))
}

// PUT /api/organization/settings
#[utoipa::path(
    put,
    path = "/api/organization/settings",
    tag = "Settings",
    params(OrganizationQuery),
    request_body = UpdateSettingsPayload,
    responses(
        (status = 200, description = "Políticas atualizadas", body = OrganizationSettings),
        (status = 400, description = "Valor fora do intervalo permitido"),
        (status = 403, description = "Acesso restrito a administradores")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_settings(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiQuery(query): ApiQuery<OrganizationQuery>,
    ApiJson(payload): ApiJson<UpdateSettingsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = app_state
        .organization_service
        .update_settings(&user, query.organization_id, payload, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(settings)))
}
