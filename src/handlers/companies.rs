// src/handlers/companies.rs

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        extract::{ApiJson, ApiPath},
        i18n::Locale,
    },
    models::{
        audit::ClientInfo,
        company::{Company, CreateCompanyPayload, UpdateCompanyPayload},
    },
};

// GET /api/companies
#[utoipa::path(
    get,
    path = "/api/companies",
    tag = "Companies",
    responses(
        (status = 200, description = "Empresas que o usuário pode visualizar", body = Vec<Company>),
        (status = 401, description = "Não autenticado")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_companies(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let companies = app_state
        .company_service
        .list_companies(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(companies)))
}

// POST /api/companies
#[utoipa::path(
    post,
    path = "/api/companies",
    tag = "Companies",
    request_body = CreateCompanyPayload,
    responses(
        (status = 201, description = "Empresa criada; o criador recebe todas as permissões", body = Company),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Identificador já cadastrado na organização")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_company(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(payload): ApiJson<CreateCompanyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let company = app_state
        .company_service
        .create_company(&user, payload, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(company)))
}

// GET /api/companies/{id}
#[utoipa::path(
    get,
    path = "/api/companies/{id}",
    tag = "Companies",
    params(("id" = Uuid, Path, description = "ID da empresa")),
    responses(
        (status = 200, description = "Empresa", body = Company),
        (status = 403, description = "Sem permissão de visualização"),
        (status = 404, description = "Empresa não encontrada")
    ),
    security(("session_cookie" = []))
)]
pub async fn get_company(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let company = app_state
        .company_service
        .get_company(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(company)))
}

// PATCH /api/companies/{id}
#[utoipa::path(
    patch,
    path = "/api/companies/{id}",
    tag = "Companies",
    params(("id" = Uuid, Path, description = "ID da empresa")),
    request_body = UpdateCompanyPayload,
    responses(
        (status = 200, description = "Empresa atualizada", body = Company),
        (status = 403, description = "Sem permissão de edição"),
        (status = 404, description = "Empresa não encontrada")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_company(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateCompanyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let company = app_state
        .company_service
        .update_company(&user, id, payload, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(company)))
}

// DELETE /api/companies/{id}
#[utoipa::path(
    delete,
    path = "/api/companies/{id}",
    tag = "Companies",
    params(("id" = Uuid, Path, description = "ID da empresa")),
    responses(
        (status = 204, description = "Empresa removida junto com certificados e permissões"),
        (status = 403, description = "Sem permissão de exclusão"),
        (status = 404, description = "Empresa não encontrada")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_company(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .company_service
        .delete_company(&user, id, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}
