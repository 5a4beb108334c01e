// src/handlers/certificates.rs

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
        auth::{AuthenticatedUser, SessionContext},
        extract::{ApiJson, ApiPath, ApiQuery},
        i18n::Locale,
    },
    models::{
        audit::ClientInfo,
        certificate::{
            CertificateListQuery, CertificatePasswordResponse, CertificateResponse, CreateCertificatePayload,
            UpdateCertificatePayload,
        },
    },
};

// GET /api/certificates
#[utoipa::path(
    get,
    path = "/api/certificates",
    tag = "Certificates",
    params(CertificateListQuery),
    responses(
        (status = 200, description = "Certificados com situação calculada na leitura", body = Vec<CertificateResponse>),
        (status = 403, description = "Sem permissão na empresa informada")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_certificates(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiQuery(query): ApiQuery<CertificateListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let certificates = app_state
        .certificate_service
        .list_certificates(&user, query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(certificates)))
}

// POST /api/certificates
#[utoipa::path(
    post,
    path = "/api/certificates",
    tag = "Certificates",
    request_body = CreateCertificatePayload,
    responses(
        (status = 201, description = "Certificado cadastrado (senha cifrada)", body = CertificateResponse),
        (status = 400, description = "Dados inválidos"),
        (status = 403, description = "Sem permissão de edição na empresa")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_certificate(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(payload): ApiJson<CreateCertificatePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let certificate = app_state
        .certificate_service
        .create_certificate(&user, payload, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(certificate)))
}

// GET /api/certificates/{id}
#[utoipa::path(
    get,
    path = "/api/certificates/{id}",
    tag = "Certificates",
    params(("id" = Uuid, Path, description = "ID do certificado")),
    responses(
        (status = 200, description = "Certificado com sistemas vinculados", body = CertificateResponse),
        (status = 403, description = "Sem permissão de visualização"),
        (status = 404, description = "Certificado não encontrado")
    ),
    security(("session_cookie" = []))
)]
pub async fn get_certificate(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let certificate = app_state
        .certificate_service
        .get_certificate(&user, id, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(certificate)))
}

// PATCH /api/certificates/{id}
#[utoipa::path(
    patch,
    path = "/api/certificates/{id}",
    tag = "Certificates",
    params(("id" = Uuid, Path, description = "ID do certificado")),
    request_body = UpdateCertificatePayload,
    responses(
        (status = 200, description = "Certificado atualizado", body = CertificateResponse),
        (status = 403, description = "Sem permissão de edição"),
        (status = 404, description = "Certificado não encontrado")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_certificate(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateCertificatePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let certificate = app_state
        .certificate_service
        .update_certificate(&user, id, payload, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(certificate)))
}

// DELETE /api/certificates/{id}
#[utoipa::path(
    delete,
    path = "/api/certificates/{id}",
    tag = "Certificates",
    params(("id" = Uuid, Path, description = "ID do certificado")),
    responses(
        (status = 204, description = "Certificado removido"),
        (status = 403, description = "Sem permissão de exclusão"),
        (status = 404, description = "Certificado não encontrado")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_certificate(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .certificate_service
        .delete_certificate(&user, id, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// GET e POST /api/certificates/{id}/password
#[utoipa::path(
    get,
    path = "/api/certificates/{id}/password",
    tag = "Certificates",
    params(("id" = Uuid, Path, description = "ID do certificado")),
    responses(
        (status = 200, description = "Senha decifrada", body = CertificatePasswordResponse),
        (status = 403, description = "Sem permissão ou sessão sem 2FA (requiresTwoFactor)"),
        (status = 404, description = "Certificado não encontrado")
    ),
    security(("session_cookie" = []))
)]
pub async fn reveal_password(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    SessionContext(session): SessionContext,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let revealed = app_state
        .certificate_service
        .reveal_password(&user, &session, id, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(revealed)))
}
