// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::{clear_session_cookie, session_cookie, AuthenticatedUser, SessionContext},
        extract::ApiJson,
        i18n::Locale,
    },
    models::{
        audit::ClientInfo,
        auth::{
            ChangePasswordPayload, LoginPayload, MessageResponse, RegisterPayload, Session,
            SessionUserResponse, TwoFactorCodePayload, TwoFactorSetupResponse, User,
        },
    },
};

// Usuário + empresas visíveis + estado do 2FA da sessão
async fn session_payload(
    app_state: &AppState,
    user: User,
    session: &Session,
    requires_two_factor: bool,
) -> Result<SessionUserResponse, AppError> {
    let companies = app_state.permission_service.accessible_companies(&user).await?;
    Ok(SessionUserResponse {
        user,
        companies,
        requires_two_factor,
        two_factor_verified: session.two_factor_authenticated,
    })
}

// POST /api/register
#[utoipa::path(
    post,
    path = "/api/register",
    tag = "Auth",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "Conta criada e sessão iniciada", body = SessionUserResponse),
        (status = 400, description = "Dados inválidos ou senha fraca"),
        (status = 409, description = "Usuário ou e-mail já existe"),
        (status = 429, description = "Muitas tentativas")
    )
)]
pub async fn register(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    jar: CookieJar,
    ApiJson(payload): ApiJson<RegisterPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let grant = app_state
        .auth_service
        .register(payload, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let cookie = session_cookie(grant.token, &grant.session, app_state.config.cookie_secure);
    let body = session_payload(&app_state, grant.user, &grant.session, grant.requires_two_factor)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, jar.add(cookie), Json(body)))
}

// POST /api/login
#[utoipa::path(
    post,
    path = "/api/login",
    tag = "Auth",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Sessão iniciada (cookie cm_session)", body = SessionUserResponse),
        (status = 401, description = "Credenciais inválidas"),
        (status = 403, description = "Conta inativa ou bloqueada"),
        (status = 429, description = "Muitas tentativas")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    jar: CookieJar,
    ApiJson(payload): ApiJson<LoginPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let grant = app_state
        .auth_service
        .login(payload, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let cookie = session_cookie(grant.token, &grant.session, app_state.config.cookie_secure);
    let body = session_payload(&app_state, grant.user, &grant.session, grant.requires_two_factor)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, jar.add(cookie), Json(body)))
}

// POST /api/logout
#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Sessão encerrada", body = MessageResponse),
        (status = 401, description = "Não autenticado")
    ),
    security(("session_cookie" = []))
)]
pub async fn logout(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    jar: CookieJar,
    AuthenticatedUser(user): AuthenticatedUser,
    SessionContext(session): SessionContext,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .auth_service
        .logout(&user, &session, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let jar = jar.add(clear_session_cookie(app_state.config.cookie_secure));
    Ok((StatusCode::OK, jar, Json(MessageResponse::new("Sessão encerrada."))))
}

// GET /api/user e GET /api/me
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Users",
    responses(
        (status = 200, description = "Usuário da sessão, empresas visíveis e estado do 2FA", body = SessionUserResponse),
        (status = 401, description = "Não autenticado")
    ),
    security(("session_cookie" = []))
)]
pub async fn get_me(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    SessionContext(session): SessionContext,
) -> Result<impl IntoResponse, ApiError> {
    let requires_two_factor = app_state
        .auth_service
        .requires_two_factor(&user, &session)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let body = session_payload(&app_state, user, &session, requires_two_factor)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(body)))
}

// PATCH /api/user/password
#[utoipa::path(
    patch,
    path = "/api/user/password",
    tag = "Users",
    request_body = ChangePasswordPayload,
    responses(
        (status = 200, description = "Senha alterada", body = MessageResponse),
        (status = 400, description = "Senha fraca"),
        (status = 401, description = "Senha atual incorreta")
    ),
    security(("session_cookie" = []))
)]
pub async fn change_password(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    SessionContext(session): SessionContext,
    ApiJson(payload): ApiJson<ChangePasswordPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .auth_service
        .change_password(&user, &session, payload, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(MessageResponse::new("Senha alterada com sucesso."))))
}

// ---
// Segundo fator
// ---

// POST /api/verify-2fa
#[utoipa::path(
    post,
    path = "/api/verify-2fa",
    tag = "Two Factor",
    request_body = TwoFactorCodePayload,
    responses(
        (status = 200, description = "Sessão verificada", body = MessageResponse),
        (status = 400, description = "2FA não configurado"),
        (status = 401, description = "Código inválido")
    ),
    security(("session_cookie" = []))
)]
pub async fn verify_two_factor(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    SessionContext(session): SessionContext,
    ApiJson(payload): ApiJson<TwoFactorCodePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .auth_service
        .verify_two_factor(&user, &session, &payload.code, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(MessageResponse::new("Verificação concluída."))))
}

// POST /api/2fa/setup
#[utoipa::path(
    post,
    path = "/api/2fa/setup",
    tag = "Two Factor",
    responses(
        (status = 200, description = "Segredo gerado; confirme com /api/2fa/enable", body = TwoFactorSetupResponse),
        (status = 400, description = "2FA já ativo")
    ),
    security(("session_cookie" = []))
)]
pub async fn setup_two_factor(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let setup = app_state
        .auth_service
        .setup_two_factor(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(setup)))
}

// POST /api/2fa/enable
#[utoipa::path(
    post,
    path = "/api/2fa/enable",
    tag = "Two Factor",
    request_body = TwoFactorCodePayload,
    responses(
        (status = 200, description = "2FA ativado", body = MessageResponse),
        (status = 400, description = "Nenhum segredo pendente"),
        (status = 401, description = "Código inválido")
    ),
    security(("session_cookie" = []))
)]
pub async fn enable_two_factor(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    SessionContext(session): SessionContext,
    ApiJson(payload): ApiJson<TwoFactorCodePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .auth_service
        .enable_two_factor(&user, &session, &payload.code, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(MessageResponse::new("Autenticação de dois fatores ativada."))))
}

// POST /api/2fa/disable
#[utoipa::path(
    post,
    path = "/api/2fa/disable",
    tag = "Two Factor",
    request_body = TwoFactorCodePayload,
    responses(
        (status = 200, description = "2FA desativado", body = MessageResponse),
        (status = 401, description = "Código inválido"),
        (status = 403, description = "A política da organização exige 2FA")
    ),
    security(("session_cookie" = []))
)]
pub async fn disable_two_factor(
    State(app_state): State<AppState>,
    locale: Locale,
    client: ClientInfo,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(payload): ApiJson<TwoFactorCodePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .auth_service
        .disable_two_factor(&user, &payload.code, &client)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(MessageResponse::new("Autenticação de dois fatores desativada."))))
}
