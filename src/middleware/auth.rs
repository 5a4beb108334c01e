// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::auth::{Session, User},
    services::permission_service::ensure_admin,
};

pub const SESSION_COOKIE: &str = "cm_session";

// O middleware de sessão: cookie -> JWT -> sessão no banco -> usuário ativo
pub async fn session_guard(
    State(app_state): State<AppState>,
    jar: CookieJar,
    locale: Locale,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
        return Err(AppError::Unauthenticated.to_api_error(&locale, &app_state.i18n_store));
    };

    let (user, session) = app_state
        .auth_service
        .authenticate(&token)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // Insere usuário e sessão nos "extensions" da requisição
    request.extensions_mut().insert(AuthenticatedUser(user));
    request.extensions_mut().insert(SessionContext(session));

    Ok(next.run(request).await)
}

// Deve vir depois do session_guard
pub async fn admin_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    ensure_admin(&user).map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(next.run(request).await)
}

pub async fn system_admin_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.role.is_system_admin() {
        return Err(AppError::Forbidden.to_api_error(&locale, &app_state.i18n_store));
    }
    Ok(next.run(request).await)
}

// Extrator para obter o usuário autenticado diretamente nos handlers
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

// A sessão do servidor correspondente ao cookie
#[derive(Debug, Clone)]
pub struct SessionContext(pub Session);

impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

/// Cookie da sessão; o Max-Age acompanha a expiração da linha no banco.
pub fn session_cookie(token: String, session: &Session, secure: bool) -> Cookie<'static> {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn session(hours: i64) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            two_factor_authenticated: true,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(hours),
        }
    }

    #[test]
    fn session_cookie_is_http_only_and_lax() {
        let cookie = session_cookie("jwt".into(), &session(24), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(true));

        let max_age = cookie.max_age().unwrap().whole_seconds();
        assert!(max_age > 23 * 3600 && max_age <= 24 * 3600);
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let cookie = clear_session_cookie(false);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }

    #[test]
    fn expired_session_yields_zero_max_age() {
        let cookie = session_cookie("jwt".into(), &session(-1), false);
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}
