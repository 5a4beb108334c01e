//src/main.rs

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod crypto;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::{
    config::{AppConfig, AppState},
    docs::ApiDoc,
    services::auth::AuthService,
    middleware::{
        auth::{admin_guard, session_guard, system_admin_guard},
        client::resolve_client_ip,
        rate_limit::rate_limit_guard,
    },
};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controla o nível; padrão "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let port = config.port;
    if !config.trusted_proxies.is_empty() {
        tracing::info!("🔀 X-Forwarded-For aceito de {} proxy(s) confiável(is)", config.trusted_proxies.len());
    }
    let app_state = AppState::new(config).await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    spawn_session_sweeper(app_state.auth_service.clone());

    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    // ConnectInfo alimenta o rate limit e os logs de auditoria
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_router(app_state: AppState) -> Router {
    // Rotas públicas de entrada (limite mais rígido por IP)
    let login_routes = Router::new()
        .route("/api/register", post(handlers::auth::register))
        .route("/api/login", post(handlers::auth::login))
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.login_limiter.clone(),
            rate_limit_guard,
        ));

    // Qualquer usuário com sessão válida
    let session_routes = Router::new()
        .route("/api/logout", post(handlers::auth::logout))
        .route("/api/user", get(handlers::auth::get_me))
        .route("/api/me", get(handlers::auth::get_me))
        .route("/api/user/password", patch(handlers::auth::change_password))
        .route("/api/verify-2fa", post(handlers::auth::verify_two_factor))
        .route("/api/2fa/setup", post(handlers::auth::setup_two_factor))
        .route("/api/2fa/enable", post(handlers::auth::enable_two_factor))
        .route("/api/2fa/disable", post(handlers::auth::disable_two_factor))
        .route(
            "/api/companies",
            get(handlers::companies::list_companies).post(handlers::companies::create_company),
        )
        .route(
            "/api/companies/{id}",
            get(handlers::companies::get_company)
                .patch(handlers::companies::update_company)
                .delete(handlers::companies::delete_company),
        )
        .route(
            "/api/certificates",
            get(handlers::certificates::list_certificates).post(handlers::certificates::create_certificate),
        )
        .route(
            "/api/certificates/{id}",
            get(handlers::certificates::get_certificate)
                .patch(handlers::certificates::update_certificate)
                .delete(handlers::certificates::delete_certificate),
        )
        .route(
            "/api/certificates/{id}/password",
            get(handlers::certificates::reveal_password).post(handlers::certificates::reveal_password),
        );

    // Administração (org_admin ou system_admin)
    let admin_routes = Router::new()
        .route(
            "/api/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/api/users/{id}",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route(
            "/api/permissions",
            get(handlers::permissions::list_permissions).put(handlers::permissions::set_permission),
        )
        .route(
            "/api/permissions/{user_id}/{company_id}",
            delete(handlers::permissions::revoke_permission),
        )
        .route("/api/logs", get(handlers::logs::list_activity_logs))
        .route("/api/security-logs", get(handlers::logs::list_security_logs))
        .route(
            "/api/organization/settings",
            get(handlers::settings::get_settings).put(handlers::settings::update_settings),
        )
        .route("/api/admin/users/stats", get(handlers::admin::user_stats))
        .route("/api/admin/certificates/stats", get(handlers::admin::certificate_stats))
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), admin_guard));

    let system_admin_routes = Router::new()
        .route("/api/admin/organizations", get(handlers::admin::list_organizations))
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), system_admin_guard));

    // A última camada adicionada roda primeiro: sessão antes dos guardas de papel
    let protected_routes = session_routes
        .merge(admin_routes)
        .merge(system_admin_routes)
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), session_guard));

    let api = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .merge(login_routes)
        .merge(protected_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.general_limiter.clone(),
            rate_limit_guard,
        ));

    let cors = build_cors(app_state.config.cors_origin.as_deref());
    let trusted_proxies = app_state.config.trusted_proxies.clone();

    // O IP do cliente é resolvido antes do rate limit e da auditoria
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api)
        .layer(axum_middleware::from_fn_with_state(trusted_proxies, resolve_client_ip))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

fn spawn_session_sweeper(auth_service: AuthService) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match auth_service.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!("🧹 {} sessões expiradas removidas", removed),
                Err(e) => tracing::error!("Falha ao remover sessões expiradas: {}", e),
            }
        }
    });
}

// Sem origem configurada o navegador fica restrito à mesma origem
fn build_cors(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin.and_then(|o| HeaderValue::from_str(o).ok()) else {
        return CorsLayer::new();
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT_LANGUAGE])
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Falha ao escutar o sinal de desligamento: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Sinal recebido, encerrando o servidor...");
}
