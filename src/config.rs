// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    crypto::SecretCipher,
    db::{
        AuditRepository, CertificateRepository, CompanyRepository, DashboardRepository, OrganizationRepository,
        PermissionRepository, SessionRepository, UserRepository,
    },
    middleware::{
        client::TrustedProxies,
        rate_limit::{RateLimitConfig, RateLimiter},
    },
    services::{
        audit_service::{AuditService, AuditTrail},
        auth::AuthService,
        certificate_service::CertificateService,
        company_service::CompanyService,
        dashboard_service::DashboardService,
        organization_service::OrganizationService,
        permission_service::PermissionService,
        user_service::UserService,
    },
};

// Só para desenvolvimento local; em produção as variáveis são obrigatórias
const DEV_SESSION_SECRET: &str = "segredo-de-sessao-apenas-para-desenvolvimento";
const DEV_ENCRYPTION_KEY: &str = "chave-de-desenvolvimento-32bytes";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_secret: String,
    pub encryption_key: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub login_rate_limit: RateLimitConfig,
    pub cookie_secure: bool,
    /// Origem do front-end autorizada a enviar o cookie (CORS com credenciais)
    pub cors_origin: Option<String>,
    /// Proxies reversos cujo X-Forwarded-For é aceito; vazio usa só o par TCP
    pub trusted_proxies: TrustedProxies,
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Valor inválido para {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let Some(database_url) = lookup("DATABASE_URL") else {
            bail!("DATABASE_URL deve ser definida");
        };

        let session_secret = lookup("SESSION_SECRET").unwrap_or_else(|| {
            tracing::warn!("⚠️ SESSION_SECRET não definido; usando segredo de desenvolvimento.");
            DEV_SESSION_SECRET.to_string()
        });

        let encryption_key = lookup("ENCRYPTION_KEY").unwrap_or_else(|| {
            tracing::warn!("⚠️ ENCRYPTION_KEY não definida; senhas de certificados usarão a chave de desenvolvimento!");
            DEV_ENCRYPTION_KEY.to_string()
        });
        // Falha cedo: chave com tamanho errado não deve subir o servidor
        SecretCipher::from_key_material(&encryption_key).context("ENCRYPTION_KEY inválida")?;

        let window_secs: u64 = parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", 900)?;
        let window = Duration::from_secs(window_secs.max(1));

        Ok(Self {
            database_url,
            session_secret,
            encryption_key,
            port: parse_or(&lookup, "PORT", 3000)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            db_acquire_timeout: Duration::from_secs(parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 5)?),
            rate_limit: RateLimitConfig {
                max_requests: parse_or(&lookup, "RATE_LIMIT_MAX_REQUESTS", 300)?,
                window,
            },
            login_rate_limit: RateLimitConfig {
                max_requests: parse_or(&lookup, "LOGIN_RATE_LIMIT_MAX_REQUESTS", 20)?,
                window,
            },
            cookie_secure: parse_or(&lookup, "COOKIE_SECURE", false)?,
            cors_origin: lookup("CORS_ORIGIN").filter(|o| !o.trim().is_empty()),
            trusted_proxies: parse_or(&lookup, "TRUSTED_PROXIES", TrustedProxies::default())?,
        })
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<AppConfig>,
    pub i18n_store: I18nStore,
    pub general_limiter: RateLimiter,
    pub login_limiter: RateLimiter,

    pub auth_service: AuthService,
    pub permission_service: PermissionService,
    pub company_service: CompanyService,
    pub certificate_service: CertificateService,
    pub user_service: UserService,
    pub organization_service: OrganizationService,
    pub dashboard_service: DashboardService,
    pub audit_service: AuditService,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Self::assemble(db_pool, config)
    }

    // --- Monta o gráfico de dependências ---
    fn assemble(db_pool: PgPool, config: AppConfig) -> anyhow::Result<Self> {
        let i18n_store = I18nStore::load()?;
        let cipher = SecretCipher::from_key_material(&config.encryption_key)?;

        let user_repo = UserRepository::new(db_pool.clone());
        let org_repo = OrganizationRepository::new(db_pool.clone());
        let company_repo = CompanyRepository::new(db_pool.clone());
        let certificate_repo = CertificateRepository::new(db_pool.clone());
        let permission_repo = PermissionRepository::new(db_pool.clone());
        let session_repo = SessionRepository::new(db_pool.clone());
        let audit_repo = AuditRepository::new(db_pool.clone());
        let dashboard_repo = DashboardRepository::new(db_pool.clone());

        // Worker destacado: vive enquanto houver um AuditTrail clonado no estado
        let (audit, _worker) = AuditTrail::spawn(Arc::new(audit_repo.clone()));

        let auth_service = AuthService::new(
            user_repo.clone(),
            org_repo.clone(),
            session_repo.clone(),
            cipher.clone(),
            audit.clone(),
            config.session_secret.clone(),
            db_pool.clone(),
        );
        let permission_service = PermissionService::new(
            permission_repo.clone(),
            company_repo.clone(),
            user_repo.clone(),
            audit.clone(),
            db_pool.clone(),
        );
        let company_service = CompanyService::new(
            company_repo,
            org_repo.clone(),
            permission_repo,
            permission_service.clone(),
            audit.clone(),
            db_pool.clone(),
        );
        let certificate_service = CertificateService::new(
            certificate_repo,
            permission_service.clone(),
            auth_service.clone(),
            cipher,
            audit.clone(),
            db_pool.clone(),
        );
        let user_service = UserService::new(
            user_repo,
            org_repo.clone(),
            session_repo,
            auth_service.clone(),
            audit.clone(),
            db_pool.clone(),
        );
        let organization_service = OrganizationService::new(org_repo.clone(), audit.clone());
        let dashboard_service = DashboardService::new(dashboard_repo, org_repo);
        let audit_service = AuditService::new(audit_repo);

        let general_limiter = RateLimiter::new("geral", config.rate_limit, i18n_store.clone());
        let login_limiter = RateLimiter::new("login", config.login_rate_limit, i18n_store.clone());

        Ok(Self {
            db_pool,
            config: Arc::new(config),
            i18n_store,
            general_limiter,
            login_limiter,
            auth_service,
            permission_service,
            company_service,
            certificate_service,
            user_service,
            organization_service,
            dashboard_service,
            audit_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn database_url_is_required() {
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_missing() {
        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/certs")])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.rate_limit.max_requests, 300);
        assert_eq!(config.login_rate_limit.max_requests, 20);
        assert_eq!(config.rate_limit.window, Duration::from_secs(900));
        assert!(!config.cookie_secure);
        assert!(config.cors_origin.is_none());
        assert!(config.trusted_proxies.is_empty());
        assert_eq!(config.encryption_key, DEV_ENCRYPTION_KEY);
    }

    #[test]
    fn hex_encryption_key_is_accepted() {
        let key = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/certs"),
            ("ENCRYPTION_KEY", key),
            ("PORT", "8080"),
            ("COOKIE_SECURE", "true"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.cookie_secure);
    }

    #[test]
    fn short_encryption_key_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/certs"),
            ("ENCRYPTION_KEY", "curta"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn trusted_proxies_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/certs"),
            ("TRUSTED_PROXIES", "10.0.0.1,10.0.0.2"),
        ]))
        .unwrap();
        assert!(config.trusted_proxies.contains(&"10.0.0.2".parse().unwrap()));

        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/certs"),
            ("TRUSTED_PROXIES", "balanceador"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_number_is_an_error() {
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/certs"),
            ("PORT", "porta"),
        ]));
        assert!(result.is_err());
    }
}
