// src/middleware/rate_limit.rs

use std::{
    collections::{HashMap, VecDeque},
    net::IpAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    common::{error::AppError, i18n::I18nStore},
    middleware::{client::request_ip, i18n::Locale},
};

// A cada N requisições, remove IPs sem atividade na janela
const CLEANUP_INTERVAL: u64 = 256;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

/// Janela deslizante por IP, em memória. Clonar compartilha o mesmo estado.
#[derive(Clone)]
pub struct RateLimiter {
    name: &'static str,
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<IpAddr, VecDeque<Instant>>>>,
    request_count: Arc<AtomicU64>,
    i18n_store: I18nStore,
}

impl RateLimiter {
    pub fn new(name: &'static str, config: RateLimitConfig, i18n_store: I18nStore) -> Self {
        Self {
            name,
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
            request_count: Arc::new(AtomicU64::new(0)),
            i18n_store,
        }
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.check_at(ip, Instant::now())
    }

    /// `Err(retry_after)` quando o IP já esgotou a janela.
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count > 0 && count % CLEANUP_INTERVAL == 0 {
            self.cleanup_at(now);
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let hits = state.entry(ip).or_default();

        while hits.front().is_some_and(|&t| now.duration_since(t) >= self.config.window) {
            hits.pop_front();
        }

        if hits.len() >= self.config.max_requests as usize {
            let oldest = hits.front().copied().unwrap_or(now);
            let retry_after = self.config.window.saturating_sub(now.duration_since(oldest));
            return Err(retry_after.max(Duration::from_secs(1)));
        }

        hits.push_back(now);
        Ok(())
    }

    fn cleanup_at(&self, now: Instant) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let window = self.config.window;
        state.retain(|_, hits| hits.back().is_some_and(|&t| now.duration_since(t) < window));
    }

    pub fn tracked_ips(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

pub async fn rate_limit_guard(State(limiter): State<RateLimiter>, request: Request, next: Next) -> Response {
    // Sem IP identificável não há chave para limitar
    let Some(ip) = request_ip(request.extensions()) else {
        return next.run(request).await;
    };

    match limiter.check(ip) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let retry_after_secs = retry_after.as_secs().max(1);
            tracing::warn!("🚦 Limite '{}' excedido por {} (tente em {}s)", limiter.name, ip, retry_after_secs);

            let locale = Locale::from_header(
                request
                    .headers()
                    .get(header::ACCEPT_LANGUAGE)
                    .and_then(|v| v.to_str().ok()),
            );
            let mut response = AppError::RateLimited { retry_after_secs }
                .to_api_error(&locale, &limiter.i18n_store)
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(
            "teste",
            RateLimitConfig { max_requests, window: Duration::from_secs(window_secs) },
            I18nStore::empty(),
        )
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[test]
    fn blocks_after_max_requests_in_window() {
        let limiter = limiter(3, 60);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check_at(ip(1), now).is_ok());
        }
        let retry = limiter.check_at(ip(1), now).unwrap_err();
        assert_eq!(retry, Duration::from_secs(60));
    }

    #[test]
    fn ips_are_counted_separately() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(limiter.check_at(ip(1), now).is_ok());
        assert!(limiter.check_at(ip(2), now).is_ok());
        assert!(limiter.check_at(ip(1), now).is_err());
    }

    #[test]
    fn window_slides() {
        let limiter = limiter(2, 60);
        let start = Instant::now();
        assert!(limiter.check_at(ip(1), start).is_ok());
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(30)).is_ok());
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(59)).is_err());

        // A primeira requisição saiu da janela
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn rejected_requests_do_not_extend_the_block() {
        let limiter = limiter(1, 10);
        let start = Instant::now();
        assert!(limiter.check_at(ip(1), start).is_ok());
        for s in 1..10 {
            assert!(limiter.check_at(ip(1), start + Duration::from_secs(s)).is_err());
        }
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn cleanup_drops_idle_ips() {
        let limiter = limiter(5, 10);
        let start = Instant::now();
        limiter.check_at(ip(1), start).unwrap();
        limiter.check_at(ip(2), start + Duration::from_secs(8)).unwrap();

        limiter.cleanup_at(start + Duration::from_secs(12));
        assert_eq!(limiter.tracked_ips(), 1);
    }

    #[tokio::test]
    async fn forged_forwarded_for_does_not_reset_the_window() {
        use axum::{
            body::Body,
            extract::ConnectInfo,
            Extension,
            http::{Request as HttpRequest, StatusCode},
            middleware::from_fn_with_state,
            routing::post,
            Router,
        };
        use std::net::SocketAddr;
        use tower::ServiceExt;

        use crate::middleware::client::{resolve_client_ip, TrustedProxies};

        let limiter = limiter(2, 900);
        let peer: SocketAddr = "198.51.100.9:40000".parse().unwrap();
        let app = Router::new()
            .route("/api/login", post(|| async { "ok" }))
            .route_layer(from_fn_with_state(limiter.clone(), rate_limit_guard))
            .layer(from_fn_with_state(TrustedProxies::default(), resolve_client_ip))
            .layer(Extension(ConnectInfo(peer)));

        let mut rejected = 0;
        for i in 0..50u8 {
            let request = HttpRequest::post("/api/login")
                .header("x-forwarded-for", format!("203.0.113.{}", i))
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                assert!(response.headers().contains_key(header::RETRY_AFTER));
                rejected += 1;
            }
        }

        assert_eq!(rejected, 48);
        assert_eq!(limiter.tracked_ips(), 1);
    }

    #[test]
    fn clones_share_state() {
        let a = limiter(1, 60);
        let b = a.clone();
        let now = Instant::now();
        assert!(a.check_at(ip(9), now).is_ok());
        assert!(b.check_at(ip(9), now).is_err());
    }
}
