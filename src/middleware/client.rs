// src/middleware/client.rs

use std::{
    net::{AddrParseError, IpAddr, SocketAddr},
    str::FromStr,
    sync::Arc,
};

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, Extensions, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::models::audit::ClientInfo;

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Proxies reversos cujo X-Forwarded-For é aceito (TRUSTED_PROXIES).
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(Arc<[IpAddr]>);

impl TrustedProxies {
    pub fn new(proxies: Vec<IpAddr>) -> Self {
        Self(proxies.into())
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.0.contains(ip)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// "10.0.0.1, 10.0.0.2"
impl FromStr for TrustedProxies {
    type Err = AddrParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse::<IpAddr>)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

/// IP do cliente já resolvido por `resolve_client_ip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Resolve o IP de origem a partir do par TCP.
///
/// O X-Forwarded-For só é lido quando o par é um proxy confiável. A lista é
/// percorrida da direita para a esquerda e o primeiro salto fora da lista de
/// confiáveis é o cliente; os saltos à esquerda dele vêm do próprio cliente.
pub fn client_ip(headers: &HeaderMap, peer: IpAddr, trusted: &TrustedProxies) -> IpAddr {
    if !trusted.contains(&peer) {
        return peer;
    }

    let hops: Vec<&str> = headers
        .get_all(FORWARDED_FOR_HEADER)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .collect();

    let mut client = peer;
    for hop in hops.iter().rev() {
        let Ok(ip) = hop.parse::<IpAddr>() else {
            break;
        };
        client = ip;
        if !trusted.contains(&ip) {
            break;
        }
    }
    client
}

/// IP resolvido, ou o par TCP quando o middleware não rodou.
pub fn request_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ClientIp>()
        .map(|ClientIp(ip)| *ip)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

pub async fn resolve_client_ip(
    State(trusted): State<TrustedProxies>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Some(peer) = peer {
        let ip = client_ip(request.headers(), peer, &trusted);
        request.extensions_mut().insert(ClientIp(ip));
    }

    next.run(request).await
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip_address = request_ip(&parts.extensions).map(|ip| ip.to_string());
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(ClientInfo { ip_address, user_agent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn ip(raw: &str) -> IpAddr {
        raw.parse().unwrap()
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn untrusted_peer_header_is_ignored() {
        let headers = forwarded("203.0.113.7");
        let peer = ip("198.51.100.9");

        assert_eq!(client_ip(&headers, peer, &TrustedProxies::default()), peer);
    }

    #[test]
    fn trusted_proxy_yields_rightmost_untrusted_hop() {
        let trusted: TrustedProxies = "10.0.0.1, 10.0.0.2".parse().unwrap();
        // O cliente forjou 1.2.3.4; o proxy acrescentou o endereço real
        let headers = forwarded("1.2.3.4, 203.0.113.7, 10.0.0.2");

        assert_eq!(client_ip(&headers, ip("10.0.0.1"), &trusted), ip("203.0.113.7"));
    }

    #[test]
    fn garbage_hop_stops_the_walk() {
        let trusted: TrustedProxies = "10.0.0.1".parse().unwrap();
        let headers = forwarded("203.0.113.7, desconhecido");

        assert_eq!(client_ip(&headers, ip("10.0.0.1"), &trusted), ip("10.0.0.1"));
        assert_eq!(client_ip(&HeaderMap::new(), ip("10.0.0.1"), &trusted), ip("10.0.0.1"));
    }

    #[test]
    fn trusted_proxies_parse_from_config_list() {
        let trusted: TrustedProxies = " 10.0.0.1 ,::1,".parse().unwrap();
        assert_eq!(trusted.len(), 2);
        assert!(trusted.contains(&ip("::1")));
        assert!("10.0.0.1, proxy".parse::<TrustedProxies>().is_err());
    }

    #[test]
    fn resolved_ip_wins_over_peer() {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo("10.0.0.1:4000".parse::<SocketAddr>().unwrap()));
        assert_eq!(request_ip(&extensions), Some(ip("10.0.0.1")));

        extensions.insert(ClientIp(ip("203.0.113.7")));
        assert_eq!(request_ip(&extensions), Some(ip("203.0.113.7")));
        assert_eq!(request_ip(&Extensions::new()), None);
    }
}
