//! HTTP API layer: request handlers plus the client-metadata extractor.

pub mod handlers;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::SocketAddr;

/// Request metadata recorded with the submission and shown in the operations
/// email: the caller's IP and user agent.
///
/// The IP prefers `x-forwarded-for` (set by the reverse proxy in production),
/// falling back to the socket peer address when the server was started with
/// connect info. Both fields degrade to empty strings rather than rejecting
/// the request.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: String,
    pub user_agent: String,
}

impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string());

        let ip = match forwarded {
            Some(ip) if !ip.is_empty() => ip,
            _ => parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
                .unwrap_or_default(),
        };

        let user_agent = parts
            .headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(Self { ip, user_agent })
    }
}
