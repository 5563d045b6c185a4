//! Route handlers
//!
//! Only `/chat` can fail; the source routes always answer, degrading to the
//! fallback document.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use tracing::Instrument;
use uuid::Uuid;

use crate::chat::ChatQuery;
use crate::error::DocentError;
use crate::server::AppState;
use crate::source::{SourceDocument, SourceStats};

/// Chat bodies are a single short question; anything larger is rejected
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Health check endpoint - returns JSON status
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// `POST /chat`
pub async fn chat_handler(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_id = client_id(request.headers(), peer, &state.trusted_proxies);
    let span = tracing::info_span!("chat", request_id = %Uuid::new_v4(), client = %client_id);

    async move {
        let query = match read_query(request.into_body()).await {
            Ok(query) => query,
            Err(e) => return e.into_response(),
        };

        match state.chat.answer(&client_id, &query).await {
            Ok(answer) => Json(answer).into_response(),
            Err(e) => e.into_response(),
        }
    }
    .instrument(span)
    .await
}

async fn read_query(body: Body) -> Result<ChatQuery, DocentError> {
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| DocentError::Validation("Request body too large".to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| DocentError::Validation(format!("Invalid request body: {e}")))
}

/// `GET /source`: always 200, degrading to the fallback text
pub async fn source_handler(State(state): State<Arc<AppState>>) -> Json<SourceDocument> {
    let document = state.chat.fetcher().get().await;
    Json(SourceDocument::clone(&document))
}

/// `GET /source/stats`: counts without the content body
pub async fn source_stats_handler(State(state): State<Arc<AppState>>) -> Json<SourceStats> {
    Json(state.chat.fetcher().get().await.stats())
}

/// Identify the caller for rate limiting.
///
/// Forwarding headers are only believed when the socket peer is a trusted
/// proxy. Then the nearest `X-Forwarded-For` hop that is not itself a
/// trusted proxy wins, then `X-Real-IP`. Otherwise the socket peer is used.
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>, trusted: &[IpAddr]) -> String {
    let Some(peer_ip) = peer.map(|addr| addr.ip()) else {
        return "unknown".to_string();
    };
    if !trusted.contains(&peer_ip) {
        return peer_ip.to_string();
    }

    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    let is_trusted = |hop: &&str| hop.parse::<IpAddr>().is_ok_and(|ip| trusted.contains(&ip));
    let forwarded = hops
        .iter()
        .rev()
        .find(|hop| !is_trusted(*hop))
        .or(hops.first())
        .copied();

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .unwrap_or_else(|| peer_ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn proxy() -> SocketAddr {
        "10.0.0.1:5555".parse().unwrap()
    }

    fn trusted() -> Vec<IpAddr> {
        vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()]
    }

    #[test]
    fn untrusted_peer_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        let peer: SocketAddr = "192.0.2.1:5555".parse().unwrap();
        assert_eq!(client_id(&headers, Some(peer), &trusted()), "192.0.2.1");
        assert_eq!(client_id(&headers, Some(peer), &[]), "192.0.2.1");
    }

    #[test]
    fn trusted_proxy_forwards_nearest_untrusted_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 6.6.6.6 , 203.0.113.7, 10.0.0.2"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_id(&headers, Some(proxy()), &trusted()), "203.0.113.7");
    }

    #[test]
    fn all_trusted_chain_uses_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.0.0.2, 10.0.0.1"),
        );
        assert_eq!(client_id(&headers, Some(proxy()), &trusted()), "10.0.0.2");
    }

    #[test]
    fn real_ip_then_peer_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_id(&headers, Some(proxy()), &trusted()), "198.51.100.2");

        assert_eq!(
            client_id(&HeaderMap::new(), Some(proxy()), &trusted()),
            "10.0.0.1"
        );
        assert_eq!(client_id(&headers, None, &trusted()), "unknown");
    }
}
