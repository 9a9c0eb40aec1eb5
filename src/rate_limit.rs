use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::{debug, warn};

/// Limiter settings: at most `max` requests per client per `window`.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Accept,
    Reject(String),
}

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    window_start: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client identity.
///
/// Each instance owns its own state; two limiters never share counters even
/// when configured identically. Up to `2 * max` requests can pass across a
/// window boundary.
pub struct RateLimiter {
    name: &'static str,
    config: RateLimitConfig,
    windows: DashMap<String, RateLimitWindow>,
    trusted_proxy_hops: usize,
}

impl RateLimiter {
    pub fn new(name: &'static str, config: RateLimitConfig) -> Self {
        Self {
            name,
            config,
            windows: DashMap::new(),
            trusted_proxy_hops: 0,
        }
    }

    /// Number of reverse proxies in front of the service that append to
    /// `X-Forwarded-For`. Zero ignores forwarding headers entirely.
    pub fn trusted_proxy_hops(mut self, hops: usize) -> Self {
        self.trusted_proxy_hops = hops;
        self
    }

    pub fn check(&self, client: &str) -> RateLimitDecision {
        self.check_at(client, Instant::now())
    }

    /// Count a request from `client` observed at `now`.
    pub fn check_at(&self, client: &str, now: Instant) -> RateLimitDecision {
        // entry() holds the shard write lock for the whole read-modify-write
        let count = {
            let mut entry = self
                .windows
                .entry(client.to_string())
                .or_insert(RateLimitWindow {
                    window_start: now,
                    count: 0,
                });
            let window = entry.value_mut();
            if now.saturating_duration_since(window.window_start) >= self.config.window {
                window.window_start = now;
                window.count = 0;
            }
            window.count = window.count.saturating_add(1);
            window.count
        };

        if count <= self.config.max {
            RateLimitDecision::Accept
        } else {
            RateLimitDecision::Reject(self.config.message.clone())
        }
    }

    /// Drop windows that have fully elapsed as of `now`.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.config.window;
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.window_start) < window);
        let purged = before.saturating_sub(self.windows.len());
        if purged > 0 {
            debug!(limiter = self.name, purged, "purged expired rate-limit windows");
        }
        purged
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Identity used as the counter key: the peer address, or the address the
    /// outermost trusted proxy recorded when proxies are configured.
    pub fn client_identity(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        if self.trusted_proxy_hops > 0 {
            if let Some(xff) = headers.get("x-forwarded-for") {
                // the header is present, so never fall through to X-Real-IP
                let hop = xff
                    .to_str()
                    .ok()
                    .and_then(|v| forwarded_client(v, self.trusted_proxy_hops));
                return match hop {
                    Some(ip) => ip.to_string(),
                    None => peer_key(peer),
                };
            }
            let real_ip = headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = real_ip {
                return ip.to_string();
            }
        }
        peer_key(peer)
    }
}

fn peer_key(peer: Option<SocketAddr>) -> String {
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Pick the `X-Forwarded-For` entry written by the outermost of `hops` trusted
/// proxies, counting from the right. Entries further left are client-controlled.
fn forwarded_client(header: &str, hops: usize) -> Option<&str> {
    let entries: Vec<&str> = header.split(',').map(str::trim).collect();
    if hops == 0 || entries.len() < hops {
        return None;
    }
    let hop = entries[entries.len() - hops];
    (!hop.is_empty()).then_some(hop)
}

/// Middleware guarding a route with the given limiter.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = limiter.client_identity(req.headers(), peer);

    match limiter.check(&client) {
        RateLimitDecision::Accept => next.run(req).await,
        RateLimitDecision::Reject(message) => {
            warn!(limiter = limiter.name, %client, "rate limit exceeded");
            (StatusCode::TOO_MANY_REQUESTS, message).into_response()
        }
    }
}
