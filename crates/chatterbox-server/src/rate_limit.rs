//! Per-client token buckets guarding the chat routes.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const RATE_LIMITED_REPLY: &str = "You're sending messages too quickly. Please slow down.";

/// Verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Allowed,
    /// `retry_after` is `None` when the bucket never refills.
    Throttled { retry_after: Option<Duration> },
}

/// Request allowance of one client. Refills continuously at `per_sec` up to
/// `burst`; each request spends one unit.
#[derive(Debug, Clone)]
struct Allowance {
    units: f64,
    seen_at: Instant,
}

impl Allowance {
    fn admit(&mut self, now: Instant, per_sec: f64, burst: f64) -> Admission {
        let elapsed = now.saturating_duration_since(self.seen_at).as_secs_f64();
        self.seen_at = now;
        self.units = (self.units + elapsed * per_sec).min(burst);

        if self.units >= 1.0 {
            self.units -= 1.0;
            return Admission::Allowed;
        }
        let retry_after = (per_sec > 0.0)
            .then(|| Duration::from_secs_f64((1.0 - self.units) / per_sec));
        Admission::Throttled { retry_after }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    clients: Arc<Mutex<HashMap<IpAddr, Allowance>>>,
    per_sec: f64,
    burst: f64,
}

impl RateLimiter {
    /// `per_sec` requests per second sustained, up to `burst` at once.
    pub fn new(per_sec: f64, burst: f64) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            per_sec: per_sec.max(0.0),
            burst: burst.max(1.0),
        }
    }

    pub async fn admit(&self, ip: IpAddr) -> Admission {
        self.admit_at(ip, Instant::now()).await
    }

    async fn admit_at(&self, ip: IpAddr, now: Instant) -> Admission {
        let mut clients = self.clients.lock().await;
        clients
            .entry(ip)
            .or_insert_with(|| Allowance {
                units: self.burst,
                seen_at: now,
            })
            .admit(now, self.per_sec, self.burst)
    }

    /// Forget clients that have been quiet for `max_idle`.
    pub async fn purge_stale(&self, max_idle: Duration) {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;
        let before = clients.len();
        clients.retain(|_, a| now.duration_since(a.seen_at) < max_idle);
        if clients.len() < before {
            debug!(evicted = before - clients.len(), "Forgot idle clients");
        }
    }
}

/// Answers throttled clients with 429 and, when the allowance refills, a
/// `Retry-After` in whole seconds.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(ip) = client_ip(&req) else {
        return next.run(req).await;
    };
    match limiter.admit(ip).await {
        Admission::Allowed => next.run(req).await,
        Admission::Throttled { retry_after } => {
            warn!(ip = %ip, path = %req.uri().path(), ?retry_after, "Rate limit exceeded");
            let mut resp = (StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_REPLY).into_response();
            if let Some(wait) = retry_after {
                let secs = wait.as_secs_f64().ceil().max(1.0) as u64;
                resp.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
            }
            resp
        }
    }
}

/// Peer address first, then `X-Forwarded-For`, then `X-Real-IP`.
fn client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip());
    }

    let header_ip = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };
    header_ip("x-forwarded-for").or_else(|| header_ip("x-real-ip"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(raw: &str) -> IpAddr {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn test_burst_then_reject() {
        let limiter = RateLimiter::new(0.0, 3.0);
        for _ in 0..3 {
            assert_eq!(limiter.admit(ip("127.0.0.1")).await, Admission::Allowed);
        }
        assert_eq!(
            limiter.admit(ip("127.0.0.1")).await,
            Admission::Throttled { retry_after: None }
        );
    }

    #[tokio::test]
    async fn test_refill_and_retry_after() {
        let limiter = RateLimiter::new(2.0, 1.0);
        let client = ip("10.0.0.9");
        let start = Instant::now();

        assert_eq!(limiter.admit_at(client, start).await, Admission::Allowed);
        assert_eq!(
            limiter.admit_at(client, start).await,
            Admission::Throttled {
                retry_after: Some(Duration::from_millis(500))
            }
        );
        let later = start + Duration::from_millis(500);
        assert_eq!(limiter.admit_at(client, later).await, Admission::Allowed);
    }

    #[tokio::test]
    async fn test_clients_are_independent() {
        let limiter = RateLimiter::new(0.0, 1.0);
        assert_eq!(limiter.admit(ip("10.0.0.1")).await, Admission::Allowed);
        assert_ne!(limiter.admit(ip("10.0.0.1")).await, Admission::Allowed);
        assert_eq!(limiter.admit(ip("10.0.0.2")).await, Admission::Allowed);
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let limiter = RateLimiter::new(5.0, 20.0);
        assert_eq!(limiter.admit(ip("192.168.1.1")).await, Admission::Allowed);

        limiter.purge_stale(Duration::ZERO).await;
        assert!(limiter.clients.lock().await.is_empty());
    }

    #[test]
    fn test_client_ip_from_headers() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), Some("203.0.113.7".parse().unwrap()));

        let req = Request::builder().header("x-real-ip", "198.51.100.2").body(()).unwrap();
        assert_eq!(client_ip(&req), Some("198.51.100.2".parse().unwrap()));

        let req = Request::builder().body(()).unwrap();
        assert_eq!(client_ip(&req), None);
    }
}
