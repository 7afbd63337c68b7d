//! Per-principal rate limiting.
//!
//! Requests are bucketed by `user:<id>` when a valid bearer token accompanies the request, otherwise by the
//! client IP. Each key owns a token bucket; the key→bucket map is guarded by a mutex, and the bucket
//! arithmetic itself is plain token-bucket refill. Over-limit requests are answered with 429 before the
//! handler runs.
use std::{
    collections::HashMap,
    future::{ready, Ready},
    rc::Rc,
    sync::{Arc, Mutex},
    time::Instant,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorTooManyRequests,
    Error,
};
use futures::future::LocalBoxFuture;
use log::warn;

use crate::auth::TokenIssuer;

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

/// A token-bucket limiter shared by every worker thread.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    refill_per_sec: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(refill_per_sec: f64, burst: f64) -> Self {
        Self { buckets: Mutex::new(HashMap::new()), refill_per_sec, burst }
    }

    /// Takes one token from the key's bucket. `false` means the caller is over its budget.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket { tokens: self.burst, last_refill: now });
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.burst);
        bucket.last_refill = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct RateLimiterMiddlewareFactory {
    limiter: Arc<RateLimiter>,
    verifier: TokenIssuer,
}

impl RateLimiterMiddlewareFactory {
    pub fn new(limiter: Arc<RateLimiter>, verifier: TokenIssuer) -> Self {
        Self { limiter, verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiterMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = RateLimiterMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddlewareService {
            limiter: Arc::clone(&self.limiter),
            verifier: self.verifier.clone(),
            service: Rc::new(service),
        }))
    }
}

pub struct RateLimiterMiddlewareService<S> {
    limiter: Arc<RateLimiter>,
    verifier: TokenIssuer,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let key = principal_key(&req, &self.verifier);
        if !self.limiter.check(&key) {
            warn!("🚦️ Rate limit exceeded for {key}");
            return Box::pin(async { Err(ErrorTooManyRequests("Too Many Requests")) });
        }
        let service = Rc::clone(&self.service);
        Box::pin(async move { service.call(req).await })
    }
}

/// `user:<id>` when the request carries a verifiable bearer token, else `ip:<addr>`.
fn principal_key(req: &ServiceRequest, verifier: &TokenIssuer) -> String {
    let claims = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| verifier.decode_claims(token).ok());
    match claims {
        Some(claims) => format!("user:{}", claims.user_id),
        None => {
            let ip = req.connection_info().realip_remote_addr().unwrap_or("unknown").to_string();
            format!("ip:{ip}")
        },
    }
}
