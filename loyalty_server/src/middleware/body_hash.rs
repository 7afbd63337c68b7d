//! Body-hash middleware.
//!
//! Clients that share the process secret may attach a `HashSHA256` header carrying the hex-encoded
//! HMAC-SHA256 of the request body. When the secret is configured and the header is present, the middleware
//! recomputes the digest and rejects mismatches with 400. An empty secret disables verification entirely,
//! and requests without the header always pass.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorBadRequest,
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use hmac::{Hmac, Mac};
use log::{trace, warn};
use lpg_common::Secret;
use sha2::Sha256;

pub const HASH_HEADER: &str = "HashSHA256";

/// Hex-encoded HMAC-SHA256 of `data` under `secret`.
pub fn calculate_body_hash(secret: &str, data: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

pub struct BodyHashMiddlewareFactory {
    key: Secret<String>,
}

impl BodyHashMiddlewareFactory {
    pub fn new(key: Secret<String>) -> Self {
        BodyHashMiddlewareFactory { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BodyHashMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = BodyHashMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BodyHashMiddlewareService { key: self.key.clone(), service: Rc::new(service) }))
    }
}

pub struct BodyHashMiddlewareService<S> {
    key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for BodyHashMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.key.clone();
        Box::pin(async move {
            if secret.is_empty() {
                trace!("🔐️ Body hash checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let Some(header) = req.headers().get(HASH_HEADER).cloned() else {
                return service.call(req).await;
            };
            let expected = header.to_str().map(str::to_owned).map_err(|_| {
                warn!("🔐️ Unreadable {HASH_HEADER} header. Denying request.");
                ErrorBadRequest("Hash verification failed.")
            })?;
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ErrorBadRequest("Failed to read request body.")
            })?;
            let calculated = calculate_body_hash(secret.reveal(), data.as_ref());
            if calculated == expected {
                trace!("🔐️ Body hash check passed ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Body hash mismatch. Denying request.");
                Err(ErrorBadRequest("Hash verification failed."))
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
