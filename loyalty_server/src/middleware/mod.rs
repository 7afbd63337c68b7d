mod body_hash;
mod rate_limit;

pub use body_hash::{calculate_body_hash, BodyHashMiddlewareFactory, BodyHashMiddlewareService, HASH_HEADER};
pub use rate_limit::{RateLimiter, RateLimiterMiddlewareFactory, RateLimiterMiddlewareService};
