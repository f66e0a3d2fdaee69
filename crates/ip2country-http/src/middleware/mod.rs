//! HTTP middleware: rate limiting, request timeouts and request ID tracking.

pub mod rate_limit;
pub mod request_id;
pub mod timeout;
