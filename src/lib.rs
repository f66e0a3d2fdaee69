//! ip2country Server — resolves IP addresses to country and city over HTTP.
//!
//! Business logic lives in `ip2country-service`; the HTTP adapter in
//! `ip2country-http`. This crate only carries configuration and process
//! lifecycle.

pub mod config;
