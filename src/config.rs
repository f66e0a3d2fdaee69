//! Server configuration via CLI args and environment variables.

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use ip2country_service::ServiceConfig;

/// HTTP service resolving IP addresses to country and city.
#[derive(Parser, Debug, Clone)]
#[command(name = "ip2country-server", version, about)]
pub struct Config {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0", env = "IP2COUNTRY_HOST")]
    pub host: String,

    /// Bind port.
    #[arg(long, default_value_t = 8080, env = "PORT")]
    pub port: u16,

    /// Requests per second admitted for each client.
    #[arg(
        long,
        default_value_t = 10,
        env = "RATE_LIMIT_RPS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub rate_limit_rps: u32,

    /// Location database backend.
    #[arg(
        long,
        default_value = "csv",
        env = "DATABASE_TYPE",
        value_parser = clap::builder::NonEmptyStringValueParser::new()
    )]
    pub database_type: String,

    /// Location database file (`address-or-cidr,city,country` rows).
    #[arg(
        long,
        default_value = "data/ip2country.csv",
        env = "DATABASE_PATH",
        value_parser = parse_database_path
    )]
    pub database_path: PathBuf,

    /// Key clients by X-Forwarded-For / X-Real-IP before the socket address.
    #[arg(long, default_value_t = true, env = "TRUST_PROXY_HEADERS", action = ArgAction::Set)]
    pub trust_proxy_headers: bool,

    /// Seconds a single request may take before it fails with 408 (0 disables).
    #[arg(long, default_value_t = 15, env = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    /// Seconds to wait for in-flight requests on shutdown.
    #[arg(long, default_value_t = 30, env = "SHUTDOWN_TIMEOUT")]
    pub shutdown_timeout: u64,

    /// Log level.
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, default_value = "text", env = "LOG_FORMAT", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl Config {
    /// Parses configuration from CLI args and env vars.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// The service-layer subset of this config.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            rate_limit_rps: self.rate_limit_rps,
            database_type: self.database_type.clone(),
            database_path: self.database_path.clone(),
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        Ok(SocketAddr::new(self.host.parse::<IpAddr>()?, self.port))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

fn parse_database_path(s: &str) -> Result<PathBuf, String> {
    if s.trim().is_empty() {
        Err("database path must not be empty".to_string())
    } else {
        Ok(PathBuf::from(s))
    }
}
