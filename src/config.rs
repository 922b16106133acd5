//! Runtime configuration read from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// How long a session token stays valid.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// How often expired sessions are swept out of memory.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Interval between heartbeats on an open stream.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound for any configured interval or TTL.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Payloads buffered per viewer before new ones are dropped.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// Server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Address to bind (default `0.0.0.0`).
    pub host: IpAddr,
    /// Port to bind.
    pub port: u16,
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
    pub heartbeat_interval: Duration,
    pub subscriber_capacity: usize,
    /// Mark the session cookie `Secure`. Enable behind HTTPS.
    pub secure_cookies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            session_ttl: DEFAULT_SESSION_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            secure_cookies: false,
        }
    }
}

impl Config {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Unset keys fall back to their defaults; set but unparsable keys
    /// are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.host = parse("HOST", &host)?;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse("PORT", &port)?;
        }
        if let Some(ttl) = lookup("SIM_SESSION_TTL_SECS") {
            config.session_ttl = parse_secs("SIM_SESSION_TTL_SECS", &ttl)?;
        }
        if let Some(sweep) = lookup("SIM_SWEEP_INTERVAL_SECS") {
            config.sweep_interval = parse_secs("SIM_SWEEP_INTERVAL_SECS", &sweep)?;
        }
        if let Some(heartbeat) = lookup("SIM_HEARTBEAT_SECS") {
            config.heartbeat_interval = parse_secs("SIM_HEARTBEAT_SECS", &heartbeat)?;
        }
        if let Some(capacity) = lookup("SIM_SUBSCRIBER_CAPACITY") {
            config.subscriber_capacity = parse("SIM_SUBSCRIBER_CAPACITY", &capacity)?;
            if config.subscriber_capacity == 0 {
                return Err(ConfigError::Invalid {
                    key: "SIM_SUBSCRIBER_CAPACITY",
                    value: capacity,
                });
            }
        }
        if let Some(secure) = lookup("SIM_SECURE_COOKIES") {
            config.secure_cookies = parse("SIM_SECURE_COOKIES", &secure)?;
        }

        Ok(config)
    }

    /// Socket address the server listens on.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

/// Parses a whole number of seconds in `1..=MAX_INTERVAL`.
fn parse_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let secs = Duration::from_secs(parse::<u64>(key, value)?);
    if secs.is_zero() || secs > MAX_INTERVAL {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        });
    }
    Ok(secs)
}

/// Errors that can occur while reading configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
