use std::{env, fmt, net::SocketAddr, str::FromStr, time::Duration};

use thiserror::Error;

pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Front-end that carries the JSON-RPC payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// One newline-terminated request and response per TCP connection.
    Tcp,
    /// The same payload wrapped in an HTTP `POST /rpc`.
    Http,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "http" => Ok(Self::Http),
            _ => Err(ConfigError::InvalidTransport),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Http => f.write_str("http"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_connections: usize,
    pub max_request_bytes: usize,
    /// `None` waits for the request line indefinitely.
    pub read_timeout: Option<Duration>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node_id: String,
    pub bind_addr: String,
    pub bind_port: u16,
    pub transport: Transport,
    pub limits: Limits,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("NODE_ID must not be empty")]
    EmptyNodeId,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("RPC_TRANSPORT must be either `tcp` or `http`")]
    InvalidTransport,
    #[error("RPC_MAX_CONNECTIONS must be a positive integer")]
    InvalidMaxConnections,
    #[error("RPC_MAX_REQUEST_BYTES must be a positive integer")]
    InvalidMaxRequestBytes,
    #[error("RPC_READ_TIMEOUT_SECS must be a non-negative integer")]
    InvalidReadTimeout,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: "rpc-node".to_string(),
            bind_addr: "127.0.0.1".to_string(),
            bind_port: 8080,
            transport: Transport::Tcp,
            limits: Limits::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let node_id = match lookup("NODE_ID") {
            Some(value) if value.trim().is_empty() => return Err(ConfigError::EmptyNodeId),
            Some(value) => value.trim().to_string(),
            None => defaults.node_id,
        };
        let bind_addr = read("BIND_ADDR").unwrap_or(defaults.bind_addr);
        let bind_port = read("BIND_PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(defaults.bind_port);
        let transport = read("RPC_TRANSPORT")
            .map(|value| value.parse::<Transport>())
            .transpose()?
            .unwrap_or(defaults.transport);
        let max_connections = read("RPC_MAX_CONNECTIONS")
            .map(|value| parse_positive(&value).ok_or(ConfigError::InvalidMaxConnections))
            .transpose()?
            .unwrap_or(defaults.limits.max_connections);
        let max_request_bytes = read("RPC_MAX_REQUEST_BYTES")
            .map(|value| parse_positive(&value).ok_or(ConfigError::InvalidMaxRequestBytes))
            .transpose()?
            .unwrap_or(defaults.limits.max_request_bytes);
        let read_timeout = match read("RPC_READ_TIMEOUT_SECS") {
            None => defaults.limits.read_timeout,
            Some(value) => match value.parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => return Err(ConfigError::InvalidReadTimeout),
            },
        };

        let config = Self {
            node_id,
            bind_addr,
            bind_port,
            transport,
            limits: Limits {
                max_connections,
                max_request_bytes,
                read_timeout,
            },
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn parse_positive(value: &str) -> Option<usize> {
    value.parse::<usize>().ok().filter(|parsed| *parsed > 0)
}
