use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    Http,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: TransportKind,
    pub api_token: Option<String>,
    pub bind_addr: String,
    pub bind_port: u16,
    pub handler_timeout: Duration,
    pub file_root: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MCP_TRANSPORT must be one of: stdio, http")]
    InvalidTransport,
    #[error("MCP_API_TOKEN is required and must not be empty when MCP_TRANSPORT=http")]
    MissingApiToken,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("MCP_HANDLER_TIMEOUT_SECS must be a positive integer")]
    InvalidHandlerTimeout,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let transport = match env::var("MCP_TRANSPORT")
            .ok()
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
            .as_deref()
        {
            None | Some("stdio") => TransportKind::Stdio,
            Some("http") => TransportKind::Http,
            Some(_) => return Err(ConfigError::InvalidTransport),
        };

        let api_token = env::var("MCP_API_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        if transport == TransportKind::Http && api_token.is_none() {
            return Err(ConfigError::MissingApiToken);
        }

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);
        let handler_timeout = env::var("MCP_HANDLER_TIMEOUT_SECS")
            .ok()
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|seconds| *seconds > 0)
                    .ok_or(ConfigError::InvalidHandlerTimeout)
            })
            .transpose()?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));
        let file_root = env::var("MCP_FILE_ROOT")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let config = Self {
            transport,
            api_token,
            bind_addr,
            bind_port,
            handler_timeout,
            file_root,
        };

        if config.transport == TransportKind::Http {
            let _ = config.bind_socket()?;
        }
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // Tests in this module mutate process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "MCP_TRANSPORT",
            "MCP_API_TOKEN",
            "BIND_ADDR",
            "BIND_PORT",
            "MCP_HANDLER_TIMEOUT_SECS",
            "MCP_FILE_ROOT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn parse_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_env();

        let config = Config::from_env().expect("config should parse");
        assert_eq!(config.transport, TransportKind::Stdio);
        assert_eq!(config.api_token, None);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.handler_timeout, Duration::from_secs(30));
        assert_eq!(config.file_root, PathBuf::from("."));
    }

    #[test]
    fn http_transport_requires_token() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_env();
        env::set_var("MCP_TRANSPORT", "http");

        let err = Config::from_env().expect_err("expected missing token error");
        assert!(matches!(err, ConfigError::MissingApiToken));
    }

    #[test]
    fn http_transport_parses_with_token() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_env();
        env::set_var("MCP_TRANSPORT", "HTTP");
        env::set_var("MCP_API_TOKEN", " abc ");
        env::set_var("BIND_PORT", "9000");

        let config = Config::from_env().expect("config should parse");
        assert_eq!(config.transport, TransportKind::Http);
        assert_eq!(config.api_token.as_deref(), Some("abc"));
        assert_eq!(
            config.bind_socket().expect("valid socket"),
            "127.0.0.1:9000".parse().expect("valid addr")
        );
    }

    #[test]
    fn unknown_transport_fails() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_env();
        env::set_var("MCP_TRANSPORT", "carrier-pigeon");

        let err = Config::from_env().expect_err("expected invalid transport");
        assert!(matches!(err, ConfigError::InvalidTransport));
    }

    #[test]
    fn zero_handler_timeout_fails() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_env();
        env::set_var("MCP_HANDLER_TIMEOUT_SECS", "0");

        let err = Config::from_env().expect_err("expected invalid timeout");
        assert!(matches!(err, ConfigError::InvalidHandlerTimeout));
    }

    #[test]
    fn invalid_port_fails() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_env();
        env::set_var("BIND_PORT", "99999");

        let err = Config::from_env().expect_err("expected invalid port");
        assert!(matches!(err, ConfigError::InvalidPort));
    }
}
