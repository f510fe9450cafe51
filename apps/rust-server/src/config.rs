// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup. Invalid
//! values fail startup; nothing is re-read at runtime.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root of ledger, blobs, audit trail and key file | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `AUTH_JWKS_URL` | JWKS endpoint for bearer token verification | Required for production |
//! | `AUTH_ISSUER` | Expected JWT issuer claim | Optional |
//! | `AUTH_AUDIENCE` | Expected JWT audience claim | Optional |
//! | `REFERENCE_KEY` | 64 hex chars, file reference master key | `<DATA_DIR>/keys/reference.key` |
//! | `AT_REST_KEY` | 64 hex chars, enables encryption at rest | Disabled |
//! | `CONTENT_TIMEOUT_SECS` | Upper bound for content operations | `30` |
//! | `MAX_UPLOAD_BYTES` | Request body limit for uploads | `52428800` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key | Plain HTTP |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::paths::DATA_ROOT;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const AUTH_JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
pub const AUTH_AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const REFERENCE_KEY_ENV: &str = "REFERENCE_KEY";
pub const AT_REST_KEY_ENV: &str = "AT_REST_KEY";
pub const CONTENT_TIMEOUT_SECS_ENV: &str = "CONTENT_TIMEOUT_SECS";
pub const MAX_UPLOAD_BYTES_ENV: &str = "MAX_UPLOAD_BYTES";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CONTENT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Bearer token verification settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSettings {
    pub jwks_url: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// PEM files for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Process configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub auth: AuthSettings,
    /// Hex-encoded reference key. Never logged.
    pub reference_key: Option<String>,
    /// Hex-encoded at-rest key. Never logged.
    pub at_rest_key: Option<String>,
    pub content_timeout: Duration,
    pub max_upload_bytes: usize,
    pub tls: Option<TlsSettings>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("bind_addr", &self.bind_addr)
            .field("auth", &self.auth)
            .field("reference_key", &redact(&self.reference_key))
            .field("at_rest_key", &redact(&self.at_rest_key))
            .field("content_timeout", &self.content_timeout)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("tls", &self.tls)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = get(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string());

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(PORT_ENV, get(PORT_ENV), DEFAULT_PORT)?;
        let ip: IpAddr = host.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                name: HOST_ENV,
                value: host.clone(),
                reason: e.to_string(),
            }
        })?;
        let bind_addr = SocketAddr::new(ip, port);

        let content_timeout_secs = parse_or(
            CONTENT_TIMEOUT_SECS_ENV,
            get(CONTENT_TIMEOUT_SECS_ENV),
            DEFAULT_CONTENT_TIMEOUT_SECS,
        )?;
        if content_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: CONTENT_TIMEOUT_SECS_ENV,
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let max_upload_bytes = parse_or(
            MAX_UPLOAD_BYTES_ENV,
            get(MAX_UPLOAD_BYTES_ENV),
            DEFAULT_MAX_UPLOAD_BYTES,
        )?;

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsSettings {
                cert_path: cert.into(),
                key_path: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    value: other.to_string(),
                    reason: "expected 'json' or 'pretty'".to_string(),
                })
            }
        };

        Ok(Self {
            data_dir: data_dir.into(),
            bind_addr,
            auth: AuthSettings {
                jwks_url: get(AUTH_JWKS_URL_ENV),
                issuer: get(AUTH_ISSUER_ENV),
                audience: get(AUTH_AUDIENCE_ENV),
            },
            reference_key: get(REFERENCE_KEY_ENV),
            at_rest_key: get(AT_REST_KEY_ENV),
            content_timeout: Duration::from_secs(content_timeout_secs),
            max_upload_bytes,
            tls,
            log_format,
        })
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.content_timeout, Duration::from_secs(30));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.auth, AuthSettings::default());
        assert!(config.tls.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            (DATA_DIR_ENV, "/srv/vault"),
            (PORT_ENV, "9443"),
            (AUTH_JWKS_URL_ENV, "https://id.example.com/jwks.json"),
            (AUTH_ISSUER_ENV, "https://id.example.com"),
            (CONTENT_TIMEOUT_SECS_ENV, "5"),
            (TLS_CERT_PATH_ENV, "/certs/cert.pem"),
            (TLS_KEY_PATH_ENV, "/certs/key.pem"),
            (LOG_FORMAT_ENV, "json"),
        ])
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/vault"));
        assert_eq!(config.bind_addr.port(), 9443);
        assert_eq!(
            config.auth.jwks_url.as_deref(),
            Some("https://id.example.com/jwks.json")
        );
        assert_eq!(config.content_timeout, Duration::from_secs(5));
        assert!(config.tls.is_some());
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn empty_values_are_unset() {
        let config = config(&[(AT_REST_KEY_ENV, "  "), (PORT_ENV, "")]).unwrap();
        assert!(config.at_rest_key.is_none());
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn debug_redacts_keys() {
        let config = config(&[(REFERENCE_KEY_ENV, &"ab".repeat(32))]).unwrap();
        let printed = format!("{config:?}");
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("abab"));
    }

    #[test]
    fn invalid_values_fail() {
        assert!(matches!(
            config(&[(PORT_ENV, "eighty")]),
            Err(ConfigError::Invalid { name: PORT_ENV, .. })
        ));
        assert!(matches!(
            config(&[(CONTENT_TIMEOUT_SECS_ENV, "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[(LOG_FORMAT_ENV, "xml")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[(TLS_CERT_PATH_ENV, "/certs/cert.pem")]),
            Err(ConfigError::Incomplete(..))
        ));
    }
}
