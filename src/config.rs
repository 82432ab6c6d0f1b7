// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once from the environment at startup and never
//! re-evaluated. Everything downstream (security chains, trusted issuers,
//! the management credential) is derived from the resulting [`Config`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `PUBLIC_BASE_URL` | External base URL used in OAuth2 redirect URIs | `http://localhost:8080` |
//! | `OAUTH2_SECURITY_ENABLED` | Selects the protected chain (`true`) or the open chain (`false`) | `true` |
//! | `OAUTH2_PROVIDER_<NAME>_ISSUER_URI` | Issuer URI of provider `<name>` | - |
//! | `OAUTH2_CLIENT_<NAME>_CLIENT_ID` | OAuth2 client id for login via `<name>` | - |
//! | `OAUTH2_CLIENT_<NAME>_CLIENT_SECRET` | OAuth2 client secret for login via `<name>` | - |
//! | `OAUTH2_CLIENT_<NAME>_SCOPE` | Requested scopes | `openid profile email` |
//! | `OAUTH2_AUDIENCE` | Expected JWT audience claim | Optional |
//! | `MANAGEMENT_USER` | Management Basic-auth user | Required |
//! | `MANAGEMENT_PASSWORD` | Management Basic-auth password | Required |
//! | `MANAGEMENT_ROLE` | Role required on protected management endpoints | `MONITORING` |
//! | `MANAGEMENT_BCRYPT_COST` | bcrypt cost factor for the management password | `10` |
//! | `JWKS_CACHE_TTL_SECS` | Per-issuer signing key cache TTL | `300` |
//! | `JWKS_FETCH_TIMEOUT_SECS` | Bound on discovery/JWKS fetches | `5` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::time::Duration;

use crate::auth::jwks::JwksOptions;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";
pub const OAUTH2_ENABLED_ENV: &str = "OAUTH2_SECURITY_ENABLED";
pub const OAUTH2_AUDIENCE_ENV: &str = "OAUTH2_AUDIENCE";
pub const MANAGEMENT_USER_ENV: &str = "MANAGEMENT_USER";
pub const MANAGEMENT_PASSWORD_ENV: &str = "MANAGEMENT_PASSWORD";
pub const MANAGEMENT_ROLE_ENV: &str = "MANAGEMENT_ROLE";
pub const MANAGEMENT_BCRYPT_COST_ENV: &str = "MANAGEMENT_BCRYPT_COST";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWKS_FETCH_TIMEOUT_ENV: &str = "JWKS_FETCH_TIMEOUT_SECS";

/// Environment variable selecting the log output format.
///
/// Read directly by `main` before configuration loading so that
/// configuration errors are logged in the requested format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Fixed variable names read by [`Config::from_vars`].
const KNOWN_VARS: [&str; 12] = [
    HOST_ENV,
    PORT_ENV,
    PUBLIC_BASE_URL_ENV,
    OAUTH2_ENABLED_ENV,
    OAUTH2_AUDIENCE_ENV,
    MANAGEMENT_USER_ENV,
    MANAGEMENT_PASSWORD_ENV,
    MANAGEMENT_ROLE_ENV,
    MANAGEMENT_BCRYPT_COST_ENV,
    JWKS_CACHE_TTL_ENV,
    JWKS_FETCH_TIMEOUT_ENV,
    LOG_FORMAT_ENV,
];

const PROVIDER_PREFIX: &str = "OAUTH2_PROVIDER_";
const CLIENT_PREFIX: &str = "OAUTH2_CLIENT_";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_MANAGEMENT_ROLE: &str = "MONITORING";
const DEFAULT_BCRYPT_COST: u32 = 10;
pub const DEFAULT_SCOPE: &str = "openid profile email";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required configuration `{0}` is missing")]
    Missing(String),

    #[error("configuration `{key}` is invalid: {reason}")]
    Invalid { key: String, reason: String },

    #[error("security configuration is inconsistent: {0}")]
    Inconsistent(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Keep the variables that are valid UTF-8.
///
/// Unrelated variables that are not UTF-8 are skipped; one of ours is an
/// error.
fn utf8_vars<I>(vars: I) -> Result<Vec<(String, String)>, ConfigError>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut utf8 = Vec::new();
    for (key, value) in vars {
        let Ok(key) = key.into_string() else {
            continue;
        };
        match value.into_string() {
            Ok(value) => utf8.push((key, value)),
            Err(_) if is_known_var(&key) => {
                return Err(ConfigError::invalid(key, "value is not valid UTF-8"))
            }
            Err(_) => {}
        }
    }
    Ok(utf8)
}

fn is_known_var(key: &str) -> bool {
    KNOWN_VARS.contains(&key) || key.starts_with(PROVIDER_PREFIX) || key.starts_with(CLIENT_PREFIX)
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub security: SecurityConfig,
}

/// Everything the security chains are built from.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// `oauth2.security.enabled`
    pub oauth2_enabled: bool,
    /// Provider name (lowercase) to provider settings, as configured.
    /// Only the well-known providers are consulted when building trust.
    pub providers: HashMap<String, ProviderConfig>,
    /// Expected `aud` claim on bearer tokens.
    pub audience: Option<String>,
    /// Base URL used to build the OAuth2 `redirect_uri`.
    pub public_base_url: String,
    pub management: ManagementConfig,
    pub jwks: JwksOptions,
}

/// One identity provider: where its tokens come from and, optionally,
/// the client registration used for interactive login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub issuer_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

/// Static credential guarding the management endpoints.
#[derive(Clone)]
pub struct ManagementConfig {
    pub user: String,
    pub password: String,
    pub role: String,
    pub bcrypt_cost: u32,
}

impl fmt::Debug for ManagementConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementConfig")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("role", &self.role)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(utf8_vars(std::env::vars_os())?)
    }

    /// Load configuration from an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();

        let host = vars
            .get(HOST_ENV)
            .cloned()
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(&vars, PORT_ENV, DEFAULT_PORT)?;

        let management = ManagementConfig {
            user: required(&vars, MANAGEMENT_USER_ENV)?,
            password: required(&vars, MANAGEMENT_PASSWORD_ENV)?,
            role: vars
                .get(MANAGEMENT_ROLE_ENV)
                .cloned()
                .unwrap_or_else(|| DEFAULT_MANAGEMENT_ROLE.to_string()),
            bcrypt_cost: parse_or(&vars, MANAGEMENT_BCRYPT_COST_ENV, DEFAULT_BCRYPT_COST)?,
        };

        let defaults = JwksOptions::default();
        let jwks = JwksOptions {
            cache_ttl: Duration::from_secs(parse_or(
                &vars,
                JWKS_CACHE_TTL_ENV,
                defaults.cache_ttl.as_secs(),
            )?),
            fetch_timeout: Duration::from_secs(parse_or(
                &vars,
                JWKS_FETCH_TIMEOUT_ENV,
                defaults.fetch_timeout.as_secs(),
            )?),
        };
        if jwks.fetch_timeout.is_zero() {
            return Err(ConfigError::invalid(JWKS_FETCH_TIMEOUT_ENV, "must be positive"));
        }

        let security = SecurityConfig {
            oauth2_enabled: parse_bool(&vars, OAUTH2_ENABLED_ENV, true)?,
            providers: collect_providers(&vars),
            audience: vars.get(OAUTH2_AUDIENCE_ENV).cloned(),
            public_base_url: vars
                .get(PUBLIC_BASE_URL_ENV)
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string()),
            management,
            jwks,
        };

        Ok(Self {
            host,
            port,
            security,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Gather every `OAUTH2_PROVIDER_*` / `OAUTH2_CLIENT_*` variable into a
/// provider map keyed by lowercase provider name.
fn collect_providers(vars: &HashMap<String, String>) -> HashMap<String, ProviderConfig> {
    let mut providers: HashMap<String, ProviderConfig> = HashMap::new();

    for (key, value) in vars {
        if let Some(name) = key
            .strip_prefix(PROVIDER_PREFIX)
            .and_then(|rest| rest.strip_suffix("_ISSUER_URI"))
        {
            providers.entry(name.to_lowercase()).or_default().issuer_uri = Some(value.clone());
        } else if let Some(rest) = key.strip_prefix(CLIENT_PREFIX) {
            if let Some(name) = rest.strip_suffix("_CLIENT_ID") {
                providers.entry(name.to_lowercase()).or_default().client_id = Some(value.clone());
            } else if let Some(name) = rest.strip_suffix("_CLIENT_SECRET") {
                providers.entry(name.to_lowercase()).or_default().client_secret =
                    Some(value.clone());
            } else if let Some(name) = rest.strip_suffix("_SCOPE") {
                providers.entry(name.to_lowercase()).or_default().scope = Some(value.clone());
            }
        }
    }

    providers.retain(|name, _| !name.is_empty());
    providers
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    vars.get(key)
        .cloned()
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn parse_or<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match vars.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool(
    vars: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(key).map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v == "true" || v == "1" => Ok(true),
        Some(v) if v == "false" || v == "0" => Ok(false),
        Some(v) => Err(ConfigError::invalid(key, format!("expected true/false, got `{v}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            (MANAGEMENT_USER_ENV, "admin"),
            (MANAGEMENT_PASSWORD_ENV, "s3cret"),
        ]
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_vars(base_vars()).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.security.oauth2_enabled);
        assert_eq!(config.security.management.role, "MONITORING");
        assert_eq!(config.security.management.bcrypt_cost, 10);
        assert_eq!(config.security.public_base_url, "http://localhost:8080");
        assert!(config.security.providers.is_empty());
        assert!(config.security.audience.is_none());
    }

    #[test]
    fn management_credentials_are_required() {
        let err = Config::from_vars(vec![(MANAGEMENT_USER_ENV, "admin")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref k) if k == MANAGEMENT_PASSWORD_ENV));
    }

    #[test]
    fn oauth2_flag_parses() {
        let mut vars = base_vars();
        vars.push((OAUTH2_ENABLED_ENV, "FALSE"));
        assert!(!Config::from_vars(vars).unwrap().security.oauth2_enabled);

        let mut vars = base_vars();
        vars.push((OAUTH2_ENABLED_ENV, "maybe"));
        assert!(matches!(
            Config::from_vars(vars).unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }

    #[test]
    fn providers_are_grouped_by_name() {
        let mut vars = base_vars();
        vars.extend([
            ("OAUTH2_PROVIDER_KEYCLOAK_ISSUER_URI", "https://kc.example.com/realms/todo"),
            ("OAUTH2_CLIENT_KEYCLOAK_CLIENT_ID", "todo-list"),
            ("OAUTH2_CLIENT_KEYCLOAK_CLIENT_SECRET", "secret"),
            ("OAUTH2_PROVIDER_AUTH0_ISSUER_URI", "https://todo.eu.auth0.com/"),
            ("OAUTH2_PROVIDER_GITHUB_ISSUER_URI", "https://github.com"),
        ]);
        let config = Config::from_vars(vars).unwrap();
        let providers = &config.security.providers;

        assert_eq!(providers.len(), 3);
        let keycloak = &providers["keycloak"];
        assert_eq!(
            keycloak.issuer_uri.as_deref(),
            Some("https://kc.example.com/realms/todo")
        );
        assert_eq!(keycloak.client_id.as_deref(), Some("todo-list"));
        assert_eq!(keycloak.client_secret.as_deref(), Some("secret"));
        assert!(keycloak.scope.is_none());
        assert!(providers["auth0"].client_id.is_none());
    }

    #[test]
    fn blank_values_are_ignored() {
        let mut vars = base_vars();
        vars.push((PORT_ENV, "  "));
        vars.push(("OAUTH2_PROVIDER_AUTH0_ISSUER_URI", ""));
        let config = Config::from_vars(vars).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.security.providers.is_empty());
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let mut vars = base_vars();
        vars.push((PORT_ENV, "eighty"));
        assert!(matches!(
            Config::from_vars(vars).unwrap_err(),
            ConfigError::Invalid { ref key, .. } if key == PORT_ENV
        ));

        let mut vars = base_vars();
        vars.push((JWKS_FETCH_TIMEOUT_ENV, "0"));
        assert!(Config::from_vars(vars).is_err());
    }

    #[test]
    fn debug_redacts_management_password() {
        let config = Config::from_vars(base_vars()).unwrap();
        let rendered = format!("{:?}", config.security.management);
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_environment_is_handled() {
        use std::os::unix::ffi::OsStringExt;

        let bad = || OsString::from_vec(vec![0x66, 0x6f, 0xff]);
        let mut vars: Vec<(OsString, OsString)> = base_vars()
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        vars.push(("LESSOPEN".into(), bad()));
        vars.push((bad(), "x".into()));

        let utf8 = utf8_vars(vars.clone()).unwrap();
        assert_eq!(utf8.len(), base_vars().len());
        assert!(Config::from_vars(utf8).is_ok());

        vars.push(("OAUTH2_PROVIDER_KEYCLOAK_ISSUER_URI".into(), bad()));
        assert!(matches!(
            utf8_vars(vars).unwrap_err(),
            ConfigError::Invalid { ref key, .. } if key == "OAUTH2_PROVIDER_KEYCLOAK_ISSUER_URI"
        ));
    }
}
