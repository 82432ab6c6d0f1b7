// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Static management credential and HTTP Basic parsing.
//!
//! The management chain authenticates exactly one user, provisioned from
//! configuration at startup. Only the bcrypt hash of its password is kept.

use base64ct::{Base64, Encoding};
use tracing::info;

use super::error::AuthError;
use crate::config::{ConfigError, ManagementConfig, MANAGEMENT_BCRYPT_COST_ENV};

/// The provisioned management user.
#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub role: String,
    password_hash: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Process-lifetime, single-user credential store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credential: Credential,
}

/// Hash the configured password and build the store.
///
/// Takes the configuration by value so the plaintext password is dropped
/// here.
pub fn provision_user(config: ManagementConfig) -> Result<CredentialStore, ConfigError> {
    let ManagementConfig {
        user,
        password,
        role,
        bcrypt_cost,
    } = config;

    if user.contains(':') {
        return Err(ConfigError::invalid("MANAGEMENT_USER", "must not contain ':'"));
    }
    if role.trim().is_empty() {
        return Err(ConfigError::invalid("MANAGEMENT_ROLE", "must not be empty"));
    }

    let password_hash = bcrypt::hash(password, bcrypt_cost)
        .map_err(|e| ConfigError::invalid(MANAGEMENT_BCRYPT_COST_ENV, e.to_string()))?;

    info!(user = %user, role = %role, "Provisioned management user");
    Ok(CredentialStore {
        credential: Credential {
            username: user,
            role,
            password_hash,
        },
    })
}

impl CredentialStore {
    pub fn username(&self) -> &str {
        &self.credential.username
    }

    pub fn role(&self) -> &str {
        &self.credential.role
    }

    /// Check a username/password pair.
    ///
    /// Unknown user and wrong password are indistinguishable to the caller,
    /// and both pay for a bcrypt verification. Hashing runs on the blocking
    /// pool.
    pub async fn authenticate(
        &self,
        username: &str,
        password: String,
    ) -> Result<&Credential, AuthError> {
        let hash = self.credential.password_hash.clone();
        let password_ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        if password_ok && username == self.credential.username {
            Ok(&self.credential)
        } else {
            Err(AuthError::BadCredentials)
        }
    }
}

/// Split an `Authorization: Basic ...` value into username and password.
pub fn parse_basic(header: &str) -> Result<(String, String), AuthError> {
    let (scheme, encoded) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthHeader)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthError::InvalidAuthHeader);
    }

    let decoded = Base64::decode_vec(encoded.trim()).map_err(|_| AuthError::InvalidAuthHeader)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidAuthHeader)?;
    let (user, password) = decoded
        .split_once(':')
        .ok_or(AuthError::InvalidAuthHeader)?;

    Ok((user.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::basic_header;

    fn config() -> ManagementConfig {
        ManagementConfig {
            user: "admin".into(),
            password: "s3cret".into(),
            role: "MONITORING".into(),
            bcrypt_cost: 4,
        }
    }

    #[test]
    fn password_is_stored_as_bcrypt_hash() {
        let store = provision_user(config()).unwrap();
        assert_ne!(store.credential.password_hash, "s3cret");
        assert!(store.credential.password_hash.starts_with("$2"));
        assert!(!format!("{store:?}").contains("s3cret"));
        assert_eq!(store.username(), "admin");
        assert_eq!(store.role(), "MONITORING");
    }

    #[test]
    fn invalid_cost_is_a_config_error() {
        let mut cfg = config();
        cfg.bcrypt_cost = 99;
        assert!(matches!(
            provision_user(cfg),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[tokio::test]
    async fn authenticates_provisioned_user() {
        let store = provision_user(config()).unwrap();
        let credential = store.authenticate("admin", "s3cret".into()).await.unwrap();
        assert_eq!(credential.role, "MONITORING");
    }

    #[tokio::test]
    async fn rejects_wrong_password_and_unknown_user() {
        let store = provision_user(config()).unwrap();
        assert!(matches!(
            store.authenticate("admin", "nope".into()).await,
            Err(AuthError::BadCredentials)
        ));
        assert!(matches!(
            store.authenticate("root", "s3cret".into()).await,
            Err(AuthError::BadCredentials)
        ));
    }

    #[test]
    fn parses_basic_header() {
        let (user, password) = parse_basic(&basic_header("admin", "pa:ss")).unwrap();
        assert_eq!(user, "admin");
        assert_eq!(password, "pa:ss");
    }

    #[test]
    fn rejects_malformed_basic_headers() {
        assert!(parse_basic("Bearer abc").is_err());
        assert!(parse_basic("Basic").is_err());
        assert!(parse_basic("Basic !!!notbase64").is_err());
        // "admin" without a colon
        assert!(parse_basic("Basic YWRtaW4=").is_err());
    }
}
