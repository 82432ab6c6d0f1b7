// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Authentication Router
//!
//! Ordered security chains, each owning a URL space and one authentication
//! strategy:
//!
//! | Order | Chain          | Paths                                              | Strategy              |
//! |-------|----------------|----------------------------------------------------|-----------------------|
//! | 1     | `oauth2-login` | `/oauth2/authorization/**`, `/login/oauth2/code/**` | OAuth2 redirect       |
//! | 2     | `management`   | `/manage/**`, `/api-docs`                          | Basic + role          |
//! | 3     | `api`          | `/**`                                              | Bearer, multi-issuer  |
//! | 3     | `open`         | `/**`                                              | Permit all            |
//!
//! `api` and `open` are mutually exclusive: `OAUTH2_SECURITY_ENABLED=false`
//! swaps the login and bearer chains for the open one. Everything is built
//! once at startup and shared read-only.

pub mod chain;
pub mod filter;
pub mod matcher;

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{
    provision_user, resolve_authenticator, CredentialStore, IssuerAuthenticator, LoginFlows,
    TrustedIssuerSet,
};
use crate::config::{ConfigError, SecurityConfig};
use crate::metrics::MetricsRegistry;

pub use chain::{build_chains, AuthStrategy, ChainRegistry, SecurityChain};
pub use filter::{security_filter, AuthDecision};

/// Everything the security filter needs, built once.
pub struct SecurityState {
    pub registry: ChainRegistry,
    /// Present only while OAuth2 security is enabled
    pub authenticator: Option<Arc<IssuerAuthenticator>>,
    pub credentials: CredentialStore,
    pub login: Option<LoginFlows>,
    pub metrics: Arc<MetricsRegistry>,
}

/// Build chains, trusted issuers and the management credential.
///
/// Fails when OAuth2 security is enabled without any trusted issuer: the
/// bearer chain would otherwise reject every request.
pub fn build_security(
    config: SecurityConfig,
    metrics: Arc<MetricsRegistry>,
) -> Result<SecurityState, ConfigError> {
    let registry = build_chains(&config)?;

    let (authenticator, login) = if config.oauth2_enabled {
        let trusted = TrustedIssuerSet::from_providers(&config.providers)?;
        if trusted.is_empty() {
            return Err(ConfigError::Inconsistent(
                "OAuth2 security is enabled but no trusted issuer is configured".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.jwks.fetch_timeout)
            .build()
            .map_err(|e| ConfigError::Inconsistent(format!("cannot build HTTP client: {e}")))?;
        let authenticator = Arc::new(resolve_authenticator(
            &trusted,
            config.audience.clone(),
            client.clone(),
            config.jwks,
        ));
        let login = LoginFlows::new(
            &trusted,
            &config.providers,
            authenticator.clone(),
            config.public_base_url.clone(),
            client,
        );
        if login.registration_ids().is_empty() {
            warn!("No provider has a client id; browser login is unavailable");
        }

        for (provider, issuer) in trusted.iter() {
            info!(provider, issuer, "Trusting token issuer");
        }
        (Some(authenticator), Some(login))
    } else {
        if !config.providers.is_empty() {
            info!("OAuth2 security disabled; configured providers are ignored");
        }
        (None, None)
    };

    let credentials = provision_user(config.management)?;

    for chain in registry.chains() {
        info!(
            chain = chain.name,
            order = chain.order,
            strategy = chain.strategy.kind(),
            "Security chain active"
        );
    }

    Ok(SecurityState {
        registry,
        authenticator,
        credentials,
        login,
        metrics,
    })
}
