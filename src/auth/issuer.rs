// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trusted issuers and multi-issuer bearer token verification.
//!
//! Trust is an explicit allow-list: the issuer claim of an incoming token
//! selects the key source to verify it with, and a token naming any other
//! issuer is rejected before a key is ever looked up.

use std::collections::HashMap;

use jsonwebtoken::{decode, decode_header, Validation};
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::claims::{AuthenticatedUser, TokenClaims};
use super::error::AuthError;
use super::jwks::{JwksManager, JwksOptions};
use crate::config::{ConfigError, ProviderConfig};

/// Providers consulted when building trust, in lookup order.
pub const PROVIDERS: [&str; 2] = ["auth0", "keycloak"];

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Provider name to issuer URI, restricted to [`PROVIDERS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedIssuerSet {
    entries: Vec<(String, String)>,
}

impl TrustedIssuerSet {
    /// Filter the configured provider map down to the well-known providers.
    ///
    /// Absent providers are skipped. A well-known provider that is configured
    /// without an issuer URI is an error.
    pub fn from_providers(providers: &HashMap<String, ProviderConfig>) -> Result<Self, ConfigError> {
        let mut entries = Vec::new();
        for name in PROVIDERS {
            let Some(provider) = providers.get(name) else {
                continue;
            };
            let issuer = provider
                .issuer_uri
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    ConfigError::Inconsistent(format!("provider `{name}` has no issuer URI"))
                })?;
            if entries.iter().any(|(_, existing)| existing == issuer) {
                return Err(ConfigError::Inconsistent(format!(
                    "issuer `{issuer}` is configured for more than one provider"
                )));
            }
            entries.push((name.to_string(), issuer.to_string()));
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `(provider, issuer)` pairs in lookup order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, i)| (p.as_str(), i.as_str()))
    }

    pub fn issuer_for(&self, provider: &str) -> Option<&str> {
        self.iter().find(|(p, _)| *p == provider).map(|(_, i)| i)
    }
}

struct TrustedIssuer {
    provider: String,
    jwks: JwksManager,
}

/// Verifies bearer tokens against whichever trusted issuer signed them.
pub struct IssuerAuthenticator {
    /// Keyed by exact issuer URI
    issuers: HashMap<String, TrustedIssuer>,
    audience: Option<String>,
}

/// Build the authenticator for a trusted issuer set.
///
/// Each issuer gets its own key source; all of them share one HTTP client.
pub fn resolve_authenticator(
    trusted: &TrustedIssuerSet,
    audience: Option<String>,
    client: reqwest::Client,
    options: JwksOptions,
) -> IssuerAuthenticator {
    let issuers = trusted
        .iter()
        .map(|(provider, issuer)| {
            (
                issuer.to_string(),
                TrustedIssuer {
                    provider: provider.to_string(),
                    jwks: JwksManager::new(issuer, client.clone(), options),
                },
            )
        })
        .collect();

    IssuerAuthenticator { issuers, audience }
}

/// Only the issuer is read before the signature is checked.
#[derive(Deserialize)]
struct UnverifiedIssuer {
    #[serde(default)]
    iss: Option<String>,
}

impl IssuerAuthenticator {
    /// Verify a bearer token using the configured audience policy.
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.verify(token, self.audience.as_deref()).await
    }

    /// Verify an OIDC ID token, whose audience is the login client.
    pub async fn verify_id_token(
        &self,
        token: &str,
        client_id: &str,
    ) -> Result<AuthenticatedUser, AuthError> {
        self.verify(token, Some(client_id)).await
    }

    async fn verify(
        &self,
        token: &str,
        audience: Option<&str>,
    ) -> Result<AuthenticatedUser, AuthError> {
        let unverified = jsonwebtoken::dangerous::insecure_decode::<UnverifiedIssuer>(token)
            .map_err(|_| AuthError::MalformedToken)?;
        let issuer = unverified.claims.iss.ok_or(AuthError::MalformedToken)?;

        let Some(trusted) = self.issuers.get(&issuer) else {
            warn!(issuer = %issuer, "Rejected token from untrusted issuer");
            return Err(AuthError::UntrustedIssuer(issuer));
        };

        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        let (decoding_key, algorithm) = match &header.kid {
            Some(kid) => trusted.jwks.get_decoding_key(kid).await?,
            None => trusted.jwks.get_any_decoding_key().await?,
        };
        if header.alg != algorithm {
            return Err(AuthError::InvalidSignature);
        }

        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[trusted.jwks.issuer()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let token_data =
            decode::<TokenClaims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    AuthError::UntrustedIssuer(issuer.clone())
                }
                jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                _ => AuthError::MalformedToken,
            })?;

        debug!(provider = %trusted.provider, sub = %token_data.claims.sub, "Bearer token verified");
        Ok(AuthenticatedUser::from_claims(
            token_data.claims,
            trusted.provider.clone(),
        ))
    }

    /// Key source of a provider, if that provider is trusted.
    pub fn jwks_for_provider(&self, provider: &str) -> Option<&JwksManager> {
        self.issuers
            .values()
            .find(|t| t.provider == provider)
            .map(|t| &t.jwks)
    }

    /// `(provider, keys cached)` per trusted issuer, sorted by provider.
    pub async fn key_status(&self) -> Vec<(String, bool)> {
        let mut status = Vec::with_capacity(self.issuers.len());
        for trusted in self.issuers.values() {
            status.push((trusted.provider.clone(), trusted.jwks.is_cached().await));
        }
        status.sort();
        status
    }

    /// Refresh keys of every issuer that has none cached, all issuers at once.
    ///
    /// Returns the providers whose keys could not be fetched.
    pub async fn warm_up(&self) -> Vec<String> {
        let mut fetches = JoinSet::new();
        for trusted in self.issuers.values() {
            if trusted.jwks.is_cached().await {
                continue;
            }
            let provider = trusted.provider.clone();
            let jwks = trusted.jwks.clone();
            fetches.spawn(async move { (provider, jwks.refresh().await) });
        }

        let mut failed = Vec::new();
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((provider, Err(e))) => {
                    warn!(provider = %provider, error = %e, "Could not fetch signing keys");
                    failed.push(provider);
                }
                Err(e) => warn!(error = %e, "Signing key fetch task failed"),
            }
        }
        failed.sort();
        failed
    }
}
