// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-issuer OIDC discovery and JWKS fetching/caching.
//!
//! ## Behaviour
//!
//! - Provider metadata is discovered from `{issuer}/.well-known/openid-configuration`
//!   and must name the same issuer it was fetched for
//! - Keys are cached per issuer with a configurable TTL
//! - A key lookup is bounded by `fetch_timeout` as a whole, including the wait
//!   for another task's fetch; a stalled provider fails the request instead of
//!   hanging it
//! - Tasks that queue behind an in-flight fetch take its outcome, so a failed
//!   fetch fails every waiter at once instead of being retried by each
//! - Each issuer has its own cache and refresh lock, so a slow provider never
//!   delays token checks against another one
//! - An unknown `kid` forces one refresh (key rotation), at most once per
//!   [`MIN_FORCED_REFRESH_INTERVAL`]

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::error::AuthError;

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default bound on a single discovery or JWKS fetch.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Lower bound between refreshes triggered by an unknown `kid`.
pub const MIN_FORCED_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Cache and timeout policy shared by all issuers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JwksOptions {
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
}

impl Default for JwksOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Subset of the OIDC discovery document this service needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
}

/// JWKS cache entry.
struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Signing-key source for one trusted issuer.
#[derive(Clone)]
pub struct JwksManager {
    /// Issuer URI exactly as configured
    issuer: String,
    options: JwksOptions,
    metadata: Arc<RwLock<Option<ProviderMetadata>>>,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// Serializes fetches so concurrent misses trigger a single request
    refresh_lock: Arc<Mutex<()>>,
    /// When the last fetch failed, and why
    last_failure: Arc<RwLock<Option<(Instant, String)>>>,
    last_forced_refresh: Arc<Mutex<Option<Instant>>>,
    client: reqwest::Client,
}

impl JwksManager {
    /// Create a manager for `issuer` sharing the given HTTP client.
    pub fn new(issuer: impl Into<String>, client: reqwest::Client, options: JwksOptions) -> Self {
        Self {
            issuer: issuer.into(),
            options,
            metadata: Arc::new(RwLock::new(None)),
            cache: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
            last_failure: Arc::new(RwLock::new(None)),
            last_forced_refresh: Arc::new(Mutex::new(None)),
            client,
        }
    }

    /// Issuer URI this manager serves keys for.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Discovery document URL for this issuer.
    pub fn discovery_url(&self) -> String {
        format!("{}{DISCOVERY_PATH}", self.issuer.trim_end_matches('/'))
    }

    /// Provider metadata, fetched once and then kept for the process lifetime.
    pub async fn metadata(&self) -> Result<ProviderMetadata, AuthError> {
        if let Some(metadata) = &*self.metadata.read().await {
            return Ok(metadata.clone());
        }

        let metadata: ProviderMetadata = self
            .bounded(self.get_json(self.discovery_url()))
            .await?;

        if metadata.issuer != self.issuer {
            warn!(
                configured = %self.issuer,
                advertised = %metadata.issuer,
                "Discovery document names a different issuer"
            );
            return Err(AuthError::KeySourceUnavailable(format!(
                "discovery document for {} advertises issuer {}",
                self.issuer, metadata.issuer
            )));
        }

        *self.metadata.write().await = Some(metadata.clone());
        Ok(metadata)
    }

    /// Fetch JWKS (with caching).
    async fn get_jwks(&self) -> Result<JwkSet, AuthError> {
        if let Some(jwks) = self.cached().await {
            return Ok(jwks);
        }
        self.fetch_or_join(false).await
    }

    async fn cached(&self) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.options.cache_ttl)
            .map(|entry| entry.jwks.clone())
    }

    /// Key set fetched after `since`, or any fresh one unless `force` is set.
    async fn fetched_since(&self, since: Instant, force: bool) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|entry| {
                entry.fetched_at >= since
                    || (!force && entry.fetched_at.elapsed() < self.options.cache_ttl)
            })
            .map(|entry| entry.jwks.clone())
    }

    async fn failed_since(&self, since: Instant) -> Option<String> {
        self.last_failure
            .read()
            .await
            .as_ref()
            .filter(|(at, _)| *at >= since)
            .map(|(_, reason)| reason.clone())
    }

    /// Fetch a key set, or take the outcome of the fetch already in flight.
    ///
    /// Lock wait and fetch share one `fetch_timeout` deadline.
    async fn fetch_or_join(&self, force: bool) -> Result<JwkSet, AuthError> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.options.fetch_timeout;

        let _guard = tokio::time::timeout_at(deadline, self.refresh_lock.lock())
            .await
            .map_err(|_| self.timed_out())?;

        if let Some(jwks) = self.fetched_since(started, force).await {
            return Ok(jwks);
        }
        if let Some(reason) = self.failed_since(started).await {
            debug!(issuer = %self.issuer, "Joined a failed JWKS fetch");
            return Err(AuthError::KeySourceUnavailable(reason));
        }

        let result = tokio::time::timeout_at(deadline, self.refresh_locked())
            .await
            .unwrap_or_else(|_| Err(self.timed_out()));
        if let Err(e) = &result {
            let reason = match e {
                AuthError::KeySourceUnavailable(reason) => reason.clone(),
                other => other.to_string(),
            };
            *self.last_failure.write().await = Some((Instant::now(), reason));
        }
        result
    }

    /// Fetch and store a fresh key set. Caller holds `refresh_lock`.
    async fn refresh_locked(&self) -> Result<JwkSet, AuthError> {
        let metadata = self.metadata().await?;
        let jwks: JwkSet = self.bounded(self.get_json(metadata.jwks_uri)).await?;
        debug!(issuer = %self.issuer, keys = jwks.keys.len(), "Fetched JWKS");

        *self.cache.write().await = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });
        Ok(jwks)
    }

    /// Force refresh the JWKS cache.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        self.fetch_or_join(true).await.map(|_| ())
    }

    /// Check if JWKS is currently cached and valid.
    pub async fn is_cached(&self) -> bool {
        self.cached().await.is_some()
    }

    /// Get a decoding key for the given key ID.
    ///
    /// A miss against a cached set refreshes once, so rotated keys are picked
    /// up without waiting for the TTL.
    pub async fn get_decoding_key(&self, kid: &str) -> Result<(DecodingKey, Algorithm), AuthError> {
        let jwks = self.get_jwks().await?;
        if let Some(jwk) = find_key(&jwks, kid) {
            return jwk_to_decoding_key(jwk);
        }

        if !self.claim_forced_refresh().await {
            return Err(AuthError::NoMatchingKey);
        }

        debug!(issuer = %self.issuer, kid, "Unknown key id, refreshing JWKS");
        let jwks = self.fetch_or_join(true).await?;
        find_key(&jwks, kid)
            .ok_or(AuthError::NoMatchingKey)
            .and_then(jwk_to_decoding_key)
    }

    /// Get any valid decoding key (for tokens without kid).
    pub async fn get_any_decoding_key(&self) -> Result<(DecodingKey, Algorithm), AuthError> {
        let jwks = self.get_jwks().await?;

        for jwk in &jwks.keys {
            if let Ok(result) = jwk_to_decoding_key(jwk) {
                return Ok(result);
            }
        }

        Err(AuthError::NoMatchingKey)
    }

    async fn claim_forced_refresh(&self) -> bool {
        let mut last = self.last_forced_refresh.lock().await;
        match *last {
            Some(at) if at.elapsed() < MIN_FORCED_REFRESH_INTERVAL => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    async fn bounded<T>(
        &self,
        fetch: impl Future<Output = Result<T, AuthError>>,
    ) -> Result<T, AuthError> {
        tokio::time::timeout(self.options.fetch_timeout, fetch)
            .await
            .unwrap_or_else(|_| Err(self.timed_out()))
    }

    fn timed_out(&self) -> AuthError {
        warn!(
            issuer = %self.issuer,
            timeout_ms = self.options.fetch_timeout.as_millis() as u64,
            "Key source fetch timed out"
        );
        AuthError::KeySourceUnavailable(format!("timed out contacting {}", self.issuer))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, AuthError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::KeySourceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeySourceUnavailable(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::KeySourceUnavailable(e.to_string()))
    }
}

fn find_key<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .find(|k| k.common.key_id.as_deref() == Some(kid))
}

/// Convert a JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), AuthError> {
    use jsonwebtoken::jwk::KeyAlgorithm;

    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|_| AuthError::UnsupportedKey)?;
            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                Some(KeyAlgorithm::PS256) => Algorithm::PS256,
                _ => Algorithm::RS256,
            };
            Ok((key, alg))
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|_| AuthError::UnsupportedKey)?;
            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::ES384) => Algorithm::ES384,
                _ => Algorithm::ES256,
            };
            Ok((key, alg))
        }
        // Symmetric keys have no place in a public key set.
        _ => Err(AuthError::UnsupportedKey),
    }
}
