// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth2 authorization-code login.
//!
//! ## Flow
//!
//! 1. `GET /oauth2/authorization/{registration}` creates a pending login
//!    keyed by a random `state`, binds that state to the browser with a
//!    cookie and redirects to the provider's authorization endpoint
//! 2. The provider redirects back to `/login/oauth2/code/{registration}`
//!    with `code` and `state`
//! 3. The state must match a live pending login for that registration and
//!    the browser's cookie; it is consumed either way
//! 4. The code is exchanged at the token endpoint and the returned ID token
//!    is verified against the provider's trusted issuer
//! 5. The access token must pass the same bearer verification the API applies
//!    and is handed to the success page in the URL fragment, which browsers
//!    never send back to a server
//!
//! Pending logins live for [`LOGIN_FLOW_TTL`] and are never shared between
//! flows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use super::claims::AuthenticatedUser;
use super::error::AuthError;
use super::issuer::{IssuerAuthenticator, TrustedIssuerSet};
use crate::config::{ProviderConfig, DEFAULT_SCOPE};

/// Path prefix that starts a login.
pub const AUTHORIZATION_PATH: &str = "/oauth2/authorization/";

/// Path prefix the provider redirects back to.
pub const CALLBACK_PATH: &str = "/login/oauth2/code/";

/// Fixed destination after every successful login.
pub const LOGIN_SUCCESS_URL: &str = "/callback";

/// Cookie binding a pending login to the browser that started it.
pub const LOGIN_STATE_COOKIE: &str = "TODO_LOGIN_STATE";

/// Lifetime of a pending login.
pub const LOGIN_FLOW_TTL: Duration = Duration::from_secs(600);

/// Client credentials for logging in through one provider.
#[derive(Clone)]
pub struct Registration {
    pub id: String,
    pub client_id: String,
    client_secret: String,
    pub scope: String,
}

struct PendingLogin {
    registration: String,
    created_at: Instant,
}

/// Where to send the browser, and the cookie to set on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub location: String,
    pub set_cookie: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// A finished login: the verified user and the bearer token the browser uses
/// against the API from now on.
///
/// No `Debug`, the token must not end up in logs.
pub struct CompletedLogin {
    pub user: AuthenticatedUser,
    pub access_token: String,
    pub expires_in: Option<u64>,
}

impl CompletedLogin {
    /// `success_url` with the access token in its fragment.
    pub fn success_location(&self, success_url: &str) -> String {
        let mut fragment = url::form_urlencoded::Serializer::new(String::new());
        fragment
            .append_pair("access_token", &self.access_token)
            .append_pair("token_type", "Bearer");
        if let Some(expires_in) = self.expires_in {
            fragment.append_pair("expires_in", &expires_in.to_string());
        }
        format!("{success_url}#{}", fragment.finish())
    }
}

/// Login registrations and the pending-login store.
pub struct LoginFlows {
    registrations: HashMap<String, Registration>,
    authenticator: Arc<IssuerAuthenticator>,
    public_base_url: String,
    pending: RwLock<HashMap<String, PendingLogin>>,
    client: reqwest::Client,
}

impl LoginFlows {
    /// Registrations are the trusted providers that carry a client id.
    pub fn new(
        trusted: &TrustedIssuerSet,
        providers: &HashMap<String, ProviderConfig>,
        authenticator: Arc<IssuerAuthenticator>,
        public_base_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        let registrations = trusted
            .iter()
            .filter_map(|(name, _)| {
                let provider = providers.get(name)?;
                let client_id = provider.client_id.clone()?;
                Some((
                    name.to_string(),
                    Registration {
                        id: name.to_string(),
                        client_id,
                        client_secret: provider.client_secret.clone().unwrap_or_default(),
                        scope: provider
                            .scope
                            .clone()
                            .unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
                    },
                ))
            })
            .collect();

        Self {
            registrations,
            authenticator,
            public_base_url: public_base_url.into(),
            pending: RwLock::new(HashMap::new()),
            client,
        }
    }

    /// Registration ids, sorted.
    pub fn registration_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.registrations.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    fn registration(&self, id: &str) -> Result<&Registration, AuthError> {
        self.registrations
            .get(id)
            .ok_or_else(|| AuthError::UnknownRegistration(id.to_string()))
    }

    fn redirect_uri(&self, registration: &str) -> String {
        format!("{}{CALLBACK_PATH}{registration}", self.public_base_url)
    }

    /// Start a login through `registration`.
    pub async fn begin(&self, registration: &str) -> Result<LoginRedirect, AuthError> {
        let reg = self.registration(registration)?;
        let endpoint = self
            .metadata_endpoint(registration, |m| m.authorization_endpoint)
            .await?;

        let state = Uuid::new_v4().simple().to_string();
        let mut location = Url::parse(&endpoint)
            .map_err(|e| AuthError::LoginFailed(format!("bad authorization endpoint: {e}")))?;
        location
            .query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &reg.client_id)
            .append_pair("scope", &reg.scope)
            .append_pair("state", &state)
            .append_pair("redirect_uri", &self.redirect_uri(registration));

        {
            let mut pending = self.pending.write().await;
            pending.retain(|_, p| p.created_at.elapsed() < LOGIN_FLOW_TTL);
            pending.insert(
                state.clone(),
                PendingLogin {
                    registration: registration.to_string(),
                    created_at: Instant::now(),
                },
            );
        }

        Ok(LoginRedirect {
            location: location.into(),
            set_cookie: state_cookie(&state, LOGIN_FLOW_TTL.as_secs()),
        })
    }

    /// Finish a login: validate state, exchange the code, verify both tokens.
    pub async fn complete(
        &self,
        registration: &str,
        code: Option<&str>,
        state: Option<&str>,
        cookie_state: Option<&str>,
    ) -> Result<CompletedLogin, AuthError> {
        let reg = self.registration(registration)?;
        let state = state.ok_or_else(|| AuthError::LoginFailed("missing state".into()))?;

        // Consume first so a state can never be replayed, even on failure.
        let pending = self.pending.write().await.remove(state);
        let pending = pending.ok_or_else(|| AuthError::LoginFailed("unknown state".into()))?;
        if pending.registration != registration
            || pending.created_at.elapsed() >= LOGIN_FLOW_TTL
            || cookie_state != Some(state)
        {
            warn!(registration, "Login callback state does not match pending login");
            return Err(AuthError::LoginFailed("state mismatch".into()));
        }

        let code = code.ok_or_else(|| AuthError::LoginFailed("missing code".into()))?;
        let token_endpoint = self
            .metadata_endpoint(registration, |m| m.token_endpoint)
            .await?;

        let redirect_uri = self.redirect_uri(registration);
        let response = self
            .client
            .post(&token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri.as_str()),
                ("client_id", reg.client_id.as_str()),
                ("client_secret", reg.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::LoginFailed(format!("token request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(AuthError::LoginFailed(format!(
                "token endpoint answered HTTP {}",
                response.status()
            )));
        }
        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::LoginFailed(format!("invalid token response: {e}")))?;

        let id_token = tokens
            .id_token
            .ok_or_else(|| AuthError::LoginFailed("token response has no id_token".into()))?;
        let user = self
            .authenticator
            .verify_id_token(&id_token, &reg.client_id)
            .await?;
        if user.provider != registration {
            return Err(AuthError::LoginFailed(format!(
                "id_token was issued by {} instead of {registration}",
                user.provider
            )));
        }

        let api_user = self
            .authenticator
            .authenticate(&tokens.access_token)
            .await
            .map_err(|e| AuthError::LoginFailed(format!("access token is not usable: {e}")))?;
        if api_user.user_id != user.user_id || api_user.issuer != user.issuer {
            return Err(AuthError::LoginFailed(
                "access token and id_token name different users".into(),
            ));
        }

        info!(provider = %user.provider, sub = %user.user_id, "OAuth2 login completed");
        Ok(CompletedLogin {
            user,
            access_token: tokens.access_token,
            expires_in: tokens.expires_in,
        })
    }

    async fn metadata_endpoint(
        &self,
        registration: &str,
        pick: impl FnOnce(super::jwks::ProviderMetadata) -> Option<String>,
    ) -> Result<String, AuthError> {
        let jwks = self
            .authenticator
            .jwks_for_provider(registration)
            .ok_or_else(|| AuthError::UnknownRegistration(registration.to_string()))?;
        let metadata = jwks.metadata().await?;
        pick(metadata).ok_or_else(|| {
            AuthError::LoginFailed(format!("provider {registration} does not advertise the endpoint"))
        })
    }

    #[cfg(test)]
    async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }
}

fn state_cookie(value: &str, max_age: u64) -> String {
    format!(
        "{LOGIN_STATE_COOKIE}={value}; Path={}; Max-Age={max_age}; HttpOnly; SameSite=Lax",
        CALLBACK_PATH.trim_end_matches('/')
    )
}

/// Cookie that removes the login state after the callback.
pub fn clear_state_cookie() -> String {
    state_cookie("", 0)
}

/// Read the login state cookie from a `Cookie` header value.
pub fn state_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == LOGIN_STATE_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
