// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request enforcement of the selected chain.
//!
//! The filter runs in front of every route. It selects the chain, produces
//! an [`AuthDecision`] and either forwards the request with the resulting
//! [`Principal`] in its extensions or answers on the chain's behalf.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE, LOCATION, SET_COOKIE, WWW_AUTHENTICATE},
        HeaderMap, HeaderValue, Method, StatusCode, Uri,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};

use super::chain::{AuthStrategy, SecurityChain};
use super::matcher::is_normalized;
use super::SecurityState;
use crate::auth::credentials::parse_basic;
use crate::auth::login::{clear_state_cookie, state_from_cookie_header, AUTHORIZATION_PATH, CALLBACK_PATH};
use crate::auth::{AuthError, Principal};
use crate::error::ApiError;

const DECISIONS_METRIC: &str = "security_decisions_total";
const BASIC_CHALLENGE: &str = "Basic realm=\"management\"";
const BEARER_CHALLENGE: &str = "Bearer";

/// Outcome of evaluating one request against its chain.
#[derive(Debug)]
pub enum AuthDecision {
    Allow(Principal),
    Redirect { to: String, set_cookie: String },
    Reject(AuthError),
}

impl AuthDecision {
    fn outcome(&self) -> &'static str {
        match self {
            AuthDecision::Allow(_) => "allow",
            AuthDecision::Redirect { .. } => "redirect",
            AuthDecision::Reject(_) => "reject",
        }
    }
}

impl SecurityState {
    /// Evaluate a request against `chain`.
    pub async fn decide(
        &self,
        chain: &SecurityChain,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> AuthDecision {
        let path = uri.path();
        let result = match &chain.strategy {
            AuthStrategy::PermitAll => Ok(AuthDecision::Allow(Principal::Anonymous)),
            AuthStrategy::Basic { required_role, .. } => {
                if chain.strategy.is_public(method, path) {
                    Ok(AuthDecision::Allow(Principal::Anonymous))
                } else {
                    self.basic(headers, required_role).await.map(AuthDecision::Allow)
                }
            }
            AuthStrategy::BearerMultiIssuer { .. } => {
                self.bearer(headers, chain.strategy.is_public(method, path))
                    .await
                    .map(AuthDecision::Allow)
            }
            AuthStrategy::OAuth2Redirect { success_url } => {
                self.oauth2(uri, headers, success_url).await
            }
        };
        result.unwrap_or_else(AuthDecision::Reject)
    }

    async fn basic(&self, headers: &HeaderMap, required_role: &str) -> Result<Principal, AuthError> {
        let header = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingCredentials)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;
        let (username, password) = parse_basic(header)?;

        let credential = self.credentials.authenticate(&username, password).await?;
        if credential.role != required_role {
            return Err(AuthError::InsufficientRole);
        }
        Ok(Principal::Management {
            username: credential.username.clone(),
            role: credential.role.clone(),
        })
    }

    /// A presented bearer token is always verified, even on public rules.
    /// Other schemes are ignored.
    async fn bearer(&self, headers: &HeaderMap, public: bool) -> Result<Principal, AuthError> {
        let token = match headers.get(AUTHORIZATION) {
            Some(value) => bearer_token(value)?,
            None => None,
        };

        match token {
            Some(token) => {
                let authenticator = self
                    .authenticator
                    .as_ref()
                    .ok_or_else(|| AuthError::InternalError("no issuer authenticator".into()))?;
                authenticator.authenticate(token).await.map(Principal::User)
            }
            None if public => Ok(Principal::Anonymous),
            None => Err(AuthError::MissingCredentials),
        }
    }

    async fn oauth2(
        &self,
        uri: &Uri,
        headers: &HeaderMap,
        success_url: &str,
    ) -> Result<AuthDecision, AuthError> {
        let login = self
            .login
            .as_ref()
            .ok_or_else(|| AuthError::InternalError("OAuth2 login is not configured".into()))?;
        let path = uri.path();

        if let Some(registration) = path.strip_prefix(AUTHORIZATION_PATH) {
            let redirect = login.begin(single_segment(registration)?).await?;
            info!(registration, "Redirecting to identity provider");
            return Ok(AuthDecision::Redirect {
                to: redirect.location,
                set_cookie: redirect.set_cookie,
            });
        }

        if let Some(registration) = path.strip_prefix(CALLBACK_PATH) {
            let registration = single_segment(registration)?;
            let mut code = None;
            let mut state = None;
            for (key, value) in url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes()) {
                match key.as_ref() {
                    "code" => code = Some(value.into_owned()),
                    "state" => state = Some(value.into_owned()),
                    "error" => {
                        return Err(AuthError::LoginFailed(format!(
                            "provider returned error {value}"
                        )))
                    }
                    _ => {}
                }
            }
            let cookie_state = headers
                .get_all(COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .find_map(state_from_cookie_header);

            let completed = login
                .complete(registration, code.as_deref(), state.as_deref(), cookie_state)
                .await?;
            return Ok(AuthDecision::Redirect {
                to: completed.success_location(success_url),
                set_cookie: clear_state_cookie(),
            });
        }

        Err(AuthError::UnknownRegistration(String::new()))
    }
}

fn single_segment(rest: &str) -> Result<&str, AuthError> {
    let segment = rest.strip_suffix('/').unwrap_or(rest);
    if segment.is_empty() || segment.contains('/') {
        return Err(AuthError::UnknownRegistration(rest.to_string()));
    }
    Ok(segment)
}

/// `Some(token)` for a `Bearer` header, `None` for any other scheme.
fn bearer_token(value: &HeaderValue) -> Result<Option<&str>, AuthError> {
    let value = value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = token.trim();
            if token.is_empty() {
                Err(AuthError::InvalidAuthHeader)
            } else {
                Ok(Some(token))
            }
        }
        _ => Ok(None),
    }
}

/// Axum middleware applying the chain registry to every request.
pub async fn security_filter(
    State(security): State<Arc<SecurityState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !is_normalized(&path) {
        warn!(path = %path, "Rejected non-normalized request path");
        return ApiError::NonNormalizedPath.into_response();
    }

    let method = request.method().clone();
    let Some(chain) = security.registry.select(&method, &path) else {
        return AuthError::InternalError("no security chain claims the request".into())
            .into_response();
    };

    let decision = security
        .decide(chain, &method, request.uri(), request.headers())
        .await;
    security
        .metrics
        .inc_counter(
            DECISIONS_METRIC,
            &[("chain", chain.name), ("outcome", decision.outcome())],
        )
        .await;

    match decision {
        AuthDecision::Allow(principal) => {
            debug!(chain = chain.name, %method, path = %path, "Request allowed");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        AuthDecision::Redirect { to, set_cookie } => {
            (StatusCode::FOUND, [(LOCATION, to), (SET_COOKIE, set_cookie)]).into_response()
        }
        AuthDecision::Reject(error) => {
            match &error {
                AuthError::MissingCredentials => {
                    debug!(chain = chain.name, %method, path = %path, "No credentials presented")
                }
                other => warn!(
                    chain = chain.name,
                    %method,
                    path = %path,
                    error_code = other.error_code(),
                    error = %other,
                    "Request rejected"
                ),
            }
            let challenge = match (&chain.strategy, error.status_code()) {
                (AuthStrategy::Basic { .. }, StatusCode::UNAUTHORIZED) => Some(BASIC_CHALLENGE),
                (AuthStrategy::BearerMultiIssuer { .. }, StatusCode::UNAUTHORIZED) => {
                    Some(BEARER_CHALLENGE)
                }
                _ => None,
            };
            let mut response = error.into_response();
            if let Some(challenge) = challenge {
                response
                    .headers_mut()
                    .insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
            }
            response
        }
    }
}
