// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Every variant except `InsufficientRole` and `InternalError` means the
/// caller is unauthenticated and maps to 401. Key-source failures are
/// deliberately 401 as well: a request whose token cannot be checked is
/// rejected, never let through.
#[derive(Debug)]
pub enum AuthError {
    /// No credential was presented
    MissingCredentials,
    /// Authorization header present but not in the expected scheme/format
    InvalidAuthHeader,
    /// Token is malformed
    MalformedToken,
    /// Token signature is invalid
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// Token was issued by an issuer outside the trusted set
    UntrustedIssuer(String),
    /// Token audience is invalid
    InvalidAudience,
    /// Token is not yet valid
    TokenNotYetValid,
    /// Discovery document or JWKS could not be fetched in time
    KeySourceUnavailable(String),
    /// No matching key in JWKS
    NoMatchingKey,
    /// JWKS key uses an unsupported key type
    UnsupportedKey,
    /// Basic credentials do not match the provisioned user
    BadCredentials,
    /// Authenticated, but without the role the chain requires
    InsufficientRole,
    /// Login requested for a provider that has no client registration
    UnknownRegistration(String),
    /// OAuth2 login callback could not be completed
    LoginFailed(String),
    /// Internal error
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::UntrustedIssuer(_) => "untrusted_issuer",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::KeySourceUnavailable(_) => "key_source_unavailable",
            AuthError::NoMatchingKey => "no_matching_key",
            AuthError::UnsupportedKey => "unsupported_key",
            AuthError::BadCredentials => "bad_credentials",
            AuthError::InsufficientRole => "insufficient_role",
            AuthError::UnknownRegistration(_) => "unknown_registration",
            AuthError::LoginFailed(_) => "login_failed",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "Authentication is required"),
            AuthError::InvalidAuthHeader => write!(f, "Invalid authorization header format"),
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::UntrustedIssuer(iss) => write!(f, "Token issuer `{iss}` is not trusted"),
            AuthError::InvalidAudience => write!(f, "Token audience is invalid"),
            AuthError::TokenNotYetValid => write!(f, "Token is not yet valid"),
            AuthError::KeySourceUnavailable(msg) => {
                write!(f, "Signing keys are unavailable: {msg}")
            }
            AuthError::NoMatchingKey => write!(f, "No matching key found in JWKS"),
            AuthError::UnsupportedKey => write!(f, "Signing key type is not supported"),
            AuthError::BadCredentials => write!(f, "Bad credentials"),
            AuthError::InsufficientRole => {
                write!(f, "Insufficient permissions for this operation")
            }
            AuthError::UnknownRegistration(id) => {
                write!(f, "No login registration named `{id}`")
            }
            AuthError::LoginFailed(msg) => write!(f, "Login failed: {msg}"),
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_credentials_returns_401() {
        let response = AuthError::MissingCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_credentials");
    }

    #[test]
    fn untrusted_issuer_and_key_outage_fail_closed() {
        assert_eq!(
            AuthError::UntrustedIssuer("https://evil.example.com".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::KeySourceUnavailable("timeout".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn insufficient_role_returns_403() {
        let response = AuthError::InsufficientRole.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
