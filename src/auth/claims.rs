// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and the principals attached to allowed requests.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims read from a bearer token issued by a trusted provider.
///
/// Only standard OIDC claims are used; provider-specific claims are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID at the issuer)
    pub sub: String,

    /// Expiration timestamp
    pub exp: i64,

    /// Issuer
    pub iss: String,

    /// Audience (validated by jsonwebtoken, not read directly)
    #[serde(default)]
    #[allow(dead_code)]
    pub aud: Option<serde_json::Value>,

    /// Display name (OIDC `name`)
    #[serde(default)]
    pub name: Option<String>,

    /// Email (OIDC `email`)
    #[serde(default)]
    pub email: Option<String>,

    /// Keycloak / Auth0 short login name
    #[serde(default)]
    pub preferred_username: Option<String>,
}

/// Authenticated user information extracted from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Subject at the issuer (`sub` claim)
    pub user_id: String,

    /// Provider name the issuer belongs to (`auth0`, `keycloak`)
    pub provider: String,

    /// Issuer URI the token was verified against
    pub issuer: String,

    /// Best available display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Email, when the token carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Create from verified claims.
    pub fn from_claims(claims: TokenClaims, provider: impl Into<String>) -> Self {
        let name = claims.name.or(claims.preferred_username);
        Self {
            user_id: claims.sub,
            provider: provider.into(),
            issuer: claims.iss,
            name,
            email: claims.email,
            expires_at: claims.exp,
        }
    }
}

/// Identity attached to a request the security filter allowed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    /// Public rule or open chain; no credential checked
    Anonymous,
    /// Bearer token from a trusted issuer
    User(AuthenticatedUser),
    /// Management user authenticated via HTTP Basic
    Management { username: String, role: String },
}

/// Owner key shared by all anonymous callers.
pub const ANONYMOUS_OWNER: &str = "anonymous";

impl Principal {
    /// Key under which this principal's data is stored.
    ///
    /// Subjects are only unique per issuer, so the issuer is part of the key.
    pub fn owner_key(&self) -> String {
        match self {
            Principal::Anonymous => ANONYMOUS_OWNER.to_string(),
            Principal::User(user) => format!("{}#{}", user.issuer, user.user_id),
            Principal::Management { username, .. } => format!("management#{username}"),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }
}
