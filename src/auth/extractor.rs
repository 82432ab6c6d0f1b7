// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the principal attached by the security filter.
//!
//! Handlers never authenticate on their own. They read the [`Principal`]
//! the filter inserted into the request extensions:
//!
//! ```rust,ignore
//! async fn my_handler(CurrentPrincipal(principal): CurrentPrincipal) -> impl IntoResponse {
//!     // principal.owner_key() scopes per-caller data
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, Principal};

/// The principal the security filter decided on.
///
/// Rejects with `MissingCredentials` if the route was mounted without the
/// filter, which is a wiring mistake rather than a client error.
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or(AuthError::MissingCredentials)
    }
}
