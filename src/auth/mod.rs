// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Credential verification used by the security chains.
//!
//! ## Mechanisms
//!
//! - Bearer JWTs from any trusted issuer (`auth0`, `keycloak`). The `iss`
//!   claim selects the issuer, whose JWKS verifies the signature
//! - OAuth2 authorization-code login against the same issuers
//! - HTTP Basic for the single management user (bcrypt hashed)
//!
//! ## Security
//!
//! - Untrusted issuers are rejected before any network call
//! - JWKS is cached with TTL and fetched with a bounded timeout
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod issuer;
pub mod jwks;
pub mod login;

pub use claims::{AuthenticatedUser, Principal};
pub use credentials::{provision_user, CredentialStore};
pub use error::AuthError;
pub use extractor::CurrentPrincipal;
pub use issuer::{resolve_authenticator, IssuerAuthenticator, TrustedIssuerSet, PROVIDERS};
pub use jwks::JwksManager;
pub use login::LoginFlows;
