// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive
//! `Serialize`/`Deserialize` and `ToSchema` for JSON handling and the
//! OpenAPI document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, Principal};

/// Longest accepted item text, in characters.
pub const MAX_ITEM_TEXT_LEN: usize = 1000;

// =============================================================================
// Todo Items
// =============================================================================

/// One entry of a caller's todo list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct TodoItem {
    pub uid: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateItemRequest {
    /// Item text; surrounding whitespace is trimmed
    pub text: String,
}

// =============================================================================
// Caller
// =============================================================================

/// How the caller was authenticated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    Anonymous,
    User,
    Management,
}

/// Response of `GET /api/v1/me`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub kind: PrincipalKind,
    /// Present for bearer-authenticated users
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthenticatedUser>,
    /// Present for the management user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl From<Principal> for MeResponse {
    fn from(principal: Principal) -> Self {
        match principal {
            Principal::Anonymous => MeResponse {
                kind: PrincipalKind::Anonymous,
                user: None,
                username: None,
            },
            Principal::User(user) => MeResponse {
                kind: PrincipalKind::User,
                user: Some(user),
                username: None,
            },
            Principal::Management { username, .. } => MeResponse {
                kind: PrincipalKind::Management,
                user: None,
                username: Some(username),
            },
        }
    }
}
