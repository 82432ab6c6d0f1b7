// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Todo List Server - todo items behind OAuth2/JWT authentication
//!
//! Every request passes the Request Authentication Router, a small ordered
//! table of security chains, before it reaches a handler.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and router assembly (Axum)
//! - `auth` - Bearer JWT, OAuth2 login and Basic credential verification
//! - `security` - Chain table, request matchers and the security filter
//! - `store` - In-memory todo item store
//! - `metrics` - Counters exported in Prometheus text format

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod security;
pub mod state;
pub mod store;

#[cfg(test)]
mod test_support;
