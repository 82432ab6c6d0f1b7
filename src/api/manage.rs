// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::State,
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use super::ApiDoc;
use crate::auth::CurrentPrincipal;
use crate::security::chain::ChainSummary;
use crate::state::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Serialize, ToSchema)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub oauth2_enabled: bool,
    /// Providers usable for browser login
    pub registrations: Vec<String>,
    /// Active security chains in evaluation order
    pub chains: Vec<ChainSummary>,
}

/// Metrics in Prometheus text exposition format.
#[utoipa::path(
    get,
    path = "/manage/prometheus",
    tag = "Management",
    responses((status = 200, description = "Prometheus metrics", content_type = "text/plain", body = String))
)]
pub async fn prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let total = state.store.read().await.total_items();
    state.metrics.set_gauge("todo_items", &[], total as u64).await;

    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.metrics.to_prometheus().await)
}

/// Application version and the active chain table.
#[utoipa::path(
    get,
    path = "/manage/info",
    tag = "Management",
    security(("basic" = [])),
    responses(
        (status = 200, body = InfoResponse),
        (status = 401, description = "Missing or wrong management credentials"),
        (status = 403, description = "Management user lacks the required role")
    )
)]
pub async fn info(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Json<InfoResponse> {
    tracing::debug!(owner = %principal.owner_key(), "Serving management info");
    let security = &state.security;
    Json(InfoResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        oauth2_enabled: security.authenticator.is_some(),
        registrations: security
            .login
            .as_ref()
            .map(|l| l.registration_ids().into_iter().map(String::from).collect())
            .unwrap_or_default(),
        chains: security.registry.summary(),
    })
}

/// OpenAPI document.
#[utoipa::path(
    get,
    path = "/api-docs",
    tag = "Management",
    responses((status = 200, description = "OpenAPI JSON"))
)]
pub async fn api_docs() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
