// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Signing-key status per trusted issuer.
    /// Only present while OAuth2 security is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuers: Option<Vec<IssuerCheck>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IssuerCheck {
    pub provider: String,
    /// "ok", or "not_cached" / "unavailable" depending on the endpoint
    pub keys: String,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

fn issuer_checks(status: Vec<(String, bool)>, missing: &'static str) -> Vec<IssuerCheck> {
    status
        .into_iter()
        .map(|(provider, cached)| IssuerCheck {
            provider,
            keys: if cached { "ok" } else { missing }.to_string(),
        })
        .collect()
}

/// Health check endpoint handler.
///
/// Reports cached key status only and never contacts an issuer, so an
/// unauthenticated caller cannot trigger outbound fetches.
#[utoipa::path(
    get,
    path = "/manage/health",
    tag = "Management",
    responses(
        (status = 200, description = "Service is running", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<ReadyResponse> {
    let issuers = match &state.security.authenticator {
        Some(authenticator) => Some(issuer_checks(authenticator.key_status().await, "not_cached")),
        None => None,
    };

    Json(ReadyResponse {
        status: "ok".to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            issuers,
        },
    })
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/manage/health/liveness",
    tag = "Management",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
///
/// Fetches keys that are not cached yet, all issuers at once, and returns 200
/// only once every trusted issuer's signing keys are available.
#[utoipa::path(
    get,
    path = "/manage/health/readiness",
    tag = "Management",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let issuers = match &state.security.authenticator {
        Some(authenticator) => {
            authenticator.warm_up().await;
            Some(issuer_checks(authenticator.key_status().await, "unavailable"))
        }
        None => None,
    };
    let all_ok = issuers
        .as_ref()
        .map(|checks| checks.iter().all(|c| c.keys == "ok"))
        .unwrap_or(true);

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            issuers,
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
