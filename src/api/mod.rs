// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    error::ApiError,
    models::{CreateItemRequest, MeResponse, PrincipalKind, TodoItem},
    security::{chain::ChainSummary, security_filter},
    state::AppState,
};

pub mod health;
pub mod items;
pub mod landing;
pub mod manage;

/// Assemble every route behind the security filter.
///
/// The filter wraps the fallback too, so paths without a handler (the
/// OAuth2 login endpoints) are still claimed by their chain. CORS applies
/// to the routes of the protected resource chain only.
pub fn router(state: AppState) -> Router {
    let security = state.security.clone();

    let mut resources = Router::new()
        .route("/", get(landing::landing))
        .route(
            "/api/v1/items",
            get(items::list_items).post(items::create_item),
        )
        .route("/api/v1/items/{uid}", delete(items::delete_item))
        .route("/api/v1/me", get(items::me));
    if security.registry.cors_enabled() {
        resources = resources.layer(CorsLayer::permissive());
    }

    Router::new()
        .route("/manage/health", get(health::health))
        .route("/manage/health/liveness", get(health::liveness))
        .route("/manage/health/readiness", get(health::readiness))
        .route("/manage/prometheus", get(manage::prometheus))
        .route("/manage/info", get(manage::info))
        .route("/api-docs", get(manage::api_docs))
        .merge(resources)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(security, security_filter))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "basic",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        landing::landing,
        items::list_items,
        items::create_item,
        items::delete_item,
        items::me,
        health::health,
        health::liveness,
        health::readiness,
        manage::prometheus,
        manage::info,
        manage::api_docs
    ),
    components(
        schemas(
            TodoItem,
            CreateItemRequest,
            MeResponse,
            PrincipalKind,
            ChainSummary,
            manage::InfoResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::IssuerCheck,
            health::HealthResponse
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Landing", description = "Landing page"),
        (name = "Items", description = "Todo list items of the caller"),
        (name = "Management", description = "Health, metrics and service info")
    )
)]
pub struct ApiDoc;
