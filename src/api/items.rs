// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::CurrentPrincipal,
    error::ApiError,
    models::{CreateItemRequest, MeResponse, TodoItem},
    state::AppState,
};

const ITEM_OPERATIONS_METRIC: &str = "todo_item_operations_total";

#[utoipa::path(
    get,
    path = "/api/v1/items",
    tag = "Items",
    security(("bearer" = [])),
    responses(
        (status = 200, body = [TodoItem]),
        (status = 401, description = "Missing or invalid bearer token")
    )
)]
pub async fn list_items(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<TodoItem>>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(store.list_items(&principal.owner_key())))
}

#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = CreateItemRequest,
    tag = "Items",
    security(("bearer" = [])),
    responses(
        (status = 201, body = TodoItem),
        (status = 400, description = "Empty or oversized text"),
        (status = 401, description = "Missing or invalid bearer token")
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<TodoItem>), ApiError> {
    let item = {
        let mut store = state.store.write().await;
        store.create_item(&principal.owner_key(), request)?
    };
    state
        .metrics
        .inc_counter(ITEM_OPERATIONS_METRIC, &[("operation", "create")])
        .await;
    info!(uid = %item.uid, "Created todo item");
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/items/{uid}",
    params(
        ("uid" = Uuid, Path, description = "Identifier of the item to delete")
    ),
    tag = "Items",
    security(("bearer" = [])),
    responses(
        (status = 204),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such item for this caller")
    )
)]
pub async fn delete_item(
    Path(uid): Path<Uuid>,
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<StatusCode, ApiError> {
    {
        let mut store = state.store.write().await;
        store.delete_item(&principal.owner_key(), uid)?;
    }
    state
        .metrics
        .inc_counter(ITEM_OPERATIONS_METRIC, &[("operation", "delete")])
        .await;
    info!(%uid, "Deleted todo item");
    Ok(StatusCode::NO_CONTENT)
}

/// The caller as seen by the security filter.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "Items",
    security(("bearer" = [])),
    responses(
        (status = 200, body = MeResponse),
        (status = 401, description = "Missing or invalid bearer token")
    )
)]
pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Json<MeResponse> {
    Json(principal.into())
}
