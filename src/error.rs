// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors of the todo API, rendered as `{ "error", "error_code" }` JSON.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::models::MAX_ITEM_TEXT_LEN;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("item text must not be empty")]
    EmptyItemText,

    #[error("item text must be at most {} characters", MAX_ITEM_TEXT_LEN)]
    ItemTextTooLong,

    /// Also returned for items owned by someone else.
    #[error("no item {0} in your list")]
    ItemNotFound(Uuid),

    #[error("no such route")]
    RouteNotFound,

    #[error("request path is not normalized")]
    NonNormalizedPath,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: &'static str,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::EmptyItemText | ApiError::ItemTextTooLong | ApiError::NonNormalizedPath => {
                StatusCode::BAD_REQUEST
            }
            ApiError::ItemNotFound(_) | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::EmptyItemText => "empty_item_text",
            ApiError::ItemTextTooLong => "item_text_too_long",
            ApiError::ItemNotFound(_) => "item_not_found",
            ApiError::RouteNotFound => "not_found",
            ApiError::NonNormalizedPath => "non_normalized_path",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.to_string(),
            error_code: self.error_code(),
        });
        (self.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn variants_map_to_status() {
        assert_eq!(ApiError::EmptyItemText.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::ItemTextTooLong.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::ItemNotFound(Uuid::nil()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::RouteNotFound.error_code(), "not_found");
        assert_eq!(
            ApiError::ItemTextTooLong.to_string(),
            format!("item text must be at most {MAX_ITEM_TEXT_LEN} characters")
        );
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::ItemNotFound(Uuid::nil()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(
            body,
            r#"{"error":"no item 00000000-0000-0000-0000-000000000000 in your list","error_code":"item_not_found"}"#
        );
    }
}
