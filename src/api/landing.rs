// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, response::Html};

use crate::auth::login::AUTHORIZATION_PATH;
use crate::auth::CurrentPrincipal;
use crate::state::AppState;

/// Landing page with one login link per registration.
#[utoipa::path(
    get,
    path = "/",
    tag = "Landing",
    responses((status = 200, description = "Landing page", content_type = "text/html", body = String))
)]
pub async fn landing(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Html<String> {
    let mut body = String::from("<!DOCTYPE html>\n<html><head><title>Todo List</title></head><body>\n<h1>Todo List</h1>\n");

    match &state.security.login {
        Some(login) if principal.is_anonymous() => {
            body.push_str("<p class=\"login-prompt\">Please log in to see your todo list.</p>\n<ul>\n");
            for id in login.registration_ids() {
                body.push_str(&format!(
                    "<li><a href=\"{AUTHORIZATION_PATH}{id}\">Log in with {id}</a></li>\n"
                ));
            }
            body.push_str("</ul>\n");
        }
        Some(_) => body.push_str("<p>You are logged in.</p>\n"),
        None => body.push_str("<p>Authentication is disabled; the list is shared.</p>\n"),
    }

    body.push_str("<p>API: <code>/api/v1/items</code></p>\n</body></html>\n");
    Html(body)
}
