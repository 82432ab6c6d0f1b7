// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for in-crate tests: signing keys, a loopback identity
//! provider and configuration builders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::auth::jwks::JwksOptions;
use crate::config::{ManagementConfig, ProviderConfig, SecurityConfig};

pub const TEST_KID: &str = "test-key-1";
pub const CLIENT_ID: &str = "todo-client";
pub const CLIENT_SECRET: &str = "todo-secret";
pub const GOOD_CODE: &str = "good-code";
pub const MANAGEMENT_USER: &str = "admin";
pub const MANAGEMENT_PASSWORD: &str = "s3cret";
pub const MANAGEMENT_ROLE: &str = "MONITORING";
pub const PUBLIC_BASE_URL: &str = "http://localhost:8080";

const SIGNING_KEY_PEM: &str = include_str!("testdata/idp_signing_key.pem");
const FOREIGN_KEY_PEM: &str = include_str!("testdata/foreign_signing_key.pem");

/// Base64url modulus of `idp_signing_key.pem`.
const SIGNING_KEY_N: &str = "tWF6BbiIZ9WWL5PxfDvEK61woVv7crO0u9z0BR-EzDB0ieinQAxHOjpZq2kPjDI8lKtDbQM5O9IaMnmq5HMggnN0QQE-pJN38HJGeDUIL6IoeSDNy6EC2EC2P2BEYlpS4C_3icDnB8w3jlg5rc1O5K6Q5My14Xt2i-TE0xwyJ6hd2kHYm-qt5BVq2OF5_MEh7yGiBpqNUdguQzsDTfPIh9SEbSku5T6b0aC5THta_PtECsLJ8HXSM_q-Dj49O31NNG42-swwkx7wdh6J36QhwoGhfG-izm4t9rsP9xuXL2hqYpWZxmAo8mmSpS2vIXaXEx8OezDkpYal--fMwt_mtQ";
const SIGNING_KEY_E: &str = "AQAB";

struct IdpState {
    issuer: String,
    delay: Duration,
    jwks_hits: AtomicUsize,
    token_requests: Mutex<Vec<HashMap<String, String>>>,
}

/// Identity provider served from a loopback port: discovery, JWKS and a
/// token endpoint that accepts [`GOOD_CODE`].
pub struct MockIdp {
    pub issuer: String,
    state: Arc<IdpState>,
    handle: JoinHandle<()>,
}

impl MockIdp {
    pub async fn start() -> Self {
        Self::start_with_delay(Duration::ZERO).await
    }

    /// Start a provider whose discovery endpoint stalls for `delay`.
    pub async fn start_with_delay(delay: Duration) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let issuer = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(IdpState {
            issuer: issuer.clone(),
            delay,
            jwks_hits: AtomicUsize::new(0),
            token_requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/.well-known/openid-configuration", get(discovery))
            .route("/jwks", get(jwks))
            .route("/token", post(token))
            .with_state(state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            issuer,
            state,
            handle,
        }
    }

    pub fn jwks_hits(&self) -> usize {
        self.state.jwks_hits.load(Ordering::SeqCst)
    }

    pub fn last_token_request(&self) -> Option<HashMap<String, String>> {
        self.state.token_requests.lock().unwrap().last().cloned()
    }

    /// Access token for `subject`, signed with the provider's published key.
    pub fn token(&self, subject: &str) -> String {
        sign(&claims(&self.issuer, subject, None), TEST_KID, SIGNING_KEY_PEM)
    }
}

impl Drop for MockIdp {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn discovery(State(state): State<Arc<IdpState>>) -> Json<Value> {
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    Json(json!({
        "issuer": state.issuer,
        "jwks_uri": format!("{}/jwks", state.issuer),
        "authorization_endpoint": format!("{}/authorize", state.issuer),
        "token_endpoint": format!("{}/token", state.issuer),
    }))
}

async fn jwks(State(state): State<Arc<IdpState>>) -> Json<Value> {
    state.jwks_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "keys": [{
            "kty": "RSA",
            "kid": TEST_KID,
            "use": "sig",
            "alg": "RS256",
            "n": SIGNING_KEY_N,
            "e": SIGNING_KEY_E,
        }]
    }))
}

async fn token(
    State(state): State<Arc<IdpState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.token_requests.lock().unwrap().push(form.clone());

    let valid = form.get("grant_type").map(String::as_str) == Some("authorization_code")
        && form.get("code").map(String::as_str) == Some(GOOD_CODE)
        && form.get("client_id").map(String::as_str) == Some(CLIENT_ID)
        && form.get("client_secret").map(String::as_str) == Some(CLIENT_SECRET);
    if !valid {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response();
    }

    Json(json!({
        "access_token": sign(&claims(&state.issuer, "login-user", None), TEST_KID, SIGNING_KEY_PEM),
        "id_token": sign(&claims(&state.issuer, "login-user", Some(CLIENT_ID)), TEST_KID, SIGNING_KEY_PEM),
        "token_type": "Bearer",
        "expires_in": 3600,
    }))
    .into_response()
}

/// Standard claims valid for one hour.
pub fn claims(issuer: &str, subject: &str, audience: Option<&str>) -> Value {
    let now = chrono::Utc::now().timestamp();
    let mut claims = json!({
        "sub": subject,
        "iss": issuer,
        "iat": now,
        "exp": now + 3600,
        "preferred_username": subject,
    });
    if let Some(aud) = audience {
        claims["aud"] = json!(aud);
    }
    claims
}

pub fn sign(claims: &Value, kid: &str, pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

/// Sign arbitrary claims with the provider's published key.
pub fn idp_signed(claims: &Value) -> String {
    sign(claims, TEST_KID, SIGNING_KEY_PEM)
}

/// Token whose claims name `issuer` but which is signed with a key the
/// provider never published.
pub fn forged_token(issuer: &str, subject: &str) -> String {
    sign(&claims(issuer, subject, None), TEST_KID, FOREIGN_KEY_PEM)
}

/// Correctly signed token that expired an hour ago.
pub fn expired_token(issuer: &str, subject: &str) -> String {
    let mut claims = claims(issuer, subject, None);
    let now = chrono::Utc::now().timestamp();
    claims["iat"] = json!(now - 7200);
    claims["exp"] = json!(now - 3600);
    sign(&claims, TEST_KID, SIGNING_KEY_PEM)
}

/// Security configuration trusting `keycloak` at `issuer` (when given).
pub fn security_config(issuer: Option<&str>, oauth2_enabled: bool) -> SecurityConfig {
    let mut providers = HashMap::new();
    if let Some(issuer) = issuer {
        providers.insert(
            "keycloak".to_string(),
            ProviderConfig {
                issuer_uri: Some(issuer.to_string()),
                client_id: Some(CLIENT_ID.to_string()),
                client_secret: Some(CLIENT_SECRET.to_string()),
                scope: None,
            },
        );
    }

    SecurityConfig {
        oauth2_enabled,
        providers,
        audience: None,
        public_base_url: PUBLIC_BASE_URL.to_string(),
        management: ManagementConfig {
            user: MANAGEMENT_USER.to_string(),
            password: MANAGEMENT_PASSWORD.to_string(),
            role: MANAGEMENT_ROLE.to_string(),
            bcrypt_cost: 4,
        },
        jwks: JwksOptions {
            cache_ttl: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(2),
        },
    }
}

pub fn basic_header(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

pub fn bearer_header(token: &str) -> String {
    format!("Bearer {token}")
}
