// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Security chains and the ordered registry that selects one per request.

use axum::http::Method;
use serde::Serialize;
use utoipa::ToSchema;

use super::matcher::RequestMatcher;
use crate::auth::login::{AUTHORIZATION_PATH, CALLBACK_PATH, LOGIN_SUCCESS_URL};
use crate::config::{ConfigError, SecurityConfig};

pub const OAUTH2_LOGIN_CHAIN: &str = "oauth2-login";
pub const MANAGEMENT_CHAIN: &str = "management";
pub const OPEN_CHAIN: &str = "open";
pub const API_CHAIN: &str = "api";

/// How a chain authenticates the requests it claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Drives the OAuth2 login; success always lands on `success_url`
    OAuth2Redirect { success_url: String },
    /// HTTP Basic against the management credential
    Basic {
        public: Vec<RequestMatcher>,
        required_role: String,
    },
    /// Bearer JWT from any trusted issuer
    BearerMultiIssuer { public: Vec<RequestMatcher> },
    PermitAll,
}

impl AuthStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthStrategy::OAuth2Redirect { .. } => "oauth2_redirect",
            AuthStrategy::Basic { .. } => "basic",
            AuthStrategy::BearerMultiIssuer { .. } => "bearer_multi_issuer",
            AuthStrategy::PermitAll => "permit_all",
        }
    }

    /// Rules inside the chain that need no credential.
    pub fn public_rules(&self) -> &[RequestMatcher] {
        match self {
            AuthStrategy::Basic { public, .. } | AuthStrategy::BearerMultiIssuer { public } => {
                public
            }
            AuthStrategy::OAuth2Redirect { .. } | AuthStrategy::PermitAll => &[],
        }
    }

    pub fn is_public(&self, method: &Method, path: &str) -> bool {
        self.public_rules().iter().any(|m| m.matches(method, path))
    }
}

#[derive(Debug, Clone)]
pub struct SecurityChain {
    pub name: &'static str,
    /// Lower orders are evaluated first
    pub order: u32,
    pub matchers: Vec<RequestMatcher>,
    pub strategy: AuthStrategy,
    /// Cross-origin requests allowed for this chain
    pub cors: bool,
}

impl SecurityChain {
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(method, path))
    }

    pub fn is_catch_all(&self) -> bool {
        self.matchers.iter().any(RequestMatcher::is_catch_all)
    }
}

/// One row of the chain table, as reported by `/manage/info`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChainSummary {
    pub name: String,
    pub order: u32,
    pub matchers: Vec<String>,
    pub strategy: String,
    pub public: Vec<String>,
    pub cors: bool,
}

/// Immutable, order-sorted set of chains with exactly one catch-all.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<SecurityChain>,
}

impl ChainRegistry {
    pub fn new(mut chains: Vec<SecurityChain>) -> Result<Self, ConfigError> {
        chains.sort_by_key(|c| c.order);

        if let Some(pair) = chains.windows(2).find(|w| w[0].order == w[1].order) {
            return Err(ConfigError::Inconsistent(format!(
                "chains `{}` and `{}` share order {}",
                pair[0].name, pair[1].name, pair[0].order
            )));
        }

        let catch_all: Vec<&str> = chains
            .iter()
            .filter(|c| c.is_catch_all())
            .map(|c| c.name)
            .collect();
        if catch_all.len() != 1 {
            return Err(ConfigError::Inconsistent(format!(
                "expected exactly one catch-all chain, found {}: {:?}",
                catch_all.len(),
                catch_all
            )));
        }

        Ok(Self { chains })
    }

    /// First chain, in ascending order, that claims the request.
    pub fn select(&self, method: &Method, path: &str) -> Option<&SecurityChain> {
        self.chains.iter().find(|c| c.matches(method, path))
    }

    pub fn chains(&self) -> &[SecurityChain] {
        &self.chains
    }

    pub fn get(&self, name: &str) -> Option<&SecurityChain> {
        self.chains.iter().find(|c| c.name == name)
    }

    pub fn cors_enabled(&self) -> bool {
        self.chains.iter().any(|c| c.cors)
    }

    pub fn summary(&self) -> Vec<ChainSummary> {
        self.chains
            .iter()
            .map(|c| ChainSummary {
                name: c.name.to_string(),
                order: c.order,
                matchers: c.matchers.iter().map(ToString::to_string).collect(),
                strategy: c.strategy.kind().to_string(),
                public: c.strategy.public_rules().iter().map(ToString::to_string).collect(),
                cors: c.cors,
            })
            .collect()
    }
}

/// Build the chain table from configuration.
///
/// The OAuth2 flag picks between the login + bearer chains and the single
/// open chain. The management chain is always present.
pub fn build_chains(config: &SecurityConfig) -> Result<ChainRegistry, ConfigError> {
    let mut chains = Vec::with_capacity(3);

    if config.oauth2_enabled {
        chains.push(SecurityChain {
            name: OAUTH2_LOGIN_CHAIN,
            order: 1,
            matchers: vec![
                RequestMatcher::path(&format!("{AUTHORIZATION_PATH}**"))?,
                RequestMatcher::path(&format!("{CALLBACK_PATH}**"))?,
            ],
            strategy: AuthStrategy::OAuth2Redirect {
                success_url: LOGIN_SUCCESS_URL.to_string(),
            },
            cors: false,
        });
    }

    chains.push(SecurityChain {
        name: MANAGEMENT_CHAIN,
        order: 2,
        matchers: vec![
            RequestMatcher::path("/manage/**")?,
            RequestMatcher::path("/api-docs")?,
        ],
        strategy: AuthStrategy::Basic {
            public: vec![
                RequestMatcher::path("/manage/health/**")?,
                RequestMatcher::path("/manage/prometheus")?,
                RequestMatcher::path("/api-docs")?,
            ],
            required_role: config.management.role.clone(),
        },
        cors: false,
    });

    if config.oauth2_enabled {
        chains.push(SecurityChain {
            name: API_CHAIN,
            order: 3,
            matchers: vec![RequestMatcher::path("/**")?],
            strategy: AuthStrategy::BearerMultiIssuer {
                public: vec![
                    RequestMatcher::method(Method::OPTIONS, "/**")?,
                    RequestMatcher::method(Method::GET, "/")?,
                ],
            },
            cors: true,
        });
    } else {
        chains.push(SecurityChain {
            name: OPEN_CHAIN,
            order: 3,
            matchers: vec![RequestMatcher::path("/**")?],
            strategy: AuthStrategy::PermitAll,
            cors: false,
        });
    }

    ChainRegistry::new(chains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::security_config;

    fn names(registry: &ChainRegistry) -> Vec<(&str, u32)> {
        registry.chains().iter().map(|c| (c.name, c.order)).collect()
    }

    fn selected<'a>(registry: &'a ChainRegistry, method: Method, path: &str) -> &'a str {
        registry.select(&method, path).map(|c| c.name).unwrap()
    }

    #[test]
    fn enabled_builds_login_management_and_api_chains() {
        let registry = build_chains(&security_config(Some("https://kc.example.com"), true)).unwrap();
        assert_eq!(
            names(&registry),
            vec![(OAUTH2_LOGIN_CHAIN, 1), (MANAGEMENT_CHAIN, 2), (API_CHAIN, 3)]
        );
        assert!(registry.cors_enabled());
    }

    #[test]
    fn disabled_builds_management_and_open_chains() {
        let registry = build_chains(&security_config(None, false)).unwrap();
        assert_eq!(names(&registry), vec![(MANAGEMENT_CHAIN, 2), (OPEN_CHAIN, 3)]);
        assert!(!registry.cors_enabled());
        assert_eq!(selected(&registry, Method::GET, "/oauth2/authorization/keycloak"), OPEN_CHAIN);
    }

    #[test]
    fn selects_first_matching_chain() {
        let registry = build_chains(&security_config(Some("https://kc.example.com"), true)).unwrap();

        assert_eq!(selected(&registry, Method::GET, "/oauth2/authorization/keycloak"), OAUTH2_LOGIN_CHAIN);
        assert_eq!(selected(&registry, Method::GET, "/login/oauth2/code/keycloak"), OAUTH2_LOGIN_CHAIN);
        assert_eq!(selected(&registry, Method::GET, "/manage/health"), MANAGEMENT_CHAIN);
        assert_eq!(selected(&registry, Method::GET, "/manage/info"), MANAGEMENT_CHAIN);
        assert_eq!(selected(&registry, Method::GET, "/api-docs"), MANAGEMENT_CHAIN);
        assert_eq!(selected(&registry, Method::GET, "/api/v1/items"), API_CHAIN);
        assert_eq!(selected(&registry, Method::GET, "/"), API_CHAIN);
        assert_eq!(selected(&registry, Method::GET, "/managed"), API_CHAIN);
        assert_eq!(selected(&registry, Method::GET, "/api-docs/extra"), API_CHAIN);
    }

    #[test]
    fn public_rules_per_chain() {
        let registry = build_chains(&security_config(Some("https://kc.example.com"), true)).unwrap();
        let management = &registry.get(MANAGEMENT_CHAIN).unwrap().strategy;
        assert!(management.is_public(&Method::GET, "/manage/health/readiness"));
        assert!(management.is_public(&Method::GET, "/manage/prometheus"));
        assert!(management.is_public(&Method::GET, "/api-docs"));
        assert!(!management.is_public(&Method::GET, "/manage/info"));
        assert!(!management.is_public(&Method::GET, "/manage/healthz"));

        let api = &registry.get(API_CHAIN).unwrap().strategy;
        assert!(api.is_public(&Method::GET, "/"));
        assert!(api.is_public(&Method::OPTIONS, "/api/v1/items"));
        assert!(!api.is_public(&Method::POST, "/"));
        assert!(!api.is_public(&Method::GET, "/api/v1/items"));
    }

    #[test]
    fn management_chain_uses_configured_role() {
        let mut config = security_config(None, false);
        config.management.role = "OPS".into();
        let registry = build_chains(&config).unwrap();
        match &registry.get(MANAGEMENT_CHAIN).unwrap().strategy {
            AuthStrategy::Basic { required_role, .. } => assert_eq!(required_role, "OPS"),
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    fn chain(name: &'static str, order: u32, pattern: &str) -> SecurityChain {
        SecurityChain {
            name,
            order,
            matchers: vec![RequestMatcher::path(pattern).unwrap()],
            strategy: AuthStrategy::PermitAll,
            cors: false,
        }
    }

    #[test]
    fn rejects_missing_or_duplicate_catch_all() {
        assert!(matches!(
            ChainRegistry::new(vec![chain("a", 1, "/a/**")]),
            Err(ConfigError::Inconsistent(_))
        ));
        assert!(matches!(
            ChainRegistry::new(vec![chain("a", 1, "/**"), chain("b", 2, "/**")]),
            Err(ConfigError::Inconsistent(_))
        ));
    }

    #[test]
    fn rejects_duplicate_orders() {
        assert!(matches!(
            ChainRegistry::new(vec![chain("a", 3, "/a/**"), chain("b", 3, "/**")]),
            Err(ConfigError::Inconsistent(_))
        ));
    }

    #[test]
    fn orders_by_ascending_order() {
        let registry = ChainRegistry::new(vec![chain("last", 9, "/**"), chain("first", 1, "/a/**")]).unwrap();
        assert_eq!(names(&registry), vec![("first", 1), ("last", 9)]);
        assert_eq!(selected(&registry, Method::GET, "/a/b"), "first");
    }

    #[test]
    fn summary_lists_rules() {
        let registry = build_chains(&security_config(Some("https://kc.example.com"), true)).unwrap();
        let summary = registry.summary();
        let api = summary.iter().find(|s| s.name == API_CHAIN).unwrap();
        assert_eq!(api.strategy, "bearer_multi_issuer");
        assert_eq!(api.public, vec!["OPTIONS /**", "GET /"]);
        assert!(api.cors);
    }
}
