// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::metrics::MetricsRegistry;
use crate::security::SecurityState;
use crate::store::InMemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<InMemoryStore>>,
    pub security: Arc<SecurityState>,
    pub metrics: Arc<MetricsRegistry>,
}

impl AppState {
    /// The metrics registry is taken from the security state so that both
    /// export into the same `/manage/prometheus` page.
    pub fn new(store: InMemoryStore, security: SecurityState) -> Self {
        let metrics = security.metrics.clone();
        Self {
            store: Arc::new(RwLock::new(store)),
            security: Arc::new(security),
            metrics,
        }
    }
}
