// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory todo store.
//!
//! Items are kept per owner key (see `Principal::owner_key`); one owner can
//! never see or delete another owner's items. Nothing is persisted.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{CreateItemRequest, TodoItem, MAX_ITEM_TEXT_LEN};

#[derive(Default)]
pub struct InMemoryStore {
    /// Owner key to items, oldest first
    items: HashMap<String, Vec<TodoItem>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_items(&self, owner: &str) -> Vec<TodoItem> {
        self.items.get(owner).cloned().unwrap_or_default()
    }

    pub fn create_item(
        &mut self,
        owner: &str,
        request: CreateItemRequest,
    ) -> Result<TodoItem, ApiError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(ApiError::EmptyItemText);
        }
        if text.chars().count() > MAX_ITEM_TEXT_LEN {
            return Err(ApiError::ItemTextTooLong);
        }

        let item = TodoItem {
            uid: Uuid::new_v4(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.items
            .entry(owner.to_string())
            .or_default()
            .push(item.clone());
        Ok(item)
    }

    pub fn delete_item(&mut self, owner: &str, uid: Uuid) -> Result<TodoItem, ApiError> {
        let items = self
            .items
            .get_mut(owner)
            .ok_or(ApiError::ItemNotFound(uid))?;
        let position = items
            .iter()
            .position(|item| item.uid == uid)
            .ok_or(ApiError::ItemNotFound(uid))?;
        let removed = items.remove(position);
        if items.is_empty() {
            self.items.remove(owner);
        }
        Ok(removed)
    }

    /// Items across all owners.
    pub fn total_items(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }
}
