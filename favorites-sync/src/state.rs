//! Favorites state tracking.
//!
//! Holds the local view of favorited ids per category, the per-category
//! sync state, and the bookkeeping for toggles awaiting acknowledgment.

use crate::error::SyncError;
use chrono::{DateTime, Utc};
use favorites_types::{Category, EntityId, RequestId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Favorited ids for every category of a single user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteSet {
    categories: HashMap<Category, HashSet<EntityId>>,
}

impl FavoriteSet {
    /// Creates an empty favorite set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `id` is favorited in `category`.
    pub fn contains(&self, category: Category, id: &EntityId) -> bool {
        self.categories
            .get(&category)
            .is_some_and(|ids| ids.contains(id))
    }

    /// Adds `id` to `category`. Returns true if it was not already present.
    pub fn add(&mut self, category: Category, id: EntityId) -> bool {
        self.categories.entry(category).or_default().insert(id)
    }

    /// Removes `id` from `category`. Returns true if it was present.
    pub fn remove(&mut self, category: Category, id: &EntityId) -> bool {
        self.categories
            .get_mut(&category)
            .is_some_and(|ids| ids.remove(id))
    }

    /// Adds or removes `id` so that its membership equals `favorited`.
    pub fn set_membership(&mut self, category: Category, id: &EntityId, favorited: bool) {
        if favorited {
            self.add(category, id.clone());
        } else {
            self.remove(category, id);
        }
    }

    /// Replaces the whole contents of one category.
    pub fn replace(&mut self, category: Category, ids: impl IntoIterator<Item = EntityId>) {
        self.categories.insert(category, ids.into_iter().collect());
    }

    /// Empties one category.
    pub fn clear_category(&mut self, category: Category) {
        self.categories.remove(&category);
    }

    /// Empties every category.
    pub fn clear(&mut self) {
        self.categories.clear();
    }

    /// Returns a sorted copy of the ids favorited in `category`.
    pub fn snapshot(&self, category: Category) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .categories
            .get(&category)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Number of ids favorited in `category`.
    pub fn len(&self, category: Category) -> usize {
        self.categories.get(&category).map_or(0, HashSet::len)
    }

    /// Whether no category holds any id.
    pub fn is_empty(&self) -> bool {
        self.categories.values().all(HashSet::is_empty)
    }
}

/// Sync status of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SyncState {
    /// Nothing outstanding.
    #[default]
    Idle,
    /// A load or a reconciling write is outstanding.
    Loading,
    /// The last load failed; the category is treated as empty.
    Error(String),
}

impl SyncState {
    /// Whether this is the `Loading` state.
    pub fn is_loading(&self) -> bool {
        matches!(self, SyncState::Loading)
    }

    /// Whether this is an `Error` state.
    pub fn is_error(&self) -> bool {
        matches!(self, SyncState::Error(_))
    }
}

/// An optimistic toggle awaiting gateway acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToggle {
    pub category: Category,
    pub entity_id: EntityId,
    /// Membership before the optimistic update was applied.
    pub previous_membership: bool,
    pub request_id: RequestId,
    /// Engine generation the request was issued under.
    pub generation: u64,
}

impl PendingToggle {
    /// The membership the toggle is trying to reach.
    pub fn target_membership(&self) -> bool {
        !self.previous_membership
    }
}

/// A toggle that was rolled back after the gateway rejected it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleFailure {
    pub category: Category,
    pub entity_id: EntityId,
    pub request_id: RequestId,
    pub error: SyncError,
    pub occurred_at: DateTime<Utc>,
}

/// Point-in-time view of one category, as handed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStatus {
    pub category: Category,
    pub favorites: Vec<EntityId>,
    pub sync_state: SyncState,
    /// Number of toggles in this category awaiting acknowledgment.
    pub pending: usize,
    pub last_loaded_at: Option<DateTime<Utc>>,
    pub last_failure: Option<ToggleFailure>,
}
