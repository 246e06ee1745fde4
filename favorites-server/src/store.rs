//! In-memory favorites storage.

use favorites_types::{Category, EntityId, UserId};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

/// Favorites of every user, keyed by `(user, category)`.
#[derive(Debug, Default)]
pub struct FavoritesStore {
    favorites: RwLock<HashMap<(UserId, Category), BTreeSet<EntityId>>>,
}

impl FavoritesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted ids the user has favorited in `category`.
    pub async fn list(&self, user: &UserId, category: Category) -> Vec<EntityId> {
        self.favorites
            .read()
            .await
            .get(&(user.clone(), category))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Sets membership of `id`. Returns true if anything changed.
    pub async fn set(&self, user: &UserId, category: Category, id: EntityId, favorite: bool) -> bool {
        let mut favorites = self.favorites.write().await;
        let key = (user.clone(), category);
        if favorite {
            favorites.entry(key).or_default().insert(id)
        } else {
            let Some(ids) = favorites.get_mut(&key) else {
                return false;
            };
            let removed = ids.remove(&id);
            if ids.is_empty() {
                favorites.remove(&key);
            }
            removed
        }
    }
}
