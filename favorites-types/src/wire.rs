//! JSON bodies exchanged with the favorites API.

use crate::{Category, EntityId};
use serde::{Deserialize, Serialize};

/// Every favorited id of one user in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteIds {
    pub category: Category,
    pub ids: Vec<EntityId>,
}
