//! The closed set of favorite categories.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A favorite domain. Adding a category is a code change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Marketplace items.
    #[serde(rename = "items")]
    Item,
    /// Housing listings.
    Housing,
    /// Roommate listings.
    #[serde(rename = "roommates")]
    Roommate,
}

impl Category {
    /// Every category, in a fixed order.
    pub const ALL: [Category; 3] = [Category::Item, Category::Housing, Category::Roommate];

    /// The name used in URLs and JSON payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Category::Item => "items",
            Category::Housing => "housing",
            Category::Roommate => "roommates",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "items" => Ok(Category::Item),
            "housing" => Ok(Category::Housing),
            "roommates" => Ok(Category::Roommate),
            other => Err(Error::UnknownCategory(other.to_string())),
        }
    }
}
