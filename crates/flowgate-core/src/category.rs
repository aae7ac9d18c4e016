//! Fixed execution phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of seven execution phases. Units run in ascending [`Category::rank`];
/// units sharing a category keep their registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Authentication,
    Permission,
    Feature,
    Throttling,
    Filter,
    Pagination,
    Custom,
}

impl Category {
    /// All categories in rank order.
    pub const ALL: [Category; 7] = [
        Category::Authentication,
        Category::Permission,
        Category::Feature,
        Category::Throttling,
        Category::Filter,
        Category::Pagination,
        Category::Custom,
    ];

    /// Execution rank, 1..=7.
    pub fn rank(self) -> u8 {
        match self {
            Category::Authentication => 1,
            Category::Permission => 2,
            Category::Feature => 3,
            Category::Throttling => 4,
            Category::Filter => 5,
            Category::Pagination => 6,
            Category::Custom => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Authentication => "authentication",
            Category::Permission => "permission",
            Category::Feature => "feature",
            Category::Throttling => "throttling",
            Category::Filter => "filter",
            Category::Pagination => "pagination",
            Category::Custom => "custom",
        }
    }
}

impl PartialOrd for Category {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Category {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
