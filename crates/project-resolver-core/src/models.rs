//! Registry data types.
//!
//! These are the persisted shapes of the registry document. Every field
//! that older documents may lack carries a serde default so that loading
//! stays schema-tolerant.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Category assigned when nothing better is known.
pub const DEFAULT_CATEGORY: &str = "Other";

/// Lifecycle status of a project. Archived projects never match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
}

/// A named sub-division of a project (e.g. a customer engagement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SubItemRepr")]
pub struct SubItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl SubItem {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Older documents store sub-items as bare strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum SubItemRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        description: String,
    },
}

impl From<SubItemRepr> for SubItem {
    fn from(repr: SubItemRepr) -> Self {
        match repr {
            SubItemRepr::Name(name) => SubItem::new(name, ""),
            SubItemRepr::Full { name, description } => SubItem { name, description },
        }
    }
}

/// A canonical project: the identity every mention and alias resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sub_items: Vec<SubItem>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl Project {
    /// A new active project with no aliases, description, or sub-items.
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            category: category.into(),
            status: ProjectStatus::Active,
            description: String::new(),
            sub_items: Vec::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }

    /// The name followed by every alias, in stored order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// True if `text` equals the name or an alias, ignoring case and
    /// surrounding whitespace.
    pub fn answers_to(&self, text: &str) -> bool {
        let key = normalize(text);
        self.keys().any(|k| normalize(k) == key)
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }

    /// The sub-item called `name`, ignoring case and surrounding whitespace.
    pub fn sub_item(&self, name: &str) -> Option<&SubItem> {
        self.sub_item_position(name).map(|i| &self.sub_items[i])
    }

    pub fn sub_item_position(&self, name: &str) -> Option<usize> {
        let key = normalize(name);
        self.sub_items.iter().position(|s| normalize(&s.name) == key)
    }
}

/// A mention provisionally classified as a new project (or, when
/// `parent_project` is set, a new sub-item) awaiting admin review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMention {
    pub name: String,
    pub first_seen: NaiveDate,
    #[serde(default = "one", alias = "mentions")]
    pub mention_count: u32,
    #[serde(default)]
    pub source_texts: Vec<String>,
    #[serde(default = "default_category")]
    pub suggested_category: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_by: Option<String>,
}

fn one() -> u32 {
    1
}

impl PendingMention {
    pub fn is_sub_item(&self) -> bool {
        self.parent_project.is_some()
    }
}

/// Canonical comparison key: trimmed and lowercased.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
