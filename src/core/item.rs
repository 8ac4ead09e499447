use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::dates::ONE_DAY_IN_MILLISECONDS;

static NORMALIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\W]|_+|s$").unwrap());

/// Duplicate-detection form of an item name: "Apples " and "apple" collide.
pub fn normalize_name(name: &str) -> String {
    NORMALIZE_RE
        .replace_all(&name.trim().to_lowercase(), "")
        .into_owned()
}

/// Field bag as stored in a list partition. Every field is optional on the
/// wire; absence is resolved in [`Item::from_document`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_last_purchased: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_next_purchased: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_purchases: Option<u32>,
}

impl ItemFields {
    /// Overlay the fields present in `patch`.
    pub fn apply(&mut self, patch: &ItemFields) {
        if patch.name.is_some() {
            self.name.clone_from(&patch.name);
        }
        if patch.normalized_name.is_some() {
            self.normalized_name.clone_from(&patch.normalized_name);
        }
        if patch.date_created.is_some() {
            self.date_created = patch.date_created;
        }
        if patch.date_last_purchased.is_some() {
            self.date_last_purchased = patch.date_last_purchased;
        }
        if patch.date_next_purchased.is_some() {
            self.date_next_purchased = patch.date_next_purchased;
        }
        if patch.total_purchases.is_some() {
            self.total_purchases = patch.total_purchases;
        }
    }
}

/// One document of a list partition, as pushed by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    #[serde(flatten)]
    pub fields: ItemFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub date_created: Option<DateTime<Utc>>,
    pub date_last_purchased: Option<DateTime<Utc>>,
    pub date_next_purchased: Option<DateTime<Utc>>,
    pub total_purchases: u32,
}

impl Item {
    pub fn from_document(doc: RemoteDocument) -> Self {
        let RemoteDocument { id, fields } = doc;
        let name = fields.name.unwrap_or_default();
        let normalized_name = match fields.normalized_name {
            Some(n) if !n.is_empty() => n,
            _ => normalize_name(&name),
        };
        Self {
            id,
            name,
            normalized_name,
            date_created: fields.date_created,
            date_last_purchased: fields.date_last_purchased,
            date_next_purchased: fields.date_next_purchased,
            total_purchases: fields.total_purchases.unwrap_or(0),
        }
    }

    /// Fields for a brand-new item. The name is trimmed.
    pub fn new_fields(
        name: &str,
        created: DateTime<Utc>,
        next_purchase: DateTime<Utc>,
    ) -> ItemFields {
        let name = name.trim();
        ItemFields {
            name: Some(name.to_string()),
            normalized_name: Some(normalize_name(name)),
            date_created: Some(created),
            date_last_purchased: None,
            date_next_purchased: Some(next_purchase),
            total_purchases: Some(0),
        }
    }

    /// Bought within the last 24 hours.
    pub fn purchased_recently(&self, now: DateTime<Utc>) -> bool {
        self.date_last_purchased
            .is_some_and(|last| (now - last).num_milliseconds() < ONE_DAY_IN_MILLISECONDS)
    }

    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim();
        term.is_empty() || self.name.to_lowercase().contains(&term.to_lowercase())
    }
}

/// Items whose name contains `term`, case-insensitively. Empty term keeps all.
pub fn filter_by_name<'a, I>(items: I, term: &str) -> Vec<Item>
where
    I: IntoIterator<Item = &'a Item>,
{
    items
        .into_iter()
        .filter(|item| item.matches_search(term))
        .cloned()
        .collect()
}

/// The three buckets offered when adding an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatePreset {
    Soon,
    KindOfSoon,
    NotSoon,
}

impl EstimatePreset {
    pub const ALL: [EstimatePreset; 3] = [Self::Soon, Self::KindOfSoon, Self::NotSoon];

    pub fn days(&self) -> f64 {
        match self {
            Self::Soon => 7.0,
            Self::KindOfSoon => 14.0,
            Self::NotSoon => 30.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Soon => "Soon (7 days)",
            Self::KindOfSoon => "Kind of soon (14 days)",
            Self::NotSoon => "Not soon (30 days)",
        }
    }
}
