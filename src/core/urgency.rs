use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::dates::days_between;
use super::item::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Urgency {
    Soon,
    KindOfSoon,
    NotSoon,
    Inactive,
    Unknown,
}

impl Urgency {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Soon => "soon",
            Self::KindOfSoon => "kind of soon",
            Self::NotSoon => "not soon",
            Self::Inactive => "inactive",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "soon" => Some(Self::Soon),
            "kind of soon" => Some(Self::KindOfSoon),
            "not soon" => Some(Self::NotSoon),
            "inactive" => Some(Self::Inactive),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Day limits for the urgency buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrgencyThresholds {
    /// Upper bound (inclusive) of `Soon`.
    pub soon_days: i64,
    /// Upper bound (inclusive) of `KindOfSoon`.
    pub kind_of_soon_days: i64,
    /// Minimum days since the last purchase before an item can go inactive.
    pub inactive_after_days: i64,
}

impl Default for UrgencyThresholds {
    fn default() -> Self {
        Self {
            soon_days: 7,
            kind_of_soon_days: 21,
            inactive_after_days: 60,
        }
    }
}

/// An item with its urgency as of a given instant. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct UrgentItem {
    pub item: Item,
    pub urgency: Urgency,
    /// `None` when no next purchase is predicted; sorts after everything.
    pub days_until_next_purchase: Option<i64>,
}

impl UrgencyThresholds {
    pub fn classify(&self, item: &Item, now: DateTime<Utc>) -> UrgentItem {
        let Some(next) = item.date_next_purchased else {
            return UrgentItem {
                item: item.clone(),
                urgency: Urgency::Unknown,
                days_until_next_purchase: None,
            };
        };

        let days_until = days_between(Some(now), Some(next));
        let days_since_last = item
            .date_last_purchased
            .map(|last| days_between(Some(last), Some(now)));
        let previous_estimate = days_between(item.date_last_purchased, Some(next));

        let urgency = match days_since_last {
            Some(since) if since > self.inactive_after_days && since > 2 * previous_estimate => {
                Urgency::Inactive
            }
            _ if days_until <= self.soon_days => Urgency::Soon,
            _ if days_until <= self.kind_of_soon_days => Urgency::KindOfSoon,
            _ => Urgency::NotSoon,
        };

        UrgentItem {
            item: item.clone(),
            urgency,
            days_until_next_purchase: Some(days_until),
        }
    }

    /// Classify every item and order them most urgent first.
    pub fn sort_by_urgency<'a, I>(&self, items: I, now: DateTime<Utc>) -> Vec<UrgentItem>
    where
        I: IntoIterator<Item = &'a Item>,
    {
        let mut out: Vec<UrgentItem> = items
            .into_iter()
            .map(|item| self.classify(item, now))
            .collect();
        out.sort_by(compare_urgency);
        out
    }
}

/// Ascending days until next purchase (unpredicted last), then name, then id.
pub fn compare_urgency(a: &UrgentItem, b: &UrgentItem) -> Ordering {
    let days = match (a.days_until_next_purchase, b.days_until_next_purchase) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    days.then_with(|| a.item.name.to_lowercase().cmp(&b.item.name.to_lowercase()))
        .then_with(|| a.item.id.cmp(&b.item.id))
}

/// Classify with the default thresholds.
pub fn classify(item: &Item, now: DateTime<Utc>) -> UrgentItem {
    UrgencyThresholds::default().classify(item, now)
}

/// Sort with the default thresholds.
pub fn sort_by_urgency<'a, I>(items: I, now: DateTime<Utc>) -> Vec<UrgentItem>
where
    I: IntoIterator<Item = &'a Item>,
{
    UrgencyThresholds::default().sort_by_urgency(items, now)
}
