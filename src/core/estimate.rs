use chrono::{DateTime, Utc};

use super::dates::{add_days, days_between};
use super::item::{Item, ItemFields};

/// Blends the running estimate with a freshly observed purchase interval.
///
/// Implementations must weigh `actual_interval_days` less as
/// `total_purchases` grows, never decrease the result when
/// `actual_interval_days` grows, and always return a positive number of days.
pub trait EstimatePolicy: Send + Sync {
    fn estimate(&self, previous_estimate_days: i64, actual_interval_days: i64, total_purchases: u32) -> f64;
}

/// Weighted mean where the latest interval counts `1 / (n + 1)`.
///
/// The first purchase splits the difference between the guess made when the
/// item was added and what actually happened; later purchases nudge an
/// increasingly settled estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedAverage;

impl EstimatePolicy for WeightedAverage {
    fn estimate(&self, previous_estimate_days: i64, actual_interval_days: i64, total_purchases: u32) -> f64 {
        let previous = previous_estimate_days.max(0) as f64;
        let actual = actual_interval_days.max(0) as f64;
        let weight = 1.0 / (f64::from(total_purchases.max(1)) + 1.0);
        let blended = previous * (1.0 - weight) + actual * weight;
        blended.round().max(1.0)
    }
}

/// The three fields a purchase confirmation writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PurchaseUpdate {
    pub date_last_purchased: DateTime<Utc>,
    pub date_next_purchased: DateTime<Utc>,
    pub total_purchases: u32,
    pub estimate_days: f64,
}

impl PurchaseUpdate {
    pub fn to_fields(&self) -> ItemFields {
        ItemFields {
            date_last_purchased: Some(self.date_last_purchased),
            date_next_purchased: Some(self.date_next_purchased),
            total_purchases: Some(self.total_purchases),
            ..Default::default()
        }
    }
}

pub struct PurchaseEstimator {
    policy: Box<dyn EstimatePolicy>,
}

impl Default for PurchaseEstimator {
    fn default() -> Self {
        Self::new(WeightedAverage)
    }
}

impl PurchaseEstimator {
    pub fn new(policy: impl EstimatePolicy + 'static) -> Self {
        Self { policy: Box::new(policy) }
    }

    /// Recompute the repurchase prediction for `item` bought at `now`.
    pub fn confirm(&self, item: &Item, now: DateTime<Utc>) -> PurchaseUpdate {
        let reference_start = item.date_last_purchased.or(item.date_created);
        let previous_estimate = days_between(reference_start, item.date_next_purchased);
        let actual_interval = days_between(reference_start, Some(now));
        let total_purchases = item.total_purchases.saturating_add(1);

        let proposed = self
            .policy
            .estimate(previous_estimate, actual_interval, total_purchases);
        // Next purchase stays strictly after `now` whatever the policy says.
        let estimate_days = if proposed.is_finite() { proposed.max(1.0) } else { 1.0 };

        log::debug!(
            "Estimate for {}: previous {}d, actual {}d, purchases {} -> {}d",
            item.name,
            previous_estimate,
            actual_interval,
            total_purchases,
            estimate_days
        );

        PurchaseUpdate {
            date_last_purchased: now,
            date_next_purchased: add_days(now, estimate_days),
            total_purchases,
            estimate_days,
        }
    }
}
