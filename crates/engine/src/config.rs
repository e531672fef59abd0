use serde::{Deserialize, Serialize};

/// When outbound/transfer lines take their stock hold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationPolicy {
    /// Reserve as soon as a line is added to a draft (the default: stock is
    /// promised the moment the draft names it).
    #[default]
    OnLineAdd,
    /// Reserve only at approval time. Drafts never hold stock; approval can
    /// fail on availability.
    OnApprove,
}

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub reservation_policy: ReservationPolicy,
    /// Window used by near-expiry queries, in days.
    pub near_expiry_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reservation_policy: ReservationPolicy::default(),
            near_expiry_days: 30,
        }
    }
}

impl EngineConfig {
    pub fn with_reservation_policy(mut self, policy: ReservationPolicy) -> Self {
        self.reservation_policy = policy;
        self
    }

    pub fn with_near_expiry_days(mut self, days: i64) -> Self {
        self.near_expiry_days = days;
        self
    }
}
