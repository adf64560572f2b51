//! Restrictions attached to a delegation hop: validity window, maximum
//! re-delegation depth, and opaque custom conditions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Restriction construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestrictionsError {
    /// A window whose bounds are reversed (or zero-width) can never be
    /// satisfied; rejected at construction rather than surfacing later as a
    /// permanently invalid assertion.
    #[error("validity window is reversed or empty: not_before {not_before} >= not_on_or_after {not_on_or_after}")]
    InvalidWindow {
        not_before: DateTime<Utc>,
        not_on_or_after: DateTime<Utc>,
    },
}

/// Restrictions for one delegation hop.
///
/// `max_proxy_count` counts assertions inclusively from the carrying hop
/// through the subject's hop; zero or negative means unrestricted. `Clone`
/// is a deep copy (owned timestamps and JSON values) so assertions embed
/// their own snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationRestrictions {
    pub not_before: Option<DateTime<Utc>>,
    pub not_on_or_after: Option<DateTime<Utc>>,
    pub max_proxy_count: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_conditions: Vec<serde_json::Value>,
}

impl DelegationRestrictions {
    /// Explicit bounds. Fails fast when both are set and reversed.
    pub fn new(
        not_before: Option<DateTime<Utc>>,
        not_on_or_after: Option<DateTime<Utc>>,
        max_proxy_count: i32,
    ) -> Result<Self, RestrictionsError> {
        if let (Some(nb), Some(na)) = (not_before, not_on_or_after) {
            if nb >= na {
                return Err(RestrictionsError::InvalidWindow {
                    not_before: nb,
                    not_on_or_after: na,
                });
            }
        }
        Ok(Self {
            not_before,
            not_on_or_after,
            max_proxy_count,
            custom_conditions: Vec::new(),
        })
    }

    /// Window `[not_before, not_before + days)`.
    pub fn valid_for_days(
        not_before: DateTime<Utc>,
        days: i64,
        max_proxy_count: i32,
    ) -> Result<Self, RestrictionsError> {
        Self::new(
            Some(not_before),
            Some(not_before + Duration::days(days)),
            max_proxy_count,
        )
    }

    /// The default policy applied when a caller passes no restrictions:
    /// `[now, now + 14 days)`, at most one further re-delegation.
    pub fn standard() -> Self {
        let now = Utc::now();
        Self {
            not_before: Some(now),
            not_on_or_after: Some(now + Duration::days(14)),
            max_proxy_count: 1,
            custom_conditions: Vec::new(),
        }
    }

    /// No window, unrestricted depth.
    pub fn unrestricted() -> Self {
        Self {
            not_before: None,
            not_on_or_after: None,
            max_proxy_count: -1,
            custom_conditions: Vec::new(),
        }
    }

    /// Attach opaque custom conditions.
    pub fn with_conditions(mut self, conditions: Vec<serde_json::Value>) -> Self {
        self.custom_conditions = conditions;
        self
    }

    /// Positive counts restrict; zero or negative do not.
    pub fn restricts_proxy_depth(&self) -> bool {
        self.max_proxy_count > 0
    }
}
