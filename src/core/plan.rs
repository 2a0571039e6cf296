//! Plan tiers and subscription statuses.
//!
//! Both are persisted as strings; these enums are the typed view used by the
//! business logic. Unknown plan strings are tolerated and priced as BASIC.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Message ceiling applied to plans the table does not know.
pub const DEFAULT_MESSAGE_LIMIT: i32 = 1000;

/// Named pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Plan {
    Basic,
    Standard,
    Premium,
    Enterprise,
}

impl Plan {
    pub const ALL: [Self; 4] = [Self::Basic, Self::Standard, Self::Premium, Self::Enterprise];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "BASIC",
            Self::Standard => "STANDARD",
            Self::Premium => "PREMIUM",
            Self::Enterprise => "ENTERPRISE",
        }
    }

    /// Monthly message ceiling for this tier.
    #[must_use]
    pub const fn message_limit(self) -> i32 {
        match self {
            Self::Basic => 1000,
            Self::Standard => 5000,
            Self::Premium => 15000,
            Self::Enterprise => 50000,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|plan| plan.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown plan '{s}'"))
    }
}

/// Looks up the message ceiling for a stored plan name, defaulting to
/// [`DEFAULT_MESSAGE_LIMIT`] for names outside the table.
#[must_use]
pub fn get_message_limit_by_plan(plan: &str) -> i32 {
    plan.parse::<Plan>()
        .map_or(DEFAULT_MESSAGE_LIMIT, Plan::message_limit)
}

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub const ALL: [Self; 4] = [Self::Trial, Self::Active, Self::Cancelled, Self::Expired];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trial => "TRIAL",
            Self::Active => "ACTIVE",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Whether chat traffic is served in this state.
    #[must_use]
    pub const fn allows_chat(self) -> bool {
        matches!(self, Self::Trial | Self::Active)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown subscription status '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_limit_table() {
        assert_eq!(get_message_limit_by_plan("BASIC"), 1000);
        assert_eq!(get_message_limit_by_plan("STANDARD"), 5000);
        assert_eq!(get_message_limit_by_plan("PREMIUM"), 15000);
        assert_eq!(get_message_limit_by_plan("ENTERPRISE"), 50000);
    }

    #[test]
    fn test_unknown_plan_defaults() {
        assert_eq!(get_message_limit_by_plan("GOLD"), 1000);
        assert_eq!(get_message_limit_by_plan(""), 1000);
    }

    #[test]
    fn test_plan_parsing_is_case_insensitive() {
        assert_eq!("premium".parse::<Plan>(), Ok(Plan::Premium));
        assert_eq!(get_message_limit_by_plan(" Enterprise "), 50000);
    }

    #[test]
    fn test_status_parsing_and_chat_gate() {
        assert_eq!(
            "cancelled".parse::<SubscriptionStatus>(),
            Ok(SubscriptionStatus::Cancelled)
        );
        assert!("PAUSED".parse::<SubscriptionStatus>().is_err());
        assert!(SubscriptionStatus::Trial.allows_chat());
        assert!(SubscriptionStatus::Active.allows_chat());
        assert!(!SubscriptionStatus::Expired.allows_chat());
    }
}
