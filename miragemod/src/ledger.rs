// src/ledger.rs
//
// Per-user figment ledger. The whole map mirrors one JSON value on the
// broker; mutation happens only on the dispatcher task.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Minimum time between successive claims by the same user.
const REDEEM_COOLDOWN_HOURS: i64 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub name: String,
    pub count: i64,
    pub total: i64,
    pub last_redeem: DateTime<Utc>,
}

/// Persisted as a single JSON object keyed by Twitch user id.
pub type Ledger = HashMap<String, LedgerEntry>;

#[derive(Debug, Clone, PartialEq)]
pub enum RedemptionOutcome {
    /// Claim accepted; both counters already written back to the ledger.
    Accepted { total: i64, count: i64 },
    /// Too soon since the user's last claim. Ledger untouched.
    OnCooldown,
}

/// Applies one redemption for `user_id`. A user with an existing entry is
/// blocked while less than the cooldown has elapsed since their last claim;
/// at or past the boundary the claim goes through.
pub fn redeem(
    ledger: &mut Ledger,
    user_id: &str,
    user_name: &str,
    now: DateTime<Utc>,
) -> RedemptionOutcome {
    let mut total = 0;
    let mut count = 0;
    if let Some(entry) = ledger.get(user_id) {
        if now - entry.last_redeem < Duration::hours(REDEEM_COOLDOWN_HOURS) {
            return RedemptionOutcome::OnCooldown;
        }
        total = entry.total;
        count = entry.count;
    }

    total += 1;
    count += 1;
    ledger.insert(
        user_id.to_string(),
        LedgerEntry {
            name: user_name.to_string(),
            count,
            total,
            last_redeem: now,
        },
    );
    RedemptionOutcome::Accepted { total, count }
}

/// English ordinal suffix: last two digits 11-20 take "th", otherwise the
/// last digit decides.
pub fn ordinal_suffix(n: i64) -> &'static str {
    if (11..=20).contains(&(n % 100)) {
        return "th";
    }
    match n % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}
