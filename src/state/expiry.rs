//! Retention deadlines (`expireAt`) for every record kind the backend writes.
//!
//! All computations are pure and work in UTC. Month arithmetic clamps to the last
//! day of the target month (e.g. 31 January + 1 month = 28/29 February).

use chrono::{DateTime, Datelike, Duration, Months, Utc};

/// First day-of-month that snaps a new payment onto the billing day.
const BILLING_SNAP_FROM: u32 = 25;
/// Billing day new payments are anchored to near month-end.
const BILLING_DAY: u32 = 28;

/// Record kinds with a retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Scheduled game (also the default for records inserted alongside a season).
    Game,
    /// Season record; outlives the games it contains by two days.
    Season,
    /// One-time validation code.
    ValidationCode,
    /// Login session.
    Session,
    /// Newly inserted payment, subject to the billing-cycle snap.
    Payment,
    /// Payout generated for a winner; no billing snap.
    AwardPayment,
}

/// Compute when a record of `kind` created at `now` expires.
pub fn expire_at(kind: RecordKind, now: DateTime<Utc>) -> DateTime<Utc> {
    match kind {
        RecordKind::Game | RecordKind::AwardPayment => add_one_month(now),
        RecordKind::Season => add_one_month(now) + Duration::days(2),
        RecordKind::ValidationCode => now + Duration::minutes(10),
        RecordKind::Session => now + Duration::days(2),
        RecordKind::Payment => add_one_month(snap_to_billing_day(now)),
    }
}

/// Expiry of a payment queued behind the last verified payment of its chain.
pub fn chained_payment_expiry(last_expire: DateTime<Utc>) -> DateTime<Utc> {
    add_one_month(last_expire)
}

/// Days 25, 26 and 27 move to the 28th; every other day is kept.
fn snap_to_billing_day(now: DateTime<Utc>) -> DateTime<Utc> {
    if (BILLING_SNAP_FROM..BILLING_DAY).contains(&now.day()) {
        now.with_day(BILLING_DAY).unwrap_or(now)
    } else {
        now
    }
}

fn add_one_month(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .checked_add_months(Months::new(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
