//! Spend and renewal-risk aggregation over one owner's licenses.
//!
//! Everything here is pure: callers pass the licenses (already scoped to the
//! owner) and the reference time.

use crate::models::{CostSummary, License, LicenseStats, LicenseStatus, RiskTier};

const SECONDS_PER_DAY: i64 = 86400;

/// Window used for "renews soon" figures.
const RENEWAL_WINDOW_DAYS: i64 = 30;

/// Whole days until `expiry_date`, rounded up. Zero or negative once expired.
pub fn days_left(expiry_date: i64, now: i64) -> i64 {
    let diff = expiry_date.saturating_sub(now);
    // Integer division truncates toward zero, which is already the ceiling for negatives
    let days = diff / SECONDS_PER_DAY;
    if diff % SECONDS_PER_DAY > 0 { days + 1 } else { days }
}

pub fn risk_tier(expiry_date: i64, now: i64) -> RiskTier {
    match days_left(expiry_date, now) {
        d if d > 60 => RiskTier::Safe,
        d if d > 30 => RiskTier::Warning,
        d if d > 0 => RiskTier::Critical,
        _ => RiskTier::Expired,
    }
}

fn renews_soon(license: &License, now: i64) -> bool {
    license.status == LicenseStatus::Active
        && license.expiry_date <= now.saturating_add(RENEWAL_WINDOW_DAYS * SECONDS_PER_DAY)
}

pub fn cost_summary<'a, I>(licenses: I, now: i64) -> CostSummary
where
    I: IntoIterator<Item = &'a License>,
{
    licenses
        .into_iter()
        .fold(CostSummary::default(), |mut acc, license| {
            acc.monthly_spend += license.monthly_cost;
            acc.yearly_spend += license.annual_cost;
            if renews_soon(license, now) {
                acc.next_30_day_renewal += license.annual_cost;
            }
            acc
        })
}

pub fn license_stats<'a, I>(licenses: I, now: i64) -> LicenseStats
where
    I: IntoIterator<Item = &'a License>,
{
    licenses
        .into_iter()
        .fold(LicenseStats::default(), |mut acc, license| {
            acc.total += 1;
            match license.status {
                LicenseStatus::Active => acc.active += 1,
                LicenseStatus::Expired => acc.expired += 1,
                LicenseStatus::Renewed => {}
            }
            if renews_soon(license, now) {
                acc.expiring_soon += 1;
            }
            acc
        })
}
