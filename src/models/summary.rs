use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostSummary {
    pub monthly_spend: f64,
    pub yearly_spend: f64,
    /// Annual cost of Active licenses expiring within the next 30 days.
    pub next_30_day_renewal: f64,
}

/// Presentation-only urgency label derived from days until expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskTier {
    Safe,
    Warning,
    Critical,
    Expired,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LicenseStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
    pub expiring_soon: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub stats: LicenseStats,
    pub costs: CostSummary,
}
