use axum::extract::{Extension, State};
use chrono::Utc;

use crate::costs::{cost_summary, license_stats};
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::ledger::Ledger;
use crate::middleware::UserContext;
use crate::models::{CostSummary, DashboardSummary, License, LicenseFilter};

/// Every license the caller owns, keys decrypted.
fn owned_licenses(state: &AppState, user_id: &str) -> Result<Vec<License>> {
    let conn = state.db.get()?;
    let ledger = Ledger::new(&conn, &state.cipher, state.blobs.as_ref(), state.key_search);
    Ok(ledger
        .list(user_id, &LicenseFilter::default())?
        .into_iter()
        .map(|l| l.license)
        .collect())
}

pub async fn get_cost_summary(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Json<CostSummary>> {
    let licenses = owned_licenses(&state, &ctx.user_id)?;
    Ok(Json(cost_summary(&licenses, Utc::now().timestamp())))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Json<DashboardSummary>> {
    let licenses = owned_licenses(&state, &ctx.user_id)?;
    let now = Utc::now().timestamp();
    Ok(Json(DashboardSummary {
        stats: license_stats(&licenses, now),
        costs: cost_summary(&licenses, now),
    }))
}
