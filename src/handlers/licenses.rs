use axum::extract::{Extension, State};
use chrono::Utc;
use serde::Serialize;

use crate::costs::risk_tier;
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{FormWithFile, Json, Path, Query};
use crate::ledger::Ledger;
use crate::middleware::UserContext;
use crate::models::{CreateLicense, LicenseFilter, LicenseWithProduct, RiskTier, UpdateLicense};

/// A license as returned over HTTP: plaintext key, product context and the
/// expiry risk as of the time of the request.
#[derive(Debug, Serialize)]
pub struct LicenseResponse {
    #[serde(flatten)]
    pub license: LicenseWithProduct,
    pub expiry_risk: RiskTier,
}

impl LicenseResponse {
    fn at(license: LicenseWithProduct, now: i64) -> Self {
        let expiry_risk = risk_tier(license.license.expiry_date, now);
        Self {
            license,
            expiry_risk,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteLicenseResponse {
    pub success: bool,
    pub deleted_id: String,
}

fn ledger<'a>(state: &'a AppState, conn: &'a rusqlite::Connection) -> Ledger<'a> {
    Ledger::new(conn, &state.cipher, state.blobs.as_ref(), state.key_search)
}

pub async fn create_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    FormWithFile { fields, file }: FormWithFile<CreateLicense>,
) -> Result<Json<LicenseResponse>> {
    let conn = state.db.get()?;
    let license = ledger(&state, &conn).create(&ctx.user_id, fields, file)?;
    Ok(Json(LicenseResponse::at(license, Utc::now().timestamp())))
}

pub async fn list_licenses(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Query(filter): Query<LicenseFilter>,
) -> Result<Json<Vec<LicenseResponse>>> {
    let conn = state.db.get()?;
    let now = Utc::now().timestamp();
    let licenses = ledger(&state, &conn)
        .list(&ctx.user_id, &filter)?
        .into_iter()
        .map(|license| LicenseResponse::at(license, now))
        .collect();
    Ok(Json(licenses))
}

pub async fn get_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<LicenseResponse>> {
    let conn = state.db.get()?;
    let license = ledger(&state, &conn).get(&ctx.user_id, &id)?;
    Ok(Json(LicenseResponse::at(license, Utc::now().timestamp())))
}

pub async fn update_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
    FormWithFile { fields, file }: FormWithFile<UpdateLicense>,
) -> Result<Json<LicenseResponse>> {
    let conn = state.db.get()?;
    let license = ledger(&state, &conn).update(&ctx.user_id, &id, fields, file)?;
    Ok(Json(LicenseResponse::at(license, Utc::now().timestamp())))
}

pub async fn delete_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<DeleteLicenseResponse>> {
    let conn = state.db.get()?;
    let deleted_id = ledger(&state, &conn).delete(&ctx.user_id, &id)?;
    Ok(Json(DeleteLicenseResponse {
        success: true,
        deleted_id,
    }))
}
