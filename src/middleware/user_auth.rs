use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::db::AppState;
use crate::error::AppError;

/// The authenticated caller. Every product and license operation is scoped
/// to `user_id`.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: String,
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Resolve the caller from the bearer token and attach a [`UserContext`].
///
/// When a bypass user is configured, tokens are not checked at all.
pub async fn user_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = match state.auth.bypass_user() {
        Some(user_id) => user_id.to_string(),
        None => {
            let token = extract_bearer_token(request.headers()).ok_or_else(|| {
                tracing::debug!("Missing bearer token");
                AppError::Unauthorized
            })?;
            state.auth.verify(token)?
        }
    };

    request.extensions_mut().insert(UserContext { user_id });
    Ok(next.run(request).await)
}
