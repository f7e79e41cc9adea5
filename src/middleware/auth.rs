//! Admin authentication middleware
//!
//! Admin routes are protected by a single shared bearer token when
//! `ADMIN_API_KEY` is configured; without it they are open (local
//! development parity).

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::{AppError, AppState};

/// Middleware: require the shared admin token when one is configured.
pub async fn require_admin_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = &state.config.admin_api_key else {
        // No key configured: admin surface is open.
        return Ok(next.run(req).await);
    };

    let token = extract_bearer_token(&req)?;
    if hash_token(&token) != hash_token(expected) {
        tracing::warn!("admin request rejected: bad bearer token");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(req).await)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(req: &Request) -> Result<String, AppError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;

    if !auth_header.starts_with("Bearer ") {
        return Err(AppError::Unauthorized);
    }

    Ok(auth_header[7..].to_string())
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
