//! Per-client rate limiting middleware.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    security::rate_limit::{RateDecision, RateLimiter},
    state::AppState,
};

/// Identify the caller: `CF-Connecting-IP`, then the first `X-Forwarded-For`
/// hop, then `"unknown"`.
pub fn client_key(headers: &HeaderMap) -> String {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    from_header("cf-connecting-ip")
        .or_else(|| from_header("x-forwarded-for"))
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state.rate_limiter, request.headers())?;
    Ok(next.run(request).await)
}

fn enforce(limiter: &RateLimiter, headers: &HeaderMap) -> Result<(), AppError> {
    let key = client_key(headers);
    match limiter.check(&key) {
        RateDecision::Allowed { .. } => Ok(()),
        RateDecision::Limited { retry_after } => {
            tracing::warn!(client = %key, "rate limit exceeded");
            // Round up so clients never retry a moment too early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            Err(AppError::RateLimited {
                retry_after_secs: secs.max(1),
            })
        }
    }
}
