use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ErrorResponse;

/// Process-wide throttle for the settlement endpoint. Each settlement
/// occupies a poll slot against the shared treasury for up to five
/// minutes, so admission is limited rather than queued.
pub struct RequestThrottle {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RequestThrottle {
    pub fn new(requests: u32, per_seconds: u64) -> Arc<Self> {
        let burst = NonZeroU32::new(requests.max(1)).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(Duration::from_secs(per_seconds.max(1)))
            .unwrap_or_else(|| Quota::per_minute(burst))
            .allow_burst(burst);

        Arc::new(Self {
            limiter: RateLimiter::direct(quota),
        })
    }

    pub fn admit(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

pub async fn throttle_middleware(
    State(throttle): State<Arc<RequestThrottle>>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    if !throttle.admit() {
        let body = Json(ErrorResponse {
            error: "Too many settlement requests, try again shortly".to_string(),
            error_code: "RATE_LIMITED".to_string(),
            details: None,
        });
        return Err((StatusCode::TOO_MANY_REQUESTS, body).into_response());
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_within_burst_then_rejects() {
        let throttle = RequestThrottle::new(2, 60);
        assert!(throttle.admit());
        assert!(throttle.admit());
        assert!(!throttle.admit());
    }
}
