//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use phrasebank_common::{config::RateLimitConfig, AppError};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Limiter plus the configured rate, reported back in 429 bodies
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<GlobalRateLimiter>,
    requests_per_second: u32,
}

impl RateLimit {
    /// Create a new rate limiter; zero values are raised to one
    pub fn new(config: &RateLimitConfig) -> Self {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second).allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            requests_per_second: per_second.get(),
        }
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(limit): State<RateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match limit.limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            Err(AppError::RateLimited {
                limit: limit.requests_per_second,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_router, AppState};
    use axum::{body::Body, http::StatusCode};
    use phrasebank_common::{config::AppConfig, db::MemoryStore, PhraseService};
    use tokio_test::{assert_err, assert_ok};
    use tower::ServiceExt;

    #[test]
    fn test_rate_limiter_creation() {
        let limit = RateLimit::new(&RateLimitConfig {
            requests_per_second: 100,
            burst: 200,
            enabled: true,
        });
        assert_ok!(limit.limiter.check());
        assert_eq!(limit.requests_per_second, 100);
    }

    #[test]
    fn test_zero_rate_is_raised_to_one() {
        let limit = RateLimit::new(&RateLimitConfig {
            requests_per_second: 0,
            burst: 0,
            enabled: true,
        });
        assert_eq!(limit.requests_per_second, 1);

        assert_ok!(limit.limiter.check());
        assert_err!(limit.limiter.check());
    }

    #[tokio::test]
    async fn test_requests_over_burst_are_rejected() {
        let mut config = AppConfig::with_database_url("memory://");
        config.rate_limit = RateLimitConfig {
            requests_per_second: 1,
            burst: 1,
            enabled: true,
        };
        let phrases = PhraseService::new(Arc::new(MemoryStore::new()), config.listing.clone());
        let app = create_router(AppState {
            config: Arc::new(config),
            phrases,
        });

        let request = || axum::http::Request::builder().uri("/health").body(Body::empty()).unwrap();

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
