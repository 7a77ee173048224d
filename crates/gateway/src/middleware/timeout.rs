//! Request deadline errors

use axum::BoxError;
use phrasebank_common::AppError;
use tower::timeout::error::Elapsed;

/// Map an error from the timeout layer onto the API error envelope
pub fn timeout_error(err: BoxError, seconds: u64) -> AppError {
    if err.is::<Elapsed>() {
        tracing::warn!(seconds, "Request deadline exceeded");
        AppError::Timeout { seconds }
    } else {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        error_handling::HandleErrorLayer,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use std::time::Duration;
    use tower::{timeout::TimeoutLayer, ServiceBuilder, ServiceExt};

    #[test]
    fn test_elapsed_maps_to_timeout() {
        let err = timeout_error(Box::new(Elapsed::new()), 30);
        assert!(matches!(err, AppError::Timeout { seconds: 30 }));
    }

    #[test]
    fn test_other_errors_are_internal() {
        let err = timeout_error("socket closed".into(), 30);
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_slow_request_gets_error_envelope() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(|err: BoxError| async move {
                        timeout_error(err, 0)
                    }))
                    .layer(TimeoutLayer::new(Duration::from_millis(20))),
            );

        let request = Request::builder().uri("/slow").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "REQUEST_TIMEOUT");
    }
}
