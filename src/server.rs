//! HTTPフロントエンド
//!
//! スクレイパー本体を呼び出す薄いシェル。リクエストの検証と
//! エラーのステータスコード変換だけを受け持つ。

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::config::AppConfig;
use crate::error::ScraperError;
use crate::tokyo_gas::{Credentials, TokyoGasScraper};
use crate::traits::UsagePortal;

pub struct AppState<P> {
    portal: Arc<P>,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            portal: self.portal.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageQuery {
    username: String,
    password: String,
    customer_number: String,
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginPayload {
    username: String,
    password: String,
    customer_number: String,
}

pub fn router<P: UsagePortal + 'static>(portal: Arc<P>) -> Router {
    Router::new()
        .route("/", get(|| async { "tokyo-gas-scraper ok" }))
        .route("/login", post(login::<P>))
        .route("/electricity-usages", get(electricity_usages::<P>))
        .with_state(AppState { portal })
}

async fn login<P: UsagePortal>(
    State(state): State<AppState<P>>,
    Json(payload): Json<LoginPayload>,
) -> Response {
    info!("Verifying credentials");

    let credentials = Credentials::new(
        payload.username,
        payload.password,
        payload.customer_number,
    );

    match state.portal.verify_credentials(&credentials).await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ok"})),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"status": "unauthorized"})),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn electricity_usages<P: UsagePortal>(
    State(state): State<AppState<P>>,
    Query(query): Query<UsageQuery>,
) -> Response {
    info!("Retrieving electricity usages for {}", query.date);

    let credentials = Credentials::new(query.username, query.password, query.customer_number);

    match state
        .portal
        .fetch_electricity_usage(&credentials, query.date)
        .await
    {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_status(err: &ScraperError) -> StatusCode {
    match err {
        ScraperError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        ScraperError::Timeout(_) | ScraperError::CaptureTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn error_response(err: ScraperError) -> Response {
    (
        error_status(&err),
        Json(serde_json::json!({"status": "error", "error": err.to_string()})),
    )
        .into_response()
}

/// 設定を読み込んでHTTPサーバーを起動する
pub async fn run(config: AppConfig) -> Result<(), ScraperError> {
    let portal = Arc::new(TokyoGasScraper::new((&config).into()));
    let app = router(portal);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port)
        .parse()
        .map_err(|e| ScraperError::Config(format!("invalid listen address: {}", e)))?;

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::tokyo_gas::UsageRecord;

    use super::*;

    #[derive(Default)]
    struct MockPortal {
        accept: bool,
        records: Vec<UsageRecord>,
        fail_with_timeout: bool,
        verify_calls: AtomicUsize,
        usage_calls: AtomicUsize,
        last_usage_args: Mutex<Option<(String, NaiveDate)>>,
    }

    #[async_trait]
    impl UsagePortal for MockPortal {
        async fn verify_credentials(
            &self,
            _credentials: &Credentials,
        ) -> Result<bool, ScraperError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_with_timeout {
                return Err(ScraperError::CaptureTimeout("mock".to_string()));
            }
            Ok(self.accept)
        }

        async fn fetch_electricity_usage(
            &self,
            credentials: &Credentials,
            date: NaiveDate,
        ) -> Result<Vec<UsageRecord>, ScraperError> {
            self.usage_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_usage_args.lock().unwrap() =
                Some((credentials.customer_number.clone(), date));
            if self.fail_with_timeout {
                return Err(ScraperError::CaptureTimeout("mock".to_string()));
            }
            if !self.accept {
                return Err(ScraperError::InvalidCredentials);
            }
            Ok(self.records.clone())
        }
    }

    fn usage_uri() -> &'static str {
        "/electricity-usages?username=u1&password=p1&customerNumber=c1&date=2024-03-01"
    }

    fn login_request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"username":"u1","password":"p1","customerNumber":"c1"}"#,
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_usage_endpoint_returns_records() {
        let records = vec![
            UsageRecord {
                date: "2024-03-01T01:00".to_string(),
                usage: 0.9,
            },
            UsageRecord {
                date: "2024-03-01T02:00".to_string(),
                usage: 1.2,
            },
        ];
        let portal = Arc::new(MockPortal {
            accept: true,
            records: records.clone(),
            ..Default::default()
        });

        let response = router(portal.clone())
            .oneshot(Request::builder().uri(usage_uri()).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let returned: Vec<UsageRecord> = serde_json::from_slice(&body).unwrap();
        assert_eq!(returned, records);

        // 1リクエスト = 1スクレイプ呼び出し
        assert_eq!(portal.usage_calls.load(Ordering::SeqCst), 1);
        let args = portal.last_usage_args.lock().unwrap().clone().unwrap();
        assert_eq!(args.0, "c1");
        assert_eq!(args.1, "2024-03-01".parse::<NaiveDate>().unwrap());
    }

    #[tokio::test]
    async fn test_usage_endpoint_rejects_invalid_credentials() {
        let portal = Arc::new(MockPortal {
            accept: false,
            ..Default::default()
        });

        let response = router(portal)
            .oneshot(Request::builder().uri(usage_uri()).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_usage_endpoint_maps_timeout_to_gateway_timeout() {
        let portal = Arc::new(MockPortal {
            accept: true,
            fail_with_timeout: true,
            ..Default::default()
        });

        let response = router(portal)
            .oneshot(Request::builder().uri(usage_uri()).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_usage_endpoint_rejects_missing_date() {
        let portal = Arc::new(MockPortal::default());

        let response = router(portal.clone())
            .oneshot(
                Request::builder()
                    .uri("/electricity-usages?username=u1&password=p1&customerNumber=c1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        // スキーマ不正はスクレイプまで到達しない
        assert_eq!(portal.usage_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_endpoint_accepts_valid_credentials() {
        let portal = Arc::new(MockPortal {
            accept: true,
            ..Default::default()
        });

        let response = router(portal.clone())
            .oneshot(login_request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(portal.verify_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_login_endpoint_rejects_invalid_credentials() {
        let portal = Arc::new(MockPortal::default());

        let response = router(portal).oneshot(login_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_endpoint_propagates_transport_errors() {
        let portal = Arc::new(MockPortal {
            fail_with_timeout: true,
            ..Default::default()
        });

        let response = router(portal).oneshot(login_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
