use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::NaiveDate;
use tower::Service;
use tracing::info;

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::tokyo_gas::{Credentials, TokyoGasScraper, UsageRecord};
use crate::traits::UsagePortal;

/// 使用量取得リクエスト
#[derive(Debug, Clone)]
pub struct UsageRequest {
    pub username: String,
    pub password: String,
    pub customer_number: String,
    pub date: NaiveDate,
    pub headless: bool,
}

impl UsageRequest {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        customer_number: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            customer_number: customer_number.into(),
            date,
            headless: true,
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}

/// 認証情報検証リクエスト
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub username: String,
    pub password: String,
    pub customer_number: String,
    pub headless: bool,
}

impl VerifyRequest {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        customer_number: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            customer_number: customer_number.into(),
            headless: true,
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}

impl From<&UsageRequest> for Credentials {
    fn from(req: &UsageRequest) -> Self {
        Credentials::new(&req.username, &req.password, &req.customer_number)
    }
}

impl From<&UsageRequest> for ScraperConfig {
    fn from(req: &UsageRequest) -> Self {
        ScraperConfig::new().with_headless(req.headless)
    }
}

impl From<&VerifyRequest> for Credentials {
    fn from(req: &VerifyRequest) -> Self {
        Credentials::new(&req.username, &req.password, &req.customer_number)
    }
}

impl From<&VerifyRequest> for ScraperConfig {
    fn from(req: &VerifyRequest) -> Self {
        ScraperConfig::new().with_headless(req.headless)
    }
}

/// tower::Serviceを実装したスクレイパーサービス
///
/// リクエストごとに新しいスクレイパーとブラウザセッションを作る。
#[derive(Debug, Clone, Default)]
pub struct ScraperService {
    // 将来的な拡張用（レートリミットなど）
}

impl ScraperService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<UsageRequest> for ScraperService {
    type Response = Vec<UsageRecord>;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: UsageRequest) -> Self::Future {
        info!("使用量取得リクエスト受信: date={}", req.date);

        Box::pin(async move {
            let scraper = TokyoGasScraper::new((&req).into());
            let credentials: Credentials = (&req).into();

            let records = scraper
                .fetch_electricity_usage(&credentials, req.date)
                .await?;

            info!("使用量取得完了: {}件", records.len());
            Ok(records)
        })
    }
}

impl Service<VerifyRequest> for ScraperService {
    type Response = bool;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: VerifyRequest) -> Self::Future {
        info!("認証情報検証リクエスト受信");

        Box::pin(async move {
            let scraper = TokyoGasScraper::new((&req).into());
            let credentials: Credentials = (&req).into();

            scraper.verify_credentials(&credentials).await
        })
    }
}
