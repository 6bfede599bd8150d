//! myTOKYOGAS 電力使用量スクレイパー
//!
//! 公開APIを持たない会員ポータルから、実ブラウザ経由で時間別の
//! 電力使用量を取得する。ポータル内部のGraphQLコールを横取りして
//! 対象日を書き換え、レスポンスを構造化データとして捕捉する。
//!
//! # ライブラリ使用例
//!
//! ```rust,ignore
//! use tokyo_gas_scraper::{Credentials, ScraperConfig, TokyoGasScraper, UsagePortal};
//!
//! #[tokio::main]
//! async fn main() {
//!     let scraper = TokyoGasScraper::new(ScraperConfig::new().with_headless(true));
//!     let credentials = Credentials::new("user@example.com", "password", "1234567890");
//!
//!     let records = scraper
//!         .fetch_electricity_usage(&credentials, "2024-03-01".parse().unwrap())
//!         .await
//!         .unwrap();
//!     println!("{} records", records.len());
//! }
//! ```
//!
//! # tower Service 使用例
//!
//! ```rust,ignore
//! use tokyo_gas_scraper::{ScraperService, UsageRequest};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = ScraperService::new();
//!
//!     let request = UsageRequest::new("user@example.com", "password", "1234567890",
//!         "2024-03-01".parse().unwrap());
//!
//!     let records = service.call(request).await.unwrap();
//!     println!("{} records", records.len());
//! }
//! ```

pub mod config;
pub mod error;
pub mod server;
pub mod service;
pub mod tokyo_gas;
pub mod traits;

// 主要な型をリエクスポート
pub use config::{AppConfig, ScraperConfig};
pub use error::ScraperError;
pub use service::{ScraperService, UsageRequest, VerifyRequest};
pub use tokyo_gas::{Credentials, ScrapeSession, TokyoGasScraper, UsageRecord};
pub use traits::UsagePortal;
