//! myTOKYOGAS 会員ポータルスクレイパー
//!
//! ブラウザセッション管理・ログイン・GraphQL横取り・使用量抽出

mod auth;
mod dom;
mod intercept;
mod scraper;
mod session;
mod types;

pub use scraper::TokyoGasScraper;
pub use session::ScrapeSession;
pub use types::{Credentials, UsageRecord};
