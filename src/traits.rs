use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ScraperError;
use crate::tokyo_gas::{Credentials, UsageRecord};

/// 使用量ポータルへのリクエスト境界
///
/// 1呼び出し = 1独立ブラウザセッション。呼び出し間で状態を共有しない。
#[async_trait]
pub trait UsagePortal: Send + Sync {
    /// 認証情報の検証
    ///
    /// ポータルが認証情報を拒否した場合のみ `false`。タイムアウトや
    /// ナビゲーション障害はエラーとして伝播する。
    async fn verify_credentials(&self, credentials: &Credentials) -> Result<bool, ScraperError>;

    /// 指定日の時間別電力使用量を取得する
    ///
    /// 成功時は日時昇順のレコード列を返す。
    async fn fetch_electricity_usage(
        &self,
        credentials: &Credentials,
        date: NaiveDate,
    ) -> Result<Vec<UsageRecord>, ScraperError>;
}
