//! myTOKYOGAS 関連の型定義

use std::fmt;

use serde::{Deserialize, Serialize};

/// ポータルのログイン認証情報
///
/// セッションの生存期間を超えて保持しない。ログにも出力しない。
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub customer_number: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        customer_number: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            customer_number: customer_number.into(),
        }
    }
}

// パスワードをログに漏らさないため手動実装
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .field("customer_number", &self.customer_number)
            .finish()
    }
}

/// 1時間ごとの電力使用量レコード
///
/// `date` はポータルが返すISO形式の日時文字列をそのまま保持する。
/// 結果列は日時の昇順に整列される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub date: String,
    pub usage: f64,
}
