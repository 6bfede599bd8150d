//! myTOKYOGAS スクレイパー本体
//!
//! ログイン → 使用量ページ → GraphQL横取り → 捕捉レスポンスの解析、
//! の直列フローを1ブラウザセッション上で実行する。

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::UsagePortal;

use super::session::ScrapeSession;
use super::types::{Credentials, UsageRecord};
use super::{auth, dom, intercept};

const URL_ELECTRICITY_USAGE: &str = "https://members.tokyo-gas.co.jp/usage/electricity";
/// 時間別表示に切り替えるタブのラベル
const LABEL_HOURLY_TAB: &str = "時間";

/// myTOKYOGAS 会員ポータルのスクレイパー
///
/// リクエストごとに独立したブラウザセッションを開き、終了時に必ず閉じる。
pub struct TokyoGasScraper {
    config: ScraperConfig,
}

impl TokyoGasScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    /// 開いたセッション上で使用量を取得する
    async fn fetch_on_session(
        &self,
        session: &ScrapeSession,
        credentials: &Credentials,
        date: NaiveDate,
    ) -> Result<Vec<UsageRecord>, ScraperError> {
        let page = session.page();

        auth::login(page, credentials, self.config.timeout)
            .await?
            .authenticated()?;

        info!("Navigating to electricity usage page");
        page.goto(URL_ELECTRICITY_USAGE)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;

        // UI操作より先に武装しないとレスポンスを取りこぼす
        let armed = intercept::arm(page, date, self.config.timeout).await?;

        let clicked = dom::click_first_by_text(page, "button", LABEL_HOURLY_TAB).await?;
        if !clicked {
            // ラベル変更などでクエリが発火しない場合は捕捉タイムアウトとして表面化する
            warn!("Hourly tab '{}' not found, awaiting capture anyway", LABEL_HOURLY_TAB);
        }

        let payload = armed.capture().await?;
        decode_usage_records(&payload)
    }
}

#[async_trait]
impl UsagePortal for TokyoGasScraper {
    async fn verify_credentials(&self, credentials: &Credentials) -> Result<bool, ScraperError> {
        let session = ScrapeSession::open(&self.config).await?;
        let outcome = auth::login(session.page(), credentials, self.config.timeout).await;
        session.close().await;
        outcome?.verified()
    }

    async fn fetch_electricity_usage(
        &self,
        credentials: &Credentials,
        date: NaiveDate,
    ) -> Result<Vec<UsageRecord>, ScraperError> {
        let session = ScrapeSession::open(&self.config).await?;
        let result = self.fetch_on_session(&session, credentials, date).await;
        session.close().await;
        result
    }
}

/// 捕捉したGraphQLレスポンスから生エントリを取り出す際の形
#[derive(Debug, Deserialize)]
struct RawUsageEntry {
    date: String,
    // 未公表の時間帯はnullで返る
    usage: Option<f64>,
}

/// 捕捉レスポンスを使用量レコード列に変換する
///
/// usageがnullのエントリは落とし、日時の昇順に整列して返す。
/// 整列は文字列順ではなく日時を解析した値で行う。
fn decode_usage_records(payload: &serde_json::Value) -> Result<Vec<UsageRecord>, ScraperError> {
    let entries = payload
        .get("data")
        .and_then(|data| data.get("hourlyElectricityUsage"))
        .ok_or_else(|| {
            ScraperError::Decode("hourlyElectricityUsage missing from payload".to_string())
        })?;

    let raw: Vec<RawUsageEntry> = serde_json::from_value(entries.clone())
        .map_err(|e| ScraperError::Decode(format!("unexpected usage entry shape: {}", e)))?;

    let mut keyed: Vec<(NaiveDateTime, UsageRecord)> = Vec::with_capacity(raw.len());
    for entry in raw {
        let Some(usage) = entry.usage else {
            continue;
        };
        let key = parse_record_date(&entry.date)?;
        keyed.push((
            key,
            UsageRecord {
                date: entry.date,
                usage,
            },
        ));
    }

    keyed.sort_by_key(|(key, _)| *key);
    let records = keyed.into_iter().map(|(_, record)| record).collect();

    Ok(records)
}

/// レコードの日時文字列を解析する
///
/// ポータルは "2024-03-01T02:00" 形式を返すが、秒付き・オフセット付きも受ける。
fn parse_record_date(date: &str) -> Result<NaiveDateTime, ScraperError> {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(date) {
        return Ok(parsed.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(date, format) {
            return Ok(parsed);
        }
    }
    Err(ScraperError::Decode(format!(
        "unparseable record date: {}",
        date
    )))
}
