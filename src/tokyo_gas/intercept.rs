//! GraphQLコールの横取り
//!
//! ポータルの使用量グラフはGraphQLエンドポイント経由でデータを取る。
//! このモジュールはFetchドメインで同エンドポイントの通信を一時停止し、
//! 時間別使用量クエリの対象日を書き換えてから送出し、対応する
//! レスポンスボディを捕捉する。
//!
//! リクエスト/レスポンスのIDは突き合わせない。復号したボディに
//! `data.hourlyElectricityUsage` が現れた最初のレスポンスを採用する。
//! セッションは1リクエスト専有なので同エンドポイントの競合は起きない。

use std::time::Duration;

use base64::Engine;
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, EventRequestPaused, RequestPattern, RequestStage,
};
use chromiumoxide::Page;
use chrono::NaiveDate;
use futures::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::ScraperError;

const GRAPHQL_URL_PATTERN: &str = "*/graphql";
/// 時間別電力使用量クエリのoperationName
const OPERATION_HOURLY_USAGE: &str = "hourlyElectricityUsage";
/// 書き換える対象日フィールド
const FIELD_TARGET_DATE: &str = "targetDate";

/// 武装済みのレスポンス捕捉
///
/// `capture` が解決するまで、横取りワーカーはGraphQL通信を
/// 通過させ続ける。
pub(crate) struct ArmedCapture {
    page: Page,
    rx: oneshot::Receiver<serde_json::Value>,
    worker: JoinHandle<()>,
    timeout: Duration,
}

/// 横取りルールを設置する
///
/// 前提条件: データ取得を発火させるUI操作より**前に**呼ぶこと。
/// 後から武装するとレスポンスを取りこぼす。
pub(crate) async fn arm(
    page: &Page,
    target_date: NaiveDate,
    timeout: Duration,
) -> Result<ArmedCapture, ScraperError> {
    info!("Arming GraphQL interception for {}", target_date);

    let patterns = vec![
        RequestPattern {
            url_pattern: Some(GRAPHQL_URL_PATTERN.to_string()),
            resource_type: None,
            request_stage: Some(RequestStage::Request),
        },
        RequestPattern {
            url_pattern: Some(GRAPHQL_URL_PATTERN.to_string()),
            resource_type: None,
            request_stage: Some(RequestStage::Response),
        },
    ];

    page.execute(fetch::EnableParams {
        patterns: Some(patterns),
        handle_auth_requests: None,
    })
    .await
    .map_err(|e| ScraperError::JavaScript(format!("failed to enable fetch domain: {}", e)))?;

    let mut events = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| ScraperError::JavaScript(format!("failed to listen for requests: {}", e)))?;

    let (tx, rx) = oneshot::channel();
    let worker_page = page.clone();

    let worker = tokio::spawn(async move {
        let mut tx = Some(tx);
        while let Some(event) = events.next().await {
            if event.response_status_code.is_some() {
                // レスポンス段: ページへ流す前にボディを検査する
                if tx.is_some() {
                    match worker_page
                        .execute(fetch::GetResponseBodyParams::new(event.request_id.clone()))
                        .await
                    {
                        Ok(body) => {
                            if let Some(text) =
                                decode_response_body(&body.body, body.base64_encoded)
                            {
                                if let Some(payload) = usage_response_payload(&text) {
                                    debug!("Captured hourly usage response");
                                    if let Some(tx) = tx.take() {
                                        let _ = tx.send(payload);
                                    }
                                }
                            }
                        }
                        Err(e) => debug!("Failed to read intercepted response body: {}", e),
                    }
                }
                continue_request(&worker_page, &event, None).await;
            } else {
                // リクエスト段: 対象クエリなら対象日を書き換えて送出する
                let rewritten = event
                    .request
                    .post_data
                    .as_deref()
                    .and_then(|body| rewrite_usage_query(body, target_date));
                if rewritten.is_some() {
                    debug!("Rewrote hourly usage query targetDate to {}", target_date);
                }
                continue_request(&worker_page, &event, rewritten).await;
            }
        }
    });

    Ok(ArmedCapture {
        page: page.clone(),
        rx,
        worker,
        timeout,
    })
}

impl ArmedCapture {
    /// 一致するレスポンスの到着を待つ
    ///
    /// 制限時間内に到着しなければ `CaptureTimeout`。解決後はルールを撤去する。
    pub(crate) async fn capture(self) -> Result<serde_json::Value, ScraperError> {
        let ArmedCapture {
            page,
            rx,
            worker,
            timeout,
        } = self;

        let result = tokio::time::timeout(timeout, rx).await;

        worker.abort();
        if let Err(e) = page.execute(fetch::DisableParams::default()).await {
            debug!("Failed to disable fetch domain: {}", e);
        }

        match result {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(ScraperError::CaptureTimeout(
                "interception worker stopped before a matching response".to_string(),
            )),
            Err(_) => Err(ScraperError::CaptureTimeout(format!(
                "no matching response within {}s",
                timeout.as_secs()
            ))),
        }
    }
}

/// 停止中のリクエストを送出する。`body` があればpostDataを差し替える
async fn continue_request(page: &Page, event: &EventRequestPaused, body: Option<String>) {
    let post_data = body
        .map(|b| chromiumoxide::Binary::from(base64::engine::general_purpose::STANDARD.encode(b)));
    let params = fetch::ContinueRequestParams {
        request_id: event.request_id.clone(),
        url: None,
        method: None,
        post_data,
        headers: None,
        intercept_response: None,
    };

    if let Err(e) = page.execute(params).await {
        debug!("Failed to continue intercepted request: {}", e);
    }
}

/// 時間別使用量クエリなら対象日を書き換えたボディを返す
///
/// 他のオペレーションや解析できないボディには `None` を返し、
/// 呼び出し側はそのまま通過させる。元の対象日の有無は問わない。
fn rewrite_usage_query(body: &str, target_date: NaiveDate) -> Option<String> {
    let mut value: serde_json::Value = serde_json::from_str(body).ok()?;

    if value.get("operationName")?.as_str()? != OPERATION_HOURLY_USAGE {
        return None;
    }

    let object = value.as_object_mut()?;
    let variables = object
        .entry("variables")
        .or_insert_with(|| serde_json::json!({}));
    variables.as_object_mut()?.insert(
        FIELD_TARGET_DATE.to_string(),
        serde_json::Value::String(target_date.format("%Y-%m-%d").to_string()),
    );

    serde_json::to_string(&value).ok()
}

/// ボディが時間別使用量レスポンスならJSON全体を返す
fn usage_response_payload(body: &str) -> Option<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("data")?.get(OPERATION_HOURLY_USAGE)?;
    Some(value)
}

/// CDPが返すレスポンスボディを復号する
fn decode_response_body(body: &str, base64_encoded: bool) -> Option<String> {
    if base64_encoded {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(body)
            .ok()?;
        String::from_utf8(bytes).ok()
    } else {
        Some(body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_rewrite_overwrites_existing_target_date() {
        let body = r#"{"operationName":"hourlyElectricityUsage","variables":{"customerNumber":"c1","targetDate":"2020-01-01"},"query":"query hourlyElectricityUsage($customerNumber: String!, $targetDate: String!) { ... }"}"#;
        let rewritten = rewrite_usage_query(body, date("2024-03-01")).unwrap();

        let value: serde_json::Value = serde_json::from_str(&rewritten).unwrap();
        assert_eq!(value["variables"]["targetDate"], "2024-03-01");
        // 他の変数はそのまま
        assert_eq!(value["variables"]["customerNumber"], "c1");
    }

    #[test]
    fn test_rewrite_inserts_missing_target_date() {
        let body = r#"{"operationName":"hourlyElectricityUsage","query":"..."}"#;
        let rewritten = rewrite_usage_query(body, date("2024-03-01")).unwrap();

        let value: serde_json::Value = serde_json::from_str(&rewritten).unwrap();
        assert_eq!(value["variables"]["targetDate"], "2024-03-01");
    }

    #[test]
    fn test_rewrite_passes_through_other_operations() {
        let body = r#"{"operationName":"currentContract","variables":{"targetDate":"2020-01-01"}}"#;
        assert!(rewrite_usage_query(body, date("2024-03-01")).is_none());
    }

    #[test]
    fn test_rewrite_passes_through_non_json_bodies() {
        assert!(rewrite_usage_query("not json", date("2024-03-01")).is_none());
    }

    #[test]
    fn test_usage_response_payload_matches_on_field_presence() {
        let body = r#"{"data":{"hourlyElectricityUsage":[{"date":"2024-03-01T01:00","usage":0.9}]}}"#;
        assert!(usage_response_payload(body).is_some());
    }

    #[test]
    fn test_usage_response_payload_ignores_other_responses() {
        assert!(usage_response_payload(r#"{"data":{"currentContract":{}}}"#).is_none());
        assert!(usage_response_payload(r#"{"errors":[]}"#).is_none());
        assert!(usage_response_payload("<html>").is_none());
    }

    #[test]
    fn test_decode_response_body() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(r#"{"data":{}}"#);
        assert_eq!(
            decode_response_body(&encoded, true).unwrap(),
            r#"{"data":{}}"#
        );
        assert_eq!(
            decode_response_body(r#"{"data":{}}"#, false).unwrap(),
            r#"{"data":{}}"#
        );
        assert!(decode_response_body("!!not base64!!", true).is_none());
    }
}
