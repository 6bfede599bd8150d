//! ログインフロー
//!
//! ログインの結果検知は1つの状態機械に統一する。ダッシュボード到達と
//! インラインエラー表示を同じループで競争させ、呼び出し側が
//! `LoginOutcome` の解釈（bool か エラーか）を選ぶ。

use std::time::Duration;

use chromiumoxide::Page;
use tracing::{debug, info};

use crate::error::ScraperError;

use super::dom;
use super::types::Credentials;

const URL_TOP_PAGE: &str = "https://members.tokyo-gas.co.jp/";
const URL_LOGIN: &str = "https://members.tokyo-gas.co.jp/login";
const URL_DASHBOARD: &str = "https://members.tokyo-gas.co.jp/dashboard";

const LABEL_LOGIN_LINK: &str = "ログイン";
const SELECTOR_LOGIN_ID: &str = "input#loginId";
const SELECTOR_PASSWORD: &str = "input#password";
const SELECTOR_SUBMIT: &str = "#submit-btn";
/// ログインフォーム下に出る認証失敗メッセージ
const SELECTOR_LOGIN_ERROR: &str = ".error-message";

/// ログイン結果検知のポーリング間隔（ミリ秒）
const OUTCOME_POLL_INTERVAL_MS: u64 = 250;

/// ログイン試行の結末
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginOutcome {
    /// ダッシュボードに到達した
    Authenticated,
    /// ポータルが認証情報を拒否した
    Rejected,
    /// 制限時間内にどちらも確定しなかった
    TimedOut,
}

impl LoginOutcome {
    /// 認証情報検証として解釈する。拒否は `false`、未確定はエラー
    pub(crate) fn verified(self) -> Result<bool, ScraperError> {
        match self {
            LoginOutcome::Authenticated => Ok(true),
            LoginOutcome::Rejected => Ok(false),
            LoginOutcome::TimedOut => Err(ScraperError::Timeout(
                "login outcome not determined".to_string(),
            )),
        }
    }

    /// データ取得の前提条件として解釈する。拒否・未確定はエラー
    pub(crate) fn authenticated(self) -> Result<(), ScraperError> {
        match self {
            LoginOutcome::Authenticated => Ok(()),
            LoginOutcome::Rejected => Err(ScraperError::InvalidCredentials),
            LoginOutcome::TimedOut => Err(ScraperError::Timeout(
                "login outcome not determined".to_string(),
            )),
        }
    }
}

/// ポータルへログインし、結果を返す
///
/// トランスポート障害（ナビゲーション・JS実行の失敗）は `Err`、
/// ログインの成否そのものは `LoginOutcome` で返す。
pub(crate) async fn login(
    page: &Page,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<LoginOutcome, ScraperError> {
    info!("Starting login flow");

    page.goto(URL_TOP_PAGE)
        .await
        .map_err(|e| ScraperError::Navigation(e.to_string()))?;
    page.wait_for_navigation()
        .await
        .map_err(|e| ScraperError::Navigation(e.to_string()))?;
    debug!("Top page loaded");

    let clicked = dom::click_first_by_text(page, "a", LABEL_LOGIN_LINK).await?;
    if !clicked {
        return Err(ScraperError::ElementNotFound(format!(
            "login link '{}'",
            LABEL_LOGIN_LINK
        )));
    }

    dom::wait_for_url_prefix(page, URL_LOGIN, timeout).await?;
    debug!("Login page reached");

    page.find_element(SELECTOR_LOGIN_ID)
        .await
        .map_err(|e| ScraperError::ElementNotFound(format!("login id field: {}", e)))?
        .type_str(&credentials.username)
        .await
        .map_err(|e| ScraperError::Navigation(format!("failed to fill login id: {}", e)))?;

    page.find_element(SELECTOR_PASSWORD)
        .await
        .map_err(|e| ScraperError::ElementNotFound(format!("password field: {}", e)))?
        .type_str(&credentials.password)
        .await
        .map_err(|e| ScraperError::Navigation(format!("failed to fill password: {}", e)))?;

    page.find_element(SELECTOR_SUBMIT)
        .await
        .map_err(|e| ScraperError::ElementNotFound(format!("submit button: {}", e)))?
        .click()
        .await
        .map_err(|e| ScraperError::Navigation(format!("failed to submit login: {}", e)))?;
    debug!("Credentials submitted");

    // ダッシュボード到達とエラーメッセージ表示を同じループで競争させる
    let start = std::time::Instant::now();
    loop {
        if dom::current_url(page).await?.starts_with(URL_DASHBOARD) {
            info!("Login succeeded");
            return Ok(LoginOutcome::Authenticated);
        }
        if dom::element_visible(page, SELECTOR_LOGIN_ERROR).await? {
            info!("Portal rejected credentials");
            return Ok(LoginOutcome::Rejected);
        }
        if start.elapsed() > timeout {
            info!("Login outcome not determined within {}s", timeout.as_secs());
            return Ok(LoginOutcome::TimedOut);
        }
        tokio::time::sleep(Duration::from_millis(OUTCOME_POLL_INTERVAL_MS)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verified_maps_outcomes() {
        assert!(LoginOutcome::Authenticated.verified().unwrap());
        assert!(!LoginOutcome::Rejected.verified().unwrap());
        assert!(matches!(
            LoginOutcome::TimedOut.verified(),
            Err(ScraperError::Timeout(_))
        ));
    }

    #[test]
    fn test_authenticated_maps_outcomes() {
        assert!(LoginOutcome::Authenticated.authenticated().is_ok());
        assert!(matches!(
            LoginOutcome::Rejected.authenticated(),
            Err(ScraperError::InvalidCredentials)
        ));
        assert!(matches!(
            LoginOutcome::TimedOut.authenticated(),
            Err(ScraperError::Timeout(_))
        ));
    }
}
