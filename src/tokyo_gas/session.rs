//! ブラウザセッション管理
//!
//! 1リクエスト = 1ブラウザプロセス + 1ページ。セッションの共有・再利用はしない。

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::config::ScraperConfig;
use crate::error::ScraperError;

/// 1スクレイプリクエストに紐づく独立したブラウザセッション
///
/// `open` で確保したセッションは、成功・失敗を問わずすべての経路で
/// `close` を一度だけ呼ぶこと。`close` が値を消費するため二重クローズは
/// 型レベルで起こらない。
pub struct ScrapeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ScrapeSession {
    /// ブラウザを起動して新しいセッションを開く
    pub async fn open(config: &ScraperConfig) -> Result<Self, ScraperError> {
        info!("Launching browser session...");

        // 並行リクエスト間でプロファイルを共有しないよう、ユニークな
        // ユーザーデータディレクトリを割り当てる
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("tokyo-gas-scraper-{}", unique_id));

        let mut builder = BrowserConfig::builder().user_data_dir(&user_data_dir);

        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(config.timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        let browser_config = builder
            .build()
            .map_err(ScraperError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserLaunch(e.to_string()))?;

        // CDPイベントストリームはセッションが生きている間ドレインし続ける
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                trace!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserLaunch(e.to_string()))?;

        info!("Browser session ready");
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// セッションを破棄してブラウザプロセスを確実に終了させる
    ///
    /// 後始末の失敗はリクエストの結果を変えないため、ログに残すだけで
    /// 呼び出し元へは伝播しない。
    pub async fn close(mut self) {
        info!("Closing browser session...");

        if let Err(e) = self.browser.close().await {
            debug!("Graceful browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Failed to reap browser process: {}", e);
        }
        self.handler.abort();

        info!("Browser session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 実環境テスト用: cargo test test_session_open_close -- --ignored --nocapture
    #[tokio::test]
    #[ignore]
    async fn test_session_open_close() {
        let config = ScraperConfig::default();
        let session = ScrapeSession::open(&config)
            .await
            .expect("Failed to open session");
        assert!(session.page().url().await.is_ok());
        session.close().await;
    }
}
