//! ページ操作の共通ヘルパー
//!
//! ラベル一致クリックとURL到達待ちはログインと使用量取得の両方で使う。

use std::time::Duration;

use chromiumoxide::Page;
use tracing::debug;

use crate::error::ScraperError;

/// ポーリング間隔（ミリ秒）
const POLL_INTERVAL_MS: u64 = 250;

/// 表示テキストに `label` を含む最初の要素をクリックする
///
/// 一致する要素が無い場合は `false` を返す。部分一致・先頭一致。
pub(crate) async fn click_first_by_text(
    page: &Page,
    tag: &str,
    label: &str,
) -> Result<bool, ScraperError> {
    let script = format!(
        r#"
        (function() {{
            var nodes = document.querySelectorAll('{tag}');
            for (var i = 0; i < nodes.length; i++) {{
                if (nodes[i].textContent.indexOf('{label}') >= 0) {{
                    nodes[i].click();
                    return true;
                }}
            }}
            return false;
        }})()
        "#
    );

    let clicked = page
        .evaluate(script.as_str())
        .await
        .map_err(|e| ScraperError::JavaScript(e.to_string()))?
        .into_value::<bool>()
        .unwrap_or(false);

    debug!("Click by text '{}' on <{}>: {}", label, tag, clicked);
    Ok(clicked)
}

/// 現在のページURLを返す
pub(crate) async fn current_url(page: &Page) -> Result<String, ScraperError> {
    let result = page
        .evaluate("window.location.href")
        .await
        .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
    Ok(result.into_value::<String>().unwrap_or_default())
}

/// URLが `prefix` で始まるまで待機する。`timeout` 超過でエラー
pub(crate) async fn wait_for_url_prefix(
    page: &Page,
    prefix: &str,
    timeout: Duration,
) -> Result<(), ScraperError> {
    let start = std::time::Instant::now();

    loop {
        if current_url(page).await?.starts_with(prefix) {
            return Ok(());
        }
        if start.elapsed() > timeout {
            return Err(ScraperError::Timeout(format!(
                "page did not reach {} within {}s",
                prefix,
                timeout.as_secs()
            )));
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

/// セレクタに一致する要素が表示されているか
pub(crate) async fn element_visible(page: &Page, selector: &str) -> Result<bool, ScraperError> {
    let script = format!(
        r#"
        (function() {{
            var elem = document.querySelector('{selector}');
            if (!elem) {{
                return false;
            }}
            var style = window.getComputedStyle(elem);
            var rect = elem.getBoundingClientRect();
            return style.display !== 'none' &&
                   style.visibility !== 'hidden' &&
                   (rect.width > 0 || rect.height > 0);
        }})()
        "#
    );

    let visible = page
        .evaluate(script.as_str())
        .await
        .map_err(|e| ScraperError::JavaScript(e.to_string()))?
        .into_value::<bool>()
        .unwrap_or(false);

    Ok(visible)
}
