use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ起動エラー: {0}")]
    BrowserLaunch(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("認証情報が不正です")]
    InvalidCredentials,

    #[error("レスポンス捕捉タイムアウト: {0}")]
    CaptureTimeout(String),

    #[error("レスポンス解析エラー: {0}")]
    Decode(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),
}
