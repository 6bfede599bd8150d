use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::ScraperError;

/// Home Assistantアドオン形式のオプションファイルのデフォルトパス
const DEFAULT_OPTIONS_PATH: &str = "/data/options.json";

/// プロセス起動時に一度だけ読み込むアプリケーション設定
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            log_level: default_log_level(),
            headless: default_headless(),
            chrome_path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// オプションファイルを読み込む。ファイルが無い場合はデフォルト設定で起動する
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScraperError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("options file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| ScraperError::Config(format!("failed to parse {:?}: {}", path, e)))
    }

    /// `OPTIONS_PATH` 環境変数、無ければ `/data/options.json` から読み込む
    pub fn load_default() -> Result<Self, ScraperError> {
        let path =
            std::env::var("OPTIONS_PATH").unwrap_or_else(|_| DEFAULT_OPTIONS_PATH.to_string());
        Self::load(path)
    }
}

/// 1スクレイプセッションのブラウザ設定
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl From<&AppConfig> for ScraperConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            headless: config.headless,
            chrome_path: config.chrome_path.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}
