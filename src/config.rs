use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 浏览器会话的获取方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserMode {
    /// 每个请求启动一个独立的无头浏览器
    Launch,
    /// 连接到已开启调试端口的浏览器，每个请求新建一个页面
    Connect,
}

impl BrowserMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "launch" => Some(Self::Launch),
            "connect" => Some(Self::Connect),
            _ => None,
        }
    }
}

/// 链接发现策略
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStrategy {
    /// 直接从缩略图元素读取资源地址
    Thumbnail,
    /// 读取每个条目的链接，再进入详情页解析原图地址
    Detail,
}

impl DiscoveryStrategy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "thumbnail" => Some(Self::Thumbnail),
            "detail" => Some(Self::Detail),
            _ => None,
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 监听地址
    pub bind_addr: String,
    /// 浏览器获取方式
    pub browser_mode: BrowserMode,
    /// 浏览器调试端口（connect 模式）
    pub browser_debug_port: u16,
    /// 浏览器可执行文件，未设置时自动探测
    pub browser_executable: Option<PathBuf>,
    /// 是否无头运行
    pub headless: bool,
    /// 导航与等待选择器的超时（毫秒）
    pub navigation_timeout_ms: u64,
    /// 相册条目选择器
    pub item_selector: String,
    /// 链接发现策略
    pub discovery_strategy: DiscoveryStrategy,
    /// 缩略图选择器（thumbnail 策略）
    pub thumbnail_selector: String,
    /// 资源地址匹配规则（正则）
    pub asset_host_pattern: String,
    /// 详情页原图选择器（detail 策略）
    pub detail_image_selector: String,
    /// 每次滚动后的等待时间（毫秒）
    pub scroll_settle_ms: u64,
    /// 最大滚动次数
    pub max_scroll_iterations: usize,
    /// 发现阶段总时长上限（秒）
    pub max_discovery_secs: u64,
    /// 连续多少轮无增长视为稳定
    pub stable_rounds: usize,
    /// 同时下载的数量
    pub fetch_concurrency: usize,
    /// 两次下载开始之间的最小间隔（毫秒）
    pub fetch_spacing_ms: u64,
    /// 单个下载超时（秒）
    pub fetch_timeout_secs: u64,
    /// 单个下载失败后的重试次数，默认不重试
    pub fetch_retries: u32,
    /// 暂存根目录，未设置时使用系统临时目录
    pub staging_root: Option<PathBuf>,
    /// 压缩包文件名（不含扩展名）
    pub archive_name: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            browser_mode: BrowserMode::Launch,
            browser_debug_port: 9222,
            browser_executable: None,
            headless: true,
            navigation_timeout_ms: 60_000,
            item_selector: r#"[aria-label="Photo album photo"]"#.to_string(),
            discovery_strategy: DiscoveryStrategy::Detail,
            thumbnail_selector: r#"[aria-label="Photo album photo"] img"#.to_string(),
            asset_host_pattern: r"^https://[^/]*(fbcdn\.net|cdninstagram\.com)/".to_string(),
            detail_image_selector: r#"[data-visualcompletion="media-vc-image"]"#.to_string(),
            scroll_settle_ms: 1_500,
            max_scroll_iterations: 200,
            max_discovery_secs: 300,
            stable_rounds: 2,
            fetch_concurrency: 1,
            fetch_spacing_ms: 1_000,
            fetch_timeout_secs: 60,
            fetch_retries: 0,
            staging_root: None,
            archive_name: "photos".to_string(),
            verbose_logging: false,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// 加载配置：可选的 TOML 文件（`ALBUM_ZIPPER_CONFIG`）打底，环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let config = match std::env::var("ALBUM_ZIPPER_CONFIG") {
            Ok(path) => Self::from_toml_file(Path::new(&path))?.with_env_overrides(),
            Err(_) => Self::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// 只从环境变量加载
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileParseFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        toml::from_str(&content).map_err(|e| ConfigError::FileParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn with_env_overrides(self) -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(self.bind_addr),
            browser_mode: std::env::var("BROWSER_MODE")
                .ok()
                .and_then(|v| BrowserMode::parse(&v))
                .unwrap_or(self.browser_mode),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").unwrap_or(self.browser_debug_port),
            browser_executable: std::env::var("BROWSER_EXECUTABLE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .or(self.browser_executable),
            headless: env_parse("BROWSER_HEADLESS").unwrap_or(self.headless),
            navigation_timeout_ms: env_parse("NAVIGATION_TIMEOUT_MS")
                .unwrap_or(self.navigation_timeout_ms),
            item_selector: std::env::var("ITEM_SELECTOR").unwrap_or(self.item_selector),
            discovery_strategy: std::env::var("DISCOVERY_STRATEGY")
                .ok()
                .and_then(|v| DiscoveryStrategy::parse(&v))
                .unwrap_or(self.discovery_strategy),
            thumbnail_selector: std::env::var("THUMBNAIL_SELECTOR")
                .unwrap_or(self.thumbnail_selector),
            asset_host_pattern: std::env::var("ASSET_HOST_PATTERN")
                .unwrap_or(self.asset_host_pattern),
            detail_image_selector: std::env::var("DETAIL_IMAGE_SELECTOR")
                .unwrap_or(self.detail_image_selector),
            scroll_settle_ms: env_parse("SCROLL_SETTLE_MS").unwrap_or(self.scroll_settle_ms),
            max_scroll_iterations: env_parse("MAX_SCROLL_ITERATIONS")
                .unwrap_or(self.max_scroll_iterations),
            max_discovery_secs: env_parse("MAX_DISCOVERY_SECS").unwrap_or(self.max_discovery_secs),
            stable_rounds: env_parse("STABLE_ROUNDS").unwrap_or(self.stable_rounds),
            fetch_concurrency: env_parse("FETCH_CONCURRENCY").unwrap_or(self.fetch_concurrency),
            fetch_spacing_ms: env_parse("FETCH_SPACING_MS").unwrap_or(self.fetch_spacing_ms),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS").unwrap_or(self.fetch_timeout_secs),
            fetch_retries: env_parse("FETCH_RETRIES").unwrap_or(self.fetch_retries),
            staging_root: std::env::var("STAGING_ROOT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .or(self.staging_root),
            archive_name: std::env::var("ARCHIVE_NAME").unwrap_or(self.archive_name),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
        }
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch_concurrency",
                reason: "至少为 1".to_string(),
            });
        }
        if self.max_scroll_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_scroll_iterations",
                reason: "至少为 1".to_string(),
            });
        }
        if self.stable_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "stable_rounds",
                reason: "至少为 1".to_string(),
            });
        }
        if self.item_selector.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "item_selector",
                reason: "不能为空".to_string(),
            });
        }
        let name_ok = !self.archive_name.is_empty()
            && self
                .archive_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !name_ok {
            return Err(ConfigError::InvalidValue {
                field: "archive_name",
                reason: format!("'{}' 只能包含字母、数字、'-'、'_'、'.'", self.archive_name),
            });
        }
        regex::Regex::new(&self.asset_host_pattern).map_err(|e| ConfigError::InvalidValue {
            field: "asset_host_pattern",
            reason: e.to_string(),
        })?;
        Ok(())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn max_discovery_duration(&self) -> Duration {
        Duration::from_secs(self.max_discovery_secs)
    }

    pub fn fetch_spacing(&self) -> Duration {
        Duration::from_millis(self.fetch_spacing_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// 暂存根目录
    pub fn staging_root(&self) -> PathBuf {
        self.staging_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// 响应中的下载文件名
    pub fn archive_file_name(&self) -> String {
        format!("{}.zip", self.archive_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch_concurrency, 1);
        assert_eq!(config.fetch_retries, 0);
        assert_eq!(config.navigation_timeout(), Duration::from_secs(60));
        assert_eq!(config.archive_file_name(), "photos.zip");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = Config {
            fetch_concurrency: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "fetch_concurrency",
                ..
            })
        ));
    }

    #[test]
    fn test_bad_archive_name_rejected() {
        let config = Config {
            archive_name: "../photos".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "discovery_strategy = \"thumbnail\"\nfetch_concurrency = 3\nbrowser_mode = \"connect\"\n",
        )
        .expect("写入配置失败");

        let config = Config::from_toml_file(&path).expect("解析配置失败");
        assert_eq!(config.discovery_strategy, DiscoveryStrategy::Thumbnail);
        assert_eq!(config.browser_mode, BrowserMode::Connect);
        assert_eq!(config.fetch_concurrency, 3);
        assert_eq!(config.scroll_settle_ms, 1_500);
    }

    #[test]
    fn test_env_overrides_and_bad_values_fall_back() {
        std::env::set_var("FETCH_RETRIES", "2");
        std::env::set_var("DISCOVERY_STRATEGY", "thumbnail");
        std::env::set_var("FETCH_CONCURRENCY", "many");

        let config = Config::from_env();

        std::env::remove_var("FETCH_RETRIES");
        std::env::remove_var("DISCOVERY_STRATEGY");
        std::env::remove_var("FETCH_CONCURRENCY");

        assert_eq!(config.fetch_retries, 2);
        assert_eq!(config.discovery_strategy, DiscoveryStrategy::Thumbnail);
        assert_eq!(config.fetch_concurrency, 1);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(BrowserMode::parse(" Connect "), Some(BrowserMode::Connect));
        assert_eq!(DiscoveryStrategy::parse("detail"), Some(DiscoveryStrategy::Detail));
        assert_eq!(DiscoveryStrategy::parse("other"), None);
    }
}
