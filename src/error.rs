use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
///
/// 只有请求处理层（`orchestrator::download_handler`）会把它转换成 HTTP 响应，
/// 其它各层只负责向上传递。
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 链接发现错误
    #[error("发现错误: {0}")]
    Discovery(#[from] DiscoveryError),
    /// 打包错误
    #[error("打包错误: {0}")]
    Archive(#[from] ArchiveError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 请求参数错误
    #[error("请求参数错误: {0}")]
    InvalidRequest(String),
    /// HTTP 服务监听或运行失败
    #[error("HTTP 服务错误: {0}")]
    Server(String),
    /// 调用方已断开，请求被取消
    #[error("请求已取消")]
    Cancelled,
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 渲染引擎无法启动
    #[error("启动浏览器失败: {reason}")]
    LaunchFailed { reason: String },
    /// 连接已有浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {reason}")]
    ConnectionFailed { port: u16, reason: String },
    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },
    /// 导航或等待选择器超时
    #[error("等待 {target} 超时 ({timeout:?})")]
    Timeout { target: String, timeout: Duration },
    /// 执行脚本失败
    #[error("执行脚本失败: {reason}")]
    ScriptFailed { reason: String },
}

/// 链接发现错误
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// 滚动加载在上限内未能稳定
    #[error("列表在 {iterations} 次滚动 / {elapsed:?} 内仍未稳定")]
    Timeout { iterations: usize, elapsed: Duration },
    /// 资源地址匹配规则无效
    #[error("无效的资源地址规则 '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// 打包错误
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// 暂存目录中没有任何文件
    #[error("没有可打包的照片: {}", dir.display())]
    Empty { dir: PathBuf },
    /// zip 编码失败
    #[error("生成压缩包失败: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 创建目录失败
    #[error("创建目录失败 ({}): {source}", path.display())]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 读取文件失败
    #[error("读取文件失败 ({}): {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({}): {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 后台任务失败
    #[error("后台任务失败: {0}")]
    TaskFailed(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取或解析失败
    #[error("配置文件 {path} 解析失败: {reason}")]
    FileParseFailed { path: String, reason: String },
    /// 取值不合法
    #[error("配置项 {field} 取值不合法: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器启动错误
    pub fn launch_failed(reason: impl ToString) -> Self {
        AppError::Browser(BrowserError::LaunchFailed {
            reason: reason.to_string(),
        })
    }

    /// 创建导航错误
    pub fn navigation_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        AppError::Browser(BrowserError::NavigationFailed {
            url: url.into(),
            reason: reason.to_string(),
        })
    }

    /// 创建超时错误
    pub fn timeout(target: impl Into<String>, timeout: Duration) -> Self {
        AppError::Browser(BrowserError::Timeout {
            target: target.into(),
            timeout,
        })
    }

    /// 创建脚本执行错误
    pub fn script_failed(reason: impl ToString) -> Self {
        AppError::Browser(BrowserError::ScriptFailed {
            reason: reason.to_string(),
        })
    }

    /// 创建文件写入错误
    pub fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件读取错误
    pub fn read_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 是否为取消
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }

    /// 稳定的错误代码，用于 JSON 响应体
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Browser(BrowserError::LaunchFailed { .. })
            | AppError::Browser(BrowserError::ConnectionFailed { .. }) => "launch_failed",
            AppError::Browser(BrowserError::NavigationFailed { .. })
            | AppError::Browser(BrowserError::Timeout { .. }) => "navigation_failed",
            AppError::Browser(BrowserError::ScriptFailed { .. }) => "script_failed",
            AppError::Discovery(DiscoveryError::Timeout { .. }) => "discovery_timeout",
            AppError::Discovery(DiscoveryError::InvalidPattern { .. }) => "invalid_pattern",
            AppError::Archive(ArchiveError::Empty { .. }) => "empty_archive",
            AppError::Archive(ArchiveError::Zip(_)) => "archive_failed",
            AppError::File(_) => "io_error",
            AppError::Config(_) => "config_error",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Server(_) => "server_error",
            AppError::Cancelled => "cancelled",
        }
    }
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::script_failed(err)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::File(FileError::TaskFailed(err.to_string()))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
