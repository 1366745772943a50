//! 渲染会话管理
//!
//! 每个请求打开一个会话，在所有退出路径上恰好关闭一次。
//! 引擎的获取方式（启动新浏览器 / 连接已有浏览器）由 `SessionLauncher` 决定。

pub mod connection;
pub mod headless;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{BrowserMode, Config};
use crate::error::AppResult;
use crate::infrastructure::GalleryPage;
use crate::workflow::CancellationBroker;

pub use connection::ChromiumConnector;
pub use headless::ChromiumLauncher;

/// 选择器轮询间隔
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 打开渲染会话的能力
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// 打开一个新会话；`profile_dir` 为本请求独占的浏览器数据目录
    async fn open(&self, profile_dir: &Path) -> AppResult<Arc<dyn GalleryPage>>;
}

/// 根据配置选择引擎
pub fn launcher_from_config(config: &Config) -> Arc<dyn SessionLauncher> {
    match config.browser_mode {
        BrowserMode::Launch => Arc::new(ChromiumLauncher::new(
            config.browser_executable.clone(),
            config.headless,
        )),
        BrowserMode::Connect => Arc::new(ChromiumConnector::new(config.browser_debug_port)),
    }
}

/// 导航等待条件
#[derive(Debug, Clone)]
pub enum WaitCondition {
    /// 页面 load 完成即可
    Load,
    /// load 完成后还需等到选择器出现
    Selector(String),
}

/// 导航参数
#[derive(Debug, Clone)]
pub struct NavigateOptions {
    pub timeout: Duration,
    pub wait: WaitCondition,
}

/// 会话管理器
#[derive(Clone)]
pub struct SessionManager {
    launcher: Arc<dyn SessionLauncher>,
}

impl SessionManager {
    pub fn new(launcher: Arc<dyn SessionLauncher>) -> Self {
        Self { launcher }
    }

    /// 打开会话，返回保证关闭的守卫
    pub async fn open(
        &self,
        profile_dir: &Path,
        cancel: &CancellationBroker,
    ) -> AppResult<SessionGuard> {
        cancel.check()?;
        info!("🚀 启动浏览器会话...");
        let page = cancel.run(self.launcher.open(profile_dir)).await?;
        debug!("浏览器会话已打开");
        Ok(SessionGuard {
            page,
            cancel: cancel.clone(),
            closed: false,
        })
    }
}

/// 已打开的会话
///
/// 正常路径调用 `close()`；若守卫在关闭前被丢弃（例如请求任务被中止），
/// 会在后台补做关闭，因此每次 `open` 恰好对应一次关闭。
pub struct SessionGuard {
    page: Arc<dyn GalleryPage>,
    cancel: CancellationBroker,
    closed: bool,
}

impl SessionGuard {
    /// 页面能力
    pub fn page(&self) -> &dyn GalleryPage {
        self.page.as_ref()
    }

    /// 导航到指定地址，受超时与取消约束
    pub async fn navigate(&self, url: &str, options: &NavigateOptions) -> AppResult<()> {
        self.cancel.check()?;
        debug!("导航到: {}", url);
        self.cancel
            .run_with_timeout(url, options.timeout, self.page().goto(url))
            .await?;

        if let WaitCondition::Selector(selector) = &options.wait {
            self.wait_for_selector(selector, options.timeout).await?;
        }
        Ok(())
    }

    /// 轮询等待选择器出现
    pub async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> AppResult<()> {
        self.cancel
            .run_with_timeout(selector, timeout, async {
                loop {
                    if self.page().selector_present(selector).await? {
                        return Ok(());
                    }
                    self.cancel.sleep(SELECTOR_POLL_INTERVAL).await?;
                }
            })
            .await
    }

    /// 关闭会话
    pub async fn close(mut self) {
        self.closed = true;
        self.page.close().await;
        info!("✓ 浏览器会话已关闭");
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let page = Arc::clone(&self.page);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("会话守卫被提前丢弃，后台关闭会话");
                handle.spawn(async move { page.close().await });
            }
            Err(_) => warn!("没有可用的运行时，无法关闭浏览器会话"),
        }
    }
}
