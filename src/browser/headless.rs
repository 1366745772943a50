use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::browser::SessionLauncher;
use crate::error::{AppError, AppResult};
use crate::infrastructure::js_executor::shutdown_browser;
use crate::infrastructure::{GalleryPage, JsExecutor};

/// 无头启动参数
const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-default-apps",
    "--disable-infobars",
    "--window-position=0,0",
];

/// 每个请求启动一个独立的浏览器进程
pub struct ChromiumLauncher {
    /// 未设置时由 chromiumoxide 自动探测本机 Chrome
    executable: Option<PathBuf>,
    headless: bool,
}

impl ChromiumLauncher {
    pub fn new(executable: Option<PathBuf>, headless: bool) -> Self {
        Self {
            executable,
            headless,
        }
    }

    fn browser_config(&self, profile_dir: &Path) -> AppResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile_dir)
            .args(LAUNCH_ARGS.to_vec());

        builder = if self.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };

        if let Some(path) = &self.executable {
            debug!("使用指定的浏览器: {}", path.display());
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(|e| {
            error!("配置无头浏览器失败: {}", e);
            AppError::launch_failed(e)
        })
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn open(&self, profile_dir: &Path) -> AppResult<Arc<dyn GalleryPage>> {
        let config = self.browser_config(profile_dir)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            error!("启动无头浏览器失败: {}", e);
            AppError::launch_failed(e)
        })?;
        debug!("无头浏览器启动成功");

        // 在后台处理浏览器事件
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        // 等待浏览器状态同步
        sleep(Duration::from_millis(300)).await;

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                error!("创建页面失败: {}", e);
                shutdown_browser(browser).await;
                handler_task.abort();
                return Err(AppError::launch_failed(e));
            }
        };

        info!("✅ 无头浏览器已就绪");
        Ok(Arc::new(JsExecutor::new(page, browser, true, handler_task)))
    }
}
