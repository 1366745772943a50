use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Browser;
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::browser::SessionLauncher;
use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::{GalleryPage, JsExecutor};

/// 连接到已开启调试端口的浏览器，每个请求新建一个页面
///
/// 关闭会话时只关闭页面，不退出浏览器。
pub struct ChromiumConnector {
    port: u16,
}

impl ChromiumConnector {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl SessionLauncher for ChromiumConnector {
    async fn open(&self, _profile_dir: &Path) -> AppResult<Arc<dyn GalleryPage>> {
        let browser_url = format!("http://localhost:{}", self.port);
        info!("正在连接到浏览器: {}", browser_url);

        let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
            error!("连接浏览器失败: {}", e);
            AppError::Browser(BrowserError::ConnectionFailed {
                port: self.port,
                reason: e.to_string(),
            })
        })?;
        debug!("浏览器连接成功");

        // 在后台处理浏览器事件
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        // 添加短暂延迟以等待浏览器状态同步
        sleep(Duration::from_millis(300)).await;

        let page = browser.new_page("about:blank").await.map_err(|e| {
            error!("创建页面失败: {}", e);
            handler_task.abort();
            AppError::launch_failed(e)
        })?;

        Ok(Arc::new(JsExecutor::new(page, browser, false, handler_task)))
    }
}
