//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露 `GalleryPage` 定义的能力

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::GalleryPage;
use crate::models::{AssetUrlQuery, ScrollMetrics};

/// 定位条目所在的可滚动祖先，找不到时退回到文档滚动元素
const LOCATE_SCROLLER: &str = r#"
    const __locate = (sel) => {
        const root = document.scrollingElement || document.documentElement;
        const item = document.querySelector(sel);
        let el = item ? item.parentElement : null;
        while (el && el !== document.body && el !== document.documentElement) {
            const style = window.getComputedStyle(el);
            if (/(auto|scroll)/.test(style.overflowY) && el.scrollHeight > el.clientHeight) {
                return el;
            }
            el = el.parentElement;
        }
        return root;
    };
"#;

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源（以及 launch 模式下的 Browser）
/// - 实现 `GalleryPage`
/// - 不认识相册 / 下载
pub struct JsExecutor {
    page: Page,
    browser: Mutex<Option<Browser>>,
    owns_browser: bool,
    handler_task: JoinHandle<()>,
    closed: AtomicBool,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    ///
    /// `owns_browser` 为 true 时浏览器归本会话所有，关闭时一并退出
    pub fn new(
        page: Page,
        browser: Browser,
        owns_browser: bool,
        handler_task: JoinHandle<()>,
    ) -> Self {
        Self {
            page,
            browser: Mutex::new(Some(browser)),
            owns_browser,
            handler_task,
            closed: AtomicBool::new(false),
        }
    }

    /// 执行 JS 表达式并反序列化为指定类型
    async fn eval_as<T: DeserializeOwned>(&self, js_code: String) -> AppResult<T> {
        let result = self.page.evaluate(js_code).await?;
        result.into_value::<T>().map_err(AppError::script_failed)
    }
}

/// 关闭并等待浏览器进程退出
pub(crate) async fn shutdown_browser(mut browser: Browser) {
    if let Err(e) = browser.close().await {
        warn!("关闭浏览器失败: {}", e);
    }
    if let Err(e) = browser.wait().await {
        warn!("等待浏览器进程退出失败: {}", e);
    }
}

/// 把字符串编码成 JS 字面量
fn js_literal(value: &str) -> AppResult<String> {
    serde_json::to_string(value).map_err(AppError::script_failed)
}

#[async_trait]
impl GalleryPage for JsExecutor {
    async fn goto(&self, url: &str) -> AppResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| AppError::navigation_failed(url, e))?;
        debug!("页面导航成功: {}", url);
        Ok(())
    }

    async fn selector_present(&self, selector: &str) -> AppResult<bool> {
        let js_code = format!("document.querySelector({}) !== null", js_literal(selector)?);
        self.eval_as(js_code).await
    }

    async fn scroll_metrics(&self, item_selector: &str) -> AppResult<ScrollMetrics> {
        let sel = js_literal(item_selector)?;
        let js_code = format!(
            r#"
            (() => {{
                {LOCATE_SCROLLER}
                const target = __locate({sel});
                return {{
                    scrollHeight: Math.round(target.scrollHeight),
                    itemCount: document.querySelectorAll({sel}).length
                }};
            }})()
            "#
        );
        self.eval_as(js_code).await
    }

    async fn scroll_to_end(&self, item_selector: &str) -> AppResult<()> {
        let sel = js_literal(item_selector)?;
        let js_code = format!(
            r#"
            (() => {{
                {LOCATE_SCROLLER}
                const target = __locate({sel});
                target.scrollTop = target.scrollHeight;
                return true;
            }})()
            "#
        );
        let _: bool = self.eval_as(js_code).await?;
        Ok(())
    }

    async fn asset_urls(&self, query: &AssetUrlQuery) -> AppResult<Vec<String>> {
        let js_code = format!(
            r#"
            Array.from(document.querySelectorAll({sel}))
                .map((el) => el[{attr}])
                .filter((v) => typeof v === 'string' && v.length > 0)
            "#,
            sel = js_literal(&query.selector)?,
            attr = js_literal(query.attribute.as_str())?,
        );
        self.eval_as(js_code).await
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.page.clone().close().await {
            warn!("关闭页面失败: {}", e);
        }

        let browser = self.browser.lock().await.take();
        if let (Some(browser), true) = (browser, self.owns_browser) {
            shutdown_browser(browser).await;
        }

        self.handler_task.abort();
        debug!("浏览器会话已关闭");
    }
}
