//! 页面能力接口 - 基础设施层
//!
//! 上层只通过这个接口驱动渲染引擎，不直接执行任意脚本

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{AssetUrlQuery, ScrollMetrics};

/// 一个已打开的渲染会话（单个页面）
///
/// 职责：
/// - 导航与元素探测
/// - 两个类型化查询：滚动度量、资源地址列表
/// - 一个命令：把列表容器滚动到底
/// - 关闭会话
///
/// 超时与取消由调用方（`browser::SessionGuard`）包裹，实现只做单步操作。
#[async_trait]
pub trait GalleryPage: Send + Sync {
    /// 导航到指定地址，等待页面加载完成
    async fn goto(&self, url: &str) -> AppResult<()>;

    /// 选择器当前是否能匹配到元素
    async fn selector_present(&self, selector: &str) -> AppResult<bool>;

    /// 查询条目所在滚动容器的度量
    async fn scroll_metrics(&self, item_selector: &str) -> AppResult<ScrollMetrics>;

    /// 把条目所在滚动容器滚动到当前最大位置
    async fn scroll_to_end(&self, item_selector: &str) -> AppResult<()>;

    /// 读取匹配元素的地址属性，按文档顺序返回
    async fn asset_urls(&self, query: &AssetUrlQuery) -> AppResult<Vec<String>>;

    /// 关闭会话，失败只记录日志；重复调用无副作用
    async fn close(&self);
}
