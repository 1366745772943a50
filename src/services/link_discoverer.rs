//! 链接发现服务 - 业务能力层
//!
//! 把懒加载列表滚动到底，再按配置的策略提取照片地址

use std::collections::HashSet;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::browser::{NavigateOptions, SessionGuard, WaitCondition};
use crate::config::{Config, DiscoveryStrategy};
use crate::error::{AppError, AppResult, BrowserError, DiscoveryError};
use crate::models::{AssetUrlQuery, DiscoveredAsset, ScrollMetrics};
use crate::workflow::CancellationBroker;

/// 发现阶段参数
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub strategy: DiscoveryStrategy,
    pub thumbnail_selector: String,
    pub asset_host: Regex,
    pub detail_image_selector: String,
    pub scroll_settle: Duration,
    pub max_iterations: usize,
    pub max_duration: Duration,
    pub stable_rounds: usize,
    pub navigation_timeout: Duration,
}

impl DiscoverySettings {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let asset_host = Regex::new(&config.asset_host_pattern).map_err(|e| {
            AppError::Discovery(DiscoveryError::InvalidPattern {
                pattern: config.asset_host_pattern.clone(),
                reason: e.to_string(),
            })
        })?;
        Ok(Self {
            strategy: config.discovery_strategy,
            thumbnail_selector: config.thumbnail_selector.clone(),
            asset_host,
            detail_image_selector: config.detail_image_selector.clone(),
            scroll_settle: config.scroll_settle(),
            max_iterations: config.max_scroll_iterations,
            max_duration: config.max_discovery_duration(),
            stable_rounds: config.stable_rounds,
            navigation_timeout: config.navigation_timeout(),
        })
    }
}

/// 链接发现服务
///
/// 职责：
/// - 滚动到列表不再增长（有次数与时长上限）
/// - 按策略提取地址，按首次出现顺序去重
/// - 不下载，不关心暂存
pub struct LinkDiscoverer {
    settings: DiscoverySettings,
}

impl LinkDiscoverer {
    pub fn new(settings: DiscoverySettings) -> Self {
        Self { settings }
    }

    /// 发现相册中的全部照片
    pub async fn discover(
        &self,
        session: &SessionGuard,
        item_selector: &str,
        cancel: &CancellationBroker,
    ) -> AppResult<Vec<DiscoveredAsset>> {
        let metrics = self
            .scroll_until_stable(session, item_selector, cancel)
            .await?;
        info!(
            "✓ 列表已稳定，共渲染 {} 个条目 (高度 {})",
            metrics.item_count, metrics.scroll_height
        );

        let urls = match self.settings.strategy {
            DiscoveryStrategy::Thumbnail => self.extract_thumbnails(session, cancel).await?,
            DiscoveryStrategy::Detail => {
                self.resolve_details(session, item_selector, cancel).await?
            }
        };

        let assets = dedupe(urls);
        info!("🔍 共发现 {} 张照片", assets.len());
        Ok(assets)
    }

    /// 反复滚动到底，直到连续 `stable_rounds` 轮没有增长
    async fn scroll_until_stable(
        &self,
        session: &SessionGuard,
        item_selector: &str,
        cancel: &CancellationBroker,
    ) -> AppResult<ScrollMetrics> {
        let page = session.page();
        let started = Instant::now();
        let mut previous = cancel.run(page.scroll_metrics(item_selector)).await?;
        let mut quiet_rounds = 0;

        for iteration in 1..=self.settings.max_iterations {
            cancel.check()?;
            if started.elapsed() >= self.settings.max_duration {
                return Err(DiscoveryError::Timeout {
                    iterations: iteration - 1,
                    elapsed: started.elapsed(),
                }
                .into());
            }

            cancel.run(page.scroll_to_end(item_selector)).await?;
            cancel.sleep(self.settings.scroll_settle).await?;
            let current = cancel.run(page.scroll_metrics(item_selector)).await?;

            if current.grew_since(&previous) {
                debug!(
                    "第 {} 次滚动: 条目 {} -> {}, 高度 {} -> {}",
                    iteration,
                    previous.item_count,
                    current.item_count,
                    previous.scroll_height,
                    current.scroll_height
                );
                quiet_rounds = 0;
            } else {
                quiet_rounds += 1;
                if quiet_rounds >= self.settings.stable_rounds {
                    debug!("第 {} 次滚动后列表稳定", iteration);
                    return Ok(current);
                }
            }
            previous = current;
        }

        Err(DiscoveryError::Timeout {
            iterations: self.settings.max_iterations,
            elapsed: started.elapsed(),
        }
        .into())
    }

    /// 策略 a：直接读取缩略图地址
    async fn extract_thumbnails(
        &self,
        session: &SessionGuard,
        cancel: &CancellationBroker,
    ) -> AppResult<Vec<String>> {
        let query = AssetUrlQuery::src(&self.settings.thumbnail_selector);
        let urls = cancel.run(session.page().asset_urls(&query)).await?;
        let total = urls.len();
        let matched: Vec<String> = urls
            .into_iter()
            .filter(|url| self.settings.asset_host.is_match(url))
            .collect();
        debug!("缩略图 {} 个，符合资源地址规则的 {} 个", total, matched.len());
        Ok(matched)
    }

    /// 策略 b：读取条目链接，逐个进入详情页解析原图地址
    ///
    /// 单个详情页失败只跳过该条目；取消或会话本身出错会终止整个阶段。
    async fn resolve_details(
        &self,
        session: &SessionGuard,
        item_selector: &str,
        cancel: &CancellationBroker,
    ) -> AppResult<Vec<String>> {
        let links = cancel
            .run(session.page().asset_urls(&AssetUrlQuery::href(item_selector)))
            .await?;
        let links: Vec<String> = dedupe(links).into_iter().map(|a| a.source_url).collect();
        info!("找到 {} 个照片链接，逐个解析原图地址...", links.len());

        let options = NavigateOptions {
            timeout: self.settings.navigation_timeout,
            wait: WaitCondition::Selector(self.settings.detail_image_selector.clone()),
        };
        let image_query = AssetUrlQuery::src(&self.settings.detail_image_selector);

        let mut resolved = Vec::with_capacity(links.len());
        for (i, link) in links.iter().enumerate() {
            cancel.check()?;
            match session.navigate(link, &options).await {
                Ok(()) => {}
                Err(AppError::Browser(
                    e @ (BrowserError::Timeout { .. } | BrowserError::NavigationFailed { .. }),
                )) => {
                    warn!("[照片 #{}] ⚠️ 详情页加载失败，跳过: {}", i + 1, e);
                    continue;
                }
                Err(e) => return Err(e),
            }

            let sources = cancel.run(session.page().asset_urls(&image_query)).await?;
            match sources.into_iter().next() {
                Some(src) => {
                    debug!("[照片 #{}] 原图地址: {}", i + 1, src);
                    resolved.push(src);
                }
                None => warn!("[照片 #{}] ⚠️ 详情页中没有找到原图，跳过", i + 1),
            }
        }
        Ok(resolved)
    }
}

/// 按首次出现顺序去重，序号从 1 开始
pub fn dedupe(urls: Vec<String>) -> Vec<DiscoveredAsset> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .enumerate()
        .map(|(i, url)| DiscoveredAsset::new(url, i + 1))
        .collect()
}
