//! 相册处理流程 - 流程层
//!
//! 核心职责：定义"一个相册"的完整处理流程
//!
//! 流程顺序：
//! 1. 打开会话 → 导航 → 滚动发现 → 关闭会话
//! 2. 下载到暂存目录
//! 3. 打包

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::browser::{
    NavigateOptions, SessionGuard, SessionLauncher, SessionManager, WaitCondition,
};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::{ArchiveArtifact, DiscoveredAsset, FetchReport};
use crate::services::{Archiver, AssetFetcher, DiscoverySettings, FetchSettings, LinkDiscoverer};
use crate::workflow::RequestCtx;

/// 流程产出
#[derive(Debug)]
pub struct FlowOutput {
    pub artifact: ArchiveArtifact,
    pub report: FetchReport,
    pub discovered: usize,
}

/// 相册处理流程
///
/// - 编排各阶段的顺序
/// - 不持有请求级资源，所有请求状态都在 `RequestCtx` 中
/// - 会话在发现阶段结束后立即关闭（成功或失败都会关闭）
pub struct GalleryFlow {
    sessions: SessionManager,
    discoverer: LinkDiscoverer,
    fetcher: AssetFetcher,
    archiver: Archiver,
    item_selector: String,
    navigation_timeout: Duration,
}

impl GalleryFlow {
    /// 创建新的流程
    pub fn new(config: &Config, launcher: Arc<dyn SessionLauncher>) -> AppResult<Self> {
        Ok(Self {
            sessions: SessionManager::new(launcher),
            discoverer: LinkDiscoverer::new(DiscoverySettings::from_config(config)?),
            fetcher: AssetFetcher::new(FetchSettings::from_config(config))?,
            archiver: Archiver::new(config.archive_file_name()),
            item_selector: config.item_selector.clone(),
            navigation_timeout: config.navigation_timeout(),
        })
    }

    pub async fn run(&self, ctx: &RequestCtx) -> AppResult<FlowOutput> {
        info!("{} 📷 开始处理相册: {}", ctx, ctx.gallery_url);

        // ========== 阶段 1: 发现 ==========
        let assets = self.discover(ctx).await?;
        info!("{} 发现阶段完成: {} 张照片", ctx, assets.len());

        // ========== 阶段 2: 下载 ==========
        let report = if assets.is_empty() {
            warn!("{} ⚠️ 相册中没有发现照片", ctx);
            FetchReport::default()
        } else {
            self.fetcher
                .fetch_all(&assets, &ctx.staging, &ctx.cancel)
                .await?
        };
        for failure in &report.failures {
            warn!(
                "{} [照片 #{}] 未能下载: {}",
                ctx, failure.ordinal, failure.reason
            );
        }

        // ========== 阶段 3: 打包 ==========
        ctx.cancel.check()?;
        let artifact = self.archiver.build(&ctx.staging).await?;

        Ok(FlowOutput {
            artifact,
            report,
            discovered: assets.len(),
        })
    }

    /// 打开会话完成发现，无论结果如何都关闭会话
    async fn discover(&self, ctx: &RequestCtx) -> AppResult<Vec<DiscoveredAsset>> {
        let session = self
            .sessions
            .open(&ctx.staging.profile_dir(), &ctx.cancel)
            .await?;

        let result = self.discover_in_session(&session, ctx).await;

        session.close().await;
        result
    }

    async fn discover_in_session(
        &self,
        session: &SessionGuard,
        ctx: &RequestCtx,
    ) -> AppResult<Vec<DiscoveredAsset>> {
        let options = NavigateOptions {
            timeout: self.navigation_timeout,
            wait: WaitCondition::Load,
        };
        session.navigate(&ctx.gallery_url, &options).await?;

        // 条目一直不出现（登录墙、页面未渲染）按超时上报，不当作空相册
        if let Err(e) = session
            .wait_for_selector(&self.item_selector, self.navigation_timeout)
            .await
        {
            warn!("{} ⚠️ 页面中没有出现相册条目: {}", ctx, e);
            return Err(e);
        }

        self.discoverer
            .discover(session, &self.item_selector, &ctx.cancel)
            .await
    }
}
