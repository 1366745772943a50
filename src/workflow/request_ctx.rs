//! 请求上下文
//!
//! 封装"我正在处理哪个请求"这一信息，显式传给每个阶段

use std::fmt::Display;

use crate::error::AppResult;
use crate::services::StagingStore;
use crate::workflow::CancellationBroker;

/// 单个下载请求的上下文
#[derive(Debug)]
pub struct RequestCtx {
    /// 请求 ID（日志与暂存目录命名）
    pub request_id: String,
    /// 相册地址
    pub gallery_url: String,
    /// 本请求独占的暂存目录
    pub staging: StagingStore,
    /// 本请求的取消令牌
    pub cancel: CancellationBroker,
}

impl RequestCtx {
    /// 创建上下文并分配暂存目录
    pub fn new(
        request_id: impl Into<String>,
        gallery_url: impl Into<String>,
        staging_root: &std::path::Path,
        cancel: CancellationBroker,
    ) -> AppResult<Self> {
        let request_id = request_id.into();
        let staging = StagingStore::create(staging_root, &request_id)?;
        Ok(Self {
            request_id,
            gallery_url: gallery_url.into(),
            staging,
            cancel,
        })
    }
}

impl Display for RequestCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[请求 {}]", self.request_id)
    }
}
