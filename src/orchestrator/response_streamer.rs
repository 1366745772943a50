//! 响应流 - 编排层
//!
//! 把压缩包分块写给调用方；流结束、出错或被丢弃时清理暂存目录，且只清理一次。

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::Response;
use futures::Stream;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::ArchiveArtifact;
use crate::services::StagingStore;

/// 包装响应体，在结束时触发清理
pub struct CleanupStream<S> {
    inner: Option<S>,
    staging: Option<StagingStore>,
    sent: u64,
}

impl<S> CleanupStream<S> {
    pub fn new(inner: S, staging: StagingStore) -> Self {
        Self {
            inner: Some(inner),
            staging: Some(staging),
            sent: 0,
        }
    }

    /// 已发送字节数
    pub fn sent(&self) -> u64 {
        self.sent
    }

    fn finish(&mut self, completed: bool) {
        // 先关闭文件句柄再删目录
        self.inner = None;
        let Some(staging) = self.staging.take() else {
            return;
        };
        if completed {
            info!("📤 压缩包发送完成: {} 字节", self.sent);
        } else {
            info!("📤 响应提前结束，已发送 {} 字节", self.sent);
        }
        match staging.cleanup() {
            Ok(()) => debug!("🧹 暂存目录已清理"),
            Err(e) => warn!("清理暂存目录失败: {}", e),
        }
    }
}

impl<S> Stream for CleanupStream<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match Pin::new(inner).poll_next(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                this.sent += bytes.len() as u64;
                Poll::Ready(Some(Ok(bytes)))
            }
            Poll::Ready(Some(Err(e))) => {
                warn!("读取压缩包失败: {}", e);
                this.finish(false);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish(true);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S> Drop for CleanupStream<S> {
    fn drop(&mut self) {
        self.finish(false);
    }
}

/// 构造流式 zip 响应
///
/// 打开文件失败时暂存目录随 `staging` 一起被丢弃清理。
pub async fn stream_archive(
    artifact: &ArchiveArtifact,
    staging: StagingStore,
    file_name: &str,
) -> AppResult<Response> {
    let file = tokio::fs::File::open(&artifact.path)
        .await
        .map_err(|e| AppError::read_failed(&artifact.path, e))?;

    let body = CleanupStream::new(ReaderStream::new(file), staging);

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/zip")
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename={}", file_name),
        )
        .header(CONTENT_LENGTH, artifact.size_bytes.to_string())
        .body(Body::from_stream(body))
        .map_err(|e| AppError::Server(format!("构造响应失败: {}", e)))
}
