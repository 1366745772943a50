//! 请求级取消令牌
//!
//! 每个请求一个令牌，由服务根令牌派生；根令牌取消时所有请求随之取消。

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::info;

use crate::error::{AppError, AppResult};

/// 取消协调器
///
/// - 只被设置一次（重复调用无副作用）
/// - 各阶段在每个等待点协作式检查
#[derive(Debug, Clone)]
pub struct CancellationBroker {
    token: CancellationToken,
}

impl CancellationBroker {
    /// 独立的令牌（无父级）
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// 从父令牌派生
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
        }
    }

    /// 触发取消，幂等
    pub fn cancel(&self, reason: &str) {
        if !self.token.is_cancelled() {
            info!("🛑 请求被取消: {}", reason);
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 已取消时返回 `AppError::Cancelled`
    pub fn check(&self) -> AppResult<()> {
        if self.token.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// 可取消的等待
    pub async fn sleep(&self, duration: Duration) -> AppResult<()> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(AppError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// 运行一个可取消的操作
    pub async fn run<T, F>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(AppError::Cancelled),
            res = fut => res,
        }
    }

    /// 运行一个带超时的可取消操作，超时返回 `BrowserError::Timeout`
    pub async fn run_with_timeout<T, F>(
        &self,
        target: &str,
        timeout: Duration,
        fut: F,
    ) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        self.run(async {
            tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| AppError::timeout(target, timeout))?
        })
        .await
    }

    /// 连接守卫：被丢弃时触发取消
    ///
    /// 请求处理 future 在客户端断开时会被 HTTP 服务端丢弃，守卫随之触发取消。
    pub fn disconnect_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }
}

impl Default for CancellationBroker {
    fn default() -> Self {
        Self::new()
    }
}
