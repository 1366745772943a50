//! HTTP 服务 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：校验配置、选择浏览器引擎、构建 `GalleryFlow`
//! 2. **路由**：`GET /api/download`
//! 3. **生命周期**：持有根取消令牌，Ctrl-C 时取消全部请求并优雅退出

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::browser::{launcher_from_config, SessionLauncher};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::orchestrator::download_handler;
use crate::utils::logging::log_startup;
use crate::workflow::GalleryFlow;

/// 处理函数共享的状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub flow: Arc<GalleryFlow>,
    /// 根取消令牌，每个请求从它派生
    pub shutdown: CancellationToken,
}

/// 应用主结构
pub struct App {
    state: AppState,
}

impl App {
    /// 初始化应用（按配置选择浏览器引擎）
    pub fn initialize(config: Config) -> AppResult<Self> {
        let launcher = launcher_from_config(&config);
        Self::with_launcher(config, launcher)
    }

    /// 使用指定的会话引擎初始化
    pub fn with_launcher(config: Config, launcher: Arc<dyn SessionLauncher>) -> AppResult<Self> {
        config.validate()?;
        let flow = GalleryFlow::new(&config, launcher)?;
        Ok(Self {
            state: AppState {
                config: Arc::new(config),
                flow: Arc::new(flow),
                shutdown: CancellationToken::new(),
            },
        })
    }

    /// 根取消令牌
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// 构建路由
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/download", get(download_handler::download))
            .with_state(self.state.clone())
    }

    /// 监听并服务，直到 Ctrl-C 或根令牌被取消
    pub async fn run(self) -> AppResult<()> {
        let addr = self.state.config.bind_addr.clone();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Server(format!("无法监听 {}: {}", addr, e)))?;
        log_startup(&self.state.config, &addr);
        self.serve(listener).await
    }

    /// 在给定的监听器上服务
    pub async fn serve(self, listener: tokio::net::TcpListener) -> AppResult<()> {
        let shutdown = self.state.shutdown.clone();
        let router = self.router();

        tokio::spawn(watch_ctrl_c(shutdown.clone()));

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| AppError::Server(e.to_string()))?;

        info!("👋 服务已停止");
        Ok(())
    }
}

async fn watch_ctrl_c(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => {
                    info!("🛑 收到 Ctrl-C，正在停止服务...");
                    shutdown.cancel();
                }
                Err(e) => warn!("无法监听 Ctrl-C: {}", e),
            }
        }
        _ = shutdown.cancelled() => {}
    }
}
