//! # Album Zipper
//!
//! 把一个在线相册打包成 zip 的 HTTP 服务
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，实现 `GalleryPage`
//! - `browser/` - 会话的打开与关闭（启动新浏览器 / 连接已有浏览器）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `LinkDiscoverer` - 滚动加载并发现照片地址
//! - `AssetFetcher` - 限速、限并发地下载照片
//! - `StagingStore` - 每个请求独占的暂存目录
//! - `Archiver` - 打包 zip
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个相册"的完整处理流程
//! - `RequestCtx` - 上下文封装（request_id + 暂存目录 + 取消令牌）
//! - `GalleryFlow` - 流程编排（discover → fetch → archive）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/server` - HTTP 服务与生命周期
//! - `orchestrator/download_handler` - 单个下载请求
//! - `orchestrator/response_streamer` - 流式发送并清理
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{SessionGuard, SessionLauncher, SessionManager};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{GalleryPage, JsExecutor};
pub use models::{ArchiveArtifact, DiscoveredAsset, FetchReport};
pub use orchestrator::App;
pub use workflow::{CancellationBroker, GalleryFlow, RequestCtx};
