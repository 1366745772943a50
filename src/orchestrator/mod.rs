//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责 HTTP 入口和请求生命周期，是整个服务的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `server` - HTTP 服务
//! - 管理应用生命周期（初始化、监听、优雅退出）
//! - 持有根取消令牌和共享的 `GalleryFlow`
//!
//! ### `download_handler` - 单个下载请求
//! - 参数校验（400）
//! - 创建 `RequestCtx`，在独立任务中运行流程
//! - 客户端断开时触发取消
//! - 错误转换为 JSON 响应（500）
//!
//! ### `response_streamer` - 响应流
//! - 分块发送压缩包
//! - 发送结束、出错或连接断开时清理暂存目录
//!
//! ## 层次关系
//!
//! ```text
//! server (路由 + 生命周期)
//!     ↓
//! download_handler (处理单个请求)
//!     ↓
//! workflow::GalleryFlow (处理单个相册)
//!     ↓
//! services (能力层：discover / fetch / stage / archive)
//!     ↓
//! infrastructure (基础设施：JsExecutor)
//! ```

pub mod download_handler;
pub mod response_streamer;
pub mod server;

// 重新导出主要类型
pub use server::{App, AppState};
