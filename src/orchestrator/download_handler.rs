//! 下载请求处理 - 编排层
//!
//! ## 职责
//!
//! 1. 校验参数，缺少相册地址直接返回 400（不打开任何会话）
//! 2. 创建请求上下文（请求 ID、暂存目录、子取消令牌）
//! 3. 在独立任务中运行 `GalleryFlow`，客户端断开时通过守卫触发取消
//! 4. 把内部错误转换为 HTTP 响应，成功时交给 `response_streamer`

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, info_span, warn, Instrument};

use crate::error::{AppError, AppResult};
use crate::orchestrator::response_streamer;
use crate::orchestrator::server::AppState;
use crate::services::StagingStore;
use crate::workflow::{CancellationBroker, FlowOutput, RequestCtx};

/// 查询参数
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(alias = "url")]
    pub album: Option<String>,
}

impl DownloadQuery {
    /// 取出相册地址，空字符串视为缺失
    fn album_url(self) -> Option<String> {
        self.album
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// `GET /api/download?album=<url>`
pub async fn download(
    State(state): State<AppState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            warn!("⚠️ 查询参数无法解析: {}", rejection.body_text());
            return error_response(&AppError::InvalidRequest(rejection.body_text()));
        }
    };
    let Some(album) = query.album_url() else {
        warn!("⚠️ 请求缺少 album 参数");
        return error_response(&AppError::InvalidRequest("缺少 album 参数".to_string()));
    };
    if let Err(e) = reqwest::Url::parse(&album) {
        warn!("⚠️ 相册地址无法解析: {}", album);
        return error_response(&AppError::InvalidRequest(format!(
            "相册地址无效 ({}): {}",
            album, e
        )));
    }

    let request_id = new_request_id();
    let cancel = CancellationBroker::child_of(&state.shutdown);
    let ctx = match RequestCtx::new(
        request_id.clone(),
        album,
        &state.config.staging_root(),
        cancel.clone(),
    ) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("[请求 {}] ❌ 创建暂存目录失败: {}", request_id, e);
            return error_response(&e);
        }
    };

    // 处理 future 被丢弃（客户端断开）时触发取消
    let disconnect = cancel.disconnect_guard();

    let flow = state.flow.clone();
    let span = info_span!("download", request_id = %request_id);
    let task = tokio::spawn(
        async move {
            let outcome = flow.run(&ctx).await;
            finish_pipeline(ctx, outcome)
        }
        .instrument(span),
    );

    let (output, staging) = match task.await {
        Ok(Ok(done)) => done,
        Ok(Err(e)) => return error_response(&e),
        Err(join) => {
            error!("[请求 {}] ❌ 处理任务异常退出: {}", request_id, join);
            return error_response(&AppError::from(join));
        }
    };

    // 进入发送阶段后，断开由响应流自己处理
    disconnect.disarm();

    let file_name = state.config.archive_file_name();
    match response_streamer::stream_archive(&output.artifact, staging, &file_name).await {
        Ok(response) => {
            info!(
                "[请求 {}] ✅ 开始发送 {} ({} 个文件, {} 字节)",
                request_id, file_name, output.artifact.entry_count, output.artifact.size_bytes
            );
            response
        }
        Err(e) => {
            error!("[请求 {}] ❌ 无法发送压缩包: {}", request_id, e);
            error_response(&e)
        }
    }
}

/// 处理流程结束：失败时立即清理暂存目录，成功时把暂存目录交给响应流
fn finish_pipeline(
    ctx: RequestCtx,
    outcome: AppResult<FlowOutput>,
) -> AppResult<(FlowOutput, StagingStore)> {
    match outcome {
        Ok(output) => {
            crate::utils::logging::log_request_summary(
                &ctx.request_id,
                output.discovered,
                &output.report,
            );
            Ok((output, ctx.staging))
        }
        Err(e) => {
            if e.is_cancelled() {
                info!("{} 🛑 处理已取消，正在清理", ctx);
            } else {
                error!("{} ❌ 处理失败 [{}]: {}", ctx, e.code(), e);
            }
            let request = ctx.to_string();
            if let Err(cleanup) = ctx.staging.cleanup() {
                warn!("{} 清理暂存目录失败: {}", request, cleanup);
            }
            Err(e)
        }
    }
}

/// 错误转换为 JSON 响应
pub fn error_response(err: &AppError) -> Response {
    let status = match err {
        AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        AppError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = json!({
        "error": err.code(),
        "message": err.to_string(),
    });
    (status, Json(body)).into_response()
}

fn new_request_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..12].to_string()
}
