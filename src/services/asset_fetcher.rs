//! 照片下载服务 - 业务能力层
//!
//! 有界并发 + 最小启动间隔 + 协作式取消；单张失败只记录并跳过

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::header::CONTENT_TYPE;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError};
use crate::models::{DiscoveredAsset, FetchFailure, FetchReport, StagedFile};
use crate::services::StagingStore;
use crate::workflow::CancellationBroker;

/// 文件名最大长度
const MAX_NAME_LEN: usize = 120;

/// 下载阶段参数
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// 同时进行的下载数
    pub concurrency: usize,
    /// 两次下载开始之间的最小间隔
    pub spacing: Duration,
    /// 单次下载超时
    pub timeout: Duration,
    /// 失败后的重试次数，默认 0（不重试）
    pub retries: u32,
}

impl FetchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.fetch_concurrency.max(1),
            spacing: config.fetch_spacing(),
            timeout: config.fetch_timeout(),
            retries: config.fetch_retries,
        }
    }
}

/// 单次尝试的失败原因
enum Abort {
    Cancelled,
    Failed(String),
}

impl From<AppError> for Abort {
    fn from(err: AppError) -> Self {
        if err.is_cancelled() {
            Abort::Cancelled
        } else {
            Abort::Failed(err.to_string())
        }
    }
}

/// 控制下载启动节奏
struct RateGate {
    spacing: Duration,
    next_start: Mutex<Option<Instant>>,
}

impl RateGate {
    fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_start: Mutex::new(None),
        }
    }

    /// 等到允许启动下一次下载；持锁等待，保证启动严格串行
    async fn wait_turn(&self, cancel: &CancellationBroker) -> AppResult<()> {
        let mut next = self.next_start.lock().await;
        cancel.check()?;
        if let Some(at) = *next {
            cancel
                .run(async {
                    tokio::time::sleep_until(at).await;
                    Ok(())
                })
                .await?;
        }
        *next = Some(Instant::now() + self.spacing);
        Ok(())
    }
}

/// 本请求内已占用的文件名
#[derive(Default)]
struct NameRegistry {
    taken: Mutex<HashSet<String>>,
}

impl NameRegistry {
    /// 占用一个文件名：优先使用原始文件名，冲突或不可用时生成序号 + 时间戳的名字；
    /// 同一毫秒内再次冲突时追加递增后缀
    async fn reserve(&self, preferred: Option<String>, ordinal: usize, ext: &str) -> String {
        let mut taken = self.taken.lock().await;
        if let Some(name) = preferred {
            if taken.insert(name.clone()) {
                return name;
            }
        }
        let stem = format!(
            "photo-{:04}-{}",
            ordinal,
            chrono::Utc::now().timestamp_millis()
        );
        let mut name = format!("{}.{}", stem, ext);
        let mut suffix = 1;
        while !taken.insert(name.clone()) {
            name = format!("{}-{}.{}", stem, suffix, ext);
            suffix += 1;
        }
        name
    }
}

/// 照片下载服务
///
/// 职责：
/// - 把每张照片流式写入暂存目录（先写 partial，完成后再移入 assets）
/// - 控制并发与启动间隔
/// - 不关心发现与打包
pub struct AssetFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl AssetFetcher {
    pub fn new(settings: FetchSettings) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("album_zipper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                AppError::Config(ConfigError::InvalidValue {
                    field: "http_client",
                    reason: e.to_string(),
                })
            })?;
        Ok(Self { client, settings })
    }

    /// 下载全部照片
    ///
    /// 单张失败记入 `FetchReport::failures`；只有取消会让整批返回错误。
    pub async fn fetch_all(
        &self,
        assets: &[DiscoveredAsset],
        staging: &StagingStore,
        cancel: &CancellationBroker,
    ) -> AppResult<FetchReport> {
        let total = assets.len();
        let gate = RateGate::new(self.settings.spacing);
        let names = NameRegistry::default();

        let tasks: Vec<_> = assets
            .iter()
            .map(|asset| {
                let gate = &gate;
                let names = &names;
                async move {
                    let result = self
                        .fetch_with_retries(asset, total, staging, gate, names, cancel)
                        .await;
                    (asset.ordinal, result)
                }
            })
            .collect();
        let results: Vec<(usize, Result<StagedFile, Abort>)> = stream::iter(tasks)
            .buffer_unordered(self.settings.concurrency)
            .collect()
            .await;

        cancel.check()?;

        let mut report = FetchReport::default();
        for (ordinal, result) in results {
            match result {
                Ok(staged) => report.staged.push(staged),
                Err(Abort::Cancelled) => return Err(AppError::Cancelled),
                Err(Abort::Failed(reason)) => {
                    let source_url = assets
                        .iter()
                        .find(|a| a.ordinal == ordinal)
                        .map(|a| a.source_url.clone())
                        .unwrap_or_default();
                    report.failures.push(FetchFailure {
                        source_url,
                        ordinal,
                        reason,
                    });
                }
            }
        }
        report.staged.sort_by_key(|s| s.ordinal);
        report.failures.sort_by_key(|f| f.ordinal);

        info!(
            "📥 下载完成: 成功 {}/{}，失败 {}",
            report.staged.len(),
            total,
            report.failures.len()
        );
        Ok(report)
    }

    async fn fetch_with_retries(
        &self,
        asset: &DiscoveredAsset,
        total: usize,
        staging: &StagingStore,
        gate: &RateGate,
        names: &NameRegistry,
        cancel: &CancellationBroker,
    ) -> Result<StagedFile, Abort> {
        let mut attempt = 0;
        loop {
            gate.wait_turn(cancel).await?;
            info!("⬇️ 正在下载第 {}/{} 张照片...", asset.ordinal, total);

            let outcome = match tokio::time::timeout(
                self.settings.timeout,
                self.fetch_once(asset, staging, names, cancel),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(Abort::Failed(format!(
                    "下载超时 ({:?})",
                    self.settings.timeout
                ))),
            };

            match outcome {
                Ok(staged) => return Ok(staged),
                Err(Abort::Cancelled) => return Err(Abort::Cancelled),
                Err(Abort::Failed(reason)) if attempt < self.settings.retries => {
                    attempt += 1;
                    warn!(
                        "{} ⚠️ 下载失败 ({})，重试 {}/{}",
                        asset, reason, attempt, self.settings.retries
                    );
                }
                Err(Abort::Failed(reason)) => {
                    warn!("{} ❌ 下载失败，跳过: {}", asset, reason);
                    return Err(Abort::Failed(reason));
                }
            }
        }
    }

    /// 单次下载
    async fn fetch_once(
        &self,
        asset: &DiscoveredAsset,
        staging: &StagingStore,
        names: &NameRegistry,
        cancel: &CancellationBroker,
    ) -> Result<StagedFile, Abort> {
        cancel.check()?;

        let mut response = cancel
            .run(async {
                self.client
                    .get(&asset.source_url)
                    .send()
                    .await
                    .map_err(|e| AppError::navigation_failed(&asset.source_url, e))
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Abort::Failed(format!("HTTP {}", status)));
        }

        let ext = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(extension_for_content_type)
            .unwrap_or("jpg");
        let preferred = url_basename(&asset.source_url).map(|name| with_extension(name, ext));
        let name = names.reserve(preferred, asset.ordinal, ext).await;

        let partial_path = staging.partial_dir().join(format!("{}.part", name));
        let final_path = staging.assets_dir().join(&name);

        let written = match self
            .stream_to_file(&mut response, &partial_path, cancel)
            .await
        {
            Ok(written) => written,
            Err(abort) => {
                remove_partial(&partial_path).await;
                return Err(abort);
            }
        };

        if let Err(e) = fs::rename(&partial_path, &final_path).await {
            remove_partial(&partial_path).await;
            return Err(Abort::Failed(format!("移动文件失败: {}", e)));
        }

        debug!("{} 已保存: {} ({} 字节)", asset, name, written);
        Ok(StagedFile {
            local_path: final_path,
            origin_filename: name,
            size_bytes: written,
            ordinal: asset.ordinal,
        })
    }

    /// 把响应体分块写入文件，写完后刷盘
    async fn stream_to_file(
        &self,
        response: &mut reqwest::Response,
        path: &Path,
        cancel: &CancellationBroker,
    ) -> Result<u64, Abort> {
        let mut file = fs::File::create(path)
            .await
            .map_err(|e| AppError::write_failed(path, e))?;
        let url = response.url().to_string();
        let mut written = 0u64;

        loop {
            let chunk = cancel
                .run(async {
                    response
                        .chunk()
                        .await
                        .map_err(|e| AppError::navigation_failed(&url, e))
                })
                .await?;
            let Some(chunk) = chunk else { break };
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::write_failed(path, e))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| AppError::write_failed(path, e))?;
        file.sync_all()
            .await
            .map_err(|e| AppError::write_failed(path, e))?;
        Ok(written)
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("删除未完成文件失败 ({}): {}", path.display(), e);
        }
    }
}

/// 从地址中取出可用作文件名的最后一段（不含查询参数）
pub fn url_basename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// 文件名没有扩展名时补上
fn with_extension(name: String, ext: &str) -> String {
    if Path::new(&name).extension().is_some() {
        name
    } else {
        format!("{}.{}", name, ext)
    }
}

/// 根据 Content-Type 推断扩展名
fn extension_for_content_type(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "image/avif" => "avif",
        "video/mp4" => "mp4",
        _ => "jpg",
    }
}
