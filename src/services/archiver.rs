//! 打包服务 - 业务能力层
//!
//! 把暂存目录中已完成的照片打成一个 zip

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AppError, AppResult, ArchiveError};
use crate::models::ArchiveArtifact;
use crate::services::StagingStore;

/// 打包服务
///
/// 读取 `assets/` 的当前全部内容，空目录返回 `ArchiveError::Empty`。
/// 同一请求内只有下载阶段写、打包阶段读，不需要加锁。
pub struct Archiver {
    file_name: String,
}

impl Archiver {
    /// `file_name` 为压缩包文件名（含 .zip）
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// 打包暂存目录
    pub async fn build(&self, staging: &StagingStore) -> AppResult<ArchiveArtifact> {
        let files = staging.list_assets().await?;
        if files.is_empty() {
            return Err(ArchiveError::Empty {
                dir: staging.assets_dir(),
            }
            .into());
        }

        let archive_path = staging.archive_path(&self.file_name);
        info!("🗜️ 正在打包 {} 张照片...", files.len());

        let target = archive_path.clone();
        let entry_count =
            tokio::task::spawn_blocking(move || write_zip(&target, &files)).await??;

        let size_bytes = tokio::fs::metadata(&archive_path)
            .await
            .map_err(|e| AppError::read_failed(&archive_path, e))?
            .len();

        info!("✓ 压缩包已生成: {} 个文件, {} 字节", entry_count, size_bytes);
        Ok(ArchiveArtifact {
            path: archive_path,
            entry_count,
            size_bytes,
        })
    }
}

/// 同步写 zip，每个文件一个条目
fn write_zip(archive_path: &Path, files: &[PathBuf]) -> AppResult<usize> {
    let file = File::create(archive_path).map_err(|e| AppError::write_failed(archive_path, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytes = std::fs::read(path).map_err(|e| AppError::read_failed(path, e))?;
        zip.start_file(name.as_str(), options)
            .map_err(ArchiveError::from)?;
        zip.write_all(&bytes)
            .map_err(|e| AppError::write_failed(archive_path, e))?;
        debug!("已加入压缩包: {} ({} 字节)", name, bytes.len());
    }

    let mut writer = zip.finish().map_err(ArchiveError::from)?;
    writer
        .flush()
        .map_err(|e| AppError::write_failed(archive_path, e))?;
    Ok(files.len())
}
