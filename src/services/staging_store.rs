//! 暂存目录服务 - 业务能力层
//!
//! 每个请求独占一个临时目录，目录结构：
//!
//! ```text
//! <staging_root>/album-<request_id>-XXXXXX/
//!     assets/    已完整写入的照片（打包只读这里）
//!     partial/   下载中的 .part 文件
//!     profile/   本请求的浏览器数据目录
//!     <name>.zip 生成的压缩包
//! ```

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, FileError};

/// 请求级暂存目录
///
/// 被 `cleanup()` 或丢弃时递归删除，且只删除一次。
#[derive(Debug)]
pub struct StagingStore {
    dir: Option<TempDir>,
    root: PathBuf,
}

impl StagingStore {
    /// 在 `staging_root` 下创建新的隔离目录
    pub fn create(staging_root: &Path, request_id: &str) -> AppResult<Self> {
        std::fs::create_dir_all(staging_root).map_err(|source| {
            AppError::File(FileError::CreateDirFailed {
                path: staging_root.to_path_buf(),
                source,
            })
        })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("album-{}-", request_id))
            .tempdir_in(staging_root)
            .map_err(|source| {
                AppError::File(FileError::CreateDirFailed {
                    path: staging_root.to_path_buf(),
                    source,
                })
            })?;
        let root = dir.path().to_path_buf();

        for sub in [ASSETS_DIR, PARTIAL_DIR, PROFILE_DIR] {
            let path = root.join(sub);
            std::fs::create_dir(&path).map_err(|source| {
                AppError::File(FileError::CreateDirFailed { path, source })
            })?;
        }

        debug!("创建暂存目录: {}", root.display());
        Ok(Self {
            dir: Some(dir),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 已完成文件所在目录
    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    /// 下载中文件所在目录
    pub fn partial_dir(&self) -> PathBuf {
        self.root.join(PARTIAL_DIR)
    }

    /// 浏览器数据目录
    pub fn profile_dir(&self) -> PathBuf {
        self.root.join(PROFILE_DIR)
    }

    /// 压缩包路径
    pub fn archive_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// 按文件名排序列出已完成的文件
    pub async fn list_assets(&self) -> AppResult<Vec<PathBuf>> {
        let dir = self.assets_dir();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| AppError::read_failed(&dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::read_failed(&dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| AppError::read_failed(entry.path(), e))?;
            if file_type.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// 删除整个暂存目录
    pub fn cleanup(mut self) -> AppResult<()> {
        self.remove()
    }

    fn remove(&mut self) -> AppResult<()> {
        if let Some(dir) = self.dir.take() {
            dir.close().map_err(|source| {
                AppError::File(FileError::WriteFailed {
                    path: self.root.clone(),
                    source,
                })
            })?;
            debug!("🧹 已删除暂存目录: {}", self.root.display());
        }
        Ok(())
    }
}

impl Drop for StagingStore {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!("删除暂存目录失败: {}", e);
        }
    }
}

const ASSETS_DIR: &str = "assets";
const PARTIAL_DIR: &str = "partial";
const PROFILE_DIR: &str = "profile";
