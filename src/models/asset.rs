//! 相册资源在流水线各阶段之间流转的数据

use std::fmt::Display;
use std::path::PathBuf;

/// 发现阶段产出的单张照片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredAsset {
    /// 资源地址（去重依据）
    pub source_url: String,
    /// 发现顺序（从 1 开始），只影响命名
    pub ordinal: usize,
}

impl DiscoveredAsset {
    pub fn new(source_url: impl Into<String>, ordinal: usize) -> Self {
        Self {
            source_url: source_url.into(),
            ordinal,
        }
    }
}

impl Display for DiscoveredAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[照片 #{}]", self.ordinal)
    }
}

/// 已完整写入暂存目录的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// 暂存目录中的路径
    pub local_path: PathBuf,
    /// 压缩包内的文件名
    pub origin_filename: String,
    /// 文件大小
    pub size_bytes: u64,
    /// 对应的发现顺序
    pub ordinal: usize,
}

/// 单个下载失败（不影响整批）
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub source_url: String,
    pub ordinal: usize,
    pub reason: String,
}

/// 下载阶段汇总
#[derive(Debug, Default)]
pub struct FetchReport {
    /// 按发现顺序排列的成功文件
    pub staged: Vec<StagedFile>,
    pub failures: Vec<FetchFailure>,
}

/// 生成好的压缩包
#[derive(Debug, Clone)]
pub struct ArchiveArtifact {
    /// 压缩包路径（位于请求自己的暂存目录中）
    pub path: PathBuf,
    pub entry_count: usize,
    pub size_bytes: u64,
}
