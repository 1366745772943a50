//! 集成测试共用的假浏览器与假图片源站
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use album_zipper::config::{Config, DiscoveryStrategy};
use album_zipper::error::{AppError, AppResult};
use album_zipper::models::{AssetUrlQuery, ScrollMetrics};
use album_zipper::{App, GalleryPage, SessionLauncher};
use async_trait::async_trait;
use axum::extract::Path as AxumPath;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

/// 每次滚动新增的条目数
const ITEMS_PER_SCROLL: usize = 2;

/// 假相册页面：照片分批"懒加载"出现
pub struct FakePage {
    photos: Vec<String>,
    endless: bool,
    renders_items: bool,
    visible: AtomicUsize,
    closed: AtomicBool,
    close_count: Arc<AtomicUsize>,
}

impl FakePage {
    fn visible(&self) -> usize {
        self.visible.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GalleryPage for FakePage {
    async fn goto(&self, url: &str) -> AppResult<()> {
        if url.contains("unreachable") {
            return Err(AppError::navigation_failed(url, "net::ERR_NAME_NOT_RESOLVED"));
        }
        Ok(())
    }

    async fn selector_present(&self, _selector: &str) -> AppResult<bool> {
        Ok(self.renders_items)
    }

    async fn scroll_metrics(&self, _item_selector: &str) -> AppResult<ScrollMetrics> {
        let items = self.visible();
        Ok(ScrollMetrics {
            scroll_height: items as u64 * 240,
            item_count: items,
        })
    }

    async fn scroll_to_end(&self, _item_selector: &str) -> AppResult<()> {
        let next = self.visible() + ITEMS_PER_SCROLL;
        let next = if self.endless {
            next
        } else {
            next.min(self.photos.len())
        };
        self.visible.store(next, Ordering::SeqCst);
        Ok(())
    }

    async fn asset_urls(&self, _query: &AssetUrlQuery) -> AppResult<Vec<String>> {
        let n = self.visible().min(self.photos.len());
        Ok(self.photos[..n].to_vec())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.close_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// 假会话引擎：记录打开/关闭次数和每次使用的数据目录
#[derive(Default)]
pub struct FakeLauncher {
    photos: Vec<String>,
    endless: bool,
    /// 条目永远不出现（例如被登录墙挡住）
    never_renders: bool,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    profiles: Mutex<Vec<PathBuf>>,
}

impl FakeLauncher {
    pub fn with_photos(photos: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            photos,
            ..Self::default()
        })
    }

    /// 永远在增长的列表
    pub fn endless() -> Arc<Self> {
        Arc::new(Self {
            endless: true,
            ..Self::default()
        })
    }

    /// 页面能打开，但相册条目永远不出现
    pub fn never_renders() -> Arc<Self> {
        Arc::new(Self {
            never_renders: true,
            ..Self::default()
        })
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn profiles(&self) -> Vec<PathBuf> {
        self.profiles.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn open(&self, profile_dir: &Path) -> AppResult<Arc<dyn GalleryPage>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.profiles.lock().unwrap().push(profile_dir.to_path_buf());
        Ok(Arc::new(FakePage {
            photos: self.photos.clone(),
            endless: self.endless,
            renders_items: !self.never_renders,
            visible: AtomicUsize::new(self.photos.len().min(ITEMS_PER_SCROLL)),
            closed: AtomicBool::new(false),
            close_count: Arc::clone(&self.closed),
        }))
    }
}

async fn photo(AxumPath(name): AxumPath<String>) -> impl IntoResponse {
    if name.starts_with("missing") {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }
    if name.starts_with("slow") {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    (
        [(header::CONTENT_TYPE, "image/jpeg")],
        photo_bytes(&name),
    )
        .into_response()
}

/// 源站为每张照片返回的内容
pub fn photo_bytes(name: &str) -> Vec<u8> {
    format!("jpeg-bytes-of-{}", name).into_bytes()
}

/// 启动假图片源站，返回基地址
pub async fn spawn_origin() -> String {
    let app = Router::new().route("/photos/{name}", get(photo));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn photo_urls(base: &str, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|n| format!("{}/photos/{}", base, n))
        .collect()
}

/// 测试用配置：缩略图策略、极短的等待
pub fn test_config(staging_root: &Path) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        discovery_strategy: DiscoveryStrategy::Thumbnail,
        asset_host_pattern: r"^http://127\.0\.0\.1:\d+/".to_string(),
        scroll_settle_ms: 5,
        max_scroll_iterations: 50,
        navigation_timeout_ms: 2_000,
        fetch_spacing_ms: 0,
        fetch_timeout_secs: 60,
        staging_root: Some(staging_root.to_path_buf()),
        ..Config::default()
    }
}

/// 运行中的服务
pub struct TestServer {
    pub base_url: String,
    pub shutdown: tokio_util::sync::CancellationToken,
}

impl TestServer {
    pub fn endpoint(&self) -> String {
        format!("{}/api/download", self.base_url)
    }

    /// 发起下载请求
    pub async fn download(&self, album: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(self.endpoint())
            .query(&[("album", album)])
            .send()
            .await
            .unwrap()
    }
}

pub async fn spawn_app(config: Config, launcher: Arc<dyn SessionLauncher>) -> TestServer {
    let app = App::with_launcher(config, launcher).unwrap();
    let shutdown = app.shutdown_token();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        app.serve(listener).await.unwrap();
    });
    TestServer {
        base_url: format!("http://{}", addr),
        shutdown,
    }
}

/// 暂存根目录下还剩多少请求目录
pub fn staging_entries(root: &Path) -> usize {
    std::fs::read_dir(root)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}

/// 等到暂存根目录清空（清理发生在响应流结束之后）
pub async fn wait_until_staging_empty(root: &Path) -> bool {
    for _ in 0..100 {
        if staging_entries(root) == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

/// 等到会话关闭次数达到预期
pub async fn wait_until_closed(launcher: &FakeLauncher, expected: usize) -> bool {
    for _ in 0..100 {
        if launcher.closed() >= expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
