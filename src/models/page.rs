//! 页面查询的类型化输入输出

use serde::Deserialize;

/// 列表所在滚动容器的度量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    /// 容器可滚动总高度
    pub scroll_height: u64,
    /// 当前已渲染的条目数
    pub item_count: usize,
}

impl ScrollMetrics {
    /// 相比上一次是否有增长
    pub fn grew_since(&self, previous: &ScrollMetrics) -> bool {
        self.scroll_height > previous.scroll_height || self.item_count > previous.item_count
    }
}

/// 从元素的哪个属性读取地址
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlAttribute {
    /// `img.src`
    Src,
    /// `a.href`
    Href,
}

impl UrlAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlAttribute::Src => "src",
            UrlAttribute::Href => "href",
        }
    }
}

/// 资源地址列表查询：选中元素，读取属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUrlQuery {
    pub selector: String,
    pub attribute: UrlAttribute,
}

impl AssetUrlQuery {
    pub fn src(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attribute: UrlAttribute::Src,
        }
    }

    pub fn href(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attribute: UrlAttribute::Href,
        }
    }
}
