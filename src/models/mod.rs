pub mod asset;
pub mod page;

pub use asset::{ArchiveArtifact, DiscoveredAsset, FetchFailure, FetchReport, StagedFile};
pub use page::{AssetUrlQuery, ScrollMetrics, UrlAttribute};
