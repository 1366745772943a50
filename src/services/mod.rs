pub mod archiver;
pub mod asset_fetcher;
pub mod link_discoverer;
pub mod staging_store;

pub use archiver::Archiver;
pub use asset_fetcher::{AssetFetcher, FetchSettings};
pub use link_discoverer::{DiscoverySettings, LinkDiscoverer};
pub use staging_store::StagingStore;
