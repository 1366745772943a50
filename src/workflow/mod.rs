pub mod cancellation;
pub mod gallery_flow;
pub mod request_ctx;

pub use cancellation::CancellationBroker;
pub use gallery_flow::{FlowOutput, GalleryFlow};
pub use request_ctx::RequestCtx;
