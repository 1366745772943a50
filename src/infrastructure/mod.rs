pub mod gallery_page;
pub mod js_executor;

pub use gallery_page::GalleryPage;
pub use js_executor::JsExecutor;
