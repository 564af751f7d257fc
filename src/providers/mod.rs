//! 生成供应商层：归一化接口 + 模型名路由（Gemini / Replicate / Kling / Mock）

pub mod gemini;
pub mod kling;
pub mod mock;
pub mod registry;
pub mod replicate;
pub mod traits;

pub use gemini::GeminiImageClient;
pub use kling::KlingVideoClient;
pub use mock::{MockImageProvider, MockVideoProvider};
pub use registry::ProviderRegistry;
pub use replicate::ReplicateImageClient;
pub use traits::{ImageProvider, ImageRequest, ProviderError, VideoProvider, VideoRequest};
