//! 模型层：对话模型抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::MockChatModel;
pub use openai::OpenAiCompatClient;
pub use traits::{ChatMessage, ChatModel, LlmError, Role};
