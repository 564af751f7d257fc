//! 对话模型抽象
//!
//! 路由分类与 Agent 规划都通过 ChatModel 完成；消息可携带图片
//! （base64 data URL），供多模态规划模型查看附件内容。

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{AppError, ErrorKind};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 一条对话消息；images 为 data URL 列表，仅 User 消息使用
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub images: Vec<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// 模型调用错误
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("HTTP 请求失败: {0}")]
    Http(String),

    #[error("API 返回错误: status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("响应缺少内容")]
    EmptyResponse,
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match &err {
            LlmError::Http(msg) => AppError::new(ErrorKind::Network, msg.clone()),
            LlmError::Api { status, body } => {
                let kind = match status {
                    401 | 403 => ErrorKind::AuthFailure,
                    429 => ErrorKind::RateLimited,
                    503 => ErrorKind::ServiceOverloaded,
                    _ => ErrorKind::GenericApi,
                };
                AppError::new(kind, format!("status {status}: {body}"))
            }
            LlmError::EmptyResponse => AppError::new(ErrorKind::GenericApi, err.to_string()),
        }
    }
}

/// 对话模型 trait：单次非流式完成
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}
