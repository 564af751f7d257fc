//! 生成供应商抽象
//!
//! 每个供应商只实现一个方法：接收归一化请求，返回结果 URL 或 None。
//! Ok(None) 表示「没有产出」，是软失败（不产生资产，也不报错）；
//! Err 才是硬失败，由上层决定是否重试。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AppError, ErrorKind};

/// 图像生成请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub image_size: Option<String>,
    /// base64 data URL 或 http URL
    #[serde(default)]
    pub reference_image: Option<String>,
}

/// 视频生成请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    pub prompt: String,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub start_frame: Option<String>,
    #[serde(default)]
    pub end_frame: Option<String>,
    #[serde(default)]
    pub reference_images: Vec<String>,
}

/// 供应商调用错误
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("HTTP 请求失败: {0}")]
    Http(String),

    #[error("供应商返回错误: status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("生成任务超时: {0}")]
    Timeout(String),

    #[error("模型未注册到任何供应商: {0}")]
    UnknownModel(String),

    #[error("供应商不存在: {0}")]
    ProviderNotFound(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        let kind = match &err {
            ProviderError::Http(_) => ErrorKind::Network,
            ProviderError::Api { status, .. } => match status {
                401 | 403 => ErrorKind::AuthFailure,
                429 => ErrorKind::RateLimited,
                503 => ErrorKind::ServiceOverloaded,
                _ => ErrorKind::GenericApi,
            },
            ProviderError::Timeout(_) => ErrorKind::AgentTimeout,
            ProviderError::UnknownModel(_) => ErrorKind::UnknownModel,
            ProviderError::ProviderNotFound(_) => ErrorKind::ProviderNotFound,
        };
        AppError::new(kind, err.to_string())
    }
}

/// 图像供应商：单次（可能较长的）请求/响应
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn generate_image(
        &self,
        request: &ImageRequest,
        model: &str,
    ) -> Result<Option<String>, ProviderError>;
}

/// 视频供应商：提交任务后轮询完成
#[async_trait]
pub trait VideoProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn generate_video(
        &self,
        request: &VideoRequest,
        model: &str,
    ) -> Result<Option<String>, ProviderError>;
}
