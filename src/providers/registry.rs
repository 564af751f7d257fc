//! 供应商注册表
//!
//! 两级查找：模型名 → 供应商 id → 供应商实例，把技能层与具体厂商解耦。
//! 模型未映射返回 UnknownModel；映射指向的供应商 id 失效返回 ProviderNotFound。

use std::collections::HashMap;
use std::sync::Arc;

use crate::providers::traits::{
    ImageProvider, ImageRequest, ProviderError, VideoProvider, VideoRequest,
};

/// 供应商注册表：按名称注册实例，按模型名路由调用
#[derive(Default)]
pub struct ProviderRegistry {
    image_providers: HashMap<String, Arc<dyn ImageProvider>>,
    video_providers: HashMap<String, Arc<dyn VideoProvider>>,
    /// 模型名 → 供应商 id
    image_models: HashMap<String, String>,
    video_models: HashMap<String, String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_image_provider(&mut self, provider: impl ImageProvider + 'static) {
        self.image_providers
            .insert(provider.id().to_string(), Arc::new(provider));
    }

    pub fn register_video_provider(&mut self, provider: impl VideoProvider + 'static) {
        self.video_providers
            .insert(provider.id().to_string(), Arc::new(provider));
    }

    /// 把模型名映射到已注册的图像供应商
    pub fn map_image_model(&mut self, model: impl Into<String>, provider_id: impl Into<String>) {
        self.image_models.insert(model.into(), provider_id.into());
    }

    pub fn map_video_model(&mut self, model: impl Into<String>, provider_id: impl Into<String>) {
        self.video_models.insert(model.into(), provider_id.into());
    }

    pub async fn generate_image(
        &self,
        model: &str,
        request: &ImageRequest,
    ) -> Result<Option<String>, ProviderError> {
        let provider_id = self
            .image_models
            .get(model)
            .ok_or_else(|| ProviderError::UnknownModel(model.to_string()))?;
        let provider = self
            .image_providers
            .get(provider_id)
            .ok_or_else(|| ProviderError::ProviderNotFound(provider_id.clone()))?;
        tracing::debug!(model, provider = provider_id.as_str(), "派发图像生成");
        provider.generate_image(request, model).await
    }

    pub async fn generate_video(
        &self,
        model: &str,
        request: &VideoRequest,
    ) -> Result<Option<String>, ProviderError> {
        let provider_id = self
            .video_models
            .get(model)
            .ok_or_else(|| ProviderError::UnknownModel(model.to_string()))?;
        let provider = self
            .video_providers
            .get(provider_id)
            .ok_or_else(|| ProviderError::ProviderNotFound(provider_id.clone()))?;
        tracing::debug!(model, provider = provider_id.as_str(), "派发视频生成");
        provider.generate_video(request, model).await
    }

    pub fn image_models(&self) -> Vec<String> {
        self.image_models.keys().cloned().collect()
    }

    pub fn video_models(&self) -> Vec<String> {
        self.video_models.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockImageProvider;

    #[tokio::test]
    async fn test_unknown_model() {
        let registry = ProviderRegistry::new();
        let err = registry
            .generate_image("no-such-model", &ImageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownModel(_)));
    }

    #[tokio::test]
    async fn test_stale_provider_id() {
        let mut registry = ProviderRegistry::new();
        registry.map_image_model("some-model", "gone");
        let err = registry
            .generate_image("some-model", &ImageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ProviderNotFound(_)));
    }

    #[tokio::test]
    async fn test_routed_call() {
        let mut registry = ProviderRegistry::new();
        registry.register_image_provider(MockImageProvider::always("https://cdn.test/a.png"));
        registry.map_image_model("mock-image", "mock");
        let url = registry
            .generate_image("mock-image", &ImageRequest::default())
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some("https://cdn.test/a.png"));
    }
}
