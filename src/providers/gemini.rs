//! Gemini 图像供应商
//!
//! 单次 generateContent 请求：提示词 + 可选参考图（inline_data），
//! 从响应 parts 中取第一段 inlineData 转为 data URL；
//! 只有文本没有图像时返回 Ok(None)（软失败）。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::providers::traits::{ImageProvider, ImageRequest, ProviderError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiImageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiImageClient {
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
        }
    }

    fn build_parts(request: &ImageRequest) -> Vec<Value> {
        let mut prompt = request.prompt.clone();
        if let Some(ratio) = &request.aspect_ratio {
            prompt.push_str(&format!(", aspect ratio {ratio}"));
        }
        let mut parts = vec![json!({ "text": prompt })];
        if let Some(reference) = &request.reference_image {
            if let Some((mime, data)) = split_data_url(reference) {
                parts.push(json!({
                    "inline_data": { "mime_type": mime, "data": data }
                }));
            }
        }
        parts
    }
}

/// 拆 data URL 为 (mime, base64)；非 data URL 返回 None
fn split_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (mime, data) = rest.split_once(";base64,")?;
    Some((mime, data))
}

#[async_trait]
impl ImageProvider for GeminiImageClient {
    fn id(&self) -> &str {
        "gemini"
    }

    async fn generate_image(
        &self,
        request: &ImageRequest,
        model: &str,
    ) -> Result<Option<String>, ProviderError> {
        let body = json!({
            "contents": [{ "parts": Self::build_parts(request) }],
            "generationConfig": { "responseModalities": ["IMAGE", "TEXT"] },
        });

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        let payload = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: payload.chars().take(500).collect(),
            });
        }

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Http(e.to_string()))?;

        let parts = parsed["candidates"][0]["content"]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        for part in parts {
            let inline = &part["inlineData"];
            if let (Some(mime), Some(data)) = (inline["mimeType"].as_str(), inline["data"].as_str())
            {
                return Ok(Some(format!("data:{mime};base64,{data}")));
            }
        }

        // 模型只回了文本，没有图像产出
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_data_url() {
        let (mime, data) = split_data_url("data:image/png;base64,QUJD").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(data, "QUJD");
        assert!(split_data_url("https://example.com/a.png").is_none());
    }

    #[test]
    fn test_build_parts_with_reference() {
        let request = ImageRequest {
            prompt: "咖啡海报".to_string(),
            aspect_ratio: Some("3:4".to_string()),
            image_size: None,
            reference_image: Some("data:image/png;base64,QUJD".to_string()),
        };
        let parts = GeminiImageClient::build_parts(&request);
        assert_eq!(parts.len(), 2);
        assert!(parts[0]["text"].as_str().unwrap().contains("3:4"));
        assert_eq!(parts[1]["inline_data"]["data"], "QUJD");
    }
}
