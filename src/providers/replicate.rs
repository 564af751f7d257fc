//! Replicate 图像供应商
//!
//! 创建 prediction 后轮询状态直到 succeeded / failed；
//! 轮询次数有上限，超出判定 Timeout。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::providers::traits::{ImageProvider, ImageRequest, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";

pub struct ReplicateImageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl ReplicateImageClient {
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            poll_interval: Duration::from_secs(2),
            max_polls: 90,
        }
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    async fn request_json(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<Value, ProviderError> {
        let response = builder
            .bearer_auth(&self.api_key)
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

        serde_json::from_str(&payload).map_err(|e| ProviderError::Http(e.to_string()))
    }
}

/// 从 prediction output 中取第一个 URL（字符串或字符串数组）
fn first_output_url(output: &Value) -> Option<String> {
    match output {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|v| v.as_str().map(String::from)),
        _ => None,
    }
}

#[async_trait]
impl ImageProvider for ReplicateImageClient {
    fn id(&self) -> &str {
        "replicate"
    }

    async fn generate_image(
        &self,
        request: &ImageRequest,
        model: &str,
    ) -> Result<Option<String>, ProviderError> {
        let mut input = json!({ "prompt": request.prompt });
        if let Some(ratio) = &request.aspect_ratio {
            input["aspect_ratio"] = json!(ratio);
        }
        if let Some(reference) = &request.reference_image {
            input["image"] = json!(reference);
        }

        let created = self
            .request_json(
                self.http
                    .post(format!("{}/models/{}/predictions", self.base_url, model))
                    .json(&json!({ "input": input })),
            )
            .await?;

        let prediction_id = created["id"]
            .as_str()
            .ok_or_else(|| ProviderError::Http("prediction id missing".to_string()))?
            .to_string();

        for _ in 0..self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let state = self
                .request_json(
                    self.http
                        .get(format!("{}/predictions/{}", self.base_url, prediction_id)),
                )
                .await?;

            match state["status"].as_str().unwrap_or("") {
                "succeeded" => return Ok(first_output_url(&state["output"])),
                "failed" | "canceled" => {
                    return Err(ProviderError::Api {
                        status: 500,
                        body: state["error"].as_str().unwrap_or("prediction failed").to_string(),
                    })
                }
                _ => continue,
            }
        }

        Err(ProviderError::Timeout(format!(
            "prediction {prediction_id} 未在限期内完成"
        )))
    }
}
