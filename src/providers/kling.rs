//! Kling 视频供应商
//!
//! 提交生成任务拿 task_id，按固定间隔轮询状态；
//! succeed 取视频 URL，failed 报 Api 错误，轮询耗尽判定 Timeout。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ProvidersSection;
use crate::providers::traits::{ProviderError, VideoProvider, VideoRequest};

const DEFAULT_BASE_URL: &str = "https://api.klingai.com";

pub struct KlingVideoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl KlingVideoClient {
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            poll_interval: Duration::from_secs(5),
            max_polls: 60,
        }
    }

    pub fn with_polling_from(mut self, cfg: &ProvidersSection) -> Self {
        self.poll_interval = Duration::from_secs(cfg.video_poll_interval_secs);
        self.max_polls = cfg.video_poll_attempts;
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

#[async_trait]
impl VideoProvider for KlingVideoClient {
    fn id(&self) -> &str {
        "kling"
    }

    async fn generate_video(
        &self,
        request: &VideoRequest,
        model: &str,
    ) -> Result<Option<String>, ProviderError> {
        // 有首帧走图生视频，否则文生视频
        let endpoint = if request.start_frame.is_some() {
            "/v1/videos/image2video"
        } else {
            "/v1/videos/text2video"
        };

        let mut body = json!({
            "model_name": model,
            "prompt": request.prompt,
        });
        if let Some(ratio) = &request.aspect_ratio {
            body["aspect_ratio"] = json!(ratio);
        }
        if let Some(frame) = &request.start_frame {
            body["image"] = json!(frame);
        }
        if let Some(frame) = &request.end_frame {
            body["image_tail"] = json!(frame);
        }

        let created = self
            .request_json(
                self.http
                    .post(format!("{}{}", self.base_url, endpoint))
                    .json(&body),
            )
            .await?;

        let task_id = created["data"]["task_id"]
            .as_str()
            .ok_or_else(|| ProviderError::Http("task_id missing".to_string()))?
            .to_string();

        tracing::info!(task_id = task_id.as_str(), model, "视频任务已提交，开始轮询");

        for attempt in 0..self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let state = self
                .request_json(
                    self.http
                        .get(format!("{}{}/{}", self.base_url, endpoint, task_id)),
                )
                .await?;

            match state["data"]["task_status"].as_str().unwrap_or("") {
                "succeed" => {
                    let url = state["data"]["task_result"]["videos"][0]["url"]
                        .as_str()
                        .map(String::from);
                    return Ok(url);
                }
                "failed" => {
                    return Err(ProviderError::Api {
                        status: 500,
                        body: state["data"]["task_status_msg"]
                            .as_str()
                            .unwrap_or("video task failed")
                            .to_string(),
                    })
                }
                _ => {
                    tracing::debug!(
                        task_id = task_id.as_str(),
                        attempt = attempt + 1,
                        "视频生成中"
                    );
                }
            }
        }

        Err(ProviderError::Timeout(format!(
            "视频任务 {task_id} 轮询 {} 次后仍未完成",
            self.max_polls
        )))
    }
}
