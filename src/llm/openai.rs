//! OpenAI 兼容 API 客户端
//!
//! 调用任意 OpenAI 兼容端点（可配置 base_url）；User 消息携带图片时
//! 转为 content 分段数组（text + image_url），供多模态模型查看附件。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::LlmSection;
use crate::llm::{ChatMessage, ChatModel, LlmError, Role};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI 兼容客户端：持有 reqwest Client 与 model 名
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_default();

        Self {
            http: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.to_string(),
        }
    }

    pub fn from_config(cfg: &LlmSection) -> Self {
        Self::new(cfg.base_url.as_deref(), &cfg.model, cfg.api_key.as_deref())
    }

    fn to_wire_messages(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                if m.images.is_empty() {
                    json!({ "role": role, "content": m.content })
                } else {
                    let mut parts = vec![json!({ "type": "text", "text": m.content })];
                    for url in &m.images {
                        parts.push(json!({
                            "type": "image_url",
                            "image_url": { "url": url }
                        }));
                    }
                    json!({ "role": role, "content": parts })
                }
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::Api {
                status: 401,
                body: "missing api key".to_string(),
            });
        }

        let body = json!({
            "model": self.model,
            "messages": Self::to_wire_messages(messages),
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        let payload = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: truncate(&payload, 500),
            });
        }

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| LlmError::Http(e.to_string()))?;

        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}
