//! 图像 / 视频生成技能
//!
//! 薄适配：拼品牌上下文进提示词，按模型名委托给供应商注册表。
//! 供应商返回 Ok(None) 视为软失败：结果里 url 为 null，不报错。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::providers::{ImageRequest, ProviderRegistry, VideoRequest};
use crate::skills::registry::{Skill, SkillError};

/// 若 params 携带 brand 信息，把品牌名 / 色板 / 风格拼入提示词
pub(crate) fn augment_prompt_with_brand(prompt: &str, params: &Value) -> String {
    let brand = &params["brand"];
    if brand.is_null() {
        return prompt.to_string();
    }

    let mut augmented = prompt.to_string();
    if let Some(name) = brand["name"].as_str() {
        augmented.push_str(&format!(", for brand \"{name}\""));
    }
    if let Some(colors) = brand["colors"].as_array() {
        let palette: Vec<&str> = colors.iter().filter_map(|c| c.as_str()).collect();
        if !palette.is_empty() {
            augmented.push_str(&format!(", brand colors: {}", palette.join(" ")));
        }
    }
    if let Some(style) = brand["style"].as_str() {
        augmented.push_str(&format!(", {style} style"));
    }
    augmented
}

fn required_prompt(params: &Value) -> Result<&str, SkillError> {
    params["prompt"]
        .as_str()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| SkillError::InvalidParams("prompt 不能为空".to_string()))
}

/// generateImage：文生图 / 图生图
pub struct GenerateImageSkill {
    providers: Arc<ProviderRegistry>,
    default_model: String,
}

impl GenerateImageSkill {
    pub fn new(providers: Arc<ProviderRegistry>, default_model: impl Into<String>) -> Self {
        Self {
            providers,
            default_model: default_model.into(),
        }
    }
}

#[async_trait]
impl Skill for GenerateImageSkill {
    fn name(&self) -> &str {
        "generateImage"
    }

    fn description(&self) -> &str {
        "生成图像。参数: prompt（必填）, aspectRatio, imageSize, referenceImage, model"
    }

    async fn execute(&self, params: Value) -> Result<Value, SkillError> {
        let prompt = augment_prompt_with_brand(required_prompt(&params)?, &params);
        let model = params["model"].as_str().unwrap_or(&self.default_model);

        let request = ImageRequest {
            prompt: prompt.clone(),
            aspect_ratio: params["aspectRatio"].as_str().map(String::from),
            image_size: params["imageSize"].as_str().map(String::from),
            reference_image: params["referenceImage"].as_str().map(String::from),
        };

        let url = self.providers.generate_image(model, &request).await?;
        if url.is_none() {
            tracing::warn!(model, "图像供应商未产出结果（软失败）");
        }

        Ok(json!({
            "type": "image",
            "url": url,
            "model": model,
            "prompt": prompt,
        }))
    }
}

/// generateVideo：文生视频 / 图生视频
pub struct GenerateVideoSkill {
    providers: Arc<ProviderRegistry>,
    default_model: String,
}

impl GenerateVideoSkill {
    pub fn new(providers: Arc<ProviderRegistry>, default_model: impl Into<String>) -> Self {
        Self {
            providers,
            default_model: default_model.into(),
        }
    }
}

#[async_trait]
impl Skill for GenerateVideoSkill {
    fn name(&self) -> &str {
        "generateVideo"
    }

    fn description(&self) -> &str {
        "生成视频。参数: prompt（必填）, aspectRatio, startFrame, endFrame, referenceImages, model"
    }

    async fn execute(&self, params: Value) -> Result<Value, SkillError> {
        let prompt = augment_prompt_with_brand(required_prompt(&params)?, &params);
        let model = params["model"].as_str().unwrap_or(&self.default_model);

        let reference_images = params["referenceImages"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let request = VideoRequest {
            prompt: prompt.clone(),
            aspect_ratio: params["aspectRatio"].as_str().map(String::from),
            start_frame: params["startFrame"].as_str().map(String::from),
            end_frame: params["endFrame"].as_str().map(String::from),
            reference_images,
        };

        let url = self.providers.generate_video(model, &request).await?;
        if url.is_none() {
            tracing::warn!(model, "视频供应商未产出结果（软失败）");
        }

        Ok(json!({
            "type": "video",
            "url": url,
            "model": model,
            "prompt": prompt,
        }))
    }
}
