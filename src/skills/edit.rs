//! smartEdit：封闭编辑类型集合到指令模板的映射
//!
//! 把 background-remove / object-remove / upscale / style-transfer / extend
//! 翻译为固定英文编辑指令，代入用户参数后交给图像供应商执行。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::providers::{ImageRequest, ProviderRegistry};
use crate::skills::registry::{Skill, SkillError};

pub struct SmartEditSkill {
    providers: Arc<ProviderRegistry>,
    default_model: String,
}

impl SmartEditSkill {
    pub fn new(providers: Arc<ProviderRegistry>, default_model: impl Into<String>) -> Self {
        Self {
            providers,
            default_model: default_model.into(),
        }
    }
}

/// 编辑类型 → 指令模板；未知类型报参数错误
fn edit_instruction(edit_type: &str, params: &Value) -> Result<String, SkillError> {
    let instruction = match edit_type {
        "background-remove" => {
            "Remove the background completely, keep the subject with clean edges on a transparent background".to_string()
        }
        "object-remove" => {
            let object = params["object"]
                .as_str()
                .ok_or_else(|| SkillError::InvalidParams("object-remove 需要 object 参数".to_string()))?;
            format!("Remove the {object} from the image and fill the area seamlessly to match the surroundings")
        }
        "upscale" => {
            "Upscale the image to a higher resolution, enhancing sharpness and detail without altering the content".to_string()
        }
        "style-transfer" => {
            let style = params["style"]
                .as_str()
                .ok_or_else(|| SkillError::InvalidParams("style-transfer 需要 style 参数".to_string()))?;
            format!("Redraw the image in {style} style while preserving the original composition and subjects")
        }
        "extend" => {
            "Extend the image beyond its current borders, continuing the scene naturally in all directions".to_string()
        }
        other => {
            return Err(SkillError::InvalidParams(format!(
                "不支持的编辑类型: {other}"
            )))
        }
    };
    Ok(instruction)
}

#[async_trait]
impl Skill for SmartEditSkill {
    fn name(&self) -> &str {
        "smartEdit"
    }

    fn description(&self) -> &str {
        "智能编辑图像。参数: editType（background-remove/object-remove/upscale/style-transfer/extend）, sourceUrl, object, style"
    }

    async fn execute(&self, params: Value) -> Result<Value, SkillError> {
        let edit_type = params["editType"]
            .as_str()
            .ok_or_else(|| SkillError::InvalidParams("缺少 editType 参数".to_string()))?;
        let source = params["sourceUrl"]
            .as_str()
            .ok_or_else(|| SkillError::InvalidParams("缺少 sourceUrl 参数".to_string()))?;

        let instruction = edit_instruction(edit_type, &params)?;
        let model = params["model"].as_str().unwrap_or(&self.default_model);

        let request = ImageRequest {
            prompt: instruction.clone(),
            aspect_ratio: None,
            image_size: None,
            reference_image: Some(source.to_string()),
        };

        let url = self.providers.generate_image(model, &request).await?;

        Ok(json!({
            "type": "image",
            "url": url,
            "model": model,
            "prompt": instruction,
            "editType": edit_type,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockImageProvider;

    #[test]
    fn test_object_remove_substitution() {
        let instruction =
            edit_instruction("object-remove", &json!({"object": "coffee cup"})).unwrap();
        assert!(instruction.contains("coffee cup"));
    }

    #[test]
    fn test_unknown_edit_type() {
        let err = edit_instruction("rotate", &json!({})).unwrap_err();
        assert!(matches!(err, SkillError::InvalidParams(_)));
    }

    #[test]
    fn test_style_transfer_requires_style() {
        let err = edit_instruction("style-transfer", &json!({})).unwrap_err();
        assert!(matches!(err, SkillError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_smart_edit_dispatch() {
        let mut registry = ProviderRegistry::new();
        registry.register_image_provider(MockImageProvider::always("https://cdn.test/edited.png"));
        registry.map_image_model("mock-image", "mock");
        let skill = SmartEditSkill::new(Arc::new(registry), "mock-image");

        let out = skill
            .execute(json!({
                "editType": "background-remove",
                "sourceUrl": "data:image/png;base64,AAAA",
            }))
            .await
            .unwrap();
        assert_eq!(out["url"], "https://cdn.test/edited.png");
        assert_eq!(out["editType"], "background-remove");
    }
}
