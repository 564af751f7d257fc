//! 视觉理解技能：extractText（OCR）与 analyzeRegion（区域描述）
//!
//! 都通过多模态对话模型完成；extractText 无文字时返回空数组而非报错。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{ChatMessage, ChatModel};
use crate::skills::registry::{Skill, SkillError};

fn required_image(params: &Value) -> Result<&str, SkillError> {
    params["image"]
        .as_str()
        .or_else(|| params["sourceUrl"].as_str())
        .ok_or_else(|| SkillError::InvalidParams("缺少 image 参数".to_string()))
}

/// extractText：识别图中文字，按阅读顺序返回字符串数组
pub struct ExtractTextSkill {
    model: Arc<dyn ChatModel>,
}

impl ExtractTextSkill {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Skill for ExtractTextSkill {
    fn name(&self) -> &str {
        "extractText"
    }

    fn description(&self) -> &str {
        "识别图像中的文字，按阅读顺序逐行返回。参数: image（data URL）"
    }

    async fn execute(&self, params: Value) -> Result<Value, SkillError> {
        let image = required_image(&params)?.to_string();

        let messages = vec![
            ChatMessage::system(
                "识别图中的所有文字，按阅读顺序逐行输出，每行一条。\
                 没有文字时输出空内容。不要任何解释。",
            ),
            ChatMessage::user("请识别这张图中的文字。").with_images(vec![image]),
        ];

        let raw = self
            .model
            .complete(&messages)
            .await
            .map_err(|e| SkillError::Model(e.to_string()))?;

        let lines: Vec<&str> = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        Ok(json!({ "type": "text", "texts": lines }))
    }
}

/// analyzeRegion：对裁剪区域生成自由文本描述
pub struct AnalyzeRegionSkill {
    model: Arc<dyn ChatModel>,
}

impl AnalyzeRegionSkill {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Skill for AnalyzeRegionSkill {
    fn name(&self) -> &str {
        "analyzeRegion"
    }

    fn description(&self) -> &str {
        "描述图像选区的内容与风格。参数: image（data URL）, question（可选）"
    }

    async fn execute(&self, params: Value) -> Result<Value, SkillError> {
        let image = required_image(&params)?.to_string();
        let question = params["question"]
            .as_str()
            .unwrap_or("描述这个区域的内容、配色与风格。");

        let messages = vec![
            ChatMessage::system("你是设计助手，用两三句话精确描述图像区域。"),
            ChatMessage::user(question.to_string()).with_images(vec![image]),
        ];

        let description = self
            .model
            .complete(&messages)
            .await
            .map_err(|e| SkillError::Model(e.to_string()))?;

        Ok(json!({ "type": "text", "description": description.trim() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatModel;

    #[tokio::test]
    async fn test_extract_text_lines() {
        let model = Arc::new(MockChatModel::new("山雾咖啡\n冷萃 · 限定\n"));
        let skill = ExtractTextSkill::new(model);
        let out = skill
            .execute(json!({"image": "data:image/png;base64,AAAA"}))
            .await
            .unwrap();
        let texts = out["texts"].as_array().unwrap();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], "山雾咖啡");
    }

    #[tokio::test]
    async fn test_extract_text_empty_is_ok() {
        let model = Arc::new(MockChatModel::new("  \n"));
        let skill = ExtractTextSkill::new(model);
        let out = skill
            .execute(json!({"image": "data:image/png;base64,AAAA"}))
            .await
            .unwrap();
        assert!(out["texts"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_image_rejected() {
        let model = Arc::new(MockChatModel::new("x"));
        let skill = AnalyzeRegionSkill::new(model);
        let err = skill.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, SkillError::InvalidParams(_)));
    }
}
