//! generateCopy：营销文案生成
//!
//! 通过对话模型产出文案；结果是文本，不进画布资产。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{ChatMessage, ChatModel};
use crate::skills::registry::{Skill, SkillError};

pub struct GenerateCopySkill {
    model: Arc<dyn ChatModel>,
}

impl GenerateCopySkill {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Skill for GenerateCopySkill {
    fn name(&self) -> &str {
        "generateCopy"
    }

    fn description(&self) -> &str {
        "生成营销文案。参数: prompt（必填）, tone（可选，如 活泼/高级感）"
    }

    async fn execute(&self, params: Value) -> Result<Value, SkillError> {
        let brief = params["prompt"]
            .as_str()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| SkillError::InvalidParams("prompt 不能为空".to_string()))?;

        let tone = params["tone"].as_str().unwrap_or("简洁有力");

        let messages = vec![
            ChatMessage::system(format!(
                "你是品牌文案。基调：{tone}。直接输出文案本身，不要解释。"
            )),
            ChatMessage::user(brief.to_string()),
        ];

        let text = self
            .model
            .complete(&messages)
            .await
            .map_err(|e| SkillError::Model(e.to_string()))?;

        Ok(json!({ "type": "text", "text": text.trim() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatModel;

    #[tokio::test]
    async fn test_generate_copy() {
        let model = Arc::new(MockChatModel::new("山间一杯雾，醒来一座城。"));
        let skill = GenerateCopySkill::new(model);
        let out = skill.execute(json!({"prompt": "咖啡品牌 slogan"})).await.unwrap();
        assert_eq!(out["text"], "山间一杯雾，醒来一座城。");
    }

    #[tokio::test]
    async fn test_empty_brief_rejected() {
        let model = Arc::new(MockChatModel::new("x"));
        let skill = GenerateCopySkill::new(model);
        assert!(skill.execute(json!({})).await.is_err());
    }
}
