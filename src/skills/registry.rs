//! 技能注册表
//!
//! 所有技能实现 Skill trait（name / description / execute），由 SkillRegistry
//! 按名注册与派发；每次调用输出结构化审计日志（JSON）。纯派发表，无状态。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::{AppError, ErrorKind};
use crate::providers::ProviderError;

/// 技能执行错误
#[derive(Debug, Error)]
pub enum SkillError {
    #[error("未注册的技能: {0}")]
    NotFound(String),

    #[error("技能参数错误: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("模型调用失败: {0}")]
    Model(String),
}

impl From<SkillError> for AppError {
    fn from(err: SkillError) -> Self {
        match err {
            SkillError::NotFound(name) => AppError::new(ErrorKind::SkillNotFound, name),
            SkillError::InvalidParams(msg) => AppError::validation(msg),
            SkillError::Provider(inner) => inner.into(),
            SkillError::Model(msg) => AppError::new(ErrorKind::GenericApi, msg),
        }
    }
}

/// 技能 trait：薄适配层，把归一化参数转为一次供应商/模型调用
#[async_trait]
pub trait Skill: Send + Sync {
    /// 技能名称（规划 JSON 中的 skillName 字段）
    fn name(&self) -> &str;

    /// 描述（拼入规划提示词，供模型理解功能）
    fn description(&self) -> &str;

    async fn execute(&self, params: Value) -> Result<Value, SkillError>;
}

/// 技能注册表：按名称存储 Arc<dyn Skill>
#[derive(Default)]
pub struct SkillRegistry {
    skills: HashMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, skill: impl Skill + 'static) {
        let name = skill.name().to_string();
        self.skills.insert(name, Arc::new(skill));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.skills.get(name).cloned()
    }

    pub fn skill_names(&self) -> Vec<String> {
        self.skills.keys().cloned().collect()
    }

    /// (name, description) 列表，用于规划提示词的可用技能段落
    pub fn skill_descriptions(&self) -> Vec<(String, String)> {
        self.skills
            .iter()
            .map(|(name, skill)| (name.clone(), skill.description().to_string()))
            .collect()
    }

    /// 派发技能并输出审计日志；未注册返回 NotFound
    pub async fn execute(&self, name: &str, params: Value) -> Result<Value, SkillError> {
        let skill = self
            .skills
            .get(name)
            .ok_or_else(|| SkillError::NotFound(name.to_string()))?;

        let start = Instant::now();
        let params_preview = params_preview(&params);
        let result = skill.execute(params).await;

        let audit = serde_json::json!({
            "event": "skill_audit",
            "skill": name,
            "ok": result.is_ok(),
            "duration_ms": start.elapsed().as_millis() as u64,
            "params_preview": params_preview,
        });
        tracing::info!(audit = %audit.to_string(), "skill");

        result
    }
}

fn params_preview(params: &Value) -> String {
    let s = params.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoSkill;

    #[async_trait]
    impl Skill for EchoSkill {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "回显参数"
        }

        async fn execute(&self, params: Value) -> Result<Value, SkillError> {
            Ok(params)
        }
    }

    #[tokio::test]
    async fn test_dispatch_and_not_found() {
        let mut registry = SkillRegistry::new();
        registry.register(EchoSkill);

        let out = registry.execute("echo", json!({"a": 1})).await.unwrap();
        assert_eq!(out["a"], 1);

        let err = registry.execute("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, SkillError::NotFound(_)));
        let app: AppError = err.into();
        assert_eq!(app.kind, ErrorKind::SkillNotFound);
        assert!(!app.retryable);
    }
}
