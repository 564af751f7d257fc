//! export：画布元素序列化占位
//!
//! 不做生成；把调用方传入的元素列表原样打包，真正的导出由画布侧完成。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::skills::registry::{Skill, SkillError};

pub struct ExportSkill;

#[async_trait]
impl Skill for ExportSkill {
    fn name(&self) -> &str {
        "export"
    }

    fn description(&self) -> &str {
        "导出画布元素。参数: elements, format（默认 json）"
    }

    async fn execute(&self, params: Value) -> Result<Value, SkillError> {
        let format = params["format"].as_str().unwrap_or("json").to_string();
        let elements = params["elements"].clone();
        let count = elements.as_array().map(|a| a.len()).unwrap_or(0);

        Ok(json!({
            "type": "export",
            "format": format,
            "elementCount": count,
            "elements": elements,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_export_counts_elements() {
        let out = ExportSkill
            .execute(json!({"elements": [{"id": 1}, {"id": 2}]}))
            .await
            .unwrap();
        assert_eq!(out["elementCount"], 2);
        assert_eq!(out["format"], "json");
    }
}
