//! 技能层：归一化的生成/理解/编辑能力，供 Agent 派发
//!
//! 技能是薄适配：把规划产出的参数转为一次供应商或模型调用。
//! builtin_registry 装配全部内置技能。

pub mod copywriting;
pub mod edit;
pub mod export;
pub mod generate;
pub mod registry;
pub mod vision;

use std::sync::Arc;

pub use copywriting::GenerateCopySkill;
pub use edit::SmartEditSkill;
pub use export::ExportSkill;
pub use generate::{GenerateImageSkill, GenerateVideoSkill};
pub use registry::{Skill, SkillError, SkillRegistry};
pub use vision::{AnalyzeRegionSkill, ExtractTextSkill};

use crate::config::ProvidersSection;
use crate::llm::ChatModel;
use crate::providers::ProviderRegistry;

/// 装配全部内置技能
pub fn builtin_registry(
    model: Arc<dyn ChatModel>,
    providers: Arc<ProviderRegistry>,
    cfg: &ProvidersSection,
) -> SkillRegistry {
    let mut registry = SkillRegistry::new();
    registry.register(GenerateImageSkill::new(
        Arc::clone(&providers),
        cfg.image_model.clone(),
    ));
    registry.register(GenerateVideoSkill::new(
        Arc::clone(&providers),
        cfg.video_model.clone(),
    ));
    registry.register(ExtractTextSkill::new(Arc::clone(&model)));
    registry.register(AnalyzeRegionSkill::new(Arc::clone(&model)));
    registry.register(GenerateCopySkill::new(Arc::clone(&model)));
    registry.register(SmartEditSkill::new(providers, cfg.image_model.clone()));
    registry.register(ExportSkill);
    registry
}
