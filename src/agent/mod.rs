//! Agent 层：档案、任务模型与执行状态机

pub mod executor;
pub mod profiles;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

pub use executor::{DesignAgent, ExecuteConfig};
pub use profiles::AgentProfile;
pub use types::{
    AgentType, AssetKind, Attachment, BrandInfo, ChatRole, ChatTurn, GeneratedAsset, MarkerRef,
    ProjectContext, Proposal, SkillCall, Task, TaskInput, TaskOutput, TaskStatus,
};

use crate::llm::ChatModel;
use crate::skills::SkillRegistry;

/// 装配全部专职 Agent，共享同一个模型与技能注册表
pub fn build_agents(
    model: Arc<dyn ChatModel>,
    skills: Arc<SkillRegistry>,
    config: ExecuteConfig,
) -> HashMap<AgentType, Arc<DesignAgent>> {
    AgentType::ALL
        .into_iter()
        .map(|agent_type| {
            let agent = DesignAgent::new(
                agent_type,
                Arc::clone(&model),
                Arc::clone(&skills),
                config.clone(),
            );
            (agent_type, Arc::new(agent))
        })
        .collect()
}
