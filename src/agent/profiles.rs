//! Agent 档案：系统提示词与技能偏好
//!
//! 每个专职 Agent 一份固定档案，纯配置数据；规划提示词由
//! executor 在此基础上拼接项目上下文、附件清单与用户消息。

use crate::agent::types::AgentType;

/// Agent 档案：角色提示词 + 按优先级排列的偏好技能
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub display_name: &'static str,
    pub system_prompt: &'static str,
    /// 技能名按偏好排序，规划提示词按此顺序列出
    pub preferred_skills: &'static [&'static str],
}

impl AgentProfile {
    pub fn for_agent(agent: AgentType) -> Self {
        match agent {
            AgentType::Coco => Self {
                display_name: "Coco 文案",
                system_prompt: "你是 Coco，资深品牌文案与创意总监。\
                    你负责广告语、产品卖点、品牌故事与标题创作。\
                    输出文案要精炼有记忆点，先给出核心文案，再给出可选方向。",
                preferred_skills: &["generateCopy", "generateImage"],
            },
            AgentType::Vireo => Self {
                display_name: "Vireo 品牌视觉",
                system_prompt: "你是 Vireo，品牌视觉识别（VI）设计师。\
                    你负责 logo、标志、色彩系统与品牌规范物料。\
                    方案必须保持品牌一致性：统一的色板、字形与构图语言。",
                preferred_skills: &["generateImage", "smartEdit", "generateCopy"],
            },
            AgentType::Cameron => Self {
                display_name: "Cameron 分镜",
                system_prompt: "你是 Cameron，广告片分镜与故事板设计师。\
                    你把创意脚本拆为镜头序列，每个镜头一张画面，\
                    注明景别、机位与画面要素，整组镜头风格统一。",
                preferred_skills: &["generateImage", "generateVideo"],
            },
            AgentType::Poster => Self {
                display_name: "Poster 海报",
                system_prompt: "你是 Poster，全能平面海报设计师，也是默认兜底设计师。\
                    你负责海报、Banner、宣传图与一般图像生成需求。\
                    构图要有视觉焦点，文字层级清晰，给出 2-3 个不同方向的提案。",
                preferred_skills: &["generateImage", "smartEdit", "extractText", "generateCopy"],
            },
            AgentType::Package => Self {
                display_name: "Package 包装",
                system_prompt: "你是 Package，产品包装设计师。\
                    你负责瓶身、盒型、标签与货架视觉。\
                    注意可印刷性与正面视觉层级，多角度展示包装效果。",
                preferred_skills: &["generateImage", "analyzeRegion", "smartEdit"],
            },
            AgentType::Motion => Self {
                display_name: "Motion 动效",
                system_prompt: "你是 Motion，动态设计师。\
                    你负责产品动画、动效片段与短视频生成。\
                    先确定首帧画面，再描述运动方式与节奏。",
                preferred_skills: &["generateVideo", "generateImage"],
            },
            AgentType::Campaign => Self {
                display_name: "Campaign 营销系列",
                system_prompt: "你是 Campaign，整合营销视觉设计师。\
                    你负责成套的系列图：主视觉加多张延展，\
                    同一主题下每张侧重不同场景或卖点，风格必须成体系。",
                preferred_skills: &["generateImage", "generateCopy", "smartEdit"],
            },
        }
    }
}
