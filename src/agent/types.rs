//! 任务与提案数据模型
//!
//! Task 是执行状态机的载体：状态只向前推进（Pending → Analyzing →
//! Executing → Completed | Failed），每次迁移产生新值而非原地修改。
//! Proposal 自带技能调用，多个提案可独立执行；GeneratedAsset 只为
//! 真正成功的生成结果创建，失败的技能调用绝不合成占位资产。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// 专职设计 Agent 的封闭集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    /// 文案 / 创意总监
    Coco,
    /// 品牌 VI
    Vireo,
    /// 分镜 / 故事板
    Cameron,
    /// 海报（最通用，兜底）
    Poster,
    /// 包装设计
    Package,
    /// 动效 / 视频
    Motion,
    /// 营销系列图
    Campaign,
}

impl AgentType {
    pub const ALL: [AgentType; 7] = [
        AgentType::Coco,
        AgentType::Vireo,
        AgentType::Cameron,
        AgentType::Poster,
        AgentType::Package,
        AgentType::Motion,
        AgentType::Campaign,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentType::Coco => "coco",
            AgentType::Vireo => "vireo",
            AgentType::Cameron => "cameron",
            AgentType::Poster => "poster",
            AgentType::Package => "package",
            AgentType::Motion => "motion",
            AgentType::Campaign => "campaign",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coco" => Ok(AgentType::Coco),
            "vireo" => Ok(AgentType::Vireo),
            "cameron" => Ok(AgentType::Cameron),
            "poster" => Ok(AgentType::Poster),
            "package" => Ok(AgentType::Package),
            "motion" => Ok(AgentType::Motion),
            "campaign" => Ok(AgentType::Campaign),
            other => Err(format!("未知 agent: {other}")),
        }
    }
}

/// 任务状态；只向前推进
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Analyzing,
    Executing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// 迁移合法性：Pending→Analyzing→Executing→{Completed|Failed}，
    /// Analyzing 可直接失败；终态不再迁移
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Analyzing)
                | (Pending, Failed)
                | (Analyzing, Executing)
                | (Analyzing, Failed)
                | (Executing, Completed)
                | (Executing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// 画布选区标记（附件来源位置信息）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerRef {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 用户上传/画布选区产生的附件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub marker: Option<MarkerRef>,
}

impl Attachment {
    pub fn image(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
            marker: None,
        }
    }

    pub fn with_marker(mut self, marker: MarkerRef) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// 转为 base64 data URL，供多模态模型与技能参数使用
    pub fn to_data_url(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.data);
        format!("data:{};base64,{}", self.mime_type, encoded)
    }
}

/// 对话历史角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// 一轮对话
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// 品牌信息，用于生成提示词增强
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandInfo {
    pub name: Option<String>,
    pub colors: Vec<String>,
    pub style: Option<String>,
}

/// 项目上下文：路由与规划的只读输入，调用方每条消息重建
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub project_id: String,
    pub project_title: String,
    pub brand_info: Option<BrandInfo>,
    pub existing_assets: Vec<String>,
    pub conversation_history: Vec<ChatTurn>,
}

impl ProjectContext {
    pub fn new(project_id: impl Into<String>, project_title: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            project_title: project_title.into(),
            ..Default::default()
        }
    }
}

/// 任务输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInput {
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub context: ProjectContext,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// 一次技能调用；params 可能含 ATTACHMENT_<n> 哨兵，派发前解析
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCall {
    pub skill_name: String,
    pub params: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SkillCall {
    pub fn new(skill_name: impl Into<String>, params: Value) -> Self {
        Self {
            skill_name: skill_name.into(),
            params,
            result: None,
            error: None,
        }
    }
}

/// 一个具体设计方向，自带技能调用
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub skill_calls: Vec<SkillCall>,
    #[serde(default)]
    pub generated_url: Option<String>,
}

impl Proposal {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: format!("proposal_{}", uuid::Uuid::new_v4()),
            title: title.into(),
            description: description.into(),
            preview: None,
            skill_calls: Vec::new(),
            generated_url: None,
        }
    }

    pub fn with_skill_calls(mut self, calls: Vec<SkillCall>) -> Self {
        self.skill_calls = calls;
        self
    }
}

/// 资产类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
    Text,
}

/// 资产元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub agent_id: AgentType,
}

/// 生成结果资产；创建后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAsset {
    pub id: String,
    pub kind: AssetKind,
    pub url: String,
    pub metadata: AssetMetadata,
}

impl GeneratedAsset {
    pub fn new(kind: AssetKind, url: impl Into<String>, metadata: AssetMetadata) -> Self {
        Self {
            id: format!("asset_{}", uuid::Uuid::new_v4()),
            kind,
            url: url.into(),
            metadata,
        }
    }
}

/// 任务输出
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskOutput {
    pub message: String,
    #[serde(default)]
    pub proposals: Vec<Proposal>,
    #[serde(default)]
    pub assets: Vec<GeneratedAsset>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub error: Option<AppError>,
}

/// 任务：每条用户消息或每次提案执行创建一个；迁移产生新值
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub agent_id: AgentType,
    pub status: TaskStatus,
    pub input: TaskInput,
    pub output: Option<TaskOutput>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(agent_id: AgentType, input: TaskInput) -> Self {
        let now = Utc::now();
        Self {
            id: format!("task_{}", uuid::Uuid::new_v4()),
            agent_id,
            status: TaskStatus::Pending,
            input,
            output: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 迁移到新状态；非法迁移保持原状态并告警（状态只向前）
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        if self.status == status {
            return self;
        }
        if !self.status.can_transition_to(status) {
            tracing::warn!(
                task = %self.id,
                from = ?self.status,
                to = ?status,
                "忽略非法状态迁移"
            );
            return self;
        }
        self.status = status;
        self.updated_at = Utc::now();
        self
    }

    pub fn with_output(mut self, output: TaskOutput) -> Self {
        self.output = Some(output);
        self.updated_at = Utc::now();
        self
    }
}
