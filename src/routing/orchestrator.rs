//! API 路由器（编排器）
//!
//! 先走本地预路由（零网络）；未命中时调用分类模型，带重试 + 超时，
//! 解析 route / clarify / respond 三种响应，clarify 与 respond 折叠为
//! 指向通用 Poster 的路由；低置信度只追加 fallback 候选，不失败。
//! 只有本地让路且 API 彻底不可用时才返回 None，调用方应视为
//! 「用自己的默认 agent」，绝不向用户抛错。

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::types::{AgentType, ChatRole, ProjectContext};
use crate::config::RoutingSection;
use crate::error::{with_retry, AppError, RetryConfig};
use crate::llm::{ChatMessage, ChatModel};
use crate::routing::local::local_pre_route;

/// 任务复杂度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Complex,
}

/// 一次路由决策；随用随建，不持久化
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub target_agent: AgentType,
    pub task_type: String,
    pub complexity: Complexity,
    pub handoff_message: String,
    pub confidence: f32,
    /// 置信度低于阈值时追加的候选；不修改 confidence 本身
    pub fallback_options: Vec<AgentType>,
}

/// 历史截断：只带最近 5 轮进分类请求
const HISTORY_WINDOW: usize = 5;

const ROUTER_SYSTEM_PROMPT: &str = "\
你是设计工作台的意图路由器。根据用户消息与对话历史，决定由哪个专职设计 agent 处理。

可选 agent 与职责：
- coco: 品牌文案、标题、slogan、卖点
- vireo: 品牌视觉识别（VI）、logo、色彩系统
- cameron: 广告分镜、故事板、镜头脚本
- poster: 海报、Banner、一般图像生成（默认兜底）
- package: 产品包装、瓶身、盒型、标签
- motion: 视频、动画、动效
- campaign: 营销系列图、主视觉加延展、多图成套

判定规则，按优先级从高到低：
1. 纯寒暄/致谢/告别 → action=respond，给一句简短回应
2. 意图不明、信息不足 → action=clarify，给一个澄清问题
3. 明确品牌 VI / logo 需求 → vireo
4. 分镜/故事板 → cameron
5. 包装 → package
6. 视频/动效 → motion
7. 系列图/多图成套/营销活动 → campaign
8. 一般海报/图像需求 → poster
9. 修改已有图（替换/移除/调整元素）→ 按被修改内容归属对应 agent
10. 多意图取主要意图
11. 纯文案需求 → coco

只输出一个 JSON 对象，不要解释：
{\"action\": \"route\", \"targetAgent\": \"poster\", \"taskType\": \"poster-design\", \
\"complexity\": \"simple\", \"handoffMessage\": \"...\", \"confidence\": 0.9}
或 {\"action\": \"clarify\", \"question\": \"...\"}
或 {\"action\": \"respond\", \"reply\": \"...\"}";

/// 编排器：持有分类模型与路由参数
pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    confidence_threshold: f32,
    fallback_agent: AgentType,
    max_retries: u32,
    request_timeout: Duration,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            confidence_threshold: 0.6,
            fallback_agent: AgentType::Poster,
            max_retries: 2,
            request_timeout: Duration::from_secs(15),
        }
    }

    pub fn from_config(model: Arc<dyn ChatModel>, cfg: &RoutingSection) -> Self {
        Self {
            model,
            confidence_threshold: cfg.confidence_threshold,
            fallback_agent: AgentType::from_str(&cfg.fallback_agent).unwrap_or(AgentType::Poster),
            max_retries: cfg.max_retries,
            request_timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }

    pub fn fallback_agent(&self) -> AgentType {
        self.fallback_agent
    }

    /// 路由一条用户消息；None 表示「调用方用默认 agent」
    pub async fn route(
        &self,
        message: &str,
        context: &ProjectContext,
    ) -> Option<RoutingDecision> {
        // 快路径：本地命中则零网络
        if let Some(agent) = local_pre_route(message) {
            tracing::debug!(agent = %agent, "本地预路由命中");
            return Some(RoutingDecision {
                target_agent: agent,
                task_type: "local-routed".to_string(),
                complexity: Complexity::Simple,
                handoff_message: message.to_string(),
                confidence: 0.7,
                fallback_options: Vec::new(),
            });
        }

        let messages = self.build_messages(message, context);
        let retry_cfg = RetryConfig::new(self.max_retries, Duration::from_millis(500), true);
        let timeout = self.request_timeout;
        let model = Arc::clone(&self.model);

        let raw = with_retry(
            || {
                let messages = messages.clone();
                let model = Arc::clone(&model);
                async move {
                    match tokio::time::timeout(timeout, model.complete(&messages)).await {
                        Ok(result) => result.map_err(AppError::from),
                        Err(_) => Err(AppError::timeout("路由分类请求超时")),
                    }
                }
            },
            &retry_cfg,
        )
        .await;

        match raw {
            Ok(raw) => self
                .parse_response(&raw)
                .map(|decision| self.annotate_fallback(decision)),
            Err(err) => {
                tracing::warn!(kind = ?err.kind, "API 路由失败，降级为 None: {}", err.message);
                None
            }
        }
    }

    fn build_messages(&self, message: &str, context: &ProjectContext) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(ROUTER_SYSTEM_PROMPT)];
        let history = &context.conversation_history;
        let skip = history.len().saturating_sub(HISTORY_WINDOW);
        for turn in &history[skip..] {
            messages.push(match turn.role {
                ChatRole::User => ChatMessage::user(turn.content.clone()),
                ChatRole::Assistant => ChatMessage::assistant(turn.content.clone()),
            });
        }
        messages.push(ChatMessage::user(message.to_string()));
        messages
    }

    /// 解析分类响应；结构不可用返回 None
    fn parse_response(&self, raw: &str) -> Option<RoutingDecision> {
        let json = extract_json(raw)?;
        let parsed: Value = serde_json::from_str(json).ok()?;

        match parsed["action"].as_str()? {
            "route" => {
                let target = AgentType::from_str(parsed["targetAgent"].as_str()?).ok()?;
                let complexity = match parsed["complexity"].as_str() {
                    Some("complex") => Complexity::Complex,
                    _ => Complexity::Simple,
                };
                Some(RoutingDecision {
                    target_agent: target,
                    task_type: parsed["taskType"].as_str().unwrap_or("design").to_string(),
                    complexity,
                    handoff_message: parsed["handoffMessage"].as_str().unwrap_or("").to_string(),
                    confidence: parsed["confidence"].as_f64().unwrap_or(0.5) as f32,
                    fallback_options: Vec::new(),
                })
            }
            // 澄清与寒暄都折叠为指向兜底 agent 的路由，携带应答文本
            "clarify" => Some(RoutingDecision {
                target_agent: self.fallback_agent,
                task_type: "clarify".to_string(),
                complexity: Complexity::Simple,
                handoff_message: parsed["question"].as_str().unwrap_or("").to_string(),
                confidence: 1.0,
                fallback_options: Vec::new(),
            }),
            "respond" => Some(RoutingDecision {
                target_agent: self.fallback_agent,
                task_type: "respond".to_string(),
                complexity: Complexity::Simple,
                handoff_message: parsed["reply"].as_str().unwrap_or("").to_string(),
                confidence: 1.0,
                fallback_options: Vec::new(),
            }),
            _ => None,
        }
    }

    fn annotate_fallback(&self, mut decision: RoutingDecision) -> RoutingDecision {
        if decision.confidence < self.confidence_threshold {
            decision.fallback_options = vec![self.fallback_agent];
        }
        decision
    }
}

/// 从模型输出中提取 JSON 块（```json 围栏或首个大括号对）
fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}
