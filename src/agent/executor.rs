//! Agent 执行状态机
//!
//! 每个任务走 Pending → Analyzing → Executing → Completed | Failed：
//! 先让规划模型产出设计提案（JSON），对结构缺陷做修复（顶层技能调用
//! 补成提案、数量词展开为多个变体），再逐条派发技能调用。单条调用
//! 失败只记录在该调用上，不拖垮同级；整体受 with_retry + 超时约束，
//! 超时直接丢弃当轮 future，晚到的结果不会写进任务。

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::agent::profiles::AgentProfile;
use crate::agent::types::{
    AgentType, AssetKind, AssetMetadata, Attachment, GeneratedAsset, Proposal, SkillCall, Task,
    TaskInput, TaskOutput, TaskStatus,
};
use crate::config::AgentSection;
use crate::error::{handler, with_retry, AppError, ErrorKind, RetryConfig};
use crate::llm::{ChatMessage, ChatModel};
use crate::skills::SkillRegistry;

/// 数量词未给出但消息含「系列」时的默认变体数
const SERIES_DEFAULT_COUNT: usize = 5;

/// 多变体合成时依次附加的风格侧重（英文进生成提示词）
const VARIANT_STYLES: &[(&str, &str)] = &[
    ("信息图版", "infographic style with annotated callouts"),
    ("多角度版", "multi-angle product view composition"),
    ("场景版", "lifestyle scene with natural environment"),
    ("细节特写版", "macro close-up detail shot"),
    ("尺寸对照版", "size reference comparison layout"),
];

/// 执行参数；独立于全局配置以便测试收紧超时
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
    /// 管线整体重试次数（不含首次）
    pub max_retries: u32,
    pub timeout: Duration,
    pub retry_delay: Duration,
    pub enable_cache: bool,
}

impl Default for ExecuteConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            timeout: Duration::from_secs(120),
            retry_delay: Duration::from_secs(2),
            enable_cache: true,
        }
    }
}

impl ExecuteConfig {
    pub fn from_config(cfg: &AgentSection) -> Self {
        Self {
            max_retries: cfg.max_retries,
            timeout: cfg.timeout(),
            retry_delay: cfg.retry_delay(),
            enable_cache: cfg.enable_cache,
        }
    }
}

/// 规划模型输出的设计计划（宽松解析，字段全部可缺省）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DesignPlan {
    analysis: Option<String>,
    message: Option<String>,
    concept: Option<String>,
    proposals: Vec<PlanProposal>,
    /// 有些模型把调用放在顶层而不挂在提案下，交给修复逻辑
    skill_calls: Vec<PlanSkillCall>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PlanProposal {
    title: String,
    description: String,
    skill_calls: Vec<PlanSkillCall>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanSkillCall {
    #[serde(alias = "skill", alias = "name")]
    skill_name: String,
    #[serde(default)]
    params: Value,
}

/// 专职设计 Agent：档案 + 规划模型 + 技能注册表 + 结果缓存
pub struct DesignAgent {
    agent_type: AgentType,
    profile: AgentProfile,
    model: Arc<dyn ChatModel>,
    skills: Arc<SkillRegistry>,
    config: ExecuteConfig,
    /// 已完成任务缓存：project_id|message → Task
    cache: Mutex<HashMap<String, Task>>,
}

impl DesignAgent {
    pub fn new(
        agent_type: AgentType,
        model: Arc<dyn ChatModel>,
        skills: Arc<SkillRegistry>,
        config: ExecuteConfig,
    ) -> Self {
        Self {
            agent_type,
            profile: AgentProfile::for_agent(agent_type),
            model,
            skills,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    pub fn display_name(&self) -> &'static str {
        self.profile.display_name
    }

    /// 执行一条用户消息；总是返回终态 Task，不向上抛错
    pub async fn execute(&self, input: TaskInput) -> Task {
        let task = Task::new(self.agent_type, input);

        if task.input.message.trim().is_empty() {
            let err = AppError::validation("消息内容为空");
            handler().record(&err);
            return task
                .with_status(TaskStatus::Failed)
                .with_output(failure_output(&err));
        }

        let cache_key = format!(
            "{}|{}",
            task.input.context.project_id, task.input.message
        );
        if self.config.enable_cache {
            if let Some(hit) = self.cache_lookup(&cache_key) {
                tracing::debug!(agent = %self.agent_type, task = %hit.id, "命中结果缓存");
                return hit;
            }
        }

        let task = task.with_status(TaskStatus::Analyzing);
        let retry_cfg = RetryConfig::new(self.config.max_retries, self.config.retry_delay, true);

        let result = with_retry(
            || {
                let attempt = task.clone();
                async move {
                    match tokio::time::timeout(self.config.timeout, self.run_pipeline(attempt))
                        .await
                    {
                        Ok(result) => result,
                        // 丢弃当轮 future，晚到的生成结果不会写回任务
                        Err(_) => Err(AppError::timeout(format!(
                            "agent {} 管线超时",
                            self.agent_type
                        ))),
                    }
                }
            },
            &retry_cfg,
        )
        .await;

        match result {
            Ok(done) => {
                if self.config.enable_cache {
                    if let Ok(mut cache) = self.cache.lock() {
                        cache.insert(cache_key, done.clone());
                    }
                }
                done
            }
            Err(err) => {
                handler().record(&err);
                tracing::error!(agent = %self.agent_type, kind = ?err.kind, "任务失败: {}", err.message);
                task.with_status(TaskStatus::Failed)
                    .with_output(failure_output(&err))
            }
        }
    }

    fn cache_lookup(&self, key: &str) -> Option<Task> {
        let cache = self.cache.lock().ok()?;
        cache
            .get(key)
            .filter(|t| t.status == TaskStatus::Completed)
            .cloned()
    }

    /// 单轮管线：规划 → Executing → 派发 → Completed
    async fn run_pipeline(&self, task: Task) -> Result<Task, AppError> {
        let plan = self.analyze_and_plan(&task.input).await?;
        let task = task.with_status(TaskStatus::Executing);

        let proposals = normalize_plan(&plan, &task.input.message);
        let output = self.execute_proposals(&task.input, &plan, proposals).await;

        Ok(task
            .with_output(output)
            .with_status(TaskStatus::Completed))
    }

    /// 规划阶段：组装提示词并调用模型，解析为 DesignPlan
    async fn analyze_and_plan(&self, input: &TaskInput) -> Result<DesignPlan, AppError> {
        let system = format!(
            "{}\n\n{}",
            self.profile.system_prompt,
            planning_instructions()
        );

        let image_urls: Vec<String> = input
            .attachments
            .iter()
            .filter(|a| a.is_image())
            .map(Attachment::to_data_url)
            .collect();

        let user = ChatMessage::user(self.plan_prompt(input)).with_images(image_urls);
        let messages = vec![ChatMessage::system(system), user];

        let raw = self
            .model
            .complete(&messages)
            .await
            .map_err(AppError::from)?;

        parse_plan(&raw).ok_or_else(|| {
            AppError::new(ErrorKind::GenericApi, "规划输出不是合法 JSON")
                .with_context(truncate(&raw, 200))
        })
    }

    /// 规划提示词正文：项目上下文 + 附件清单 + 可用技能 + 用户需求
    fn plan_prompt(&self, input: &TaskInput) -> String {
        let ctx = &input.context;
        let mut prompt = format!("【项目】{}\n", ctx.project_title);

        if let Some(brand) = &ctx.brand_info {
            let mut parts = Vec::new();
            if let Some(name) = &brand.name {
                parts.push(format!("名称 {name}"));
            }
            if !brand.colors.is_empty() {
                parts.push(format!("色板 {}", brand.colors.join(" ")));
            }
            if let Some(style) = &brand.style {
                parts.push(format!("风格 {style}"));
            }
            if !parts.is_empty() {
                prompt.push_str(&format!("【品牌】{}\n", parts.join("，")));
            }
        }

        if !ctx.existing_assets.is_empty() {
            prompt.push_str(&format!("【已有资产】{} 个\n", ctx.existing_assets.len()));
        }

        if !input.attachments.is_empty() {
            prompt.push_str("【附件】引用时写 ATTACHMENT_<序号>\n");
            for (i, att) in input.attachments.iter().enumerate() {
                let marker = att
                    .marker
                    .as_ref()
                    .map(|m| {
                        format!("，画布选区 ({:.0},{:.0}) {:.0}x{:.0}", m.x, m.y, m.width, m.height)
                    })
                    .unwrap_or_default();
                prompt.push_str(&format!(
                    "ATTACHMENT_{}: {} ({}{})\n",
                    i, att.name, att.mime_type, marker
                ));
            }
        }

        prompt.push_str("【可用技能】\n");
        let descriptions: HashMap<String, String> =
            self.skills.skill_descriptions().into_iter().collect();
        // 偏好技能在前，其余随后
        for name in self.profile.preferred_skills {
            if let Some(desc) = descriptions.get(*name) {
                prompt.push_str(&format!("- {name}: {desc}\n"));
            }
        }
        for (name, desc) in &descriptions {
            if !self.profile.preferred_skills.contains(&name.as_str()) {
                prompt.push_str(&format!("- {name}: {desc}\n"));
            }
        }

        prompt.push_str(&format!("【用户需求】\n{}", input.message));
        prompt
    }

    /// 执行阶段：逐提案、逐调用派发；单条失败不拖垮同级
    async fn execute_proposals(
        &self,
        input: &TaskInput,
        plan: &DesignPlan,
        mut proposals: Vec<Proposal>,
    ) -> TaskOutput {
        let mut assets = Vec::new();

        for proposal in proposals.iter_mut() {
            for call in proposal.skill_calls.iter_mut() {
                let params = match self.prepare_params(call, input) {
                    Ok(params) => params,
                    Err(msg) => {
                        call.error = Some(msg.clone());
                        handler().record(&AppError::validation(msg));
                        continue;
                    }
                };
                // 解析结果回写到调用上：下游看到的是实际派发的参数
                call.params = params.clone();

                match self.skills.execute(&call.skill_name, params).await {
                    Ok(result) => {
                        if let Some(asset) = asset_from_result(&result, self.agent_type) {
                            if proposal.generated_url.is_none() {
                                proposal.generated_url = Some(asset.url.clone());
                            }
                            assets.push(asset);
                        }
                        call.result = Some(result);
                    }
                    Err(err) => {
                        let app: AppError = err.into();
                        handler().record(&app);
                        tracing::warn!(
                            agent = %self.agent_type,
                            skill = call.skill_name.as_str(),
                            kind = ?app.kind,
                            "技能调用失败，继续其余调用: {}",
                            app.message
                        );
                        call.error = Some(app.message.clone());
                    }
                }
            }
        }

        let message = plan
            .analysis
            .clone()
            .or_else(|| plan.message.clone())
            .or_else(|| plan.concept.clone())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "设计方案已生成，请查看画布。".to_string());

        TaskOutput {
            message,
            proposals,
            assets,
            suggestions: default_suggestions(),
            error: None,
        }
    }

    /// 派发前参数处理：解析附件哨兵、注入品牌信息、图生图自动带参考图
    fn prepare_params(&self, call: &SkillCall, input: &TaskInput) -> Result<Value, String> {
        let mut params = if call.params.is_object() {
            call.params.clone()
        } else {
            Value::Object(Default::default())
        };

        resolve_attachment_refs(&mut params, &input.attachments)?;

        if let Some(obj) = params.as_object_mut() {
            // 附件在场但规划没引用时，图像生成自动带第一张图做参考
            if call.skill_name == "generateImage" && !obj.contains_key("referenceImage") {
                if let Some(att) = input.attachments.iter().find(|a| a.is_image()) {
                    obj.insert(
                        "referenceImage".to_string(),
                        Value::String(att.to_data_url()),
                    );
                }
            }

            if !obj.contains_key("brand") {
                if let Some(brand) = &input.context.brand_info {
                    if let Ok(value) = serde_json::to_value(brand) {
                        obj.insert("brand".to_string(), value);
                    }
                }
            }
        }

        Ok(params)
    }
}

/// 规划输出格式要求（拼在每个 agent 的系统提示词之后）
fn planning_instructions() -> &'static str {
    "请以 JSON 形式输出设计计划，不要输出 JSON 以外的内容：\n\
     {\"analysis\": \"对需求的一句话分析\",\n \
      \"proposals\": [{\"title\": \"方向名\", \"description\": \"方案说明\",\n   \
      \"skillCalls\": [{\"skillName\": \"generateImage\", \"params\": {\"prompt\": \"英文生成提示词\"}}]}]}\n\
     生成类提示词用英文描述画面；引用附件写 ATTACHMENT_<序号>；\n\
     不需要生成时 proposals 可为空数组，把回应写在 analysis 里。"
}

/// 解析规划输出：剥离 ```json 围栏后反序列化
fn parse_plan(raw: &str) -> Option<DesignPlan> {
    let json = strip_fences(raw);
    serde_json::from_str(json).ok()
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return rest
            .find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim());
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }
    trimmed
}

/// 把计划归一化为带技能调用的提案列表
///
/// 修复两类结构缺陷：调用挂在顶层而非提案下；用户要 N 张但只规划了
/// 一次生成（按数量词展开成 N 个风格变体）。
fn normalize_plan(plan: &DesignPlan, message: &str) -> Vec<Proposal> {
    let mut proposals: Vec<Proposal> = plan
        .proposals
        .iter()
        .map(|p| {
            Proposal::new(p.title.clone(), p.description.clone())
                .with_skill_calls(p.skill_calls.iter().map(to_skill_call).collect())
        })
        .collect();

    let any_calls = proposals.iter().any(|p| !p.skill_calls.is_empty());
    if !any_calls && !plan.skill_calls.is_empty() {
        proposals = repair_orphan_calls(&plan.skill_calls, message);
    }

    proposals
}

fn to_skill_call(call: &PlanSkillCall) -> SkillCall {
    SkillCall::new(resolve_skill_alias(&call.skill_name), call.params.clone())
}

/// 顶层孤儿调用修复：数量词 + 单次图像生成 → N 个风格变体，
/// 否则每个调用包成独立提案
fn repair_orphan_calls(calls: &[PlanSkillCall], message: &str) -> Vec<Proposal> {
    let requested = requested_count(message);

    if let Some(n) = requested {
        if n > 1 && calls.len() == 1 {
            let base = to_skill_call(&calls[0]);
            if base.skill_name == "generateImage" {
                tracing::debug!(count = n, "按数量词展开为多变体提案");
                return synthesize_variants(&base, n);
            }
        }
    }

    calls
        .iter()
        .enumerate()
        .map(|(i, call)| {
            let call = to_skill_call(call);
            Proposal::new(format!("方案 {}", i + 1), format!("执行 {}", call.skill_name))
                .with_skill_calls(vec![call])
        })
        .collect()
}

/// 单次生成展开为 n 个变体：每个变体在提示词后附加不同风格侧重
fn synthesize_variants(base: &SkillCall, n: usize) -> Vec<Proposal> {
    (0..n)
        .map(|i| {
            let (label, style) = VARIANT_STYLES[i % VARIANT_STYLES.len()];
            let mut params = base.params.clone();
            if let Some(prompt) = params["prompt"].as_str() {
                let varied = format!("{prompt}, {style}");
                params["prompt"] = Value::String(varied);
            }
            let title = if i < VARIANT_STYLES.len() {
                label.to_string()
            } else {
                format!("{} {}", label, i + 1)
            };
            Proposal::new(title, format!("第 {} 个风格变体", i + 1))
                .with_skill_calls(vec![SkillCall::new(base.skill_name.clone(), params)])
        })
        .collect()
}

/// 从消息中解析「N 张 / N 个 / N 款…」；含「系列」但无数字时取默认值
fn requested_count(message: &str) -> Option<usize> {
    static COUNT_RE: OnceLock<Regex> = OnceLock::new();
    let re = COUNT_RE.get_or_init(|| {
        Regex::new(r"([0-9]+|[一二两三四五六七八九十]+)\s*[张个款幅套组版]").unwrap()
    });

    if let Some(caps) = re.captures(message) {
        let raw = &caps[1];
        let n = raw
            .parse::<usize>()
            .ok()
            .or_else(|| chinese_numeral(raw))?;
        return (n >= 1).then_some(n);
    }

    message.contains("系列").then_some(SERIES_DEFAULT_COUNT)
}

fn chinese_numeral(s: &str) -> Option<usize> {
    match s {
        "一" => Some(1),
        "二" | "两" => Some(2),
        "三" => Some(3),
        "四" => Some(4),
        "五" => Some(5),
        "六" => Some(6),
        "七" => Some(7),
        "八" => Some(8),
        "九" => Some(9),
        "十" => Some(10),
        _ => None,
    }
}

/// 规划模型偶尔输出的技能别名归一化
fn resolve_skill_alias(name: &str) -> String {
    match name.trim() {
        "text-to-image" | "image" | "generate-image" | "image_generation" => {
            "generateImage".to_string()
        }
        "text-to-video" | "video" | "generate-video" => "generateVideo".to_string(),
        "copy" | "copywriting" | "generate-copy" => "generateCopy".to_string(),
        "edit" | "smart-edit" => "smartEdit".to_string(),
        "ocr" | "extract-text" => "extractText".to_string(),
        other => other.to_string(),
    }
}

/// 解析 params 里的 ATTACHMENT_<n> 哨兵为 data URL；索引越界报错
fn resolve_attachment_refs(
    params: &mut Value,
    attachments: &[Attachment],
) -> Result<(), String> {
    const REF_KEYS: &[&str] = &["referenceImage", "sourceUrl", "image", "startFrame", "endFrame"];

    let obj = match params.as_object_mut() {
        Some(obj) => obj,
        None => return Ok(()),
    };

    for key in REF_KEYS {
        if let Some(Value::String(s)) = obj.get(*key) {
            if let Some(url) = sentinel_to_url(s, attachments)? {
                obj.insert((*key).to_string(), Value::String(url));
            }
        }
    }

    if let Some(Value::Array(items)) = obj.get_mut("referenceImages") {
        for item in items.iter_mut() {
            if let Value::String(s) = item {
                if let Some(url) = sentinel_to_url(s, attachments)? {
                    *item = Value::String(url);
                }
            }
        }
    }

    Ok(())
}

fn sentinel_to_url(s: &str, attachments: &[Attachment]) -> Result<Option<String>, String> {
    let Some(index) = s.strip_prefix("ATTACHMENT_") else {
        return Ok(None);
    };
    let index: usize = index
        .parse()
        .map_err(|_| format!("附件引用无法解析: {s}"))?;
    let att = attachments
        .get(index)
        .ok_or_else(|| format!("附件引用越界: {s}（共 {} 个附件）", attachments.len()))?;
    Ok(Some(att.to_data_url()))
}

/// 技能结果含非空 url 时合成资产；软失败（url 为 null）不产资产
fn asset_from_result(result: &Value, agent: AgentType) -> Option<GeneratedAsset> {
    let url = result["url"].as_str()?;
    let kind = match result["type"].as_str()? {
        "image" => AssetKind::Image,
        "video" => AssetKind::Video,
        _ => return None,
    };
    Some(GeneratedAsset::new(
        kind,
        url,
        AssetMetadata {
            prompt: result["prompt"].as_str().map(String::from),
            model: result["model"].as_str().map(String::from),
            agent_id: agent,
        },
    ))
}

fn default_suggestions() -> Vec<String> {
    vec![
        "调整配色".to_string(),
        "更换风格".to_string(),
        "修改文案".to_string(),
        "再来一组".to_string(),
    ]
}

/// 失败输出：按错误类别给用户可读的中文提示
fn failure_output(err: &AppError) -> TaskOutput {
    let message = match err.kind {
        ErrorKind::AuthFailure => "API 密钥无效或已过期，请在设置中检查。",
        ErrorKind::QuotaExceeded => "配额已用尽，请检查账户用量后再试。",
        ErrorKind::AgentTimeout => "任务执行超时，请重试。",
        ErrorKind::Validation => "请输入具体的设计需求。",
        _ => "任务执行失败，请稍后重试。",
    };
    TaskOutput {
        message: message.to_string(),
        proposals: Vec::new(),
        assets: Vec::new(),
        suggestions: Vec::new(),
        error: Some(err.clone()),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::ProjectContext;
    use crate::config::ProvidersSection;
    use crate::llm::MockChatModel;
    use crate::providers::{MockImageProvider, ProviderRegistry};
    use crate::skills::builtin_registry;

    fn fast_config() -> ExecuteConfig {
        ExecuteConfig {
            max_retries: 0,
            timeout: Duration::from_secs(5),
            retry_delay: Duration::from_millis(1),
            enable_cache: true,
        }
    }

    fn providers_cfg() -> ProvidersSection {
        ProvidersSection {
            image_model: "mock-image".to_string(),
            ..Default::default()
        }
    }

    fn skills_with_mock_image(
        model: Arc<MockChatModel>,
        provider: MockImageProvider,
    ) -> Arc<SkillRegistry> {
        let mut registry = ProviderRegistry::new();
        registry.register_image_provider(provider);
        registry.map_image_model("mock-image", "mock");
        Arc::new(builtin_registry(
            model,
            Arc::new(registry),
            &providers_cfg(),
        ))
    }

    fn input(message: &str) -> TaskInput {
        TaskInput {
            message: message.to_string(),
            attachments: vec![],
            context: ProjectContext::new("p1", "测试项目"),
            metadata: None,
        }
    }

    fn plan_with_proposals(n: usize) -> String {
        let proposals: Vec<Value> = (0..n)
            .map(|i| {
                serde_json::json!({
                    "title": format!("方向 {}", i + 1),
                    "description": "测试方案",
                    "skillCalls": [{"skillName": "generateImage", "params": {"prompt": "coffee poster"}}]
                })
            })
            .collect();
        serde_json::json!({"analysis": "三个方向", "proposals": proposals}).to_string()
    }

    #[tokio::test]
    async fn test_empty_message_fails_without_model_call() {
        let model = Arc::new(MockChatModel::new("{}"));
        let skills = skills_with_mock_image(Arc::clone(&model), MockImageProvider::always("u"));
        let agent = DesignAgent::new(
            AgentType::Poster,
            Arc::clone(&model) as Arc<dyn ChatModel>,
            skills,
            fast_config(),
        );

        let task = agent.execute(input("   ")).await;
        assert_eq!(task.status, TaskStatus::Failed);
        let output = task.output.unwrap();
        assert_eq!(output.error.as_ref().unwrap().kind, ErrorKind::Validation);
        assert!(!output.error.unwrap().retryable);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_happy_path_three_proposals_three_assets() {
        let model = Arc::new(MockChatModel::new(plan_with_proposals(3)));
        let skills = skills_with_mock_image(
            Arc::clone(&model),
            MockImageProvider::always("https://cdn.test/out.png"),
        );
        let agent = DesignAgent::new(
            AgentType::Poster,
            Arc::clone(&model) as Arc<dyn ChatModel>,
            skills,
            fast_config(),
        );

        let task = agent.execute(input("做三张咖啡海报")).await;
        assert_eq!(task.status, TaskStatus::Completed);
        let output = task.output.unwrap();
        assert_eq!(output.proposals.len(), 3);
        assert_eq!(output.assets.len(), 3);
        assert_eq!(output.message, "三个方向");
        assert!(output
            .proposals
            .iter()
            .all(|p| p.generated_url.as_deref() == Some("https://cdn.test/out.png")));
        assert!(!output.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_soft_failure_keeps_partial_assets() {
        let model = Arc::new(MockChatModel::new(plan_with_proposals(3)));
        let provider = MockImageProvider::script(vec![
            Ok(Some("https://cdn.test/1.png".into())),
            Ok(None),
            Ok(Some("https://cdn.test/3.png".into())),
        ]);
        let skills = skills_with_mock_image(Arc::clone(&model), provider);
        let agent = DesignAgent::new(
            AgentType::Poster,
            Arc::clone(&model) as Arc<dyn ChatModel>,
            skills,
            fast_config(),
        );

        let task = agent.execute(input("做三张海报")).await;
        assert_eq!(task.status, TaskStatus::Completed);
        let output = task.output.unwrap();
        // 软失败不产资产也不报错
        assert_eq!(output.assets.len(), 2);
        assert_eq!(output.proposals.len(), 3);
        assert!(output.error.is_none());
    }

    #[tokio::test]
    async fn test_orphan_calls_expanded_by_count_word() {
        let plan = serde_json::json!({
            "analysis": "好的",
            "skillCalls": [{"skillName": "generateImage", "params": {"prompt": "coffee poster"}}]
        })
        .to_string();
        let model = Arc::new(MockChatModel::new(plan));
        let skills = skills_with_mock_image(
            Arc::clone(&model),
            MockImageProvider::always("https://cdn.test/v.png"),
        );
        let agent = DesignAgent::new(
            AgentType::Campaign,
            Arc::clone(&model) as Arc<dyn ChatModel>,
            skills,
            fast_config(),
        );

        let task = agent.execute(input("做5张咖啡推广图")).await;
        let output = task.output.unwrap();
        assert_eq!(output.proposals.len(), 5);
        assert_eq!(output.assets.len(), 5);
        // 每个变体的提示词带不同风格侧重
        let prompts: Vec<String> = output
            .proposals
            .iter()
            .map(|p| p.skill_calls[0].params["prompt"].as_str().unwrap().to_string())
            .collect();
        let unique: std::collections::HashSet<&String> = prompts.iter().collect();
        assert_eq!(unique.len(), 5);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_second_model_call() {
        let model = Arc::new(MockChatModel::new(plan_with_proposals(1)));
        let skills = skills_with_mock_image(
            Arc::clone(&model),
            MockImageProvider::always("https://cdn.test/c.png"),
        );
        let agent = DesignAgent::new(
            AgentType::Poster,
            Arc::clone(&model) as Arc<dyn ChatModel>,
            skills,
            fast_config(),
        );

        let first = agent.execute(input("做一张海报")).await;
        let second = agent.execute(input("做一张海报")).await;
        assert_eq!(first.status, TaskStatus::Completed);
        assert_eq!(second.id, first.id);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_hard_failure_recorded_on_call_not_task() {
        let model = Arc::new(MockChatModel::new(plan_with_proposals(2)));
        let provider = MockImageProvider::script(vec![
            Err(crate::providers::ProviderError::Api {
                status: 500,
                body: "boom".into(),
            }),
            Ok(Some("https://cdn.test/ok.png".into())),
        ]);
        let skills = skills_with_mock_image(Arc::clone(&model), provider);
        let agent = DesignAgent::new(
            AgentType::Poster,
            Arc::clone(&model) as Arc<dyn ChatModel>,
            skills,
            fast_config(),
        );

        let task = agent.execute(input("做两张海报")).await;
        assert_eq!(task.status, TaskStatus::Completed);
        let output = task.output.unwrap();
        assert!(output.proposals[0].skill_calls[0].error.is_some());
        assert!(output.proposals[1].skill_calls[0].error.is_none());
        assert_eq!(output.assets.len(), 1);
    }

    #[tokio::test]
    async fn test_attachment_sentinel_resolved() {
        let plan = serde_json::json!({
            "analysis": "参考原图重绘",
            "proposals": [{
                "title": "重绘",
                "description": "基于附件",
                "skillCalls": [{
                    "skillName": "generateImage",
                    "params": {"prompt": "redraw", "referenceImage": "ATTACHMENT_0"}
                }]
            }]
        })
        .to_string();
        let model = Arc::new(MockChatModel::new(plan));
        let skills = skills_with_mock_image(
            Arc::clone(&model),
            MockImageProvider::always("https://cdn.test/r.png"),
        );
        let agent = DesignAgent::new(
            AgentType::Poster,
            Arc::clone(&model) as Arc<dyn ChatModel>,
            skills,
            fast_config(),
        );

        let mut task_input = input("参考这张图重画");
        task_input.attachments = vec![Attachment::image("ref.png", "image/png", vec![1, 2, 3])];

        let task = agent.execute(task_input).await;
        let output = task.output.unwrap();
        let resolved = output.proposals[0].skill_calls[0].params["referenceImage"]
            .as_str()
            .unwrap();
        assert!(resolved.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_auto_injected_reference_visible_on_call() {
        // 规划没引用附件时自动带第一张图；回写后的参数对下游可见
        let model = Arc::new(MockChatModel::new(plan_with_proposals(1)));
        let skills = skills_with_mock_image(
            Arc::clone(&model),
            MockImageProvider::always("https://cdn.test/a.png"),
        );
        let agent = DesignAgent::new(
            AgentType::Poster,
            Arc::clone(&model) as Arc<dyn ChatModel>,
            skills,
            fast_config(),
        );

        let mut task_input = input("照着这张图做一版海报");
        task_input.attachments = vec![Attachment::image("ref.png", "image/png", vec![9, 9])];

        let task = agent.execute(task_input).await;
        let output = task.output.unwrap();
        let params = &output.proposals[0].skill_calls[0].params;
        assert!(params["referenceImage"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert!(params["brand"].is_null());
    }

    #[tokio::test]
    async fn test_out_of_range_sentinel_errors_call_only() {
        let plan = serde_json::json!({
            "analysis": "ok",
            "proposals": [{
                "title": "t",
                "description": "d",
                "skillCalls": [{
                    "skillName": "generateImage",
                    "params": {"prompt": "x", "referenceImage": "ATTACHMENT_3"}
                }]
            }]
        })
        .to_string();
        let model = Arc::new(MockChatModel::new(plan));
        let skills = skills_with_mock_image(
            Arc::clone(&model),
            MockImageProvider::always("https://cdn.test/x.png"),
        );
        let agent = DesignAgent::new(
            AgentType::Poster,
            Arc::clone(&model) as Arc<dyn ChatModel>,
            skills,
            fast_config(),
        );

        let task = agent.execute(input("画一张图")).await;
        assert_eq!(task.status, TaskStatus::Completed);
        let output = task.output.unwrap();
        assert!(output.proposals[0].skill_calls[0]
            .error
            .as_deref()
            .unwrap()
            .contains("越界"));
        assert!(output.assets.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_plan_fails_task() {
        let model = Arc::new(MockChatModel::new("抱歉，我帮不了你"));
        let skills = skills_with_mock_image(Arc::clone(&model), MockImageProvider::always("u"));
        let agent = DesignAgent::new(
            AgentType::Poster,
            Arc::clone(&model) as Arc<dyn ChatModel>,
            skills,
            fast_config(),
        );

        let task = agent.execute(input("做一张海报")).await;
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.output.unwrap().error.is_some());
    }

    #[tokio::test]
    async fn test_text_only_plan_completes_without_assets() {
        let plan = serde_json::json!({"analysis": "建议用暖色调，无需生成。", "proposals": []})
            .to_string();
        let model = Arc::new(MockChatModel::new(plan));
        let skills = skills_with_mock_image(Arc::clone(&model), MockImageProvider::always("u"));
        let agent = DesignAgent::new(
            AgentType::Coco,
            Arc::clone(&model) as Arc<dyn ChatModel>,
            skills,
            fast_config(),
        );

        let task = agent.execute(input("咖啡海报用什么颜色好")).await;
        assert_eq!(task.status, TaskStatus::Completed);
        let output = task.output.unwrap();
        assert!(output.assets.is_empty());
        assert_eq!(output.message, "建议用暖色调，无需生成。");
    }

    #[test]
    fn test_requested_count_parsing() {
        assert_eq!(requested_count("做5张海报"), Some(5));
        assert_eq!(requested_count("来三款包装"), Some(3));
        assert_eq!(requested_count("两个方案"), Some(2));
        assert_eq!(requested_count("一套系列图"), Some(1));
        assert_eq!(requested_count("做个系列"), Some(SERIES_DEFAULT_COUNT));
        assert_eq!(requested_count("做一张海报"), Some(1));
        assert_eq!(requested_count("做张海报"), None);
    }

    #[test]
    fn test_skill_alias_resolution() {
        assert_eq!(resolve_skill_alias("text-to-image"), "generateImage");
        assert_eq!(resolve_skill_alias("video"), "generateVideo");
        assert_eq!(resolve_skill_alias("generateImage"), "generateImage");
    }
}
