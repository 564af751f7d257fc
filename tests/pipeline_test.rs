//! 管线集成测试：路由 → Agent 执行 → 事件回传的端到端链路

use std::sync::Arc;
use std::time::Duration;

use atelier::agent::{build_agents, AgentType, ExecuteConfig, ProjectContext, TaskStatus};
use atelier::config::ProvidersSection;
use atelier::llm::{ChatModel, MockChatModel};
use atelier::pipeline::{Pipeline, PipelineEvent, UserRequest};
use atelier::providers::{MockImageProvider, ProviderRegistry};
use atelier::routing::Orchestrator;
use atelier::skills::builtin_registry;

fn build_pipeline(
    model: Arc<MockChatModel>,
    image_provider: MockImageProvider,
) -> (Pipeline, tokio::sync::mpsc::UnboundedReceiver<PipelineEvent>) {
    let mut registry = ProviderRegistry::new();
    registry.register_image_provider(image_provider);
    registry.map_image_model("mock-image", "mock");

    let providers_cfg = ProvidersSection {
        image_model: "mock-image".to_string(),
        ..Default::default()
    };
    let skills = Arc::new(builtin_registry(
        Arc::clone(&model) as Arc<dyn ChatModel>,
        Arc::new(registry),
        &providers_cfg,
    ));
    let config = ExecuteConfig {
        max_retries: 0,
        timeout: Duration::from_secs(5),
        retry_delay: Duration::from_millis(1),
        enable_cache: true,
    };
    let agents = build_agents(Arc::clone(&model) as Arc<dyn ChatModel>, skills, config);
    let orchestrator = Orchestrator::new(model);
    Pipeline::start(orchestrator, agents)
}

fn poster_plan() -> String {
    serde_json::json!({
        "analysis": "为咖啡新品出三个海报方向",
        "proposals": [
            {
                "title": "暖色氛围",
                "description": "晨光中的咖啡杯",
                "skillCalls": [{"skillName": "generateImage",
                                "params": {"prompt": "coffee cup in warm morning light, poster"}}]
            },
            {
                "title": "极简留白",
                "description": "大面积留白与单杯特写",
                "skillCalls": [{"skillName": "generateImage",
                                "params": {"prompt": "minimalist coffee poster, negative space"}}]
            },
            {
                "title": "手绘插画",
                "description": "插画风格的咖啡庄园",
                "skillCalls": [{"skillName": "generateImage",
                                "params": {"prompt": "hand-drawn coffee farm illustration poster"}}]
            }
        ]
    })
    .to_string()
}

async fn wait_terminal(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<PipelineEvent>,
    request_id: &str,
) -> PipelineEvent {
    loop {
        let event = events.recv().await.expect("事件通道提前关闭");
        match &event {
            PipelineEvent::Completed { request_id: id, .. }
            | PipelineEvent::Failed { request_id: id, .. }
                if id == request_id =>
            {
                return event;
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_poster_request_end_to_end() {
    let model = Arc::new(MockChatModel::new(poster_plan()));
    let (pipeline, mut events) = build_pipeline(
        Arc::clone(&model),
        MockImageProvider::always("https://cdn.test/poster.png"),
    );

    let mut ctx = ProjectContext::new("proj-1", "山雾咖啡上新");
    ctx.brand_info = Some(atelier::agent::BrandInfo {
        name: Some("山雾咖啡".to_string()),
        colors: vec!["#2B1E16".to_string(), "#E8D5B5".to_string()],
        style: Some("minimalist".to_string()),
    });

    let id = pipeline
        .submit(UserRequest::new("帮我做一张咖啡品牌海报", ctx))
        .unwrap();

    // 本地路由直接命中 Poster，不经过分类模型
    match events.recv().await.unwrap() {
        PipelineEvent::Routed { agent, decision, .. } => {
            assert_eq!(agent, AgentType::Poster);
            assert_eq!(decision.unwrap().task_type, "local-routed");
        }
        other => panic!("意外事件: {other:?}"),
    }

    match wait_terminal(&mut events, &id).await {
        PipelineEvent::Completed { task, .. } => {
            assert_eq!(task.status, TaskStatus::Completed);
            let output = task.output.unwrap();
            assert_eq!(output.proposals.len(), 3);
            assert_eq!(output.assets.len(), 3);
            // 品牌信息进入了生成提示词
            let prompt = output.assets[0].metadata.prompt.as_deref().unwrap();
            assert!(prompt.contains("山雾咖啡"));
            assert!(!output.suggestions.is_empty());
        }
        other => panic!("意外事件: {other:?}"),
    }
    // 一次分类都没发生，只有一次规划
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_provider_soft_failure_still_completes() {
    let model = Arc::new(MockChatModel::new(poster_plan()));
    let provider = MockImageProvider::script(vec![
        Ok(Some("https://cdn.test/1.png".to_string())),
        Ok(None),
        Ok(Some("https://cdn.test/3.png".to_string())),
    ]);
    let (pipeline, mut events) = build_pipeline(model, provider);

    let id = pipeline
        .submit(UserRequest::new(
            "做三张咖啡海报",
            ProjectContext::new("proj-2", "测试项目"),
        ))
        .unwrap();

    match wait_terminal(&mut events, &id).await {
        PipelineEvent::Completed { task, .. } => {
            let output = task.output.unwrap();
            assert_eq!(output.proposals.len(), 3);
            assert_eq!(output.assets.len(), 2);
            assert!(output.error.is_none());
        }
        other => panic!("意外事件: {other:?}"),
    }
}

#[tokio::test]
async fn test_routing_failure_falls_back_to_default_agent() {
    // 分类与规划返回的都是无法解析的文本：路由降级到默认 Poster，
    // Poster 规划失败后任务以 Failed 事件收尾，错误不抛给调用方
    let model = Arc::new(MockChatModel::new("看不懂"));
    let (pipeline, mut events) =
        build_pipeline(model, MockImageProvider::always("https://cdn.test/x.png"));

    let id = pipeline
        .submit(UserRequest::new(
            "把背景换成白色",
            ProjectContext::new("proj-3", "测试项目"),
        ))
        .unwrap();

    let mut routed_to_default = false;
    loop {
        match events.recv().await.unwrap() {
            PipelineEvent::Routed { agent, decision, .. } => {
                assert_eq!(agent, AgentType::Poster);
                assert!(decision.is_none());
                routed_to_default = true;
            }
            PipelineEvent::Failed {
                request_id, task, ..
            } if request_id == id => {
                assert!(routed_to_default);
                assert_eq!(task.status, TaskStatus::Failed);
                break;
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_fifo_order_across_agents() {
    let model = Arc::new(MockChatModel::new(
        serde_json::json!({"analysis": "好的", "proposals": []}).to_string(),
    ));
    let (pipeline, mut events) =
        build_pipeline(model, MockImageProvider::always("https://cdn.test/x.png"));

    let ctx = ProjectContext::new("proj-4", "测试项目");
    let ids = vec![
        pipeline
            .submit(UserRequest::new("设计一个茶饮logo", ctx.clone()))
            .unwrap(),
        pipeline
            .submit(UserRequest::new("做一条产品宣传视频", ctx.clone()))
            .unwrap(),
        pipeline
            .submit(UserRequest::new("写一句上新文案", ctx.clone()))
            .unwrap(),
        pipeline
            .submit(UserRequest::new("做一张夏日海报", ctx))
            .unwrap(),
    ];

    let mut terminal_order = Vec::new();
    while terminal_order.len() < ids.len() {
        match events.recv().await.unwrap() {
            PipelineEvent::Completed { request_id, .. }
            | PipelineEvent::Failed { request_id, .. } => terminal_order.push(request_id),
            _ => {}
        }
    }
    assert_eq!(terminal_order, ids);
}
