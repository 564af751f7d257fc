//! 管线编排：单飞行 FIFO 任务队列
//!
//! 所有用户消息进同一个无界队列，由一个常驻 worker 顺序消费：
//! 同一时刻最多一个任务在执行，先进先出，无并发竞争。每条消息先走
//! 路由（本地 → API → 调用方默认），再交给目标 Agent 执行；进度与
//! 结果通过事件通道回传。关闭用 CancellationToken：当前任务被
//! select 丢弃（尽力而为），队列中未开始的任务不再执行。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agent::{
    AgentType, Attachment, DesignAgent, ProjectContext, Task, TaskInput, TaskStatus,
};
use crate::error::AppError;
use crate::routing::{Orchestrator, RoutingDecision};

/// 一条进入管线的用户消息
#[derive(Debug, Clone)]
pub struct UserRequest {
    pub message: String,
    pub attachments: Vec<Attachment>,
    pub context: ProjectContext,
}

impl UserRequest {
    pub fn new(message: impl Into<String>, context: ProjectContext) -> Self {
        Self {
            message: message.into(),
            attachments: Vec::new(),
            context,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// 管线事件：按发生顺序推送给调用方
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// 路由完成；decision 为 None 表示 API 路由降级、走默认 agent
    Routed {
        request_id: String,
        agent: AgentType,
        decision: Option<RoutingDecision>,
    },
    /// 任务开始执行
    StatusChanged {
        request_id: String,
        status: TaskStatus,
    },
    Completed {
        request_id: String,
        task: Task,
    },
    Failed {
        request_id: String,
        task: Task,
        error: AppError,
    },
}

impl PipelineEvent {
    pub fn request_id(&self) -> &str {
        match self {
            Self::Routed { request_id, .. }
            | Self::StatusChanged { request_id, .. }
            | Self::Completed { request_id, .. }
            | Self::Failed { request_id, .. } => request_id,
        }
    }
}

struct QueuedRequest {
    id: String,
    request: UserRequest,
}

/// 管线句柄：submit 入队，shutdown 取消
pub struct Pipeline {
    tx: mpsc::UnboundedSender<QueuedRequest>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// 启动常驻 worker，返回句柄与事件接收端
    pub fn start(
        orchestrator: Orchestrator,
        agents: HashMap<AgentType, Arc<DesignAgent>>,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel::<QueuedRequest>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<PipelineEvent>();
        let cancel = CancellationToken::new();

        let worker = Worker {
            orchestrator,
            agents,
            events: event_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(worker.run(rx));

        (Self { tx, cancel }, event_rx)
    }

    /// 入队一条用户消息；返回请求 id，后续事件以此关联
    pub fn submit(&self, request: UserRequest) -> Result<String, AppError> {
        let id = format!("req_{}", uuid::Uuid::new_v4());
        self.tx
            .send(QueuedRequest {
                id: id.clone(),
                request,
            })
            .map_err(|_| AppError::validation("管线已关闭"))?;
        Ok(id)
    }

    /// 尽力而为取消：当前任务的 future 被丢弃，排队任务不再执行
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

struct Worker {
    orchestrator: Orchestrator,
    agents: HashMap<AgentType, Arc<DesignAgent>>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    cancel: CancellationToken,
}

impl Worker {
    /// 顺序消费队列：上一条完成前绝不取下一条（单飞行 FIFO）
    async fn run(self, mut rx: mpsc::UnboundedReceiver<QueuedRequest>) {
        loop {
            let queued = tokio::select! {
                _ = self.cancel.cancelled() => break,
                queued = rx.recv() => match queued {
                    Some(queued) => queued,
                    None => break,
                },
            };

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!(request = queued.id.as_str(), "任务被取消，丢弃执行中的 future");
                    break;
                }
                _ = self.process(&queued) => {}
            }
        }
        tracing::debug!("管线 worker 退出");
    }

    async fn process(&self, queued: &QueuedRequest) {
        let QueuedRequest { id, request } = queued;

        let decision = self
            .orchestrator
            .route(&request.message, &request.context)
            .await;
        let agent_type = decision
            .as_ref()
            .map(|d| d.target_agent)
            .unwrap_or_else(|| self.orchestrator.fallback_agent());

        self.emit(PipelineEvent::Routed {
            request_id: id.clone(),
            agent: agent_type,
            decision: decision.clone(),
        });

        // 澄清与寒暄不进执行状态机，直接用路由产出的应答完成
        if let Some(d) = &decision {
            if matches!(d.task_type.as_str(), "clarify" | "respond") {
                let input = TaskInput {
                    message: request.message.clone(),
                    attachments: Vec::new(),
                    context: request.context.clone(),
                    metadata: None,
                };
                let task = Task::new(agent_type, input)
                    .with_status(TaskStatus::Analyzing)
                    .with_status(TaskStatus::Executing)
                    .with_output(crate::agent::TaskOutput {
                        message: d.handoff_message.clone(),
                        ..Default::default()
                    })
                    .with_status(TaskStatus::Completed);
                self.emit(PipelineEvent::Completed {
                    request_id: id.clone(),
                    task,
                });
                return;
            }
        }

        let Some(agent) = self.agents.get(&agent_type) else {
            // 注册表与 AgentType 封闭集合同源，正常不可达
            tracing::error!(agent = %agent_type, "目标 agent 未装配");
            return;
        };

        self.emit(PipelineEvent::StatusChanged {
            request_id: id.clone(),
            status: TaskStatus::Analyzing,
        });

        // 路由交接语优先于原始消息（clarify/respond 折叠场景除外）
        let message = match &decision {
            Some(d) if !d.handoff_message.trim().is_empty() => d.handoff_message.clone(),
            _ => request.message.clone(),
        };

        let input = TaskInput {
            message,
            attachments: request.attachments.clone(),
            context: request.context.clone(),
            metadata: decision
                .as_ref()
                .and_then(|d| serde_json::to_value(d).ok()),
        };

        let task = agent.execute(input).await;
        match task.status {
            TaskStatus::Failed => {
                let error = task
                    .output
                    .as_ref()
                    .and_then(|o| o.error.clone())
                    .unwrap_or_else(|| AppError::validation("任务失败但缺少错误信息"));
                self.emit(PipelineEvent::Failed {
                    request_id: id.clone(),
                    task,
                    error,
                });
            }
            _ => {
                self.emit(PipelineEvent::Completed {
                    request_id: id.clone(),
                    task,
                });
            }
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("事件接收端已关闭");
        }
    }
}
