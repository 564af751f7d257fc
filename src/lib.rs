//! Atelier - AI 设计智能体管线
//!
//! 把自由文本的设计需求路由到专职设计 Agent 并执行：
//! - `routing`: 本地关键词预路由 + API 意图分类编排器
//! - `agent`: 任务状态机（规划 → 提案 → 技能调用）与 Agent 档案
//! - `skills`: 归一化的生成/理解/编辑技能与注册表
//! - `providers`: 图像/视频供应商注册表与具体客户端
//! - `pipeline`: 单飞行 FIFO 队列与事件回传
//! - `llm`: 对话模型抽象（OpenAI 兼容端点 + mock）
//! - `error`: 错误分类、滚动日志与指数退避重试
//! - `config`: TOML + 环境变量配置

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod providers;
pub mod routing;
pub mod skills;

pub use agent::{build_agents, AgentType, DesignAgent, ExecuteConfig, Task, TaskStatus};
pub use config::{load_config, AppConfig};
pub use error::{AppError, ErrorKind};
pub use pipeline::{Pipeline, PipelineEvent, UserRequest};
pub use routing::{Orchestrator, RoutingDecision};
