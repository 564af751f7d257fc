//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ATELIER__*` 覆盖
//! （双下划线表示嵌套，如 `ATELIER__LLM__API_KEY=sk-xxx`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub routing: RoutingSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub providers: ProvidersSection,
}

/// [llm] 段：规划/分类模型的端点与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub api_key: Option<String>,
    /// OpenAI 兼容端点；未设置时用官方默认
    pub base_url: Option<String>,
    pub model: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: "gemini-2.5-flash".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// [routing] 段：API 路由器参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoutingSection {
    /// 置信度阈值；低于该值仅追加 fallback 候选，不失败
    pub confidence_threshold: f32,
    /// 兜底 agent（同时也是本地路由的默认值）
    pub fallback_agent: String,
    /// 分类请求重试次数（不含首次，共 max_retries+1 次尝试）
    pub max_retries: u32,
    /// 单次分类请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            fallback_agent: "poster".to_string(),
            max_retries: 2,
            timeout_secs: 15,
        }
    }
}

/// [agent] 段：执行状态机参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 管线整体重试次数
    pub max_retries: u32,
    /// 管线整体超时（秒）
    pub timeout_secs: u64,
    /// 重试基础延迟（毫秒），指数退避
    pub retry_delay_ms: u64,
    /// 相同消息命中缓存时直接返回已完成结果
    pub enable_cache: bool,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_retries: 2,
            timeout_secs: 120,
            retry_delay_ms: 2000,
            enable_cache: true,
        }
    }
}

/// [providers] 段：生成供应商默认模型与视频轮询参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersSection {
    pub image_model: String,
    pub video_model: String,
    /// 视频任务轮询间隔（秒）
    pub video_poll_interval_secs: u64,
    /// 轮询次数上限，超出判定 Timeout
    pub video_poll_attempts: u32,
}

impl Default for ProvidersSection {
    fn default() -> Self {
        Self {
            image_model: "gemini-2.5-flash-image".to_string(),
            video_model: "kling-v1-6".to_string(),
            video_poll_interval_secs: 5,
            video_poll_attempts: 60,
        }
    }
}

impl AgentSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// 从 config 目录加载配置，环境变量 ATELIER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ATELIER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ATELIER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.routing.confidence_threshold, 0.6);
        assert_eq!(cfg.routing.fallback_agent, "poster");
        assert_eq!(cfg.agent.max_retries, 2);
        assert!(cfg.agent.enable_cache);
        assert_eq!(cfg.providers.video_poll_interval_secs, 5);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let cfg = load_config(Some(PathBuf::from("/nonexistent/atelier.toml"))).unwrap();
        assert_eq!(cfg.llm.request_timeout_secs, 60);
    }
}
