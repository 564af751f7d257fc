//! 错误分类与重试
//!
//! 所有上游异常（网络、限流、配额、鉴权、校验等）统一分类为 AppError，
//! 由 kind 决定是否可重试；with_retry 提供指数退避的通用重试包装；
//! ErrorHandler 额外维护一个 100 条的滚动错误日志用于诊断。

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 错误日志上限，超出后淘汰最旧条目
const ERROR_LOG_CAPACITY: usize = 100;

/// 错误类别；retryable 策略见 [`ErrorKind::retryable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 网络层失败（连接、DNS、发送失败）
    Network,
    /// HTTP 429
    RateLimited,
    /// HTTP 503，上游过载；可考虑切换供应商
    ServiceOverloaded,
    /// 配额耗尽，需要用户处理
    QuotaExceeded,
    /// 401 / 403 / API Key 无效
    AuthFailure,
    /// 其它 API 错误
    GenericApi,
    /// 输入校验失败
    Validation,
    /// Agent 管线超时（race 输给计时器）
    AgentTimeout,
    /// 技能未注册
    SkillNotFound,
    /// 模型名未映射到任何供应商
    UnknownModel,
    /// 供应商 id 已失效
    ProviderNotFound,
    Unknown,
}

impl ErrorKind {
    /// 是否允许透明重试
    pub fn retryable(self) -> bool {
        match self {
            Self::Network
            | Self::RateLimited
            | Self::ServiceOverloaded
            | Self::GenericApi
            | Self::AgentTimeout
            | Self::Unknown => true,
            Self::QuotaExceeded
            | Self::AuthFailure
            | Self::Validation
            | Self::SkillNotFound
            | Self::UnknownModel
            | Self::ProviderNotFound => false,
        }
    }

    /// 是否建议上层切换供应商（目前仅 503）
    pub fn suggests_provider_fallback(self) -> bool {
        matches!(self, Self::ServiceOverloaded)
    }
}

/// 结构化应用错误；创建后不再修改
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("[{kind:?}] {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
            timestamp: Utc::now(),
            retryable: kind.retryable(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AgentTimeout, message)
    }
}

/// 进程级错误处理器：消息分类 + 滚动日志
#[derive(Default)]
pub struct ErrorHandler {
    log: Mutex<VecDeque<AppError>>,
}

static HANDLER: OnceLock<ErrorHandler> = OnceLock::new();

/// 进程级单例
pub fn handler() -> &'static ErrorHandler {
    HANDLER.get_or_init(ErrorHandler::default)
}

impl ErrorHandler {
    /// 按消息子串把任意错误文本分类为 AppError，并记入日志。
    /// 匹配顺序：鉴权 → 配额 → 限流 → 过载 → 校验 → 超时 → 网络 → 泛化 API → 未知
    pub fn classify(&self, message: &str, context: Option<&str>) -> AppError {
        let lower = message.to_lowercase();

        let kind = if lower.contains("401")
            || lower.contains("403")
            || lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("api key")
            || lower.contains("invalid key")
        {
            ErrorKind::AuthFailure
        } else if lower.contains("quota") || lower.contains("配额") || lower.contains("billing") {
            ErrorKind::QuotaExceeded
        } else if lower.contains("429") || lower.contains("rate limit") || lower.contains("限流") {
            ErrorKind::RateLimited
        } else if lower.contains("503") || lower.contains("overload") || lower.contains("过载") {
            ErrorKind::ServiceOverloaded
        } else if lower.contains("validation") || lower.contains("校验") {
            ErrorKind::Validation
        } else if lower.contains("timeout") || lower.contains("timed out") || lower.contains("超时")
        {
            ErrorKind::AgentTimeout
        } else if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("fetch")
            || lower.contains("dns")
        {
            ErrorKind::Network
        } else if lower.contains("api") || lower.contains("http") || lower.contains("status") {
            ErrorKind::GenericApi
        } else {
            ErrorKind::Unknown
        };

        let mut err = AppError::new(kind, message);
        if let Some(ctx) = context {
            err = err.with_context(ctx);
        }
        self.record(&err);
        err
    }

    /// 记入滚动日志；日志本身绝不 panic
    pub fn record(&self, err: &AppError) {
        if let Ok(mut log) = self.log.lock() {
            log.push_back(err.clone());
            while log.len() > ERROR_LOG_CAPACITY {
                log.pop_front();
            }
        }
    }

    /// 最近的错误（最旧在前）
    pub fn recent(&self) -> Vec<AppError> {
        self.log
            .lock()
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.log.lock().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 重试参数
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 重试次数（不含首次调用）
    pub max_retries: u32,
    /// 基础延迟
    pub delay: Duration,
    /// 是否指数退避（delay * 2^attempt）
    pub backoff: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(2),
            backoff: true,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, delay: Duration, backoff: bool) -> Self {
        Self {
            max_retries,
            delay,
            backoff,
        }
    }
}

/// 通用重试包装：成功即返回；不可重试错误立刻返回；
/// 可重试错误在 max_retries 次内按退避延迟重试。
pub async fn with_retry<T, F, Fut>(mut op: F, cfg: &RetryConfig) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.retryable || attempt >= cfg.max_retries {
                    return Err(err);
                }
                let delay = if cfg.backoff {
                    cfg.delay.saturating_mul(2u32.saturating_pow(attempt))
                } else {
                    cfg.delay
                };
                tracing::warn!(
                    kind = ?err.kind,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "操作失败，准备重试: {}",
                    err.message
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_classify_auth() {
        let h = ErrorHandler::default();
        let err = h.classify("HTTP 401 unauthorized", None);
        assert_eq!(err.kind, ErrorKind::AuthFailure);
        assert!(!err.retryable);
    }

    #[test]
    fn test_classify_rate_limited() {
        let h = ErrorHandler::default();
        let err = h.classify("HTTP 429 rate limit exceeded", None);
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert!(err.retryable);
    }

    #[test]
    fn test_classify_overloaded_suggests_fallback() {
        let h = ErrorHandler::default();
        let err = h.classify("HTTP 503 model overloaded", None);
        assert_eq!(err.kind, ErrorKind::ServiceOverloaded);
        assert!(err.kind.suggests_provider_fallback());
    }

    #[test]
    fn test_classify_timeout_before_network() {
        let h = ErrorHandler::default();
        let err = h.classify("connection timed out", None);
        assert_eq!(err.kind, ErrorKind::AgentTimeout);
    }

    #[test]
    fn test_classify_unknown_is_retryable() {
        let h = ErrorHandler::default();
        let err = h.classify("something odd happened", None);
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(err.retryable);
    }

    #[test]
    fn test_error_log_bound() {
        let h = ErrorHandler::default();
        for i in 0..150 {
            h.classify(&format!("network error {i}"), None);
        }
        let recent = h.recent();
        assert_eq!(recent.len(), 100);
        // 最旧的 50 条已淘汰
        assert!(recent[0].message.contains("error 50"));
        assert!(recent[99].message.contains("error 149"));
    }

    #[tokio::test]
    async fn test_retry_bound() {
        let calls = AtomicUsize::new(0);
        let cfg = RetryConfig::new(3, Duration::from_millis(1), false);
        let result: Result<(), AppError> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::new(ErrorKind::Network, "connection refused")) }
            },
            &cfg,
        )
        .await;
        assert!(result.is_err());
        // 首次 + 3 次重试
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuit() {
        let calls = AtomicUsize::new(0);
        let cfg = RetryConfig::new(3, Duration::from_millis(1), false);
        let result: Result<(), AppError> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::new(ErrorKind::AuthFailure, "invalid key")) }
            },
            &cfg,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_eventual_success() {
        let calls = AtomicUsize::new(0);
        let cfg = RetryConfig::new(3, Duration::from_millis(1), true);
        let result = with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(AppError::new(ErrorKind::Network, "flaky"))
                    } else {
                        Ok(42)
                    }
                }
            },
            &cfg,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
