//! Mock 对话模型（用于测试，无需 API）
//!
//! 按脚本顺序吐出预设回复并计数调用次数；脚本耗尽后重复最后一条。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{ChatMessage, ChatModel, LlmError};

/// Mock 客户端：固定脚本回复 + 调用计数
pub struct MockChatModel {
    script: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    calls: AtomicUsize,
    fail_with: Option<LlmError>,
}

impl MockChatModel {
    /// 每次调用都返回同一条回复
    pub fn new(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    /// 按顺序返回脚本中的回复，耗尽后重复最后一条
    pub fn with_script(replies: Vec<String>) -> Self {
        let last = replies.last().cloned().unwrap_or_default();
        Self {
            script: Mutex::new(replies.into()),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    /// 每次调用都失败
    pub fn failing(err: LlmError) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(String::new()),
            calls: AtomicUsize::new(0),
            fail_with: Some(err),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        let mut script = self.script.lock().map_err(|_| LlmError::EmptyResponse)?;
        match script.pop_front() {
            Some(reply) => {
                *self.last.lock().map_err(|_| LlmError::EmptyResponse)? = reply.clone();
                Ok(reply)
            }
            None => Ok(self.last.lock().map_err(|_| LlmError::EmptyResponse)?.clone()),
        }
    }
}
