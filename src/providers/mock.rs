//! Mock 供应商（用于测试，无需网络）
//!
//! 按脚本顺序返回预设结果并计数；脚本耗尽后重复最后一条。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::providers::traits::{
    ImageProvider, ImageRequest, ProviderError, VideoProvider, VideoRequest,
};

type MockResult = Result<Option<String>, ProviderError>;

struct Script {
    queue: Mutex<VecDeque<MockResult>>,
    last: Mutex<MockResult>,
    calls: AtomicUsize,
}

impl Script {
    fn repeating(result: MockResult) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            last: Mutex::new(result),
            calls: AtomicUsize::new(0),
        }
    }

    fn sequenced(results: Vec<MockResult>) -> Self {
        let last = results.last().cloned().unwrap_or(Ok(None));
        Self {
            queue: Mutex::new(results.into()),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> MockResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let popped = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        match popped {
            Some(result) => {
                if let Ok(mut last) = self.last.lock() {
                    *last = result.clone();
                }
                result
            }
            None => self.last.lock().map(|l| l.clone()).unwrap_or(Ok(None)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Mock 图像供应商
pub struct MockImageProvider {
    script: Script,
}

impl MockImageProvider {
    /// 每次都返回同一个 URL
    pub fn always(url: impl Into<String>) -> Self {
        Self {
            script: Script::repeating(Ok(Some(url.into()))),
        }
    }

    /// 按顺序返回脚本结果
    pub fn script(results: Vec<MockResult>) -> Self {
        Self {
            script: Script::sequenced(results),
        }
    }

    /// 每次都硬失败
    pub fn failing(err: ProviderError) -> Self {
        Self {
            script: Script::repeating(Err(err)),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl ImageProvider for MockImageProvider {
    fn id(&self) -> &str {
        "mock"
    }

    async fn generate_image(
        &self,
        _request: &ImageRequest,
        _model: &str,
    ) -> Result<Option<String>, ProviderError> {
        self.script.next()
    }
}

/// Mock 视频供应商
pub struct MockVideoProvider {
    script: Script,
}

impl MockVideoProvider {
    pub fn always(url: impl Into<String>) -> Self {
        Self {
            script: Script::repeating(Ok(Some(url.into()))),
        }
    }

    pub fn script(results: Vec<MockResult>) -> Self {
        Self {
            script: Script::sequenced(results),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl VideoProvider for MockVideoProvider {
    fn id(&self) -> &str {
        "mock-video"
    }

    async fn generate_video(
        &self,
        _request: &VideoRequest,
        _model: &str,
    ) -> Result<Option<String>, ProviderError> {
        self.script.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_soft_failure_sequence() {
        let provider = MockImageProvider::script(vec![
            Ok(Some("https://cdn.test/1.png".into())),
            Ok(None),
            Ok(Some("https://cdn.test/3.png".into())),
        ]);
        let req = ImageRequest::default();
        assert!(provider.generate_image(&req, "m").await.unwrap().is_some());
        assert!(provider.generate_image(&req, "m").await.unwrap().is_none());
        assert!(provider.generate_image(&req, "m").await.unwrap().is_some());
        assert_eq!(provider.calls(), 3);
    }
}
