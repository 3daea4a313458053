//! Mock LLM 客户端（用于测试与离线演示，无需 API）
//!
//! 按顺序返回预置回复；预置回复用完后回显最后一条 User 消息。
//! 每次调用收到的消息都会被记录，便于断言 prompt 内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::LlmError;
use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：脚本化回复 + 请求记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回给定回复
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::default();
        for r in replies {
            client.push_reply(Ok(r.into()));
        }
        client
    }

    /// 首次调用即失败
    pub fn failing(error: LlmError) -> Self {
        let client = Self::default();
        client.push_reply(Err(error));
        client
    }

    pub fn push_reply(&self, reply: Result<String, LlmError>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply);
        }
    }

    /// 已收到的请求（每次 complete 的完整消息列表）
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn model(&self) -> &str {
        "mock"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(messages.to_vec());
        }

        let scripted = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        if let Some(reply) = scripted {
            return reply;
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {}", last_user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_echo() {
        let mock = MockLlmClient::with_replies(["first"]);
        let msgs = vec![Message::system("s"), Message::user("question")];
        assert_eq!(mock.complete(&msgs).await.unwrap(), "first");
        assert_eq!(
            mock.complete(&msgs).await.unwrap(),
            "Echo from Mock: question"
        );
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.requests()[0][1].content, "question");
    }

    #[tokio::test]
    async fn test_failing() {
        let mock = MockLlmClient::failing(LlmError::Api("down".to_string()));
        let err = mock.complete(&[Message::user("x")]).await.unwrap_err();
        assert_eq!(err, LlmError::Api("down".to_string()));
    }
}
