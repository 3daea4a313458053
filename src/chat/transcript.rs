//! 对话记录：只追加、按发言顺序排列
//!
//! 没有任何修改或重排已有条目的方法；选择器只拿到 `&Transcript`。

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::llm::{Message, Role};

/// 单轮发言
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: Role,
    /// 发言人：Agent 名或用户名
    pub speaker: String,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// 对话记录
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, speaker: impl Into<String>, content: impl Into<String>) {
        self.push(Role::User, speaker.into(), content.into());
    }

    pub fn push_agent(&mut self, speaker: impl Into<String>, content: impl Into<String>) {
        self.push(Role::Assistant, speaker.into(), content.into());
    }

    fn push(&mut self, role: Role, speaker: String, content: String) {
        self.turns.push(Turn {
            role,
            speaker,
            content,
            at: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// 最近一位由 Agent 担任的发言人
    pub fn last_agent_speaker(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .map(|t| t.speaker.as_str())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// 以 `speaker` 的视角转成 LLM 消息：它自己的发言为 assistant，
    /// 其余发言为 user 并带上发言人前缀
    pub fn to_messages_for(&self, speaker: &str, system_message: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        if !system_message.is_empty() {
            messages.push(Message::system(system_message));
        }
        for t in &self.turns {
            if t.role == Role::Assistant && t.speaker == speaker {
                messages.push(Message::assistant(t.content.clone()));
            } else {
                messages.push(Message::user(format!("[{}] {}", t.speaker, t.content)));
            }
        }
        messages
    }
}
