//! LLM 层：消息类型、客户端抽象与实现（OpenAI 兼容 / Mock）、模型表

pub mod message;
pub mod mock;
pub mod models;
pub mod openai;
pub mod traits;

pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use models::{AgentLlmSettings, LlmOverrides, ModelInfo, ModelRegistry};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::LlmClient;

pub use crate::core::LlmError;
