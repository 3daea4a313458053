//! Tutor Hive - 由选择器驱动的多 Agent 辅导群聊
//!
//! 模块划分：
//! - **agents**: Agent 定义、注册表、Prompt 模板与默认辅导团队
//! - **chat**: 对话记录、发言人选择、终止判定、对话监控与群聊主循环
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **data**: 学科数据目录（大纲、资料、练习题）
//! - **llm**: LLM 客户端抽象、OpenAI 兼容实现、Mock 与模型表
//! - **observability**: tracing 日志初始化
//! - **service**: 请求级聊天服务（团队缓存、覆盖项、最终答案提取）
//! - **web**: HTTP 接口（feature `web`）

pub mod agents;
pub mod chat;
pub mod config;
pub mod core;
pub mod data;
pub mod llm;
pub mod observability;
pub mod service;
#[cfg(feature = "web")]
pub mod web;

pub use agents::{Agent, AgentRegistry};
pub use chat::{GroupChat, Selector, Transcript};
pub use service::{ChatRequest, ChatResponse, ChatService};
