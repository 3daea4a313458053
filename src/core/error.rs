//! 群聊错误类型
//!
//! 三类错误各自独立：配置错误（模型映射、Agent 注册、API Key）、
//! 选择错误（外部分类调用失败或结果为空/歧义）、LLM 调用错误；
//! 统一由 ChatError 向调用方冒泡，不做自动重试。

use thiserror::Error;

/// LLM 调用错误（外部 chat completion 接口）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Request build failed: {0}")]
    RequestBuild(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Empty completion from model {0}")]
    EmptyChoice(String),
}

/// 配置错误：模型映射缺失/非法、Agent 集合为空、重名注册等
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("No agents registered")]
    NoAgents,

    #[error("Duplicate agent name: {0}")]
    DuplicateAgent(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("No API key provided. Set FCI_API_KEY or OPENAI_API_KEY, or pass api_key explicitly")]
    MissingApiKey,

    #[error("No model info for model '{0}' and no default entry")]
    MissingModelInfo(String),

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Config load failed: {0}")]
    Load(#[from] config::ConfigError),
}

/// 选择错误：外部分类调用失败，或返回内容无法唯一对应到已注册 Agent
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Classification call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Classifier returned an empty response")]
    EmptyResponse,

    #[error("No agent matches classifier response: {0}")]
    NoMatch(String),

    #[error("Classifier response '{response}' matches several agents: {candidates:?}")]
    Ambiguous {
        response: String,
        candidates: Vec<String>,
    },
}

/// 学科数据目录读写错误
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Unknown subject: {0}")]
    UnknownSubject(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// 顶层错误
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Message must not be empty")]
    EmptyMessage,
}

impl ChatError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ChatError::Configuration(_))
    }

    /// 调用方输入有误（而非服务端故障）
    pub fn is_bad_request(&self) -> bool {
        matches!(self, ChatError::EmptyMessage)
    }
}
