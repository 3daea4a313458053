//! Agent 与注册表
//!
//! Agent 只是数据：名称（会话内唯一）、能力描述、系统消息、关键词、解析后的模型 id。
//! 注册表保持注册顺序，重名在注册时拒绝。

pub mod prompts;
pub mod team;

use serde::{Deserialize, Serialize};

use crate::core::ConfigurationError;
use crate::llm::ModelRegistry;

pub use prompts::Personalization;
pub use team::{default_team, load_team, TeamFile};

/// 群聊参与者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    /// 能力描述（供分类路由匹配）
    pub description: String,
    #[serde(default)]
    pub system_message: String,
    /// 关键词（关键词选择策略使用）
    #[serde(default)]
    pub keywords: Vec<String>,
    /// 解析后的模型 id；为空表示尚未解析
    #[serde(default)]
    pub model_id: String,
}

impl Agent {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_message: String::new(),
            keywords: Vec::new(),
            model_id: String::new(),
        }
    }

    pub fn with_system_message(mut self, msg: impl Into<String>) -> Self {
        self.system_message = msg.into();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_id = model.into();
        self
    }

    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// 对外展示的 Agent 摘要（/agents）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
}

/// Agent 注册表：按注册顺序保存
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 批量注册，任一失败即返回错误
    pub fn from_agents(agents: impl IntoIterator<Item = Agent>) -> Result<Self, ConfigurationError> {
        let mut reg = Self::new();
        for a in agents {
            reg.register(a)?;
        }
        Ok(reg)
    }

    /// 注册 Agent；空名称或重名返回 ConfigurationError
    pub fn register(&mut self, agent: Agent) -> Result<(), ConfigurationError> {
        if agent.name.trim().is_empty() {
            return Err(ConfigurationError::InvalidSetting {
                key: "agent.name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.get(&agent.name).is_some() {
            return Err(ConfigurationError::DuplicateAgent(agent.name));
        }
        self.agents.push(agent);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Agent> {
        let idx = self.position(name)?;
        Some(self.agents.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.agents.iter().position(|a| a.name == name)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn infos(&self) -> Vec<AgentInfo> {
        self.agents.iter().map(Agent::info).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// 为尚未指定模型的 Agent 填入模型表中的模型（专属映射或默认模型）
    pub fn resolve_models(&mut self, models: &ModelRegistry) {
        for agent in &mut self.agents {
            if agent.model_id.is_empty() {
                agent.model_id = models.model_for(&agent.name).to_string();
            }
        }
    }
}
