//! 模型表：Agent → 模型 id → 模型能力
//!
//! 纯数据：Agent 未配置专属模型时使用默认模型；模型能力按
//! `model → default_model → "default"` 逐级回退。

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LlmSection;
use crate::core::ConfigurationError;

/// 兜底能力条目的键
pub const DEFAULT_MODEL_INFO_KEY: &str = "default";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// 模型能力描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub vision: bool,
    pub json_output: bool,
    pub function_calling: bool,
    pub structured_output: bool,
    pub family: String,
}

impl ModelInfo {
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            vision: false,
            json_output: false,
            function_calling: false,
            structured_output: false,
            family: family.into(),
        }
    }

    pub fn with_vision(mut self, v: bool) -> Self {
        self.vision = v;
        self
    }

    pub fn with_json_output(mut self, v: bool) -> Self {
        self.json_output = v;
        self
    }

    pub fn with_function_calling(mut self, v: bool) -> Self {
        self.function_calling = v;
        self
    }

    pub fn with_structured_output(mut self, v: bool) -> Self {
        self.structured_output = v;
        self
    }
}

/// 单次调用的覆盖项（来自请求或调用方）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmOverrides {
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// 解析完成的单个 Agent 的 LLM 设置
#[derive(Debug, Clone, PartialEq)]
pub struct AgentLlmSettings {
    pub model: String,
    pub temperature: f32,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model_info: ModelInfo,
    /// 单次请求超时
    pub timeout: Duration,
}

/// 模型表
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    default_model: String,
    base_url: Option<String>,
    api_key: Option<String>,
    temperature: f32,
    request_timeout: Duration,
    /// 键为小写 Agent 名（配置源可能改写键的大小写）
    agent_models: HashMap<String, String>,
    model_infos: HashMap<String, ModelInfo>,
}

impl ModelRegistry {
    /// 内置 gpt-oss-120b 与兜底两条能力描述
    pub fn new(default_model: impl Into<String>) -> Self {
        let mut model_infos = HashMap::new();
        model_infos.insert(
            "gpt-oss-120b".to_string(),
            ModelInfo::new("unknown").with_json_output(true),
        );
        model_infos.insert(DEFAULT_MODEL_INFO_KEY.to_string(), ModelInfo::new("unknown"));
        Self {
            default_model: default_model.into(),
            base_url: None,
            api_key: None,
            temperature: 0.2,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            agent_models: HashMap::new(),
            model_infos,
        }
    }

    pub fn from_config(llm: &LlmSection) -> Self {
        let mut reg = Self::new(llm.default_model.clone())
            .with_temperature(llm.temperature)
            .with_request_timeout(Duration::from_secs(llm.request_timeout_secs.max(1)));
        reg.base_url = llm.base_url.clone().filter(|u| !u.trim().is_empty());
        reg.api_key = llm.api_key.clone().filter(|k| !k.is_empty());
        for (agent, model) in &llm.agent_models {
            reg.agent_models.insert(agent.to_lowercase(), model.clone());
        }
        reg
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_agent_model(mut self, agent: impl Into<String>, model: impl Into<String>) -> Self {
        self.agent_models
            .insert(agent.into().to_lowercase(), model.into());
        self
    }

    pub fn with_model_info(mut self, model: impl Into<String>, info: ModelInfo) -> Self {
        self.model_infos.insert(model.into(), info);
        self
    }

    /// 清空能力表（测试或完全自定义时使用）
    pub fn without_model_infos(mut self) -> Self {
        self.model_infos.clear();
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Agent 使用的模型：专属映射优先，否则默认模型
    pub fn model_for(&self, agent_name: &str) -> &str {
        self.agent_models
            .get(&agent_name.to_lowercase())
            .map(String::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model)
    }

    /// 模型能力：model → default_model → "default"
    pub fn model_info(&self, model: &str) -> Result<&ModelInfo, ConfigurationError> {
        self.model_infos
            .get(model)
            .or_else(|| self.model_infos.get(&self.default_model))
            .or_else(|| self.model_infos.get(DEFAULT_MODEL_INFO_KEY))
            .ok_or_else(|| ConfigurationError::MissingModelInfo(model.to_string()))
    }

    /// 显式传入的 key 优先，其次为配置中的 key
    pub fn validate_api_key(&self, api_key: Option<&str>) -> Result<String, ConfigurationError> {
        api_key
            .filter(|k| !k.is_empty())
            .or(self.api_key.as_deref())
            .filter(|k| !k.is_empty())
            .map(String::from)
            .ok_or(ConfigurationError::MissingApiKey)
    }

    /// 是否为本地模型服务（localhost / 127.0.0.1）
    pub fn is_local_server(&self) -> bool {
        self.base_url
            .as_deref()
            .map_or(false, |u| u.contains("localhost") || u.contains("127.0.0.1"))
    }

    /// 解析某个 Agent 的完整 LLM 设置
    pub fn agent_settings(
        &self,
        agent_name: &str,
        overrides: &LlmOverrides,
        api_key: Option<&str>,
    ) -> Result<AgentLlmSettings, ConfigurationError> {
        let model = overrides
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.model_for(agent_name).to_string());
        let api_key = self.validate_api_key(api_key)?;
        let model_info = self.model_info(&model)?.clone();
        Ok(AgentLlmSettings {
            temperature: overrides.temperature.unwrap_or(self.temperature),
            model,
            api_key,
            base_url: self.base_url.clone(),
            model_info,
            timeout: self.request_timeout,
        })
    }

    /// 调试摘要：API Key 仅显示末 8 位
    pub fn debug_summary(&self) -> String {
        let key = match self.api_key.as_deref() {
            Some(k) if k.chars().count() > 8 => {
                let tail: String = k.chars().skip(k.chars().count() - 8).collect();
                format!("***{tail}")
            }
            _ => "NOT SET".to_string(),
        };
        let mut models: Vec<&str> = self.model_infos.keys().map(String::as_str).collect();
        models.sort_unstable();
        format!(
            "default_model={} base_url={} api_key={} local={} models={:?}",
            self.default_model,
            self.base_url.as_deref().unwrap_or("(none)"),
            key,
            self.is_local_server(),
            models
        )
    }
}
