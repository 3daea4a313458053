//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TUTOR__*` 覆盖（双下划线表示嵌套，如 `TUTOR__LLM__DEFAULT_MODEL=gpt-oss-120b`），
//! 最后叠加部署沿用的扁平变量：`LLM_BASE_URL`、`LLM_BASE_MODEL`、`FCI_API_KEY`/`OPENAI_API_KEY`、
//! `MAX_ROUNDS`、`MAX_CHAT_ROUNDS`、`DATA_PATH`。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::agents::Personalization;
use crate::core::ConfigurationError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub selector: SelectorSection,
    pub personalization: Personalization,
    pub web: WebSection,
}

/// [app] 段：对话轮数上限、终止标记、数据目录
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 单次群聊最多轮数（每轮一位 Agent 发言）
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// HTTP 请求的轮数下限：实际轮数取 max(请求值, 此值)
    #[serde(default = "default_max_rounds")]
    pub max_chat_rounds: usize,
    #[serde(default = "default_termination_msg")]
    pub termination_msg: String,
    /// 学科数据根目录（syllabus / materials / quizzes）
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    /// 团队定义文件（可选），缺省使用内置辅导团队
    pub team_file: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            max_rounds: default_max_rounds(),
            max_chat_rounds: default_max_rounds(),
            termination_msg: default_termination_msg(),
            data_path: default_data_path(),
            team_file: None,
        }
    }
}

fn default_max_rounds() -> usize {
    10
}

fn default_termination_msg() -> String {
    "TERMINATE".to_string()
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data")
}

/// [llm] 段：端点、默认模型、Agent→模型映射
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_base_url")]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Agent 名 → 模型 id；未列出的 Agent 使用 default_model
    #[serde(default)]
    pub agent_models: HashMap<String, String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            agent_models: HashMap::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_base_url() -> Option<String> {
    Some("https://mkp-api.fptcloud.com/v1".to_string())
}

fn default_model() -> String {
    "gpt-oss-120b".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_request_timeout() -> u64 {
    60
}

/// 发言人选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// 交给 LLM 按能力描述分类
    #[default]
    Auto,
    /// 关键词计分，无命中时轮转
    Keyword,
    /// 轮转
    RoundRobin,
}

/// 选择失败时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionFallback {
    /// 记录警告并回退到默认 Agent
    #[default]
    DefaultAgent,
    /// 把 SelectionError 返回给调用方
    Error,
}

/// [selector] 段
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorSection {
    #[serde(default)]
    pub strategy: SelectionStrategy,
    #[serde(default)]
    pub on_failure: SelectionFallback,
    /// 是否允许同一 Agent 连续发言
    #[serde(default)]
    pub allow_repeat_speaker: bool,
    /// 默认 Agent：空对话的首位发言人与失败回退目标；未注册时取第一个 Agent
    #[serde(default = "default_agent")]
    pub default_agent: String,
    /// 分类调用的温度
    #[serde(default = "default_selector_temperature")]
    pub temperature: f32,
}

impl Default for SelectorSection {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::default(),
            on_failure: SelectionFallback::default(),
            allow_repeat_speaker: false,
            default_agent: default_agent(),
            temperature: default_selector_temperature(),
        }
    }
}

fn default_agent() -> String {
    "Info_Agent".to_string()
}

fn default_selector_temperature() -> f32 {
    0.3
}

/// [web] 段：监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl AppConfig {
    /// 叠加扁平环境变量（部署脚本沿用的名字）
    pub fn apply_env_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(url) = get("LLM_BASE_URL").filter(|s| !s.trim().is_empty()) {
            self.llm.base_url = Some(url);
        }
        if let Some(model) = get("LLM_BASE_MODEL").filter(|s| !s.trim().is_empty()) {
            self.llm.default_model = model;
        }
        if self.llm.api_key.as_deref().map_or(true, str::is_empty) {
            self.llm.api_key = get("FCI_API_KEY")
                .or_else(|| get("OPENAI_API_KEY"))
                .filter(|s| !s.is_empty());
        }
        if let Some(n) = get("MAX_ROUNDS").and_then(|s| s.trim().parse().ok()) {
            self.app.max_rounds = n;
        }
        if let Some(n) = get("MAX_CHAT_ROUNDS").and_then(|s| s.trim().parse().ok()) {
            self.app.max_chat_rounds = n;
        }
        if let Some(p) = get("DATA_PATH").filter(|s| !s.trim().is_empty()) {
            self.app.data_path = PathBuf::from(p);
        }
    }

    /// 校验取值范围；模型映射中的空模型名视为配置错误
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.llm.default_model.trim().is_empty() {
            return Err(ConfigurationError::InvalidSetting {
                key: "llm.default_model".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        for (agent, model) in &self.llm.agent_models {
            if model.trim().is_empty() {
                return Err(ConfigurationError::InvalidSetting {
                    key: format!("llm.agent_models.{agent}"),
                    reason: "model id must not be empty".to_string(),
                });
            }
        }
        for (key, t) in [
            ("llm.temperature", self.llm.temperature),
            ("selector.temperature", self.selector.temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigurationError::InvalidSetting {
                    key: key.to_string(),
                    reason: format!("{t} is outside 0.0..=2.0"),
                });
            }
        }
        if self.app.max_rounds == 0 {
            return Err(ConfigurationError::InvalidSetting {
                key: "app.max_rounds".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// 从 config 目录加载配置，环境变量 TUTOR__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 叠加环境变量 TUTOR__*（双下划线表示嵌套键）
/// 4. 叠加扁平环境变量并校验
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, ConfigurationError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TUTOR")
            .separator("__")
            .try_parsing(true),
    );

    let mut cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.apply_env_overrides(|k| std::env::var(k).ok());
    cfg.validate()?;
    Ok(cfg)
}
