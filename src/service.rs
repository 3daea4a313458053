//! 聊天服务：请求级的胶水层
//!
//! - 默认团队（Agent + 各自的 LLM 客户端）首次使用时构建并缓存
//! - 请求带 model / temperature 覆盖时单独构建一支团队
//! - 实际轮数取 max(请求值, max_chat_rounds)
//! - 返回从对话中提取的最终答案

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::info;

use crate::agents::{default_team, load_team, AgentInfo, AgentRegistry};
use crate::chat::{ChatOutcome, GroupChat, Selector};
use crate::config::AppConfig;
use crate::core::{ChatError, ConfigurationError};
use crate::llm::{AgentLlmSettings, LlmClient, LlmOverrides, ModelRegistry, OpenAiClient};

/// 模型表中为选择器保留的映射名：`[llm.agent_models] selector = "..."`
pub const SELECTOR_MODEL_KEY: &str = "selector";

fn default_request_rounds() -> Option<usize> {
    Some(8)
}

/// POST /chat 请求体
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_request_rounds")]
    pub max_rounds: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            model: None,
            max_rounds: default_request_rounds(),
            temperature: None,
        }
    }

    fn overrides(&self) -> LlmOverrides {
        LlmOverrides {
            model: self.model.clone().filter(|m| !m.trim().is_empty()),
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub result: String,
}

/// 由解析好的设置创建 LLM 客户端
pub trait ClientFactory: Send + Sync {
    fn create(&self, settings: &AgentLlmSettings) -> Arc<dyn LlmClient>;
}

/// 默认工厂：OpenAI 兼容端点
#[derive(Debug, Default)]
pub struct OpenAiClientFactory;

impl ClientFactory for OpenAiClientFactory {
    fn create(&self, settings: &AgentLlmSettings) -> Arc<dyn LlmClient> {
        Arc::new(OpenAiClient::from_settings(settings))
    }
}

/// 所有 Agent 与选择器共用同一个客户端（离线演示与测试）
pub struct SharedClientFactory(pub Arc<dyn LlmClient>);

impl ClientFactory for SharedClientFactory {
    fn create(&self, _settings: &AgentLlmSettings) -> Arc<dyn LlmClient> {
        self.0.clone()
    }
}

/// 一支可直接开聊的团队
pub struct Team {
    pub agents: AgentRegistry,
    clients: HashMap<String, Arc<dyn LlmClient>>,
    classifier: Arc<dyn LlmClient>,
}

pub struct ChatService {
    config: AppConfig,
    models: ModelRegistry,
    factory: Arc<dyn ClientFactory>,
    default_team: OnceCell<Arc<Team>>,
}

impl ChatService {
    pub fn new(config: AppConfig) -> Self {
        Self::with_factory(config, Arc::new(OpenAiClientFactory))
    }

    pub fn with_factory(config: AppConfig, factory: Arc<dyn ClientFactory>) -> Self {
        let models = ModelRegistry::from_config(&config.llm);
        Self {
            config,
            models,
            factory,
            default_team: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    fn load_agents(&self) -> Result<AgentRegistry, ConfigurationError> {
        let mut agents = match &self.config.app.team_file {
            Some(path) => load_team(path, &self.config.personalization)?,
            None => default_team(&self.config.personalization)?,
        };
        agents.resolve_models(&self.models);
        Ok(agents)
    }

    /// 构建团队；同一 (model, temperature) 组合共用一个客户端
    pub fn build_team(&self, overrides: &LlmOverrides) -> Result<Team, ConfigurationError> {
        let mut agents = AgentRegistry::new();
        let mut by_settings: HashMap<(String, u32), Arc<dyn LlmClient>> = HashMap::new();
        let mut clients = HashMap::new();

        for mut agent in self.load_agents()?.agents().iter().cloned() {
            let agent_overrides = LlmOverrides {
                model: overrides.model.clone().or_else(|| Some(agent.model_id.clone())),
                temperature: overrides.temperature,
            };
            let settings = self.models.agent_settings(&agent.name, &agent_overrides, None)?;
            let client = by_settings
                .entry((settings.model.clone(), settings.temperature.to_bits()))
                .or_insert_with(|| self.factory.create(&settings))
                .clone();
            agent.model_id = settings.model.clone();
            clients.insert(agent.name.clone(), client);
            agents.register(agent)?;
        }

        let classifier_settings = self.models.agent_settings(
            SELECTOR_MODEL_KEY,
            &LlmOverrides {
                model: overrides.model.clone(),
                temperature: Some(self.config.selector.temperature),
            },
            None,
        )?;
        let classifier = by_settings
            .entry((
                classifier_settings.model.clone(),
                classifier_settings.temperature.to_bits(),
            ))
            .or_insert_with(|| self.factory.create(&classifier_settings))
            .clone();

        Ok(Team {
            agents,
            clients,
            classifier,
        })
    }

    async fn cached_team(&self) -> Result<Arc<Team>, ConfigurationError> {
        self.default_team
            .get_or_try_init(|| async { self.build_team(&LlmOverrides::default()).map(Arc::new) })
            .await
            .cloned()
    }

    async fn team_for(&self, overrides: &LlmOverrides) -> Result<Arc<Team>, ConfigurationError> {
        if overrides.model.is_none() && overrides.temperature.is_none() {
            self.cached_team().await
        } else {
            self.build_team(overrides).map(Arc::new)
        }
    }

    /// 实际轮数：max(请求值, max_chat_rounds)
    pub fn effective_max_rounds(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config.app.max_rounds)
            .max(self.config.app.max_chat_rounds)
            .max(1)
    }

    /// 运行一次群聊，返回完整结果
    pub async fn run_chat_outcome(&self, request: &ChatRequest) -> Result<ChatOutcome, ChatError> {
        if request.message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let chat_id = uuid::Uuid::new_v4();
        let overrides = request.overrides();
        let max_rounds = self.effective_max_rounds(request.max_rounds);
        let start = Instant::now();
        info!(
            %chat_id,
            rounds = max_rounds,
            model = overrides.model.as_deref().unwrap_or("(default)"),
            temperature = ?overrides.temperature,
            "chat start"
        );

        let team = self.team_for(&overrides).await?;
        let selector = Selector::from_config(&self.config.selector, team.classifier.clone());
        let mut builder = GroupChat::builder(team.agents.clone())
            .selector(selector)
            .max_rounds(max_rounds)
            .termination_msg(self.config.app.termination_msg.clone());
        for (name, client) in &team.clients {
            builder = builder.agent_client(name.clone(), client.clone());
        }
        let outcome = builder.build()?.run(&request.message).await?;

        info!(
            %chat_id,
            rounds = outcome.rounds,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "chat done"
        );
        Ok(outcome)
    }

    pub async fn run_chat(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let outcome = self.run_chat_outcome(request).await?;
        Ok(ChatResponse {
            result: outcome.final_result,
        })
    }

    /// 默认团队的 Agent 列表
    pub async fn list_agents_info(&self) -> Result<Vec<AgentInfo>, ConfigurationError> {
        Ok(self.cached_team().await?.agents.infos())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::llm::MockLlmClient;

    fn config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key = Some("sk-test".to_string());
        cfg
    }

    /// 记录每次创建客户端时的设置；所有客户端共用一个 mock
    struct RecordingFactory {
        created: Mutex<Vec<(String, f32)>>,
        mock: Arc<MockLlmClient>,
    }

    impl RecordingFactory {
        fn new(mock: Arc<MockLlmClient>) -> Self {
            Self {
                created: Mutex::new(Vec::new()),
                mock,
            }
        }
    }

    impl ClientFactory for RecordingFactory {
        fn create(&self, settings: &AgentLlmSettings) -> Arc<dyn LlmClient> {
            self.created
                .lock()
                .unwrap()
                .push((settings.model.clone(), settings.temperature));
            self.mock.clone()
        }
    }

    #[test]
    fn test_effective_rounds() {
        let mut cfg = config();
        cfg.app.max_chat_rounds = 10;
        let svc = ChatService::new(cfg);
        assert_eq!(svc.effective_max_rounds(Some(3)), 10);
        assert_eq!(svc.effective_max_rounds(Some(15)), 15);
        assert_eq!(svc.effective_max_rounds(None), 10);
    }

    #[test]
    fn test_request_defaults() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(req.max_rounds, Some(8));
        assert!(req.model.is_none());
        assert!(req.temperature.is_none());
    }

    #[test]
    fn test_clients_shared_per_model_and_temperature() {
        let mock = Arc::new(MockLlmClient::new());
        let factory = Arc::new(RecordingFactory::new(mock));
        let mut cfg = config();
        cfg.llm
            .agent_models
            .insert("Math_Expert".to_string(), "math-model".to_string());
        let svc = ChatService::with_factory(cfg, factory.clone());

        let team = svc.build_team(&LlmOverrides::default()).unwrap();
        assert_eq!(team.agents.len(), 8);
        assert_eq!(team.agents.get("Math_Expert").unwrap().model_id, "math-model");
        assert_eq!(team.agents.get("CS_Expert").unwrap().model_id, "gpt-oss-120b");

        let created = factory.created.lock().unwrap().clone();
        // 默认模型、math-model、选择器（温度 0.3）各一个
        assert_eq!(created.len(), 3);
        assert!(created.contains(&("gpt-oss-120b".to_string(), 0.3)));
    }

    #[test]
    fn test_missing_api_key() {
        let svc = ChatService::new(AppConfig::default());
        assert!(matches!(
            svc.build_team(&LlmOverrides::default()),
            Err(ConfigurationError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn test_run_chat_end_to_end() {
        let mock = Arc::new(MockLlmClient::with_replies([
            "Math_Expert",
            "Nghiệm là x = 2 và x = -1/2. TERMINATE",
        ]));
        let svc = ChatService::with_factory(config(), Arc::new(RecordingFactory::new(mock)));
        let resp = svc
            .run_chat(&ChatRequest::new("Giải phương trình 2x^2 - 3x - 2 = 0"))
            .await
            .unwrap();
        assert_eq!(resp.result, "Nghiệm là x = 2 và x = -1/2.");
    }

    #[tokio::test]
    async fn test_default_team_cached() {
        let mock = Arc::new(MockLlmClient::new());
        let factory = Arc::new(RecordingFactory::new(mock));
        let svc = ChatService::with_factory(config(), factory.clone());
        let first = svc.list_agents_info().await.unwrap();
        let n = factory.created.lock().unwrap().len();
        let second = svc.list_agents_info().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(factory.created.lock().unwrap().len(), n);
        assert_eq!(first[0].name, "Info_Agent");
    }

    #[tokio::test]
    async fn test_overrides_build_fresh_team() {
        let mock = Arc::new(MockLlmClient::with_replies(["Math_Expert", "The answer is 3. TERMINATE"]));
        let factory = Arc::new(RecordingFactory::new(mock));
        let svc = ChatService::with_factory(config(), factory.clone());
        let mut req = ChatRequest::new("1 + 2?");
        req.model = Some("other-model".to_string());
        req.temperature = Some(0.7);
        svc.run_chat(&req).await.unwrap();
        let created = factory.created.lock().unwrap().clone();
        assert!(created.contains(&("other-model".to_string(), 0.7)));
        assert!(created.contains(&("other-model".to_string(), 0.3)));
    }

    #[tokio::test]
    async fn test_empty_message() {
        let svc = ChatService::with_factory(
            config(),
            Arc::new(RecordingFactory::new(Arc::new(MockLlmClient::new()))),
        );
        let err = svc.run_chat(&ChatRequest::new("  ")).await.unwrap_err();
        assert!(err.is_bad_request());
    }
}
