//! 群聊主循环
//!
//! 追加用户消息 → 选择发言人 → 调用该 Agent 的模型 → 追加回复 → 判定终止，
//! 直到终止标记、问题已解决、轮数上限或选择器无人可选。

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::monitor::{ConversationMonitor, ConversationSummary};
use super::selector::Selector;
use super::termination::{StopReason, TerminationHandler};
use super::transcript::Transcript;
use crate::agents::AgentRegistry;
use crate::core::{ChatError, ConfigurationError};
use crate::llm::{LlmClient, Role};

/// 群聊中用户的发言人名
pub const DEFAULT_USER_NAME: &str = "student";

const FINAL_RESULT_MARKERS: &[&str] = &["TERMINATE", "KẾT THÚC"];

/// 无法提取有效答案时的提示
pub const FALLBACK_ANSWER: &str =
    "Xin lỗi, tôi không thể xử lý yêu cầu này. Vui lòng thử lại với câu hỏi cụ thể hơn.";

/// 一次群聊的结果
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub transcript: Transcript,
    pub final_result: String,
    /// Agent 发言的轮数
    pub rounds: usize,
    pub stop_reason: StopReason,
    pub summary: ConversationSummary,
}

pub struct GroupChat {
    agents: AgentRegistry,
    clients: HashMap<String, Arc<dyn LlmClient>>,
    shared_client: Option<Arc<dyn LlmClient>>,
    selector: Selector,
    max_rounds: usize,
    termination_msg: String,
    user_name: String,
}

pub struct GroupChatBuilder {
    agents: AgentRegistry,
    clients: HashMap<String, Arc<dyn LlmClient>>,
    shared_client: Option<Arc<dyn LlmClient>>,
    selector: Option<Selector>,
    max_rounds: usize,
    termination_msg: String,
    user_name: String,
}

impl GroupChatBuilder {
    /// 所有未单独指定客户端的 Agent 共用此客户端
    pub fn client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.shared_client = Some(client);
        self
    }

    pub fn agent_client(mut self, agent: impl Into<String>, client: Arc<dyn LlmClient>) -> Self {
        self.clients.insert(agent.into(), client);
        self
    }

    pub fn selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn max_rounds(mut self, n: usize) -> Self {
        self.max_rounds = n;
        self
    }

    pub fn termination_msg(mut self, msg: impl Into<String>) -> Self {
        self.termination_msg = msg.into();
        self
    }

    pub fn user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = name.into();
        self
    }

    pub fn build(self) -> Result<GroupChat, ConfigurationError> {
        if self.agents.is_empty() {
            return Err(ConfigurationError::NoAgents);
        }
        if let Some(name) = self.clients.keys().find(|n| self.agents.get(n).is_none()) {
            return Err(ConfigurationError::UnknownAgent(name.clone()));
        }
        if self.shared_client.is_none() {
            if let Some(a) = self
                .agents
                .agents()
                .iter()
                .find(|a| !self.clients.contains_key(&a.name))
            {
                return Err(ConfigurationError::InvalidSetting {
                    key: "llm".to_string(),
                    reason: format!("no client for agent {}", a.name),
                });
            }
        }
        if self.max_rounds == 0 {
            return Err(ConfigurationError::InvalidSetting {
                key: "max_rounds".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let selector = match self.selector {
            Some(s) => s,
            None => match &self.shared_client {
                Some(c) => Selector::llm(c.clone()),
                None => Selector::round_robin(),
            },
        };

        Ok(GroupChat {
            agents: self.agents,
            clients: self.clients,
            shared_client: self.shared_client,
            selector,
            max_rounds: self.max_rounds,
            termination_msg: self.termination_msg,
            user_name: self.user_name,
        })
    }
}

impl GroupChat {
    pub fn builder(agents: AgentRegistry) -> GroupChatBuilder {
        GroupChatBuilder {
            agents,
            clients: HashMap::new(),
            shared_client: None,
            selector: None,
            max_rounds: 10,
            termination_msg: "TERMINATE".to_string(),
            user_name: DEFAULT_USER_NAME.to_string(),
        }
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    fn client_for(&self, agent: &str) -> Result<&Arc<dyn LlmClient>, ConfigurationError> {
        self.clients
            .get(agent)
            .or(self.shared_client.as_ref())
            .ok_or_else(|| ConfigurationError::UnknownAgent(agent.to_string()))
    }

    /// 以一条用户消息开启群聊并运行到结束
    pub async fn run(&self, message: &str) -> Result<ChatOutcome, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let mut transcript = Transcript::new();
        let mut monitor = ConversationMonitor::new();
        let mut termination = TerminationHandler::new(&self.termination_msg, self.max_rounds);

        transcript.push_user(&self.user_name, message);
        if let Some(t) = transcript.last() {
            monitor.record(t);
        }

        let mut rounds = 0;
        let stop_reason = loop {
            let Some(agent) = self.selector.select(&transcript, &self.agents).await? else {
                debug!("no suitable agent, ending chat");
                break StopReason::NoSpeaker;
            };

            let client = self.client_for(&agent.name)?;
            let messages = transcript.to_messages_for(&agent.name, &agent.system_message);
            let reply = client.complete(&messages).await?;
            debug!(agent = %agent.name, round = rounds + 1, chars = reply.len(), "agent replied");

            transcript.push_agent(agent.name.clone(), reply);
            if let Some(t) = transcript.last() {
                monitor.record(t);
            }
            rounds += 1;

            if let Some(reason) = termination.should_stop(transcript.turns()) {
                break reason;
            }
        };

        info!(rounds, stop_reason = ?stop_reason, "group chat finished");

        Ok(ChatOutcome {
            final_result: extract_final_result(&transcript),
            summary: monitor.summary(),
            transcript,
            rounds,
            stop_reason,
        })
    }
}

/// 从对话中提取最终答案
///
/// 取最后一条有实质内容（去空白后超过 10 个字符且不以 `[` 开头）的 Agent 发言，
/// 没有则取最后一条消息；去掉终止标记，剩余不足 5 个字符时返回 [`FALLBACK_ANSWER`]。
pub fn extract_final_result(transcript: &Transcript) -> String {
    let chosen = transcript
        .turns()
        .iter()
        .rev()
        .find(|t| {
            let c = t.content.trim();
            t.role == Role::Assistant && c.chars().count() > 10 && !c.starts_with('[')
        })
        .or_else(|| transcript.last());

    let Some(turn) = chosen else {
        return FALLBACK_ANSWER.to_string();
    };

    let mut text = turn.content.clone();
    for marker in FINAL_RESULT_MARKERS {
        text = text.replace(marker, "");
    }
    let text = text.trim();
    if text.chars().count() < 5 {
        FALLBACK_ANSWER.to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Agent;
    use crate::config::SelectionFallback;
    use crate::llm::MockLlmClient;

    fn team() -> AgentRegistry {
        AgentRegistry::from_agents([
            Agent::new("Info_Agent", "Curates materials").with_system_message("You curate."),
            Agent::new("Math_Expert", "Solves math").with_system_message("You solve math."),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_run_until_terminate() {
        // 选择 → 回复 交替出现在同一个 mock 上
        let mock = Arc::new(MockLlmClient::with_replies([
            "Math_Expert",
            "x = 2 because 2x = 4. TERMINATE",
        ]));
        let chat = GroupChat::builder(team()).client(mock.clone()).build().unwrap();
        let outcome = chat.run("Solve 2x = 4").await.unwrap();

        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.stop_reason, StopReason::Terminated);
        assert_eq!(outcome.final_result, "x = 2 because 2x = 4.");
        assert_eq!(outcome.transcript.len(), 2);
        assert_eq!(outcome.transcript.turns()[0].speaker, DEFAULT_USER_NAME);

        // 专家收到自己的系统消息与带前缀的用户消息
        let reqs = mock.requests();
        assert_eq!(reqs[1][0].content, "You solve math.");
        assert_eq!(reqs[1][1].content, "[student] Solve 2x = 4");
    }

    #[tokio::test]
    async fn test_max_rounds_stops_loop() {
        let chat = GroupChat::builder(team())
            .client(Arc::new(MockLlmClient::new()))
            .selector(Selector::round_robin())
            .max_rounds(3)
            .build()
            .unwrap();
        let outcome = chat.run("hello").await.unwrap();
        assert_eq!(outcome.rounds, 3);
        assert_eq!(outcome.stop_reason, StopReason::MaxRounds);
        let speakers: Vec<&str> = outcome.transcript.turns()[1..]
            .iter()
            .map(|t| t.speaker.as_str())
            .collect();
        assert_eq!(speakers, vec!["Info_Agent", "Math_Expert", "Info_Agent"]);
    }

    #[tokio::test]
    async fn test_per_agent_clients() {
        let info = Arc::new(MockLlmClient::with_replies(["Here are the materials. TERMINATE"]));
        let math = Arc::new(MockLlmClient::new());
        let chat = GroupChat::builder(team())
            .agent_client("Info_Agent", info.clone())
            .agent_client("Math_Expert", math.clone())
            .selector(Selector::keyword())
            .build()
            .unwrap();
        let outcome = chat.run("need materials").await.unwrap();
        assert_eq!(outcome.transcript.last().unwrap().speaker, "Info_Agent");
        assert_eq!(info.call_count(), 1);
        assert_eq!(math.call_count(), 0);
    }

    #[tokio::test]
    async fn test_selection_error_propagates() {
        let mock = Arc::new(MockLlmClient::with_replies(["nobody"]));
        let chat = GroupChat::builder(team())
            .client(mock.clone())
            .selector(Selector::llm(mock).with_fallback(SelectionFallback::Error))
            .build()
            .unwrap();
        let err = chat.run("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::Selection(_)));
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let chat = GroupChat::builder(team())
            .client(Arc::new(MockLlmClient::new()))
            .build()
            .unwrap();
        assert!(matches!(chat.run("   ").await, Err(ChatError::EmptyMessage)));
    }

    #[test]
    fn test_builder_validation() {
        assert!(matches!(
            GroupChat::builder(AgentRegistry::new())
                .client(Arc::new(MockLlmClient::new()))
                .build(),
            Err(ConfigurationError::NoAgents)
        ));
        assert!(matches!(
            GroupChat::builder(team())
                .agent_client("Ghost", Arc::new(MockLlmClient::new()))
                .client(Arc::new(MockLlmClient::new()))
                .build(),
            Err(ConfigurationError::UnknownAgent(_))
        ));
        assert!(GroupChat::builder(team())
            .agent_client("Info_Agent", Arc::new(MockLlmClient::new()))
            .build()
            .is_err());
    }

    #[test]
    fn test_extract_final_result_rules() {
        let mut t = Transcript::new();
        t.push_user("student", "q");
        t.push_agent("Math_Expert", "The answer is 42, as shown.");
        t.push_agent("Info_Agent", "[Info_Agent] noted");
        t.push_agent("Math_Expert", "ok");
        assert_eq!(extract_final_result(&t), "The answer is 42, as shown.");

        let mut t = Transcript::new();
        t.push_user("student", "q");
        t.push_agent("Math_Expert", "TERMINATE");
        assert_eq!(extract_final_result(&t), FALLBACK_ANSWER);

        let mut t = Transcript::new();
        t.push_agent("Math_Expert", "Đáp án là 5 KẾT THÚC");
        assert_eq!(extract_final_result(&t), "Đáp án là 5");

        assert_eq!(extract_final_result(&Transcript::new()), FALLBACK_ANSWER);
    }
}
