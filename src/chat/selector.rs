//! 发言人选择器
//!
//! 根据对话记录与已注册 Agent 的能力描述，选出下一位发言人（或“无合适 Agent”）。
//! 策略：
//! - **LlmSelector**：把候选 Agent 的名称与描述交给 LLM 分类，回复解析为唯一 Agent
//! - **KeywordSelector**：最新消息中的关键词计分，无命中时轮转
//! - **RoundRobinSelector**：按注册顺序轮转
//! - **FnSelector**：调用方自定义函数
//!
//! `Selector` 在策略外统一处理：空 Agent 集合、空对话、禁止连续发言、失败回退。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::agents::prompts::build_classification_prompt;
use crate::agents::{Agent, AgentRegistry};
use crate::chat::Transcript;
use crate::config::{SelectionFallback, SelectionStrategy, SelectorSection};
use crate::core::{ChatError, ConfigurationError, SelectionError};
use crate::llm::{LlmClient, Message};

/// 一次选择的输入
pub struct SelectionInput<'t, 'a> {
    pub transcript: &'t Transcript,
    /// 全部已注册 Agent（注册顺序）
    pub agents: &'a [Agent],
    /// 本轮可选的 Agent（非空）
    pub candidates: Vec<&'a Agent>,
}

/// 选择策略
#[async_trait]
pub trait SpeakerSelector: Send + Sync {
    /// 返回 `Ok(None)` 表示没有合适的 Agent，群聊随之结束
    async fn pick<'a>(
        &self,
        input: &SelectionInput<'_, 'a>,
    ) -> Result<Option<&'a Agent>, SelectionError>;
}

/// 由 LLM 按能力描述分类
pub struct LlmSelector {
    llm: Arc<dyn LlmClient>,
}

impl LlmSelector {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SpeakerSelector for LlmSelector {
    async fn pick<'a>(
        &self,
        input: &SelectionInput<'_, 'a>,
    ) -> Result<Option<&'a Agent>, SelectionError> {
        let Some(latest) = input.transcript.last() else {
            return Ok(None);
        };
        if input.candidates.len() == 1 {
            return Ok(Some(input.candidates[0]));
        }

        let messages = vec![
            Message::system(build_classification_prompt(&input.candidates)),
            Message::user(format!(
                "Latest message from {}:\n{}",
                latest.speaker, latest.content
            )),
        ];
        let reply = self.llm.complete(&messages).await?;
        debug!(reply = %reply.trim(), model = self.llm.model(), "classifier replied");
        match_agent_name(&reply, &input.candidates).map(Some)
    }
}

/// 把分类回复解析为唯一候选 Agent
///
/// 去掉首尾空白、引号、反引号、星号和标点后：忽略大小写完全匹配优先；
/// 否则看回复中出现了哪些候选名称（被更长命中名称包含的短名称不计），
/// 恰好一个即选中，零个为 NoMatch，多个为 Ambiguous。
pub fn match_agent_name<'a>(
    response: &str,
    candidates: &[&'a Agent],
) -> Result<&'a Agent, SelectionError> {
    let cleaned = response.trim().trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '`' | '"' | '\'' | '*' | '.' | ',' | ':' | ';' | '-')
    });
    if cleaned.is_empty() {
        return Err(SelectionError::EmptyResponse);
    }

    if let Some(a) = candidates
        .iter()
        .copied()
        .find(|a| a.name.eq_ignore_ascii_case(cleaned))
    {
        return Ok(a);
    }

    let lower = cleaned.to_lowercase();
    let hits: Vec<&'a Agent> = candidates
        .iter()
        .copied()
        .filter(|a| lower.contains(&a.name.to_lowercase()))
        .collect();
    let hits: Vec<&'a Agent> = hits
        .iter()
        .copied()
        .filter(|a| {
            let name = a.name.to_lowercase();
            !hits.iter().any(|other| {
                other.name.len() > a.name.len() && other.name.to_lowercase().contains(&name)
            })
        })
        .collect();

    match hits.as_slice() {
        [only] => Ok(*only),
        [] => Err(SelectionError::NoMatch(cleaned.to_string())),
        many => Err(SelectionError::Ambiguous {
            response: cleaned.to_string(),
            candidates: many.iter().map(|a| a.name.clone()).collect(),
        }),
    }
}

/// 关键词计分：最新消息中命中关键词最多者胜出，同分取注册顺序靠前者；无命中时轮转
#[derive(Debug, Default)]
pub struct KeywordSelector;

impl KeywordSelector {
    /// 关键词命中数（忽略大小写的子串匹配）
    pub fn score(agent: &Agent, text_lower: &str) -> usize {
        agent
            .keywords
            .iter()
            .filter(|k| !k.is_empty() && text_lower.contains(&k.to_lowercase()))
            .count()
    }
}

#[async_trait]
impl SpeakerSelector for KeywordSelector {
    async fn pick<'a>(
        &self,
        input: &SelectionInput<'_, 'a>,
    ) -> Result<Option<&'a Agent>, SelectionError> {
        let text = input
            .transcript
            .last()
            .map(|t| t.content.to_lowercase())
            .unwrap_or_default();

        let mut best: Option<(&'a Agent, usize)> = None;
        for agent in input.candidates.iter().copied() {
            let score = Self::score(agent, &text);
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((agent, score));
            }
        }
        if let Some((agent, score)) = best {
            debug!(agent = %agent.name, score, "keyword match");
            return Ok(Some(agent));
        }
        Ok(round_robin_next(input))
    }
}

/// 按注册顺序轮转
#[derive(Debug, Default)]
pub struct RoundRobinSelector;

#[async_trait]
impl SpeakerSelector for RoundRobinSelector {
    async fn pick<'a>(
        &self,
        input: &SelectionInput<'_, 'a>,
    ) -> Result<Option<&'a Agent>, SelectionError> {
        Ok(round_robin_next(input))
    }
}

/// 上一位 Agent 发言人之后的下一位候选（循环）；尚无 Agent 发言时从第一位开始
fn round_robin_next<'a>(input: &SelectionInput<'_, 'a>) -> Option<&'a Agent> {
    let n = input.agents.len();
    if n == 0 {
        return None;
    }
    let start = input
        .transcript
        .last_agent_speaker()
        .and_then(|s| input.agents.iter().position(|a| a.name == s))
        .map_or(0, |i| i + 1);
    (0..n)
        .map(|k| &input.agents[(start + k) % n])
        .find(|a| input.candidates.iter().any(|c| c.name == a.name))
}

type PickFn = dyn Fn(&Transcript, &[&Agent]) -> Option<String> + Send + Sync;

/// 自定义选择函数：返回 Agent 名称，None 表示无人发言
pub struct FnSelector {
    f: Box<PickFn>,
}

impl FnSelector {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Transcript, &[&Agent]) -> Option<String> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }
}

#[async_trait]
impl SpeakerSelector for FnSelector {
    async fn pick<'a>(
        &self,
        input: &SelectionInput<'_, 'a>,
    ) -> Result<Option<&'a Agent>, SelectionError> {
        match (self.f)(input.transcript, &input.candidates) {
            None => Ok(None),
            Some(name) => input
                .candidates
                .iter()
                .copied()
                .find(|a| a.name == name)
                .map(Some)
                .ok_or(SelectionError::NoMatch(name)),
        }
    }
}

/// 对外的选择器：策略 + 候选过滤 + 失败回退
pub struct Selector {
    strategy: Arc<dyn SpeakerSelector>,
    fallback: SelectionFallback,
    allow_repeat_speaker: bool,
    default_agent: Option<String>,
}

impl Selector {
    pub fn new(strategy: Arc<dyn SpeakerSelector>) -> Self {
        Self {
            strategy,
            fallback: SelectionFallback::DefaultAgent,
            allow_repeat_speaker: false,
            default_agent: None,
        }
    }

    pub fn llm(llm: Arc<dyn LlmClient>) -> Self {
        Self::new(Arc::new(LlmSelector::new(llm)))
    }

    pub fn keyword() -> Self {
        Self::new(Arc::new(KeywordSelector))
    }

    pub fn round_robin() -> Self {
        Self::new(Arc::new(RoundRobinSelector))
    }

    /// 按 [selector] 段构建；classifier 仅在 auto 策略下使用
    pub fn from_config(section: &SelectorSection, classifier: Arc<dyn LlmClient>) -> Self {
        let base = match section.strategy {
            SelectionStrategy::Auto => Self::llm(classifier),
            SelectionStrategy::Keyword => Self::keyword(),
            SelectionStrategy::RoundRobin => Self::round_robin(),
        };
        base.with_fallback(section.on_failure)
            .with_repeat_speaker(section.allow_repeat_speaker)
            .with_default_agent(section.default_agent.clone())
    }

    pub fn with_fallback(mut self, fallback: SelectionFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_repeat_speaker(mut self, allow: bool) -> Self {
        self.allow_repeat_speaker = allow;
        self
    }

    pub fn with_default_agent(mut self, name: impl Into<String>) -> Self {
        self.default_agent = Some(name.into());
        self
    }

    /// 默认 Agent：配置的名字已注册则用它，否则第一个注册的 Agent
    pub fn default_agent<'a>(&self, agents: &'a AgentRegistry) -> Option<&'a Agent> {
        self.default_agent
            .as_deref()
            .and_then(|n| agents.get(n))
            .or_else(|| agents.agents().first())
    }

    /// 本轮候选：禁止连续发言时去掉上一位 Agent（仅当还有其他 Agent 可选）
    fn candidates<'a>(&self, transcript: &Transcript, agents: &'a AgentRegistry) -> Vec<&'a Agent> {
        let all: Vec<&'a Agent> = agents.agents().iter().collect();
        if self.allow_repeat_speaker || all.len() < 2 {
            return all;
        }
        match transcript.last() {
            Some(t) if t.role == crate::llm::Role::Assistant => all
                .into_iter()
                .filter(|a| a.name != t.speaker)
                .collect(),
            _ => all,
        }
    }

    /// 选择下一位发言人
    ///
    /// - Agent 集合为空：`ConfigurationError::NoAgents`
    /// - 对话为空：默认 Agent，不调用策略
    /// - 策略失败：按 fallback 回退到默认 Agent 或返回 `SelectionError`
    pub async fn select<'a>(
        &self,
        transcript: &Transcript,
        agents: &'a AgentRegistry,
    ) -> Result<Option<&'a Agent>, ChatError> {
        if agents.is_empty() {
            return Err(ConfigurationError::NoAgents.into());
        }
        if transcript.is_empty() {
            return Ok(self.default_agent(agents));
        }

        let input = SelectionInput {
            transcript,
            agents: agents.agents(),
            candidates: self.candidates(transcript, agents),
        };

        match self.strategy.pick(&input).await {
            Ok(selected) => {
                debug!(
                    agent = selected.map(|a| a.name.as_str()).unwrap_or("(none)"),
                    "speaker selected"
                );
                Ok(selected)
            }
            Err(e) => match self.fallback {
                SelectionFallback::DefaultAgent => {
                    let fallback = self.default_agent(agents);
                    warn!(
                        error = %e,
                        fallback = fallback.map(|a| a.name.as_str()).unwrap_or("(none)"),
                        "speaker selection failed, using default agent"
                    );
                    Ok(fallback)
                }
                SelectionFallback::Error => Err(e.into()),
            },
        }
    }
}
