//! 群聊：对话记录、发言人选择、终止判定、监控与主循环

pub mod group;
pub mod monitor;
pub mod selector;
pub mod termination;
pub mod transcript;

pub use group::{extract_final_result, ChatOutcome, GroupChat, GroupChatBuilder, FALLBACK_ANSWER};
pub use monitor::{ConversationMonitor, ConversationSummary};
pub use selector::{
    match_agent_name, FnSelector, KeywordSelector, LlmSelector, RoundRobinSelector, SelectionInput,
    Selector, SpeakerSelector,
};
pub use termination::{StopReason, TerminationHandler};
pub use transcript::{Transcript, Turn};
