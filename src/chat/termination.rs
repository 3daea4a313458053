//! 终止判定：显式终止标记、轮数上限、“已解决且已确认”启发式

use regex::{Regex, RegexBuilder};

use super::transcript::Turn;

const TERMINATION_PATTERNS: &[&str] = &[
    r"TERMINATE",
    r"Task completed",
    r"Problem solved",
    r"Query answered",
    r"No further assistance needed",
];

const SOLUTION_INDICATORS: &[&str] = &[
    "answer is",
    "solution is",
    "the result is",
    "therefore",
    "in conclusion",
    "final answer",
    "correct answer",
];

const ACKNOWLEDGMENTS: &[&str] = &[
    "thank you",
    "thanks",
    "that's correct",
    "perfect",
    "great",
    "understood",
    "i see",
    "makes sense",
];

/// 群聊为何结束
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// 消息中出现终止标记
    Terminated,
    MaxRounds,
    /// 答案已给出且得到确认
    Solved,
    /// 选择器没有选出 Agent
    NoSpeaker,
}

pub struct TerminationHandler {
    termination_msg: String,
    max_rounds: usize,
    current_round: usize,
    patterns: Vec<Regex>,
}

impl TerminationHandler {
    pub fn new(termination_msg: impl Into<String>, max_rounds: usize) -> Self {
        let patterns = TERMINATION_PATTERNS
            .iter()
            .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
            .collect();
        Self {
            termination_msg: termination_msg.into(),
            max_rounds,
            current_round: 0,
            patterns,
        }
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn current_round(&self) -> usize {
        self.current_round
    }

    /// 消息是否包含终止标记
    pub fn is_termination_msg(&self, content: &str) -> bool {
        if !self.termination_msg.is_empty() && content.contains(&self.termination_msg) {
            return true;
        }
        self.patterns.iter().any(|re| re.is_match(content))
    }

    /// 计一轮；达到上限时返回 true
    pub fn check_max_rounds(&mut self) -> bool {
        self.current_round += 1;
        self.current_round >= self.max_rounds
    }

    /// 最近 3 条中出现答案性表述，且最后一条是确认
    pub fn is_problem_solved(&self, turns: &[Turn]) -> bool {
        if turns.len() < 2 {
            return false;
        }
        let recent = &turns[turns.len().saturating_sub(3)..];
        let has_solution = recent.iter().any(|t| {
            let lower = t.content.to_lowercase();
            SOLUTION_INDICATORS.iter().any(|s| lower.contains(s))
        });
        let last = turns[turns.len() - 1].content.to_lowercase();
        has_solution && ACKNOWLEDGMENTS.iter().any(|a| last.contains(a))
    }

    /// 综合判定最新一条消息之后是否应结束
    pub fn should_stop(&mut self, turns: &[Turn]) -> Option<StopReason> {
        if let Some(last) = turns.last() {
            if self.is_termination_msg(&last.content) {
                return Some(StopReason::Terminated);
            }
        }
        if self.is_problem_solved(turns) {
            return Some(StopReason::Solved);
        }
        if self.check_max_rounds() {
            return Some(StopReason::MaxRounds);
        }
        None
    }

    pub fn reset(&mut self) {
        self.current_round = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Transcript;

    #[test]
    fn test_termination_markers() {
        let h = TerminationHandler::new("KẾT THÚC", 10);
        assert!(h.is_termination_msg("x = 2. KẾT THÚC"));
        assert!(h.is_termination_msg("done, terminate"));
        assert!(h.is_termination_msg("Problem SOLVED."));
        assert!(h.is_termination_msg("No further assistance needed"));
        assert!(!h.is_termination_msg("let me continue"));
    }

    #[test]
    fn test_max_rounds_and_reset() {
        let mut h = TerminationHandler::new("TERMINATE", 3);
        assert!(!h.check_max_rounds());
        assert!(!h.check_max_rounds());
        assert!(h.check_max_rounds());
        assert_eq!(h.current_round(), 3);
        h.reset();
        assert_eq!(h.current_round(), 0);
        assert!(!h.check_max_rounds());
    }

    #[test]
    fn test_problem_solved_needs_acknowledgment() {
        let h = TerminationHandler::new("TERMINATE", 10);
        let mut t = Transcript::new();
        t.push_user("student", "what is 2+2?");
        assert!(!h.is_problem_solved(t.turns()));
        t.push_agent("Math_Expert", "The answer is 4");
        assert!(!h.is_problem_solved(t.turns()));
        t.push_user("student", "Thanks, that makes sense");
        assert!(h.is_problem_solved(t.turns()));
    }

    #[test]
    fn test_solution_outside_window_ignored() {
        let h = TerminationHandler::new("TERMINATE", 10);
        let mut t = Transcript::new();
        t.push_agent("Math_Expert", "The answer is 4");
        t.push_agent("Info_Agent", "see chapter 2");
        t.push_agent("Physics_Expert", "also relevant");
        t.push_user("student", "thanks");
        assert!(!h.is_problem_solved(t.turns()));
    }

    #[test]
    fn test_should_stop_order() {
        let mut h = TerminationHandler::new("TERMINATE", 2);
        let mut t = Transcript::new();
        t.push_user("student", "q");
        t.push_agent("Math_Expert", "working");
        assert_eq!(h.should_stop(t.turns()), None);
        t.push_agent("Math_Expert", "x = 1 TERMINATE");
        assert_eq!(h.should_stop(t.turns()), Some(StopReason::Terminated));
        t.push_agent("Info_Agent", "more");
        assert_eq!(h.should_stop(t.turns()), Some(StopReason::MaxRounds));
    }
}
