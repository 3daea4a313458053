//! 对话监控：轮数、各 Agent 发言次数、涉及话题、问题与答案摘录

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::transcript::Turn;
use crate::llm::Role;

const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("mathematics", &["math", "equation", "algebra", "calculus"]),
    ("physics", &["physics", "force", "energy", "momentum"]),
    ("chemistry", &["chemistry", "reaction", "element", "compound"]),
    ("biology", &["biology", "cell", "dna", "evolution"]),
    ("programming", &["code", "algorithm", "programming", "function"]),
    ("literature", &["essay", "poem", "writing", "analysis"]),
    ("english", &["grammar", "vocabulary", "pronunciation"]),
];

const ANSWER_MARKERS: &[&str] = &["answer", "solution", "result"];

const EXCERPT_CHARS: usize = 100;

/// 对话摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub total_turns: usize,
    pub topics_discussed: Vec<String>,
    pub agents_participated: Vec<String>,
    /// 发言占比（百分比，保留两位小数）
    pub participation_rate: BTreeMap<String, f64>,
    pub questions_asked: usize,
    pub answers_provided: usize,
}

#[derive(Debug, Default)]
pub struct ConversationMonitor {
    turn_count: usize,
    agent_contributions: BTreeMap<String, usize>,
    topics: BTreeSet<String>,
    questions: Vec<String>,
    answers: Vec<String>,
}

fn excerpt(content: &str) -> String {
    content.chars().take(EXCERPT_CHARS).collect()
}

impl ConversationMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, turn: &Turn) {
        self.turn_count += 1;
        if turn.role == Role::Assistant {
            *self
                .agent_contributions
                .entry(turn.speaker.clone())
                .or_insert(0) += 1;
        }

        let lower = turn.content.to_lowercase();
        for (topic, words) in TOPIC_KEYWORDS {
            if words.iter().any(|w| lower.contains(w)) {
                self.topics.insert((*topic).to_string());
            }
        }

        // 含问号的发言只算提问
        if turn.content.contains('?') {
            self.questions.push(excerpt(&turn.content));
        } else if ANSWER_MARKERS.iter().any(|m| lower.contains(m)) {
            self.answers.push(excerpt(&turn.content));
        }
    }

    pub fn turn_count(&self) -> usize {
        self.turn_count
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub fn summary(&self) -> ConversationSummary {
        let total = self.turn_count.max(1) as f64;
        let participation_rate = self
            .agent_contributions
            .iter()
            .map(|(name, count)| {
                let pct = (*count as f64 / total * 100.0 * 100.0).round() / 100.0;
                (name.clone(), pct)
            })
            .collect();

        ConversationSummary {
            total_turns: self.turn_count,
            topics_discussed: self.topics.iter().cloned().collect(),
            agents_participated: self.agent_contributions.keys().cloned().collect(),
            participation_rate,
            questions_asked: self.questions.len(),
            answers_provided: self.answers.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Transcript;

    #[test]
    fn test_summary_counts() {
        let mut t = Transcript::new();
        t.push_user("student", "How do I solve this equation?");
        t.push_agent("Math_Expert", "The solution is x = 2");
        t.push_agent("Info_Agent", "Here is a quiz on algebra");

        let mut m = ConversationMonitor::new();
        for turn in t.turns() {
            m.record(turn);
        }
        let s = m.summary();
        assert_eq!(s.total_turns, 3);
        assert_eq!(s.topics_discussed, vec!["mathematics"]);
        assert_eq!(s.agents_participated, vec!["Info_Agent", "Math_Expert"]);
        assert_eq!(s.participation_rate["Math_Expert"], 33.33);
        assert_eq!(s.questions_asked, 1);
        assert_eq!(s.answers_provided, 1);
    }

    #[test]
    fn test_topics_and_exclusive_question_answer() {
        let mut t = Transcript::new();
        t.push_user("student", "I need help with math and physics homework");
        t.push_user("student", "What is the answer?");
        let mut m = ConversationMonitor::new();
        for turn in t.turns() {
            m.record(turn);
        }
        let s = m.summary();
        assert_eq!(s.topics_discussed, vec!["mathematics", "physics"]);
        assert_eq!(s.questions_asked, 1);
        assert_eq!(s.answers_provided, 0);
    }

    #[test]
    fn test_excerpt_truncates() {
        let mut t = Transcript::new();
        t.push_user("student", format!("{}?", "á".repeat(150)));
        let mut m = ConversationMonitor::new();
        m.record(&t.turns()[0]);
        assert_eq!(m.questions()[0].chars().count(), 100);
    }

    #[test]
    fn test_empty_summary() {
        let s = ConversationMonitor::new().summary();
        assert_eq!(s.total_turns, 0);
        assert!(s.participation_rate.is_empty());
    }
}
