//! 辅导团队：内置的学科专家 + 信息检索 Agent，或从 TOML 文件加载
//!
//! config/agents.toml 示例：
//! ```toml
//! [[agents]]
//! name = "Math_Expert"
//! description = "Solves math problems step-by-step"
//! subject = "Mathematics"
//! expertise = ["Algebra", "Calculus"]
//! keywords = ["math", "equation"]
//! ```

use std::path::Path;

use serde::Deserialize;

use super::prompts::{build_subject_system_message, Personalization, INFO_AGENT_PROMPT};
use super::{Agent, AgentRegistry};
use crate::core::ConfigurationError;

struct ExpertDefinition {
    name: &'static str,
    subject: &'static str,
    expertise: &'static [&'static str],
    description: &'static str,
    keywords: &'static [&'static str],
}

const INFO_AGENT_DESCRIPTION: &str =
    "Curates curricula and learning materials; generates practice questions; routes resources.";

const INFO_AGENT_KEYWORDS: &[&str] = &[
    "material", "resource", "quiz", "syllabus", "document", "audio", "video",
];

const EXPERTS: &[ExpertDefinition] = &[
    ExpertDefinition {
        name: "CS_Expert",
        subject: "Computer Science",
        expertise: &[
            "Programming (Python, Java, C++, JavaScript)",
            "Data Structures (Arrays, Trees, Graphs, Hash Tables)",
            "Algorithms (Sorting, Searching, Dynamic Programming)",
            "Software Engineering (Design Patterns, Testing, Agile)",
            "Databases (SQL, NoSQL, Design)",
            "Operating Systems",
            "Computer Networks",
            "AI/ML",
            "Web Development",
        ],
        description: "Answers programming/CS questions; writes & debugs code; algorithms; systems; databases; networks.",
        keywords: &[
            "programming", "code", "algorithm", "data structure", "computer", "software", "debug",
            "lập trình", "thuật toán",
        ],
    },
    ExpertDefinition {
        name: "Math_Expert",
        subject: "Mathematics",
        expertise: &["Algebra", "Geometry", "Calculus", "Statistics", "Linear Algebra"],
        description: "Solves math problems step-by-step; proofs; functions; calculus; statistics.",
        keywords: &[
            "math", "calculus", "algebra", "geometry", "equation", "integral", "derivative",
            "phương trình", "toán",
        ],
    },
    ExpertDefinition {
        name: "English_Expert",
        subject: "English Language",
        expertise: &["Grammar", "Vocabulary", "Pronunciation", "IELTS/TOEFL", "Writing/Listening/Speaking"],
        description: "English language instruction: grammar, IELTS/TOEFL, pronunciation, writing feedback.",
        keywords: &[
            "english", "grammar", "vocabulary", "ielts", "toefl", "pronunciation", "speaking",
            "tiếng anh",
        ],
    },
    ExpertDefinition {
        name: "Biology_Expert",
        subject: "Biology",
        expertise: &["Cell biology", "Genetics", "Ecology", "Evolution", "Physiology"],
        description: "Explains biology: cells, genetics, ecology, evolution; clear analogies.",
        keywords: &[
            "biology", "cell", "dna", "evolution", "ecology", "organism", "genetics", "sinh học",
        ],
    },
    ExpertDefinition {
        name: "Physics_Expert",
        subject: "Physics",
        expertise: &["Mechanics", "Electricity & Magnetism", "Waves", "Thermodynamics", "Modern Physics"],
        description: "Solves physics problems; diagrams; derivations; unit analysis; conceptual clarity.",
        keywords: &[
            "physics", "force", "energy", "momentum", "quantum", "relativity", "mechanics", "vật lý",
        ],
    },
    ExpertDefinition {
        name: "Chemistry_Expert",
        subject: "Chemistry",
        expertise: &["Stoichiometry", "Thermochemistry", "Equilibrium", "Organic", "Inorganic", "Spectroscopy"],
        description: "Chemistry problem solving: equations, mechanisms, yields, structures, spectroscopic reasoning.",
        keywords: &[
            "chemistry", "chemical", "reaction", "molecule", "element", "compound", "acid", "hóa học",
        ],
    },
    ExpertDefinition {
        name: "Literature_Expert",
        subject: "Literature",
        expertise: &["Close reading", "Themes/Motifs", "Comparative analysis", "Essay guidance", "Literary devices"],
        description: "Analyzes literature; historical context; writing guidance; literary devices.",
        keywords: &[
            "literature", "essay", "poem", "story", "writing", "author", "analysis", "văn học",
        ],
    },
];

/// 内置辅导团队：Info_Agent 在前，随后是七位学科专家
pub fn default_team(personalization: &Personalization) -> Result<AgentRegistry, ConfigurationError> {
    let info = Agent::new("Info_Agent", INFO_AGENT_DESCRIPTION)
        .with_system_message(personalization.apply(INFO_AGENT_PROMPT))
        .with_keywords(INFO_AGENT_KEYWORDS.iter().copied());

    let experts = EXPERTS.iter().map(|e| {
        let msg = build_subject_system_message(e.subject, e.expertise, e.name);
        Agent::new(e.name, e.description)
            .with_system_message(personalization.apply(&msg))
            .with_keywords(e.keywords.iter().copied())
    });

    AgentRegistry::from_agents(std::iter::once(info).chain(experts))
}

/// 团队文件中的单个条目
#[derive(Debug, Clone, Deserialize)]
pub struct TeamEntry {
    pub name: String,
    pub description: String,
    /// 直接给出的系统消息；缺省时由 subject + expertise 套模板生成
    pub system_message: Option<String>,
    pub subject: Option<String>,
    #[serde(default)]
    pub expertise: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub model: Option<String>,
}

/// config/agents.toml
#[derive(Debug, Clone, Deserialize)]
pub struct TeamFile {
    #[serde(default)]
    pub agents: Vec<TeamEntry>,
}

impl TeamFile {
    pub fn parse(src: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(src).map_err(|e| ConfigurationError::InvalidSetting {
            key: "team_file".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn into_registry(
        self,
        personalization: &Personalization,
    ) -> Result<AgentRegistry, ConfigurationError> {
        if self.agents.is_empty() {
            return Err(ConfigurationError::NoAgents);
        }
        let agents = self.agents.into_iter().map(|e| {
            let base = match (e.system_message, e.subject) {
                (Some(msg), _) => msg,
                (None, Some(subject)) => {
                    let expertise: Vec<&str> = e.expertise.iter().map(String::as_str).collect();
                    build_subject_system_message(&subject, &expertise, &e.name)
                }
                (None, None) => format!("You are {}. {}", e.name, e.description),
            };
            let agent = Agent::new(e.name, e.description)
                .with_system_message(personalization.apply(&base))
                .with_keywords(e.keywords);
            match e.model {
                Some(m) if !m.trim().is_empty() => agent.with_model(m),
                _ => agent,
            }
        });
        AgentRegistry::from_agents(agents)
    }
}

/// 从 TOML 文件加载团队
pub fn load_team(
    path: &Path,
    personalization: &Personalization,
) -> Result<AgentRegistry, ConfigurationError> {
    let src = std::fs::read_to_string(path).map_err(|e| ConfigurationError::InvalidSetting {
        key: "team_file".to_string(),
        reason: format!("{}: {}", path.display(), e),
    })?;
    TeamFile::parse(&src)?.into_registry(personalization)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_team_members() {
        let team = default_team(&Personalization::default()).unwrap();
        assert_eq!(team.len(), 8);
        assert_eq!(team.agents()[0].name, "Info_Agent");
        for name in [
            "CS_Expert",
            "Math_Expert",
            "English_Expert",
            "Biology_Expert",
            "Physics_Expert",
            "Chemistry_Expert",
            "Literature_Expert",
        ] {
            let agent = team.get(name).unwrap();
            assert!(!agent.description.is_empty());
            assert!(!agent.keywords.is_empty());
            assert!(agent.system_message.contains("Always respond in vi."));
        }
    }

    #[test]
    fn test_team_file_parse() {
        let src = r#"
            [[agents]]
            name = "Math_Expert"
            description = "Solves math problems"
            subject = "Mathematics"
            expertise = ["Algebra"]
            keywords = ["math"]
            model = "math-model"

            [[agents]]
            name = "Helper"
            description = "General help"
        "#;
        let team = TeamFile::parse(src)
            .unwrap()
            .into_registry(&Personalization::default())
            .unwrap();
        assert_eq!(team.names(), vec!["Math_Expert", "Helper"]);
        let math = team.get("Math_Expert").unwrap();
        assert_eq!(math.model_id, "math-model");
        assert!(math.system_message.contains("expert in Mathematics"));
        assert!(team
            .get("Helper")
            .unwrap()
            .system_message
            .starts_with("You are Helper."));
    }

    #[test]
    fn test_team_file_duplicate_rejected() {
        let src = r#"
            [[agents]]
            name = "A"
            description = "a"
            [[agents]]
            name = "A"
            description = "again"
        "#;
        let err = TeamFile::parse(src)
            .unwrap()
            .into_registry(&Personalization::default())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateAgent(_)));
    }

    #[test]
    fn test_empty_team_file_is_no_agents() {
        let err = TeamFile::parse("")
            .unwrap()
            .into_registry(&Personalization::default())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::NoAgents));
    }

    #[test]
    fn test_load_team_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.toml");
        std::fs::write(&path, "[[agents]]\nname = \"Solo\"\ndescription = \"only one\"\n").unwrap();
        let team = load_team(&path, &Personalization::default()).unwrap();
        assert_eq!(team.names(), vec!["Solo"]);
        assert!(load_team(&dir.path().join("missing.toml"), &Personalization::default()).is_err());
    }
}
