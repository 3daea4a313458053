//! 学科数据目录：大纲、学习资料、练习题
//!
//! 目录结构：
//! ```text
//! <data_path>/<subject>/syllabus.json
//! <data_path>/<subject>/materials/*.json
//! <data_path>/<subject>/quizzes/*.json
//! ```
//! 文件缺失时使用内置默认内容。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::DataError;

/// 支持的学科
pub const SUBJECTS: &[&str] = &[
    "math",
    "physics",
    "chemistry",
    "biology",
    "cs",
    "literature",
    "english",
];

const SUBJECT_SUBDIRS: &[&str] = &["materials", "quizzes", "audio", "video"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllabusModule {
    pub name: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub difficulty: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Syllabus {
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub modules: Vec<SyllabusModule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// 搜索结果中标注所属学科
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Material {
    fn matches(&self, query_lower: &str) -> bool {
        self.title.to_lowercase().contains(query_lower)
            || self.content.to_lowercase().contains(query_lower)
            || self
                .tags
                .iter()
                .any(|t| t.to_lowercase().contains(query_lower))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn module(name: &str, topics: &[&str], duration: &str, difficulty: &str) -> SyllabusModule {
    SyllabusModule {
        name: name.to_string(),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        duration: duration.to_string(),
        difficulty: difficulty.to_string(),
    }
}

/// 内置大纲
pub fn default_syllabus(subject: &str) -> Syllabus {
    match subject {
        "math" => Syllabus {
            subject: "Mathematics".to_string(),
            description: "Comprehensive mathematics curriculum".to_string(),
            modules: vec![
                module(
                    "Algebra",
                    &["Linear Equations", "Quadratic Equations", "Systems of Equations"],
                    "6 weeks",
                    "intermediate",
                ),
                module(
                    "Calculus",
                    &["Limits", "Derivatives", "Integrals", "Applications"],
                    "8 weeks",
                    "advanced",
                ),
            ],
        },
        "physics" => Syllabus {
            subject: "Physics".to_string(),
            description: "Fundamental physics concepts and applications".to_string(),
            modules: vec![
                module(
                    "Mechanics",
                    &["Kinematics", "Dynamics", "Work and Energy"],
                    "6 weeks",
                    "intermediate",
                ),
                module(
                    "Electromagnetism",
                    &["Electric Fields", "Magnetic Fields", "EM Waves"],
                    "6 weeks",
                    "advanced",
                ),
            ],
        },
        other => Syllabus {
            subject: title_case(other),
            description: format!("Curriculum for {other}"),
            modules: Vec::new(),
        },
    }
}

fn material(id: &str, title: &str, kind: &str, content: &str, difficulty: &str, tags: &[&str]) -> Material {
    Material {
        id: id.to_string(),
        title: title.to_string(),
        kind: kind.to_string(),
        content: content.to_string(),
        difficulty: difficulty.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        subject: None,
    }
}

/// 内置示例资料（目录为空时写入）
pub fn sample_materials(subject: &str) -> Vec<Material> {
    match subject {
        "math" => vec![
            material(
                "math_001",
                "Introduction to Linear Algebra",
                "document",
                "Basic concepts of linear algebra including vectors, matrices, and linear transformations.",
                "beginner",
                &["algebra", "linear", "vectors"],
            ),
            material(
                "math_002",
                "Calculus Problem Set 1",
                "exercise",
                "Practice problems on limits and continuity",
                "intermediate",
                &["calculus", "limits", "practice"],
            ),
        ],
        "physics" => vec![material(
            "phys_001",
            "Newton's Laws of Motion",
            "document",
            "Comprehensive guide to Newton's three laws of motion with examples",
            "beginner",
            &["mechanics", "forces", "motion"],
        )],
        other => vec![Material {
            id: format!("{other}_001"),
            title: format!("Introduction to {}", title_case(other)),
            kind: "document".to_string(),
            content: format!("Basic concepts in {other}"),
            difficulty: "beginner".to_string(),
            tags: vec![other.to_string()],
            subject: None,
        }],
    }
}

/// 没有练习题文件时返回的示例题
pub fn sample_quiz(subject: &str, topic: Option<&str>) -> Quiz {
    match subject {
        "math" => Quiz {
            id: "quiz_math_001".to_string(),
            subject: "math".to_string(),
            topic: topic.unwrap_or("algebra").to_string(),
            questions: vec![QuizQuestion {
                question: "Solve for x: 2x + 5 = 13".to_string(),
                kind: "multiple_choice".to_string(),
                options: ["x = 4", "x = 3", "x = 5", "x = 6"]
                    .iter()
                    .map(|o| o.to_string())
                    .collect(),
                correct_answer: 0,
                explanation: "2x + 5 = 13 → 2x = 8 → x = 4".to_string(),
            }],
        },
        other => Quiz {
            id: format!("quiz_{other}_001"),
            subject: other.to_string(),
            topic: topic.unwrap_or("general").to_string(),
            questions: Vec::new(),
        },
    }
}

/// 学科数据目录
#[derive(Debug, Clone)]
pub struct SubjectCatalog {
    base: PathBuf,
}

impl SubjectCatalog {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn subjects(&self) -> &'static [&'static str] {
        SUBJECTS
    }

    pub fn is_known(&self, subject: &str) -> bool {
        SUBJECTS.contains(&subject)
    }

    fn check(&self, subject: &str) -> Result<PathBuf, DataError> {
        if self.is_known(subject) {
            Ok(self.base.join(subject))
        } else {
            Err(DataError::UnknownSubject(subject.to_string()))
        }
    }

    /// 创建各学科目录；缺失的大纲与空的资料目录写入内置内容
    pub fn ensure_layout(&self) -> Result<(), DataError> {
        for subject in SUBJECTS {
            let dir = self.base.join(subject);
            for sub in SUBJECT_SUBDIRS {
                std::fs::create_dir_all(dir.join(sub))?;
            }
            let syllabus = dir.join("syllabus.json");
            if !syllabus.exists() {
                write_json(&syllabus, &default_syllabus(subject))?;
            }
            if json_files(&dir.join("materials"))?.is_empty() {
                for m in sample_materials(subject) {
                    self.save_material(subject, &m)?;
                }
            }
        }
        Ok(())
    }

    /// 读取大纲；文件不存在时返回内置大纲
    pub fn load_syllabus(&self, subject: &str) -> Result<Syllabus, DataError> {
        let path = self.check(subject)?.join("syllabus.json");
        if path.exists() {
            read_json(&path)
        } else {
            Ok(default_syllabus(subject))
        }
    }

    /// 读取资料，可按 type 过滤；无法解析的文件跳过
    pub fn load_materials(&self, subject: &str, kind: Option<&str>) -> Result<Vec<Material>, DataError> {
        let dir = self.check(subject)?.join("materials");
        let mut out = Vec::new();
        for path in json_files(&dir)? {
            match read_json::<Material>(&path) {
                Ok(m) if kind.map_or(true, |k| m.kind == k) => out.push(m),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "skipping material"),
            }
        }
        Ok(out)
    }

    /// 读取练习题，可按 topic 过滤；没有匹配时返回示例题
    pub fn load_quizzes(&self, subject: &str, topic: Option<&str>) -> Result<Vec<Quiz>, DataError> {
        let dir = self.check(subject)?.join("quizzes");
        let mut out = Vec::new();
        for path in json_files(&dir)? {
            match read_json::<Quiz>(&path) {
                Ok(q) if topic.map_or(true, |t| q.topic == t) => out.push(q),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "skipping quiz"),
            }
        }
        if out.is_empty() {
            out.push(sample_quiz(subject, topic));
        }
        Ok(out)
    }

    /// 在标题、正文、标签中做忽略大小写的搜索；subject 为空时搜索全部学科
    pub fn search_materials(&self, query: &str, subject: Option<&str>) -> Result<Vec<Material>, DataError> {
        let query = query.to_lowercase();
        let subjects: Vec<&str> = match subject {
            Some(s) => vec![s],
            None => SUBJECTS.to_vec(),
        };
        let mut results = Vec::new();
        for subj in subjects {
            for mut m in self.load_materials(subj, None)? {
                if m.matches(&query) {
                    m.subject = Some(subj.to_string());
                    results.push(m);
                }
            }
        }
        Ok(results)
    }

    /// 保存资料为 materials/material_{n}.json，n 取第一个未被占用的序号，不覆盖已有文件
    pub fn save_material(&self, subject: &str, material: &Material) -> Result<PathBuf, DataError> {
        let dir = self.check(subject)?.join("materials");
        std::fs::create_dir_all(&dir)?;
        let mut n = 1usize;
        let path = loop {
            let candidate = dir.join(format!("material_{n}.json"));
            if !candidate.exists() {
                break candidate;
            }
            n += 1;
        };
        write_json(&path, material)?;
        Ok(path)
    }
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, DataError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = format!("{}/*.json", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(Result::ok).collect();
    files.sort();
    Ok(files)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DataError> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| DataError::Json {
        path: path.display().to_string(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DataError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| DataError::Json {
        path: path.display().to_string(),
        source,
    })?;
    std::fs::write(path, text)?;
    Ok(())
}
