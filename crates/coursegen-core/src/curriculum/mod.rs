//! Curriculum configuration: chapters plus shared domain vocabulary.
//!
//! Loaded once per run from `curriculum.json` and never mutated afterwards.
//! Field names accept both snake_case and the camelCase spelling used by
//! hand-written curriculum files (`learningObjectives`, `topicsLearned`).

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Sentence used as previous-chapter context for chapter 1.
pub const FIRST_CHAPTER_CONTEXT: &str =
    "This is the first chapter - no previous content to reference.";

/// Sentence used as next-chapter preview for the last chapter.
pub const FINAL_CHAPTER_PREVIEW: &str = "This is the final chapter.";

/// One chapter of the curriculum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub part: String,
    #[serde(default, alias = "learningObjectives")]
    pub learning_objectives: Vec<String>,
    #[serde(default, alias = "topicsLearned")]
    pub topics: Vec<String>,
}

/// Vocabulary shared by every generated document so examples stay
/// consistent across chapters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainContext {
    #[serde(default)]
    pub technology: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub scenarios: Vec<String>,
}

impl DomainContext {
    /// Prompt block asking generated examples to reuse this vocabulary.
    /// Empty when the curriculum defines no domain.
    pub fn grounding_block(&self) -> String {
        if self.technology.is_empty() && self.entities.is_empty() && self.scenarios.is_empty() {
            return String::new();
        }
        let mut out = String::from("## Domain Context\n\nGround every example in this shared domain.\n");
        let mut section = |label: &str, items: &[String]| {
            if !items.is_empty() {
                out.push_str(&format!("\n**{label}:** {}\n", items.join(", ")));
            }
        };
        section("Technology", &self.technology);
        section("Entities", &self.entities);
        section("Scenarios", &self.scenarios);
        out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CurriculumError {
    #[error("failed to read curriculum {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid curriculum JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("curriculum has no chapters")]
    Empty,

    #[error("duplicate chapter number {0}")]
    DuplicateChapter(u32),

    #[error("chapter numbers must run 1..={expected_last} without gaps (missing {missing})")]
    Gap { missing: u32, expected_last: u32 },

    #[error("chapter {0} not found in curriculum")]
    ChapterNotFound(u32),
}

/// Ordered chapters plus shared domain context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Curriculum {
    #[serde(default)]
    pub title: String,
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub domain: DomainContext,
}

impl Curriculum {
    /// Parse and validate curriculum JSON. Chapters are sorted by number.
    pub fn from_json(json: &str) -> Result<Self, CurriculumError> {
        let mut curriculum: Curriculum = serde_json::from_str(json)?;
        curriculum.validate()?;
        curriculum.chapters.sort_by_key(|c| c.number);
        Ok(curriculum)
    }

    pub fn load(path: &Path) -> Result<Self, CurriculumError> {
        let json = std::fs::read_to_string(path).map_err(|source| CurriculumError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let curriculum = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            chapters = curriculum.chapters.len(),
            "curriculum loaded"
        );
        Ok(curriculum)
    }

    fn validate(&self) -> Result<(), CurriculumError> {
        if self.chapters.is_empty() {
            return Err(CurriculumError::Empty);
        }
        let mut seen = HashSet::new();
        for ch in &self.chapters {
            if !seen.insert(ch.number) {
                return Err(CurriculumError::DuplicateChapter(ch.number));
            }
        }
        let expected_last = self.chapters.len() as u32;
        if let Some(missing) = (1..=expected_last).find(|n| !seen.contains(n)) {
            return Err(CurriculumError::Gap {
                missing,
                expected_last,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn chapter(&self, number: u32) -> Result<&Chapter, CurriculumError> {
        self.chapters
            .iter()
            .find(|c| c.number == number)
            .ok_or(CurriculumError::ChapterNotFound(number))
    }

    /// What the learner saw in the chapter before `number`.
    pub fn previous_context(&self, number: u32) -> String {
        match number.checked_sub(1).and_then(|n| self.chapter(n).ok()) {
            Some(prev) => {
                let topics: Vec<&str> = prev.topics.iter().take(5).map(String::as_str).collect();
                if topics.is_empty() {
                    format!("Previous chapter: {}", prev.title)
                } else {
                    format!(
                        "Previous chapter: {} (covered: {})",
                        prev.title,
                        topics.join(", ")
                    )
                }
            }
            None => FIRST_CHAPTER_CONTEXT.to_string(),
        }
    }

    /// What comes after chapter `number`.
    pub fn next_preview(&self, number: u32) -> String {
        match self.chapter(number + 1) {
            Ok(next) => format!("Next chapter: {}", next.title),
            Err(_) => FINAL_CHAPTER_PREVIEW.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "title": "Full-Stack Foundations",
        "chapters": [
            {"number": 2, "title": "Routing", "part": "Basics",
             "learningObjectives": ["Define routes"], "topicsLearned": ["paths"]},
            {"number": 1, "title": "Intro", "part": "Basics",
             "learning_objectives": ["Explain X"],
             "topics": ["X basics", "a", "b", "c", "d", "e"]}
        ],
        "domain": {"technology": ["TypeScript"], "entities": ["Order", "Part"]}
    }"#;

    #[test]
    fn parses_both_field_spellings_and_sorts() {
        let c = Curriculum::from_json(SAMPLE).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.chapters[0].number, 1);
        assert_eq!(c.chapters[0].learning_objectives, vec!["Explain X"]);
        assert_eq!(c.chapters[1].learning_objectives, vec!["Define routes"]);
        assert_eq!(c.chapters[1].topics, vec!["paths"]);
        assert_eq!(c.domain.entities, vec!["Order", "Part"]);
    }

    #[test]
    fn rejects_gaps_and_duplicates() {
        let gap = r#"{"chapters": [{"number": 1, "title": "a"}, {"number": 3, "title": "c"}]}"#;
        assert!(matches!(
            Curriculum::from_json(gap),
            Err(CurriculumError::Gap { missing: 2, expected_last: 2 })
        ));

        let dup = r#"{"chapters": [{"number": 1, "title": "a"}, {"number": 1, "title": "b"}]}"#;
        assert!(matches!(
            Curriculum::from_json(dup),
            Err(CurriculumError::DuplicateChapter(1))
        ));

        assert!(matches!(
            Curriculum::from_json(r#"{"chapters": []}"#),
            Err(CurriculumError::Empty)
        ));
    }

    #[test]
    fn first_and_last_chapter_context() {
        let c = Curriculum::from_json(SAMPLE).unwrap();
        assert_eq!(c.previous_context(1), FIRST_CHAPTER_CONTEXT);
        assert_eq!(c.next_preview(2), FINAL_CHAPTER_PREVIEW);
        assert_eq!(c.next_preview(1), "Next chapter: Routing");
    }

    #[test]
    fn previous_context_lists_at_most_five_topics() {
        let json = r#"{"chapters": [
            {"number": 1, "title": "Intro", "topics": ["t1","t2","t3","t4","t5","t6"]},
            {"number": 2, "title": "Next"}
        ]}"#;
        let c = Curriculum::from_json(json).unwrap();
        assert_eq!(
            c.previous_context(2),
            "Previous chapter: Intro (covered: t1, t2, t3, t4, t5)"
        );
    }

    #[test]
    fn unknown_chapter_is_an_error() {
        let c = Curriculum::from_json(SAMPLE).unwrap();
        assert!(matches!(c.chapter(9), Err(CurriculumError::ChapterNotFound(9))));
    }

    #[test]
    fn grounding_block_lists_only_present_sections() {
        let c = Curriculum::from_json(SAMPLE).unwrap();
        let block = c.domain.grounding_block();
        assert!(block.contains("**Technology:** TypeScript"));
        assert!(block.contains("**Entities:** Order, Part"));
        assert!(!block.contains("Scenarios"));
        assert!(DomainContext::default().grounding_block().is_empty());
    }
}
