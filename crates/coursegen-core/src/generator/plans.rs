//! Fixed pass plans, one per document kind.

use crate::document::DocumentKind;

/// Countable units an outline enumerates (slides, exercises, questions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSpec {
    /// Plural noun used in prompts and in the `Total <label>: N` line.
    pub label: &'static str,
    pub min: u32,
    pub max: u32,
    /// Used when the outline states no count.
    pub default: u32,
}

impl UnitSpec {
    pub fn clamp(&self, n: u32) -> u32 {
        n.clamp(self.min, self.max)
    }
}

/// Structure pass parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineSpec {
    pub max_tokens: u32,
    pub temperature: f32,
    pub instructions: &'static str,
    pub units: Option<UnitSpec>,
}

/// What slice of the outline a content pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassScope {
    /// A named portion of the outline.
    Directive(&'static str),
    /// Contiguous share `part` (0-based) of `of` equal shares of the units.
    Units { part: usize, of: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassSpec {
    pub name: &'static str,
    pub max_tokens: u32,
    pub temperature: f32,
    pub scope: PassScope,
    /// Send a preview of the prior pass as request context.
    pub include_previous: bool,
}

impl PassSpec {
    fn units(name: &'static str, part: usize, of: usize, max_tokens: u32, temperature: f32) -> Self {
        Self {
            name,
            max_tokens,
            temperature,
            scope: PassScope::Units { part, of },
            include_previous: part > 0,
        }
    }

    fn directive(
        name: &'static str,
        directive: &'static str,
        max_tokens: u32,
        temperature: f32,
        include_previous: bool,
    ) -> Self {
        Self {
            name,
            max_tokens,
            temperature,
            scope: PassScope::Directive(directive),
            include_previous,
        }
    }
}

/// Outline plus ordered content passes for one document kind.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPlan {
    pub kind: DocumentKind,
    pub outline: OutlineSpec,
    pub passes: Vec<PassSpec>,
    /// Sibling documents whose text feeds the outline prompt.
    pub companions: &'static [DocumentKind],
}

const SLIDES: UnitSpec = UnitSpec {
    label: "slides",
    min: 30,
    max: 50,
    default: 40,
};

const EXERCISES: UnitSpec = UnitSpec {
    label: "exercises",
    min: 3,
    max: 5,
    default: 4,
};

const QUESTIONS: UnitSpec = UnitSpec {
    label: "questions",
    min: 10,
    max: 15,
    default: 12,
};

impl DocumentPlan {
    pub fn for_kind(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Slides => Self {
                kind,
                outline: OutlineSpec {
                    max_tokens: 2000,
                    temperature: 0.4,
                    instructions: "List every slide with its number, title, slide type \
                        (title, concept, code, diagram, comparison, exercise preview) and a \
                        one-line note on what the speaker covers.",
                    units: Some(SLIDES),
                },
                passes: vec![
                    PassSpec::units("slides-first-half", 0, 2, 8000, 0.7),
                    PassSpec::units("slides-second-half", 1, 2, 8000, 0.7),
                ],
                companions: &[],
            },
            DocumentKind::BookChapter => Self {
                kind,
                outline: OutlineSpec {
                    max_tokens: 3000,
                    temperature: 0.5,
                    instructions: "Outline the front matter (reading time, prerequisites, \
                        objectives), an introduction, three main parts with subsections and \
                        the code examples each needs, then a summary, a what's-next \
                        section and further reading.",
                    units: None,
                },
                passes: vec![
                    PassSpec::directive(
                        "front-matter",
                        "Write ONLY the front matter and the introduction.",
                        2000,
                        0.7,
                        false,
                    ),
                    PassSpec::directive(
                        "main-part-1",
                        "Write ONLY main part 1 of the outline, with complete code examples.",
                        8000,
                        0.7,
                        true,
                    ),
                    PassSpec::directive(
                        "main-part-2",
                        "Write ONLY main part 2 of the outline, with complete code examples.",
                        8000,
                        0.7,
                        true,
                    ),
                    PassSpec::directive(
                        "main-part-3",
                        "Write ONLY main part 3 of the outline, with complete code examples.",
                        8000,
                        0.7,
                        true,
                    ),
                    PassSpec::directive(
                        "summary",
                        "Write ONLY the chapter summary, the What's Next section and the \
                         Further Reading list.",
                        2000,
                        0.7,
                        true,
                    ),
                ],
                companions: &[],
            },
            DocumentKind::Exercises => Self {
                kind,
                outline: OutlineSpec {
                    max_tokens: 2000,
                    temperature: 0.5,
                    instructions: "For each exercise give its number and title, difficulty \
                        and estimated time, 3-4 learning goals, a part-by-part structure, \
                        4-5 success criteria and 3-5 common problems to troubleshoot.",
                    units: Some(EXERCISES),
                },
                passes: vec![
                    PassSpec::units("exercises-first-half", 0, 2, 8000, 0.7),
                    PassSpec::units("exercises-rest", 1, 2, 8000, 0.7),
                ],
                companions: &[],
            },
            DocumentKind::Qa => Self {
                kind,
                outline: OutlineSpec {
                    max_tokens: 1500,
                    temperature: 0.4,
                    instructions: "List the questions students most often ask about this \
                        chapter, each with its number, category and the key points of the \
                        answer.",
                    units: Some(QUESTIONS),
                },
                passes: vec![
                    PassSpec::units("qa-first-half", 0, 2, 6000, 0.7),
                    PassSpec::units("qa-rest", 1, 2, 6000, 0.7),
                ],
                companions: &[],
            },
            DocumentKind::Quiz => Self {
                kind,
                outline: OutlineSpec {
                    max_tokens: 1500,
                    temperature: 0.3,
                    instructions: "List every question with its number, type (multiple \
                        choice, true/false, short answer), difficulty and the learning \
                        objective it tests.",
                    units: Some(QUESTIONS),
                },
                passes: vec![
                    PassSpec::units("quiz-first-half", 0, 2, 6000, 0.7),
                    PassSpec::units("quiz-rest", 1, 2, 6000, 0.7),
                    PassSpec::directive(
                        "answer-key",
                        "Write ONLY the Answer Key covering every question and the Scoring \
                         Guide.",
                        3000,
                        0.5,
                        true,
                    ),
                ],
                companions: &[],
            },
            DocumentKind::Topics => Self {
                kind,
                outline: OutlineSpec {
                    max_tokens: 1000,
                    temperature: 0.4,
                    instructions: "Group the chapter's topics into themes and note the key \
                        terms and takeaways for each.",
                    units: None,
                },
                passes: vec![PassSpec::directive(
                    "summary",
                    "Write the complete topics summary: every theme with its key terms, \
                     takeaways and how it connects to the rest of the course.",
                    4000,
                    0.7,
                    false,
                )],
                companions: &[],
            },
            DocumentKind::InstructorKeys => Self {
                kind,
                outline: OutlineSpec {
                    max_tokens: 1500,
                    temperature: 0.2,
                    instructions: "List every exercise and quiz question that needs a \
                        solution, with the key grading points for each.",
                    units: None,
                },
                passes: vec![
                    PassSpec::directive(
                        "exercise-solutions",
                        "Write ONLY the complete exercise solutions with full working code \
                         and the reasoning behind each step.",
                        8000,
                        0.3,
                        false,
                    ),
                    PassSpec::directive(
                        "quiz-key",
                        "Write ONLY the quiz answer key with explanations, the grading \
                         guidelines and extension ideas for advanced students.",
                        8000,
                        0.3,
                        true,
                    ),
                ],
                companions: &[DocumentKind::Exercises, DocumentKind::Quiz],
            },
        }
    }
}
