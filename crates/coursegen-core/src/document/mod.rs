//! Document kinds and assembly of pass outputs into one document.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Visible separator placed between pass outputs and before appended
/// sections.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

const HEADER_RULE: &str = "# =====================================================";

/// The seven per-chapter curriculum artifacts, in generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Slides,
    BookChapter,
    Exercises,
    Qa,
    Quiz,
    Topics,
    InstructorKeys,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 7] = [
        DocumentKind::Slides,
        DocumentKind::BookChapter,
        DocumentKind::Exercises,
        DocumentKind::Qa,
        DocumentKind::Quiz,
        DocumentKind::Topics,
        DocumentKind::InstructorKeys,
    ];

    /// File name inside the chapter directory.
    pub fn file_name(self) -> &'static str {
        match self {
            DocumentKind::Slides => "powerpoint.txt",
            DocumentKind::BookChapter => "book-chapter.txt",
            DocumentKind::Exercises => "exercises.txt",
            DocumentKind::Qa => "qa.txt",
            DocumentKind::Quiz => "quiz.txt",
            DocumentKind::Topics => "topics.txt",
            DocumentKind::InstructorKeys => "instructor-keys.txt",
        }
    }

    /// Title used in the document header and in prompts.
    pub fn title(self) -> &'static str {
        match self {
            DocumentKind::Slides => "PowerPoint Outline",
            DocumentKind::BookChapter => "Book Chapter",
            DocumentKind::Exercises => "Hands-On Exercises",
            DocumentKind::Qa => "Q&A Session",
            DocumentKind::Quiz => "Quiz",
            DocumentKind::Topics => "Topics Summary",
            DocumentKind::InstructorKeys => "Instructor Answer Keys",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Slides => "slides",
            DocumentKind::BookChapter => "book-chapter",
            DocumentKind::Exercises => "exercises",
            DocumentKind::Qa => "qa",
            DocumentKind::Quiz => "quiz",
            DocumentKind::Topics => "topics",
            DocumentKind::InstructorKeys => "instructor-keys",
        }
    }

    pub fn is_confidential(self) -> bool {
        self == DocumentKind::InstructorKeys
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.file_name() == name)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s || k.file_name() == s)
            .ok_or_else(|| format!("unknown document kind: {s}"))
    }
}

/// A fully assembled document ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub kind: DocumentKind,
    pub chapter_number: u32,
    pub chapter_title: String,
    pub generated_at: DateTime<Utc>,
    /// Pass outputs in order.
    pub sections: Vec<String>,
}

impl Document {
    pub fn header(&self) -> String {
        let mut header = format!(
            "# {} - Chapter {}\n# {}\n",
            self.kind.title(),
            self.chapter_number,
            self.chapter_title
        );
        if self.kind.is_confidential() {
            header.push_str("# CONFIDENTIAL - For Instructor Use Only\n");
        }
        header.push_str(&format!(
            "# Generated: {}\n{HEADER_RULE}\n\n",
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        header
    }

    /// Header followed by the sections joined with [`SECTION_SEPARATOR`].
    pub fn render(&self) -> String {
        let body: Vec<&str> = self.sections.iter().map(|s| s.trim()).collect();
        format!("{}{}\n", self.header(), body.join(SECTION_SEPARATOR))
    }
}

/// Number of literal `...` markers in `text`.
pub fn count_ellipses(text: &str) -> usize {
    text.matches("...").count()
}
