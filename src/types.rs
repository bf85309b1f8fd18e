//! Data carried between pipeline stages.

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::prompts::PromptTemplate;

/// One rasterised PDF page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based position of the page in the document.
    pub index: usize,
    pub image: DynamicImage,
}

impl PageImage {
    pub fn new(index: usize, image: DynamicImage) -> Self {
        Self { index, image }
    }

    /// 1-based page number, for messages.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }
}

/// Ordered per-page extraction records for one résumé run.
///
/// Each record is the raw text the vision model returned for that page. It is
/// nominally JSON but is never parsed here. `records()[i]` always belongs to
/// page `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionBatch(Vec<String>);

impl ExtractionBatch {
    pub fn new(records: Vec<String>) -> Self {
        Self(records)
    }

    pub fn records(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Records concatenated with `separator`, in page order.
    pub fn joined(&self, separator: &str) -> String {
        self.0.join(separator)
    }

    /// The batch as a compact JSON array of strings, the on-disk format.
    pub fn to_json(&self) -> String {
        // A Vec<String> always serialises.
        serde_json::to_string(&self.0).unwrap_or_else(|_| String::from("[]"))
    }

    pub fn into_records(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for ExtractionBatch {
    fn from(records: Vec<String>) -> Self {
        Self(records)
    }
}

/// The persisted (batch, job description) pair of the latest completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateState {
    pub run_id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub batch: ExtractionBatch,
    pub job_description: String,
}

/// Result of [`crate::Pipeline::process_resume`].
#[derive(Debug, Clone)]
pub struct ProcessedResume {
    /// Rendered pages, handed back for display.
    pub pages: Vec<PageImage>,
    /// The state that was just persisted.
    pub state: IntermediateState,
}

/// Which artifact a generation stage produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    InterviewQuestions,
    SkillGap,
    CoverLetter,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [
        StageKind::InterviewQuestions,
        StageKind::SkillGap,
        StageKind::CoverLetter,
    ];

    /// The prompt template that drives this stage.
    pub fn template(self) -> PromptTemplate {
        match self {
            StageKind::InterviewQuestions => PromptTemplate::InterviewQuestions,
            StageKind::SkillGap => PromptTemplate::SkillGap,
            StageKind::CoverLetter => PromptTemplate::CoverLetter,
        }
    }

    /// Human-readable title of the artifact.
    pub fn title(self) -> &'static str {
        match self {
            StageKind::InterviewQuestions => "Interview Questions",
            StageKind::SkillGap => "Skill Gap Analysis",
            StageKind::CoverLetter => "Cover Letter",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageKind::InterviewQuestions => "interview-questions",
            StageKind::SkillGap => "skill-gap",
            StageKind::CoverLetter => "cover-letter",
        };
        f.write_str(s)
    }
}
