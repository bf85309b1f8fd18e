//! Prompt templates: named files in a prompt directory.
//!
//! Four templates drive the pipeline. The extraction template is sent with
//! every page image; the three generation templates are combined with the
//! persisted résumé data and job description.
//!
//! Templates are read from disk on every use, so editing a file takes effect
//! on the next run without restarting. The built-in defaults below are only
//! written out by [`PromptStore::write_defaults`]; they are never substituted
//! silently for a missing file.

pub mod template;

use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use template::{render, TemplateValues};

/// The four named prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptTemplate {
    /// Sent with each page image to extract structured résumé data.
    Extraction,
    InterviewQuestions,
    SkillGap,
    CoverLetter,
}

impl PromptTemplate {
    pub const ALL: [PromptTemplate; 4] = [
        PromptTemplate::Extraction,
        PromptTemplate::InterviewQuestions,
        PromptTemplate::SkillGap,
        PromptTemplate::CoverLetter,
    ];

    /// File name inside the prompt directory.
    pub fn file_name(self) -> &'static str {
        match self {
            PromptTemplate::Extraction => "resume_parsing_prompt.txt",
            PromptTemplate::InterviewQuestions => "interview_questions_prompt.txt",
            PromptTemplate::SkillGap => "skills_gap_prompt.txt",
            PromptTemplate::CoverLetter => "cover_letter_prompt.txt",
        }
    }

    /// Built-in text used by [`PromptStore::write_defaults`].
    pub fn default_text(self) -> &'static str {
        match self {
            PromptTemplate::Extraction => DEFAULT_EXTRACTION_PROMPT,
            PromptTemplate::InterviewQuestions => DEFAULT_INTERVIEW_QUESTIONS_PROMPT,
            PromptTemplate::SkillGap => DEFAULT_SKILL_GAP_PROMPT,
            PromptTemplate::CoverLetter => DEFAULT_COVER_LETTER_PROMPT,
        }
    }
}

/// Loads prompt templates from a directory.
#[derive(Debug, Clone)]
pub struct PromptStore {
    dir: PathBuf,
}

impl PromptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, template: PromptTemplate) -> PathBuf {
        self.dir.join(template.file_name())
    }

    /// Read a template as UTF-8 text.
    ///
    /// A missing file, unreadable file or invalid UTF-8 is a
    /// [`PipelineError::PromptLoad`].
    pub async fn load(&self, template: PromptTemplate) -> Result<String, PipelineError> {
        let path = self.path_of(template);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PipelineError::PromptLoad {
                name: template.file_name().to_string(),
                path: path.clone(),
                source,
            })?;
        debug!("Loaded prompt {} ({} bytes)", path.display(), text.len());
        Ok(text)
    }

    /// Write the built-in templates into the prompt directory.
    ///
    /// Existing files are kept unless `overwrite` is set. Returns the paths
    /// that were written.
    pub async fn write_defaults(&self, overwrite: bool) -> Result<Vec<PathBuf>, PipelineError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PipelineError::Storage {
                path: self.dir.clone(),
                source,
            })?;

        let mut written = Vec::new();
        for template in PromptTemplate::ALL {
            let path = self.path_of(template);
            let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
            if exists && !overwrite {
                debug!("Keeping existing prompt {}", path.display());
                continue;
            }
            tokio::fs::write(&path, template.default_text().as_bytes())
                .await
                .map_err(|source| PipelineError::Storage {
                    path: path.clone(),
                    source,
                })?;
            info!("Wrote prompt template {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

/// Default per-page extraction prompt.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are an expert résumé parser. The image is one page of a candidate's résumé.

Extract every piece of information visible on this page and return it as a single JSON object with these keys (omit keys that do not appear on the page):

- "name": full name of the candidate
- "contact": { "email", "phone", "location", "links": [ ... ] }
- "summary": professional summary or objective
- "experience": [ { "title", "company", "location", "start", "end", "highlights": [ ... ] } ]
- "education": [ { "degree", "institution", "start", "end", "details" } ]
- "skills": [ ... ]
- "certifications": [ ... ]
- "projects": [ { "name", "description", "technologies": [ ... ] } ]
- "languages": [ ... ]

Rules:
- Copy text faithfully; do not invent information.
- Keep dates exactly as written.
- Output ONLY the JSON object, with no commentary."#;

/// Default interview-questions prompt. The résumé data is appended after it.
pub const DEFAULT_INTERVIEW_QUESTIONS_PROMPT: &str = r#"You are an experienced technical interviewer. Based on the candidate's résumé data below, write 10 interview questions.

Mix questions that probe the candidate's stated experience, questions that test depth in their listed skills, and two behavioural questions. For each question add one line describing what a strong answer would cover.

Résumé data:
"#;

/// Default skill-gap prompt.
pub const DEFAULT_SKILL_GAP_PROMPT: &str = r#"You are a career coach. Compare the candidate's résumé with the job description and produce a skill-gap analysis.

Job description:
{{ job_description }}

Résumé data (JSON, one entry per page):
{{ json_data }}

Structure the answer as:
1. Skills and experience that match the role
2. Missing or weak skills, ordered by importance for the role
3. Concrete steps (courses, projects, certifications) to close each gap"#;

/// Default cover-letter prompt.
pub const DEFAULT_COVER_LETTER_PROMPT: &str = r#"You are a professional writer. Write a one-page cover letter for the candidate applying to the role below.

Job description:
{{ job_description }}

Résumé data (JSON, one entry per page):
{{ json_data }}

Use only facts present in the résumé data. Keep a confident, specific tone, connect two or three achievements to the requirements of the role, and end with a short call to action."#;
