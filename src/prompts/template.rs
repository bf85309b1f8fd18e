//! Named-placeholder rendering for generation prompts.
//!
//! Exactly two values can be injected: `job_description` and `json_data`.
//!
//! ```text
//! {{ job_description }}   →  the job description text
//! {{ json_data }}         →  the persisted batch as a JSON array
//! {{{{  /  }}}}           →  literal "{{" / "}}"
//! ```
//!
//! Substitution is a single left-to-right pass, so braces or placeholder
//! names inside a substituted value are emitted verbatim and never expanded.
//!
//! Templates written for the older format use the bare words
//! `job_description` and `json_data` as tokens. When a template contains no
//! `{{ … }}` placeholder at all, those bare words (whole words only) are
//! substituted instead, in the same single pass. The `{{{{`/`}}}}` escapes
//! apply to both formats.

use crate::error::PipelineError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

const JOB_DESCRIPTION: &str = "job_description";
const JSON_DATA: &str = "json_data";

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\{\{|\}\}\}\}|\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap()
});

static RE_LEGACY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\{\{|\}\}\}\}|\b(job_description|json_data)\b").unwrap()
});

/// Values injected into a generation template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateValues<'a> {
    pub job_description: &'a str,
    pub json_data: &'a str,
}

impl<'a> TemplateValues<'a> {
    fn get(&self, name: &str) -> Option<&'a str> {
        match name {
            JOB_DESCRIPTION => Some(self.job_description),
            JSON_DATA => Some(self.json_data),
            _ => None,
        }
    }
}

/// Render `template` with `values`.
///
/// `name` identifies the template in errors and warnings. An unknown
/// placeholder name is a [`PipelineError::Template`]. A template that never
/// references one of the two values still renders; the omission is logged.
pub fn render(
    name: &str,
    template: &str,
    values: &TemplateValues<'_>,
) -> Result<String, PipelineError> {
    let has_named = RE_PLACEHOLDER
        .captures_iter(template)
        .any(|caps| caps.get(1).is_some());

    let (rendered, seen) = if has_named {
        render_named(name, template, values)?
    } else {
        render_legacy(template, values)
    };

    for (placeholder, used) in [(JOB_DESCRIPTION, seen.0), (JSON_DATA, seen.1)] {
        if !used {
            warn!(
                "Prompt template '{}' has no '{}' placeholder; value not injected",
                name, placeholder
            );
        }
    }

    Ok(rendered)
}

type Seen = (bool, bool);

fn mark(seen: &mut Seen, placeholder: &str) {
    match placeholder {
        JOB_DESCRIPTION => seen.0 = true,
        JSON_DATA => seen.1 = true,
        _ => {}
    }
}

fn render_named(
    name: &str,
    template: &str,
    values: &TemplateValues<'_>,
) -> Result<(String, Seen), PipelineError> {
    let mut out = String::with_capacity(
        template.len() + values.job_description.len() + values.json_data.len(),
    );
    let mut seen = (false, false);
    let mut last = 0;

    for caps in RE_PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&template[last..whole.start()]);

        match caps.get(1).map(|m| m.as_str()) {
            Some(placeholder) => {
                let value = values.get(placeholder).ok_or_else(|| PipelineError::Template {
                    name: name.to_string(),
                    detail: format!(
                        "unknown placeholder '{{{{{placeholder}}}}}'; only '{JOB_DESCRIPTION}' and '{JSON_DATA}' are available"
                    ),
                })?;
                out.push_str(value);
                mark(&mut seen, placeholder);
            }
            None if whole.as_str() == "{{{{" => out.push_str("{{"),
            None => out.push_str("}}"),
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);

    Ok((out, seen))
}

fn render_legacy(template: &str, values: &TemplateValues<'_>) -> (String, Seen) {
    let mut seen = (false, false);
    let rendered = RE_LEGACY_TOKEN
        .replace_all(template, |caps: &Captures<'_>| match caps.get(1) {
            Some(token) => {
                mark(&mut seen, token.as_str());
                values.get(token.as_str()).unwrap_or_default().to_string()
            }
            None if &caps[0] == "{{{{" => "{{".to_string(),
            None => "}}".to_string(),
        })
        .into_owned();
    (rendered, seen)
}
