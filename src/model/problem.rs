//! Problem, problem step, and problem set definitions plus normalization.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GrindError;
use crate::instructions::{build_instructions, DocRenderer};

/// Earliest acceptable creation time for problems and problem sets.
#[must_use]
pub fn beginning_of_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Top-level step directories whose files only get newline normalization.
///
/// These hold input/output fixtures and documentation, where trailing
/// spaces can be significant.
pub const RAW_STEP_DIRECTORIES: [&str; 3] = ["in", "out", "_doc"];

/// A versioned exercise definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    /// Storage identity (0 before first insert).
    #[serde(default)]
    pub id: i64,
    /// Stable, URL-safe key chosen by the author.
    pub unique: String,
    /// Short description.
    pub note: String,
    /// Opaque problem type tag resolved by the grading subsystem.
    pub problem_type: String,
    /// Tags, kept sorted by [`Problem::normalize`].
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form options, in author order.
    #[serde(default)]
    pub options: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// A single one-based step of a problem.
///
/// Files in the root directory of `files` are added to the student's
/// working directory; subdirectory contents replace those of earlier steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemStep {
    /// Owning problem.
    #[serde(rename = "problemID", default)]
    pub problem_id: i64,
    /// One-based step number.
    #[serde(default)]
    pub step: i64,
    /// Short description of the step.
    pub note: String,
    /// HTML instructions built from the `_doc/` files.
    #[serde(default)]
    pub instructions: String,
    /// Grading weight; non-positive values default to 1.0.
    #[serde(default)]
    pub weight: f64,
    /// Relative path to file contents.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

/// A named collection of problems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemSet {
    /// Storage identity.
    #[serde(default)]
    pub id: i64,
    /// Stable, URL-safe key.
    pub unique: String,
    /// Short description.
    pub note: String,
    /// Tags, kept sorted.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Problem {
    /// Validates and cleans up the problem and all of its steps.
    ///
    /// Steps are renumbered from one in the order given.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or non URL-safe unique key,
    /// an empty note, no steps, an invalid step, or out-of-range timestamps.
    pub fn normalize(
        &mut self,
        now: DateTime<Utc>,
        steps: &mut [ProblemStep],
        docs: &dyn DocRenderer,
    ) -> Result<(), GrindError> {
        self.unique = check_unique(&self.unique)?;
        self.note = check_note(&self.note)?;

        trim_all(&mut self.tags);
        self.tags.sort();
        trim_all(&mut self.options);

        if steps.is_empty() {
            return Err(GrindError::Validation("problem must have at least one step".into()));
        }
        for (n, step) in (1..).zip(steps.iter_mut()) {
            step.problem_id = self.id;
            step.normalize(n, docs)?;
        }

        check_timestamps("problem", self.created_at, self.updated_at, now)
    }
}

impl ProblemSet {
    /// Validates and cleans up the problem set.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid unique key, an empty note,
    /// or out-of-range timestamps.
    pub fn normalize(&mut self, now: DateTime<Utc>) -> Result<(), GrindError> {
        self.unique = check_unique(&self.unique)?;
        self.note = check_note(&self.note)?;
        trim_all(&mut self.tags);
        self.tags.sort();
        check_timestamps("problem set", self.created_at, self.updated_at, now)
    }
}

impl ProblemStep {
    /// Numbers the step, builds its instructions, and fixes file line endings.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the note is empty or instructions
    /// cannot be built.
    pub fn normalize(&mut self, n: i64, docs: &dyn DocRenderer) -> Result<(), GrindError> {
        self.step = n;
        self.note = self.note.trim().to_string();
        if self.note.is_empty() {
            return Err(GrindError::Validation(format!("missing note for step {n}")));
        }
        self.instructions = build_instructions(&self.files, docs).map_err(|e| {
            GrindError::Validation(format!("error building instructions for step {n}: {e}"))
        })?;
        if self.weight <= 0.0 {
            self.weight = 1.0;
        }

        let files = std::mem::take(&mut self.files);
        self.files = files
            .into_iter()
            .map(|(name, contents)| {
                let fixed = if is_raw_path(&name) {
                    fix_newlines(&contents)
                } else {
                    fix_line_endings(&contents)
                };
                if fixed != contents {
                    tracing::info!(step = n, file = %name, "fixed line endings");
                }
                (name, fixed)
            })
            .collect();
        Ok(())
    }
}

/// Returns `true` if the path lives under one of [`RAW_STEP_DIRECTORIES`].
#[must_use]
pub fn is_raw_path(name: &str) -> bool {
    match name.split_once('/') {
        Some((top, _)) => RAW_STEP_DIRECTORIES.contains(&top),
        None => false,
    }
}

/// Converts CRLF to LF, strips spaces before newlines, and collapses
/// trailing blank lines to a single final newline.
#[must_use]
pub fn fix_line_endings(s: &str) -> String {
    let mut fixed = s.replace("\r\n", "\n");
    fixed.push('\n');
    while fixed.contains(" \n") {
        fixed = fixed.replace(" \n", "\n");
    }
    trim_trailing_newlines(fixed)
}

/// Converts CRLF to LF and collapses trailing blank lines to a single final newline.
#[must_use]
pub fn fix_newlines(s: &str) -> String {
    let mut fixed = s.replace("\r\n", "\n");
    fixed.push('\n');
    trim_trailing_newlines(fixed)
}

fn trim_trailing_newlines(mut s: String) -> String {
    while s.ends_with("\n\n") {
        s.pop();
    }
    if s == "\n" {
        s.clear();
    }
    s
}

fn check_unique(unique: &str) -> Result<String, GrindError> {
    let unique = unique.trim();
    if unique.is_empty() {
        return Err(GrindError::Validation("unique ID cannot be empty".into()));
    }
    if let Some(bad) = unique.chars().find(|c| !is_url_unreserved(*c)) {
        return Err(GrindError::Validation(format!(
            "unique ID must be URL friendly: {unique} contains {bad:?}"
        )));
    }
    Ok(unique.to_string())
}

/// Characters a query escape leaves untouched.
fn is_url_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

fn check_note(note: &str) -> Result<String, GrindError> {
    let note = note.trim();
    if note.is_empty() {
        return Err(GrindError::Validation("note cannot be empty".into()));
    }
    Ok(note.to_string())
}

fn trim_all(values: &mut [String]) {
    for value in values.iter_mut() {
        *value = value.trim().to_string();
    }
}

fn check_timestamps(
    what: &str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), GrindError> {
    if created_at < beginning_of_time() || created_at > now {
        return Err(GrindError::Validation(format!(
            "{what} CreatedAt time of {created_at} is invalid"
        )));
    }
    if updated_at < created_at || updated_at > now {
        return Err(GrindError::Validation(format!(
            "{what} UpdatedAt time of {updated_at} is invalid"
        )));
    }
    Ok(())
}
