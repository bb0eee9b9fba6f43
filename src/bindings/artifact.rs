//! Per-exercise artifacts: building them from raw logs, persisting them as
//! `.paths` + `.json`, and reading them back for aggregation.
//!
//! # Files
//!
//! | File | Content |
//! |------|---------|
//! | `<lang>_<exercise>.paths` | sorted `<mode> <path>` lines, `r`/`w` only |
//! | `<lang>_<exercise>.json` | structured record with provenance |
//!
//! A re-run for the same `(lang, exercise)` overwrites both files.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::canonical::Canonicalizer;
use super::emit::write_atomic;
use super::log::{self, ParsedLog};
use super::mode::Mode;
use super::set::{self, BindingSet, PathRecord};
use crate::error::{BindingError, Result};

pub const SCHEMA_VERSION: u32 = 1;

/// Suffixes of derived per-language files that share the `<lang>_` prefix.
const DERIVED_SUFFIXES: [&str; 2] = ["union", "intersection"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub log_sha256: String,
    pub timestamp: String,
    pub schema_version: u32,
}

/// The canonical, merged bindings of one exercise under one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseArtifact {
    pub language: String,
    pub exercise_id: String,
    pub records: BindingSet,
    pub tail_flags: Vec<String>,
    pub provenance: Option<Provenance>,
}

/// On-disk JSON form of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub schema_version: u32,
    pub timestamp: String,
    pub language: String,
    pub exercise_id: String,
    /// Detail observations as parsed, hidden entries included.
    pub paths_dynamic: Vec<PathRecord>,
    /// Static binds from the base options.
    pub paths_base: Vec<PathRecord>,
    /// Merged visible bindings.
    pub paths_all: Vec<PathRecord>,
    pub tail_flags: Vec<String>,
    pub log_sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filename: Option<String>,
}

impl ArtifactRecord {
    pub fn to_artifact(&self) -> ExerciseArtifact {
        ExerciseArtifact {
            language: self.language.clone(),
            exercise_id: self.exercise_id.clone(),
            records: self
                .paths_all
                .iter()
                .map(|r| (r.path.clone(), r.mode))
                .collect(),
            tail_flags: self.tail_flags.clone(),
            provenance: Some(Provenance {
                log_sha256: self.log_sha256.clone(),
                timestamp: self.timestamp.clone(),
                schema_version: self.schema_version,
            }),
        }
    }
}

/// Paths of the files written for one artifact.
#[derive(Debug, Clone)]
pub struct ArtifactFiles {
    pub paths_file: PathBuf,
    pub record_file: PathBuf,
}

pub fn paths_file_name(lang: &str, exercise: &str) -> String {
    format!("{}_{}.paths", lang, exercise)
}

pub fn record_file_name(lang: &str, exercise: &str) -> String {
    format!("{}_{}.json", lang, exercise)
}

/// Reject identifiers that would escape the artifact directory or collide
/// with derived per-language files.
pub fn validate_identifier(id: &str) -> Result<()> {
    let bad = id.is_empty()
        || id.contains('/')
        || id.contains('\0')
        || id == "."
        || id == ".."
        || DERIVED_SUFFIXES.contains(&id);
    if bad {
        return Err(BindingError::InvalidIdentifier(id.to_string()));
    }
    Ok(())
}

/// Build the artifact record for one exercise from its raw log.
///
/// A missing or unreadable log is a [`BindingError::MissingArtifact`] for
/// this exercise only.
pub fn build_record(
    lang: &str,
    exercise: &str,
    log_path: &Path,
    canon: &Canonicalizer,
) -> Result<ArtifactRecord> {
    validate_identifier(lang)?;
    validate_identifier(exercise)?;

    let bytes = fs::read(log_path).map_err(|e| BindingError::missing(log_path, e))?;
    let text = String::from_utf8_lossy(&bytes);
    let parsed = log::parse(&text, canon);
    let stats = parsed.stats;
    debug!(
        lang,
        exercise,
        details = stats.detail_lines,
        duplicates = stats.duplicate_details,
        invalid = stats.invalid_paths,
        ignored = stats.ignored_lines,
        "Parsed observation log"
    );
    if stats.invalid_paths > 0 {
        warn!(lang, exercise, "Dropped {} invalid paths", stats.invalid_paths);
    }

    Ok(record_from_parsed(
        lang,
        exercise,
        parsed,
        sha256_hex(&bytes),
        Some(log_path.display().to_string()),
    ))
}

fn record_from_parsed(
    lang: &str,
    exercise: &str,
    parsed: ParsedLog,
    log_sha256: String,
    log_filename: Option<String>,
) -> ArtifactRecord {
    let merged = set::merge(&parsed.base_modes, &parsed.detail_pairs);
    ArtifactRecord {
        schema_version: SCHEMA_VERSION,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        language: lang.to_string(),
        exercise_id: exercise.to_string(),
        paths_base: parsed
            .base_modes
            .iter()
            .map(|(p, m)| PathRecord::new(*m, p.clone()))
            .collect(),
        paths_dynamic: parsed.detail_pairs,
        paths_all: merged.records(),
        tail_flags: parsed.tail_tokens,
        log_sha256,
        log_filename,
    }
}

/// Persist both files of an artifact into `dir`, replacing any previous run.
pub fn write_record(record: &ArtifactRecord, dir: &Path) -> Result<ArtifactFiles> {
    fs::create_dir_all(dir).map_err(|e| BindingError::write(dir, e))?;

    let paths_file = dir.join(paths_file_name(&record.language, &record.exercise_id));
    let record_file = dir.join(record_file_name(&record.language, &record.exercise_id));

    let merged: BindingSet = record
        .paths_all
        .iter()
        .map(|r| (r.path.clone(), r.mode))
        .collect();
    write_atomic(&paths_file, &render_paths(&merged))?;

    let mut json = serde_json::to_string_pretty(record).map_err(|e| BindingError::Json {
        path: record_file.clone(),
        source: e,
    })?;
    json.push('\n');
    write_atomic(&record_file, &json)?;

    Ok(ArtifactFiles {
        paths_file,
        record_file,
    })
}

/// Render a set in `.paths` form: one `<mode> <path>` line per entry.
pub fn render_paths(set: &BindingSet) -> String {
    let mut out = String::new();
    for (path, mode) in set.iter() {
        out.push(mode.as_char());
        out.push(' ');
        out.push_str(path);
        out.push('\n');
    }
    out
}

/// Parse `.paths` text. Blank lines, `#` comments, and malformed lines are
/// skipped; hidden entries are dropped.
pub fn parse_paths(text: &str) -> BindingSet {
    let mut set = BindingSet::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((mode, path)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let Ok(mode) = mode.parse::<Mode>() else {
            continue;
        };
        let path = path.trim();
        if path.is_empty() {
            continue;
        }
        set.insert(path, mode);
    }
    set
}

pub fn load_paths_file(path: &Path) -> Result<BindingSet> {
    let text = fs::read_to_string(path).map_err(|e| BindingError::missing(path, e))?;
    Ok(parse_paths(&text))
}

pub fn load_record(path: &Path) -> Result<ArtifactRecord> {
    let text = fs::read_to_string(path).map_err(|e| BindingError::missing(path, e))?;
    serde_json::from_str(&text).map_err(|e| BindingError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load every exercise artifact of `lang` found in `dir`.
///
/// The `.paths` file is authoritative for bindings; a `.json` sibling, when
/// present and readable, supplies tail flags and provenance and confirms the
/// language (so `c_*` does not pick up `c_sharp_*` artifacts).
pub fn discover(dir: &Path, lang: &str) -> Result<Vec<ExerciseArtifact>> {
    validate_identifier(lang)?;
    let pattern = dir.join(format!("{}_*.paths", glob::Pattern::escape(lang)));
    let pattern = pattern.to_string_lossy().to_string();

    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Invalid artifact pattern {}: {}", pattern, e);
            return Ok(Vec::new());
        }
    };

    let prefix = format!("{}_", lang);
    let mut artifacts = Vec::new();
    for entry in entries.flatten() {
        let Some(exercise) = entry
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix(&prefix))
            .map(str::to_string)
        else {
            continue;
        };
        if DERIVED_SUFFIXES.contains(&exercise.as_str()) {
            continue;
        }

        let records = load_paths_file(&entry)?;
        let mut artifact = ExerciseArtifact {
            language: lang.to_string(),
            exercise_id: exercise.clone(),
            records,
            tail_flags: Vec::new(),
            provenance: None,
        };

        let json_path = dir.join(record_file_name(lang, &exercise));
        if json_path.exists() {
            match load_record(&json_path) {
                Ok(record) if record.language != lang => {
                    debug!(
                        "Skipping {}: belongs to language {}",
                        entry.display(),
                        record.language
                    );
                    continue;
                }
                Ok(record) => {
                    let from_json = record.to_artifact();
                    artifact.tail_flags = from_json.tail_flags;
                    artifact.provenance = from_json.provenance;
                }
                Err(e) => warn!("Ignoring unreadable record: {}", e),
            }
        }
        artifacts.push(artifact);
    }

    artifacts.sort_by(|a, b| a.exercise_id.cmp(&b.exercise_id));
    Ok(artifacts)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
