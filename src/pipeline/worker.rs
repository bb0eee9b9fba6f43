//! Per-language worker: probe the language, then turn every raw
//! observation log under `<logs_root>/<lang>/<exercise>/` into an artifact.
//!
//! Workers only write files prefixed with their own language, so any number
//! of them can run side by side.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::probe::ProbeCommand;
use super::summary::{LanguageReport, LanguageStatus};
use crate::bindings::Canonicalizer;
use crate::bindings::artifact::{self, validate_identifier};

/// Everything a worker needs; shared read-only across workers.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub logs_root: PathBuf,
    pub log_file_name: String,
    /// Artifact directory.
    pub path_dir: PathBuf,
    pub canonicalizer: Canonicalizer,
    /// `None` skips probing and uses whatever logs already exist.
    pub probe: Option<ProbeCommand>,
}

/// `(exercise_id, log_path)` for every exercise log of `lang`, sorted by
/// exercise.
pub fn log_files(logs_root: &Path, lang: &str, log_file_name: &str) -> Vec<(String, PathBuf)> {
    let pattern = logs_root
        .join(glob::Pattern::escape(lang))
        .join("*")
        .join(glob::Pattern::escape(log_file_name));
    let pattern = pattern.to_string_lossy().to_string();

    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(lang, "Invalid log pattern {}: {}", pattern, e);
            return Vec::new();
        }
    };

    let mut logs: Vec<(String, PathBuf)> = entries
        .flatten()
        .filter_map(|path| {
            let exercise = path.parent()?.file_name()?.to_str()?.to_string();
            Some((exercise, path))
        })
        .collect();
    logs.sort();
    logs
}

/// Build and persist the artifacts of one language. Exercise-level failures
/// are recorded as warnings. The language fails when it cannot be named in a
/// file, and a fatal error (an unwritable artifact) stops it at once and is
/// carried on the report.
pub fn build_language(ctx: &WorkerContext, lang: &str) -> LanguageReport {
    let mut report = LanguageReport::new(lang);
    if let Err(e) = validate_identifier(lang) {
        report.status = LanguageStatus::Failed(e.to_string());
        return report;
    }

    let logs = log_files(&ctx.logs_root, lang, &ctx.log_file_name);
    if logs.is_empty() {
        let dir = ctx.logs_root.join(lang);
        warn!(lang, "No {} logs under {}", ctx.log_file_name, dir.display());
        report
            .warnings
            .push(format!("no {} logs under {}", ctx.log_file_name, dir.display()));
        return report;
    }

    let mut built = 0usize;
    for (exercise, log_path) in logs {
        let result = artifact::build_record(lang, &exercise, &log_path, &ctx.canonicalizer)
            .and_then(|record| artifact::write_record(&record, &ctx.path_dir));
        match result {
            Ok(files) => {
                debug!(lang, exercise = %exercise, "Wrote {}", files.paths_file.display());
                built += 1;
            }
            Err(e) if e.is_fatal() => {
                error!(lang, exercise = %exercise, "{}", e);
                report.status = LanguageStatus::Failed(e.to_string());
                report.fatal = Some(e);
                return report;
            }
            Err(e) => {
                warn!(lang, exercise = %exercise, "Skipping exercise: {}", e);
                report.warnings.push(format!("{}: {}", exercise, e));
            }
        }
    }

    info!(lang, built, skipped = report.warnings.len(), "Built exercise artifacts");
    report
}

/// Probe (if configured) then build artifacts on a blocking thread.
pub async fn process_language(ctx: Arc<WorkerContext>, lang: String) -> LanguageReport {
    if let Some(probe) = &ctx.probe
        && let Err(e) = probe.run(&lang).await
    {
        warn!(lang = %lang, "{}", e);
        let mut report = LanguageReport::new(&lang);
        report.status = LanguageStatus::Failed(e.to_string());
        return report;
    }

    let worker_lang = lang.clone();
    match tokio::task::spawn_blocking(move || build_language(&ctx, &worker_lang)).await {
        Ok(report) => report,
        Err(e) => {
            let mut report = LanguageReport::new(&lang);
            report.status = LanguageStatus::Failed(format!("worker aborted: {}", e));
            report
        }
    }
}
