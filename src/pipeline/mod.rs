//! Run orchestration.
//!
//! One tokio task per language, bounded by a semaphore of `jobs` permits,
//! probes the language and builds its artifacts. Once every worker has been
//! joined, the aggregation stage reads the artifact directory, reduces it to
//! per-language and global sets, sanitizes the pooled tail flags, and emits
//! the config files under the output lock.

pub mod probe;
pub mod summary;
pub mod worker;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::bindings::artifact::{self, ExerciseArtifact};
use crate::bindings::{OutputLayout, PolicySections, TailAccumulator};
use crate::bindings::{emit_all, global_config, language_sets, sanitize};
use crate::concurrency::RunLock;
use crate::config::Config;

pub use probe::ProbeCommand;
pub use summary::{LanguageReport, LanguageStatus, RunSummary};
pub use worker::WorkerContext;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Languages in the order they were requested.
    pub languages: Vec<String>,
    pub jobs: usize,
    /// Run the workers; `false` aggregates existing artifacts only.
    pub scan_logs: bool,
    pub worker: WorkerContext,
    pub layout: OutputLayout,
    pub allowed_flags: Vec<String>,
    pub runtime_chdir: String,
    pub policy: Option<PolicySections>,
    /// Block on a held output lock instead of failing.
    pub wait_for_lock: bool,
}

impl RunOptions {
    pub fn from_config(config: &Config, languages: Vec<String>, verbose: bool) -> Self {
        Self {
            languages,
            jobs: config.jobs,
            scan_logs: true,
            worker: WorkerContext {
                logs_root: config.logs_root(),
                log_file_name: config.probe.log_file_name.clone(),
                path_dir: config.path_dir(),
                canonicalizer: config.canonicalizer(),
                probe: Some(ProbeCommand::from_config(&config.probe, verbose)),
            },
            layout: config.output_layout(),
            allowed_flags: config.tail.allow_flags.clone(),
            runtime_chdir: config.tail.runtime_chdir.clone(),
            policy: config.policy_sections(),
            wait_for_lock: true,
        }
    }

    /// Requested languages without duplicates or blanks, first occurrence kept.
    fn requested(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for lang in &self.languages {
            let lang = lang.trim();
            if !lang.is_empty() && !out.iter().any(|l| l == lang) {
                out.push(lang.to_string());
            }
        }
        out
    }
}

/// Run the full pipeline. Language-level problems and fatal aggregation
/// errors are both reported in the returned summary; `Err` is reserved for
/// the runtime itself failing.
pub async fn run(opts: RunOptions) -> anyhow::Result<RunSummary> {
    let languages = opts.requested();
    let mut reports: HashMap<String, LanguageReport> = HashMap::new();

    if opts.scan_logs {
        let semaphore = Arc::new(Semaphore::new(opts.jobs.max(1)));
        let ctx = Arc::new(opts.worker.clone());
        let mut workers = JoinSet::new();

        for lang in &languages {
            let semaphore = semaphore.clone();
            let ctx = ctx.clone();
            let lang = lang.clone();
            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                process_language_logged(ctx, lang).await
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => {
                    reports.insert(report.language.clone(), report);
                }
                Err(e) => error!("Language worker aborted: {}", e),
            }
        }
    }

    // Every worker has finished; aggregation sees a settled artifact dir.
    let summary =
        tokio::task::spawn_blocking(move || aggregate_stage(&opts, &languages, reports)).await?;
    Ok(summary)
}

async fn process_language_logged(ctx: Arc<WorkerContext>, lang: String) -> LanguageReport {
    debug!(lang = %lang, "Worker started");
    let report = worker::process_language(ctx, lang).await;
    debug!(lang = %report.language, status = %report.status, "Worker finished");
    report
}

/// Barrier side of the run: discover, aggregate, sanitize, emit. A fatal
/// worker error stops the run before anything is emitted.
fn aggregate_stage(
    opts: &RunOptions,
    languages: &[String],
    mut reports: HashMap<String, LanguageReport>,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let mut included: Vec<String> = Vec::new();
    let mut artifacts: Vec<ExerciseArtifact> = Vec::new();

    for lang in languages {
        let mut report = reports.remove(lang).unwrap_or_else(|| {
            let mut r = LanguageReport::new(lang);
            if opts.scan_logs {
                r.status = LanguageStatus::Failed("worker aborted".to_string());
            }
            r
        });

        if !matches!(report.status, LanguageStatus::Failed(_)) {
            match artifact::discover(&opts.worker.path_dir, lang) {
                Ok(found) if found.is_empty() => {
                    warn!(lang = %lang, "No artifacts in {}; excluded", opts.worker.path_dir.display());
                    report.status = LanguageStatus::NoArtifacts;
                }
                Ok(found) => {
                    artifacts.extend(found);
                    included.push(lang.clone());
                }
                Err(e) => {
                    warn!(lang = %lang, "Cannot read artifacts: {}", e);
                    report.status = LanguageStatus::Failed(e.to_string());
                }
            }
        }
        summary.languages.push(report);
    }

    if let Some(fatal) = summary.languages.iter_mut().find_map(|r| r.fatal.take()) {
        error!("Aborting before aggregation: {}", fatal);
        summary.failure = Some(fatal.into());
        return summary;
    }

    // Tail flags pool in (language, exercise) order, independent of request order.
    artifacts.sort_by(|a, b| {
        (&a.language, &a.exercise_id).cmp(&(&b.language, &b.exercise_id))
    });
    let mut tail = TailAccumulator::new();
    for a in &artifacts {
        tail.extend(a.tail_flags.iter().cloned());
    }

    let (sets, _) = language_sets(&included, artifacts);
    for set in &sets {
        if let Some(report) = summary
            .languages
            .iter_mut()
            .find(|r| r.language == set.language)
        {
            report.status = LanguageStatus::Aggregated {
                exercises: set.exercises,
            };
        }
    }

    let global = match global_config(&sets) {
        Ok(global) => global,
        Err(e) => {
            error!("{}", e);
            summary.failure = Some(e.into());
            return summary;
        }
    };
    info!(
        languages = sets.len(),
        union = global.union.len(),
        intersection = global.intersection.len(),
        "Aggregated binding sets"
    );

    let flags = sanitize(tail.tokens(), &opts.allowed_flags, &opts.runtime_chdir);
    debug!("Tail flags: {}", flags.render().trim_end());

    let emitted = RunLock::for_output_dir(&opts.layout.core_dir)
        .and_then(|lock| {
            let _guard = lock.lock(opts.wait_for_lock)?;
            emit_all(&opts.layout, &global, &sets, &flags, opts.policy.as_ref())
                .map_err(anyhow::Error::from)
        });
    match emitted {
        Ok(written) => summary.written = written,
        Err(e) => {
            error!("{:#}", e);
            summary.failure = Some(e);
        }
    }

    summary.required = opts
        .layout
        .required_outputs(&sets)
        .into_iter()
        .map(|p| {
            let present = p.exists();
            (p, present)
        })
        .collect::<Vec<(PathBuf, bool)>>();
    summary
}
