//! End-of-run trailer: per-language status and output verification.

use std::fmt;
use std::path::PathBuf;

use crate::error::BindingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageStatus {
    /// Artifacts aggregated for this many exercises.
    Aggregated { exercises: usize },
    /// Probe or artifact building failed; excluded from aggregation.
    Failed(String),
    /// No exercise artifacts were found; excluded from aggregation.
    NoArtifacts,
}

impl LanguageStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Aggregated { .. })
    }
}

impl fmt::Display for LanguageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggregated { exercises } => write!(f, "ok ({} exercises)", exercises),
            Self::Failed(reason) => write!(f, "FAIL ({})", reason),
            Self::NoArtifacts => write!(f, "skipped (no artifacts)"),
        }
    }
}

#[derive(Debug)]
pub struct LanguageReport {
    pub language: String,
    pub status: LanguageStatus,
    /// Exercise-level problems (missing logs, bad identifiers, ...).
    pub warnings: Vec<String>,
    /// Error that must abort the whole run (e.g. an unwritable artifact dir).
    pub fatal: Option<BindingError>,
}

impl LanguageReport {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            status: LanguageStatus::NoArtifacts,
            warnings: Vec::new(),
            fatal: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub languages: Vec<LanguageReport>,
    /// Files written by the emission stage, in write order.
    pub written: Vec<PathBuf>,
    /// Required output files and whether each exists after the run.
    pub required: Vec<(PathBuf, bool)>,
    /// Fatal aggregation/emission error, if the run aborted.
    pub failure: Option<anyhow::Error>,
}

impl RunSummary {
    pub fn language(&self, name: &str) -> Option<&LanguageReport> {
        self.languages.iter().find(|l| l.language == name)
    }

    pub fn aggregated(&self) -> impl Iterator<Item = &LanguageReport> {
        self.languages.iter().filter(|l| l.status.is_ok())
    }

    pub fn all_outputs_present(&self) -> bool {
        !self.required.is_empty() && self.required.iter().all(|(_, present)| *present)
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.all_outputs_present()
    }

    /// Lines of the human-readable trailer.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec!["Languages:".to_string()];
        for report in &self.languages {
            lines.push(format!("  {:<12} {}", report.language, report.status));
            for warning in &report.warnings {
                lines.push(format!("    warning: {}", warning));
            }
        }

        if !self.required.is_empty() {
            lines.push(String::new());
            lines.push("Outputs:".to_string());
            for (path, present) in &self.required {
                let mark = if *present { "ok" } else { "MISSING" };
                lines.push(format!("  {:<8} {}", mark, path.display()));
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "Aggregated {} of {} languages.",
            self.aggregated().count(),
            self.languages.len()
        ));
        match &self.failure {
            Some(err) => lines.push(format!("Run failed: {:#}", err)),
            None if self.all_outputs_present() => {
                lines.push(format!("All {} required outputs present.", self.required.len()))
            }
            None => lines.push("Some required outputs are missing.".to_string()),
        }
        lines
    }

    pub fn print(&self) {
        for line in self.lines() {
            println!("{}", line);
        }
    }

    /// Convert into an error for a non-zero exit when the run failed.
    pub fn ensure_success(self) -> anyhow::Result<()> {
        if let Some(err) = self.failure {
            return Err(err);
        }
        if !self.all_outputs_present() {
            anyhow::bail!("required output files are missing");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer_reports_each_language() {
        let mut java = LanguageReport::new("java");
        java.status = LanguageStatus::Aggregated { exercises: 2 };
        let mut python = LanguageReport::new("python");
        python.warnings.push("no logs under /logs/python".into());

        let summary = RunSummary {
            languages: vec![java, python],
            required: vec![(PathBuf::from("/core/BasePhobos.cfg"), true)],
            ..Default::default()
        };

        let text = summary.lines().join("\n");
        assert!(text.contains("java         ok (2 exercises)"), "{}", text);
        assert!(text.contains("python       skipped (no artifacts)"), "{}", text);
        assert!(text.contains("warning: no logs under /logs/python"));
        assert!(text.contains("All 1 required outputs present."));
        assert!(text.contains("Aggregated 1 of 2 languages."), "{}", text);
        assert!(summary.is_success());
    }

    #[test]
    fn failure_is_not_success() {
        let summary = RunSummary {
            failure: Some(BindingError::NoData.into()),
            ..Default::default()
        };
        assert!(!summary.is_success());
        assert!(summary.lines().last().unwrap().starts_with("Run failed"));
        assert!(summary.ensure_success().is_err());
    }

    #[test]
    fn missing_output_is_not_success() {
        let summary = RunSummary {
            required: vec![
                (PathBuf::from("/core/BasePhobos.cfg"), true),
                (PathBuf::from("/core/TailPhobos.cfg"), false),
            ],
            ..Default::default()
        };
        assert!(!summary.all_outputs_present());
        assert!(summary.lines().iter().any(|l| l.contains("MISSING")));
    }
}
