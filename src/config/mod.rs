use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bindings::tail::default_allowed_flags;
use crate::bindings::{Canonicalizer, OutputLayout, PolicySections};
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Resolved XDG-compliant paths (not serialized)
    #[serde(skip)]
    pub paths: Paths,

    /// Maximum languages probed concurrently
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub tail: TailConfig,

    #[serde(default)]
    pub canonical: CanonicalConfig,

    #[serde(default)]
    pub emit: EmitConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Harness executable run once per language
    #[serde(default = "default_probe_command")]
    pub command: String,

    /// Extra arguments placed before the language name
    #[serde(default)]
    pub args: Vec<String>,

    /// Flag passed to the harness when running with --verbose
    #[serde(default = "default_probe_verbose_flag")]
    pub verbose_flag: String,

    /// Kill the harness after this many seconds (0 = no limit)
    #[serde(default)]
    pub timeout_secs: u64,

    /// Root holding <lang>/<exercise>/<log_file_name>
    #[serde(default = "default_logs_root")]
    pub logs_root: String,

    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Per-exercise artifacts and derived .paths files
    #[serde(default = "default_path_dir")]
    pub path_dir: String,

    /// Runtime config files
    #[serde(default = "default_core_dir")]
    pub core_dir: String,

    /// Audit-only intersection files, relative to core_dir
    #[serde(default = "default_debug_subdir")]
    pub debug_subdir: String,

    /// Also write <lang>_union.paths etc. into path_dir
    #[serde(default = "default_true")]
    pub write_path_sets: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailConfig {
    /// Flags allowed to reach TailPhobos.cfg
    #[serde(default = "default_allowed_flags")]
    pub allow_flags: Vec<String>,

    /// Directory the runtime sandbox should chdir into
    #[serde(default = "default_runtime_chdir")]
    pub runtime_chdir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalConfig {
    /// Resolve symlinks in the existing prefix of observed paths
    #[serde(default = "default_true")]
    pub resolve_symlinks: bool,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        Self {
            resolve_symlinks: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitConfig {
    /// Append [network] and [limits] sections to BasePhobos.cfg
    #[serde(default)]
    pub policy_sections: bool,

    #[serde(default = "default_network_allow")]
    pub network_allow: Vec<String>,

    #[serde(default)]
    pub limits_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
fn default_probe_command() -> String {
    "/var/tmp/pruning/run_minimal_fs_all.sh".to_string()
}
fn default_probe_verbose_flag() -> String {
    "--verbose".to_string()
}
fn default_logs_root() -> String {
    "/var/tmp/testing-dir".to_string()
}
fn default_log_file_name() -> String {
    "final_bindings.txt".to_string()
}
fn default_path_dir() -> String {
    "/var/tmp/path_sets".to_string()
}
fn default_core_dir() -> String {
    "/var/tmp/opt/core/config".to_string()
}
fn default_debug_subdir() -> String {
    "debug".to_string()
}
fn default_runtime_chdir() -> String {
    "/var/tmp/testing-dir".to_string()
}
fn default_network_allow() -> Vec<String> {
    PolicySections::default().network_allow
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: Paths::default(),
            jobs: default_jobs(),
            probe: ProbeConfig::default(),
            output: OutputConfig::default(),
            tail: TailConfig::default(),
            canonical: CanonicalConfig::default(),
            emit: EmitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            command: default_probe_command(),
            args: Vec::new(),
            verbose_flag: default_probe_verbose_flag(),
            timeout_secs: 0,
            logs_root: default_logs_root(),
            log_file_name: default_log_file_name(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path_dir: default_path_dir(),
            core_dir: default_core_dir(),
            debug_subdir: default_debug_subdir(),
            write_path_sets: default_true(),
        }
    }
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            allow_flags: default_allowed_flags(),
            runtime_chdir: default_runtime_chdir(),
        }
    }
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            policy_sections: false,
            network_allow: default_network_allow(),
            limits_timeout: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from `explicit` or the XDG config file. A missing file yields
    /// the defaults; nothing is written.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        let paths = Paths::resolve()?;
        let path = Self::config_path(explicit)?;

        if !path.exists() {
            if explicit.is_some() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Config {
                paths,
                ..Config::default()
            });
        }

        let mut config = Self::from_file(&path)?;
        config.paths = paths;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Write the commented template to `path`. An existing file is kept
    /// unless `force` is set; returns whether the file was written.
    pub fn write_template(path: &Path, force: bool) -> Result<bool> {
        if path.exists() && !force {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
        Ok(true)
    }

    /// Config file `load` would read for `explicit`.
    pub fn config_path(explicit: Option<&str>) -> Result<PathBuf> {
        match explicit {
            Some(p) => Ok(expand(p)),
            None => Ok(Paths::resolve()?.config_file()),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn path_dir(&self) -> PathBuf {
        expand(&self.output.path_dir)
    }

    pub fn core_dir(&self) -> PathBuf {
        expand(&self.output.core_dir)
    }

    pub fn logs_root(&self) -> PathBuf {
        expand(&self.probe.logs_root)
    }

    pub fn output_layout(&self) -> OutputLayout {
        let layout = OutputLayout::new(self.core_dir(), &self.output.debug_subdir);
        if self.output.write_path_sets {
            layout.with_path_sets(self.path_dir())
        } else {
            layout
        }
    }

    pub fn canonicalizer(&self) -> Canonicalizer {
        let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Canonicalizer::new(base, self.canonical.resolve_symlinks)
    }

    /// `[network]`/`[limits]` sections for BasePhobos.cfg, if enabled.
    pub fn policy_sections(&self) -> Option<PolicySections> {
        self.emit.policy_sections.then(|| PolicySections {
            network_allow: self.emit.network_allow.clone(),
            limits_timeout: self.emit.limits_timeout,
        })
    }
}

fn expand(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

/// Default config template with helpful comments (used by `config init`)
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# phobos-bindings configuration
# Every key is optional; command-line flags override these values.

# Languages probed concurrently (default: number of CPUs)
# jobs = 4

[probe]
# Harness run as: <command> [args...] [--verbose] <lang>
command = "/var/tmp/pruning/run_minimal_fs_all.sh"
# args = []
# verbose_flag = "--verbose"
# timeout_secs = 0                     # 0 = no limit
logs_root = "/var/tmp/testing-dir"     # <logs_root>/<lang>/<exercise>/<log_file_name>
log_file_name = "final_bindings.txt"

[output]
path_dir = "/var/tmp/path_sets"        # per-exercise .paths/.json artifacts
core_dir = "/var/tmp/opt/core/config"  # BasePhobos.cfg, BaseLanguage-*.cfg, TailPhobos.cfg
debug_subdir = "debug"                 # audit-only intersection files
write_path_sets = true

[tail]
allow_flags = ["--share-net"]
runtime_chdir = "/var/tmp/testing-dir"

[canonical]
# false keeps paths lexical (no filesystem lookups)
resolve_symlinks = true

[emit]
# Append [network] / [limits] sections to BasePhobos.cfg
policy_sections = false
# network_allow = ["*"]
# limits_timeout = 0

[logging]
level = "info"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.tail.allow_flags, vec!["--share-net"]);
        assert_eq!(config.output.debug_subdir, "debug");
        assert_eq!(config.probe.log_file_name, "final_bindings.txt");
        assert!(config.jobs >= 1);
        assert!(config.policy_sections().is_none());
        assert!(config.canonical.resolve_symlinks);
        assert!(config.canonicalizer().resolve_symlinks());
    }

    #[test]
    fn template_parses() {
        let config = Config::from_toml(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.output.core_dir, "/var/tmp/opt/core/config");
        assert_eq!(config.tail.runtime_chdir, "/var/tmp/testing-dir");
        assert!(config.canonical.resolve_symlinks);
    }

    #[test]
    fn overrides_apply() {
        let config = Config::from_toml(
            r#"
jobs = 2
[tail]
allow_flags = ["--share-net", "--die-with-parent"]
[emit]
policy_sections = true
limits_timeout = 30
"#,
        )
        .unwrap();
        assert_eq!(config.jobs, 2);
        assert_eq!(config.tail.allow_flags.len(), 2);
        let sections = config.policy_sections().unwrap();
        assert_eq!(sections.limits_timeout, 30);
        assert_eq!(sections.network_allow, vec!["*"]);
    }

    #[test]
    fn layout_follows_output_section() {
        let mut config = Config::from_toml("").unwrap();
        config.output.core_dir = "/out/core".into();
        config.output.path_dir = "/out/sets".into();
        let layout = config.output_layout();
        assert_eq!(layout.global_cfg(), PathBuf::from("/out/core/BasePhobos.cfg"));
        assert_eq!(
            layout.global_intersect_cfg(),
            PathBuf::from("/out/core/debug/BasePhobosIntersect.cfg")
        );
        assert_eq!(layout.path_sets_dir, Some(PathBuf::from("/out/sets")));

        config.output.write_path_sets = false;
        assert!(config.output_layout().path_sets_dir.is_none());
    }

    #[test]
    fn write_template_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/config.toml");
        assert!(Config::write_template(&path, false).unwrap());
        assert!(!Config::write_template(&path, false).unwrap());
        assert!(Config::write_template(&path, true).unwrap());
        assert!(Config::from_file(&path).is_ok());
    }
}
