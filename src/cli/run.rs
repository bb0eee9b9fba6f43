use anyhow::Result;
use clap::Args;

use super::split_languages;
use phobos_bindings::config::Config;
use phobos_bindings::pipeline::{self, RunOptions};

#[derive(Args)]
pub struct RunArgs {
    /// Languages to process, comma separated or repeated (e.g. java,python)
    #[arg(short, long, required = true)]
    pub langs: Vec<String>,

    /// Root of the raw logs: <logs-root>/<lang>/<exercise>/final_bindings.txt
    #[arg(long)]
    pub logs_root: Option<String>,

    /// Maximum languages processed concurrently
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Do not run the probe harness; use logs already on disk
    #[arg(long)]
    pub skip_probe: bool,

    /// Canonicalize observed paths lexically, without resolving symlinks
    #[arg(long)]
    pub no_symlinks: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Output flags shared by `run` and `merge`.
#[derive(Args)]
pub struct OutputArgs {
    /// Artifact directory (.paths / .json)
    #[arg(long)]
    pub path_dir: Option<String>,

    /// Directory receiving the runtime config files
    #[arg(long)]
    pub core_dir: Option<String>,

    /// Directory the runtime sandbox chdirs into (TailPhobos.cfg)
    #[arg(long)]
    pub runtime_chdir: Option<String>,

    /// Fail instead of waiting when another run holds the output lock
    #[arg(long)]
    pub no_wait: bool,
}

impl OutputArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.path_dir {
            config.output.path_dir = dir.clone();
        }
        if let Some(dir) = &self.core_dir {
            config.output.core_dir = dir.clone();
        }
        if let Some(dir) = &self.runtime_chdir {
            config.tail.runtime_chdir = dir.clone();
        }
    }
}

pub async fn run(args: RunArgs, mut config: Config, verbose: bool) -> Result<()> {
    if let Some(root) = &args.logs_root {
        config.probe.logs_root = root.clone();
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    if args.no_symlinks {
        config.canonical.resolve_symlinks = false;
    }
    args.output.apply(&mut config);

    let mut opts = RunOptions::from_config(&config, split_languages(&args.langs), verbose);
    if args.skip_probe {
        opts.worker.probe = None;
    }
    opts.wait_for_lock = !args.output.no_wait;

    let summary = pipeline::run(opts).await?;
    summary.print();
    summary.ensure_success()
}
