use anyhow::Result;
use clap::Args;

use super::run::OutputArgs;
use super::split_languages;
use phobos_bindings::config::Config;
use phobos_bindings::pipeline::{self, RunOptions};

#[derive(Args)]
pub struct MergeArgs {
    /// Languages to aggregate, comma separated or repeated
    #[arg(short, long, required = true)]
    pub langs: Vec<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub async fn run(args: MergeArgs, mut config: Config) -> Result<()> {
    args.output.apply(&mut config);

    let mut opts = RunOptions::from_config(&config, split_languages(&args.langs), false);
    opts.scan_logs = false;
    opts.worker.probe = None;
    opts.wait_for_lock = !args.output.no_wait;

    let summary = pipeline::run(opts).await?;
    summary.print();
    summary.ensure_success()
}
