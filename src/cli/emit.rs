use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use phobos_bindings::bindings::Mode;
use phobos_bindings::bindings::artifact::{build_record, write_record};
use phobos_bindings::config::Config;

#[derive(Args)]
pub struct EmitArgs {
    /// Language of the exercise
    #[arg(short, long)]
    pub lang: String,

    /// Exercise identifier
    #[arg(short, long)]
    pub exercise: String,

    /// Raw observation log (default: <logs_root>/<lang>/<exercise>/<log_file_name>)
    #[arg(long)]
    pub log: Option<String>,

    /// Artifact directory
    #[arg(long)]
    pub path_dir: Option<String>,

    /// Canonicalize observed paths lexically, without resolving symlinks
    #[arg(long)]
    pub no_symlinks: bool,
}

pub async fn run(args: EmitArgs, mut config: Config) -> Result<()> {
    if let Some(dir) = &args.path_dir {
        config.output.path_dir = dir.clone();
    }
    if args.no_symlinks {
        config.canonical.resolve_symlinks = false;
    }
    let log = match &args.log {
        Some(p) => PathBuf::from(shellexpand::tilde(p).to_string()),
        None => config
            .logs_root()
            .join(&args.lang)
            .join(&args.exercise)
            .join(&config.probe.log_file_name),
    };
    let path_dir = config.path_dir();
    let canon = config.canonicalizer();

    let (record, files) = tokio::task::spawn_blocking(move || -> Result<_> {
        let record = build_record(&args.lang, &args.exercise, &log, &canon)?;
        let files = write_record(&record, &path_dir)?;
        Ok((record, files))
    })
    .await
    .context("artifact builder aborted")??;

    let write = record.paths_all.iter().filter(|r| r.mode == Mode::Write).count();
    println!("Wrote {}", files.paths_file.display());
    println!("Wrote {}", files.record_file.display());
    println!(
        "  {} paths ({} read-only, {} write), {} tail tokens",
        record.paths_all.len(),
        record.paths_all.len() - write,
        write,
        record.tail_flags.len()
    );
    Ok(())
}
