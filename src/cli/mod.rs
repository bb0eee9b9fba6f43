pub mod config;
pub mod emit;
pub mod merge;
pub mod run;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "phobos-bindings")]
#[command(
    author,
    version,
    about = "Derive minimal sandbox filesystem policies from observed path access"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging (also passed to the probe harness)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(short, long, global = true, env = "PHOBOS_CONFIG")]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe languages, build artifacts, aggregate, and emit configs
    Run(run::RunArgs),

    /// Build the artifact of a single exercise from its raw log
    Emit(emit::EmitArgs),

    /// Aggregate existing artifacts and emit configs without probing
    Merge(merge::MergeArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

/// Split `java,python` / repeated `--langs` values into language names.
pub(crate) fn split_languages(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "phobos-bindings",
            "-v",
            "run",
            "--langs",
            "java,python",
            "--jobs",
            "3",
            "--skip-probe",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(split_languages(&args.langs), vec!["java", "python"]);
                assert_eq!(args.jobs, Some(3));
                assert!(args.skip_probe);
                assert!(!args.no_symlinks);
                assert!(!args.output.no_wait);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn no_symlinks_opts_out_of_resolution() {
        let cli = Cli::try_parse_from([
            "phobos-bindings",
            "emit",
            "--lang",
            "java",
            "--exercise",
            "ex1",
            "--no-symlinks",
        ])
        .unwrap();
        match cli.command {
            Commands::Emit(args) => assert!(args.no_symlinks),
            _ => panic!("expected emit"),
        }
    }

    #[test]
    fn run_requires_languages() {
        assert!(Cli::try_parse_from(["phobos-bindings", "run"]).is_err());
    }

    #[test]
    fn split_languages_handles_repeats_and_blanks() {
        let values = vec!["java, python".to_string(), ",go".to_string()];
        assert_eq!(split_languages(&values), vec!["java", "python", "go"]);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
