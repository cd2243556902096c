//! sops-check CLI tool.
//!
//! Usage:
//! ```bash
//! sops-check check [OPTIONS] [PATH]
//! sops-check init
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config_resolver;

/// Checks that SOPS encrypted files are protected by the expected trust anchors
#[derive(Parser)]
#[command(name = "sops-check")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check SOPS files against the configured policy
    Check {
        /// Directory to check (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Path or URL of the configuration file
        #[arg(short, long, env = "SOPS_CHECK_CONFIG")]
        config: Option<String>,

        /// Path where the SARIF report should be created
        #[arg(long, env = "SOPS_CHECK_SARIF_REPORT_PATH")]
        sarif_report_path: Option<PathBuf>,

        /// Gitignore-style file listing paths to skip (can be specified multiple times)
        #[arg(short, long = "ignore-file")]
        ignore_file: Vec<PathBuf>,

        /// Exclude glob patterns relative to PATH (can be specified multiple times)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a starter configuration file
    Init {
        /// Directory to create the configuration in
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

/// Output format for check results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Check {
            path,
            config,
            sarif_report_path,
            ignore_file,
            exclude,
            format,
        } => commands::check::run(&commands::check::CheckArgs {
            path,
            config,
            sarif_report_path,
            ignore_files: ignore_file,
            exclude,
            format,
        }),
        Commands::Init { path, force } => commands::init::run(&path, force),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn check_accepts_repeated_filters() {
        let cli = Cli::try_parse_from([
            "sops-check",
            "check",
            "secrets",
            "-i",
            ".gitignore",
            "--ignore-file",
            ".sopsignore",
            "-e",
            "vendor/**",
            "--format",
            "json",
            "--config",
            "https://example.com/policy.yaml",
        ])
        .unwrap();

        let Commands::Check {
            path,
            config,
            ignore_file,
            exclude,
            format,
            ..
        } = cli.command
        else {
            panic!("expected check command");
        };
        assert_eq!(path, PathBuf::from("secrets"));
        assert_eq!(config.as_deref(), Some("https://example.com/policy.yaml"));
        assert_eq!(
            ignore_file,
            vec![PathBuf::from(".gitignore"), PathBuf::from(".sopsignore")]
        );
        assert_eq!(exclude, vec!["vendor/**".to_string()]);
        assert_eq!(format, OutputFormat::Json);
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["sops-check", "init", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Init { force: false, .. }));
    }
}
