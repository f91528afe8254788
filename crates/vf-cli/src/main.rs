//! # vf CLI entry point
//!
//! Parses command-line arguments, installs the tracing subscriber, and
//! dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vf_cli::check::run_check;
use vf_cli::config::DEFAULT_CONFIG_FILE;
use vf_cli::record::{run_hash, run_render, HashArgs, RenderArgs};
use vf_cli::republish::{run_republish, RepublishArgs};
use vf_cli::submit::{run_cancel, run_register, SubmitArgs};
use vf_cli::verify::{run_verify, VerifyArgs};

/// Invoice record chain tool.
///
/// Hashes, renders, submits and verifies chained fiscal records, and
/// checks that an installation is ready to submit.
#[derive(Parser, Debug)]
#[command(name = "vf", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    /// Path to the configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recompute a stored record's hash.
    Hash(HashArgs),

    /// Print the SOAP envelope for a stored record.
    Render(RenderArgs),

    /// Register an issued invoice.
    Register(SubmitArgs),

    /// Cancel a registered invoice.
    Cancel(SubmitArgs),

    /// Verify a signed audit entry against the ledger.
    Verify(VerifyArgs),

    /// Restore a public artifact from its protected copy.
    Republish(RepublishArgs),

    /// Report unmet setup preconditions.
    Check,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let config = cli.config.as_path();
    let result = match &cli.command {
        Commands::Hash(args) => run_hash(args),
        Commands::Render(args) => run_render(args, config),
        Commands::Register(args) => run_register(args, config),
        Commands::Cancel(args) => run_cancel(args, config),
        Commands::Verify(args) => run_verify(args, config),
        Commands::Republish(args) => run_republish(args, config),
        Commands::Check => run_check(config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// `RUST_LOG` wins; otherwise the level follows `-v`.
fn init_tracing(verbose: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::RecordKind;

    #[test]
    fn cli_parse_register() {
        let cli = Cli::try_parse_from(["vf", "register", "--invoice", "inv.json"]).unwrap();
        match cli.command {
            Commands::Register(args) => assert_eq!(args.invoice, PathBuf::from("inv.json")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cli.config, PathBuf::from("vf.yaml"));
    }

    #[test]
    fn cli_parse_republish_kind() {
        let cli = Cli::try_parse_from([
            "vf",
            "republish",
            "--issuer",
            "B12345678",
            "--number",
            "FA-1",
            "--issue-date",
            "01-05-2024",
            "--kind",
            "cancellation",
        ])
        .unwrap();
        match cli.command {
            Commands::Republish(args) => {
                assert_eq!(args.kind, RecordKind::Cancellation);
                assert_eq!(args.issue_date, "01-05-2024");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_parse_republish_rejects_unknown_kind() {
        let result = Cli::try_parse_from([
            "vf",
            "republish",
            "--issuer",
            "B12345678",
            "--number",
            "FA-1",
            "--issue-date",
            "01-05-2024",
            "--kind",
            "draft",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parse_global_flags() {
        let cli =
            Cli::try_parse_from(["vf", "-vv", "--json", "--config", "/etc/vf.yaml", "check"])
                .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        assert_eq!(cli.config, PathBuf::from("/etc/vf.yaml"));
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn cli_parse_verify_requires_audit() {
        assert!(Cli::try_parse_from(["vf", "verify"]).is_err());
    }

    #[test]
    fn cli_parse_no_subcommand_errors() {
        assert!(Cli::try_parse_from(["vf"]).is_err());
    }
}
