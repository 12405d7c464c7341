//! credit-scope - Main Entry Point
//!
//! Runs the credit default analysis from the command line.

use clap::Parser;
use credit_scope::cli::{cmd_info, cmd_run, Cli, Commands, RunArgs};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `--json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credit_scope=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            sheet,
            header_row,
            target,
            config,
            seed,
            cv_folds,
            jobs,
            no_rules,
            json,
        } => {
            let args = RunArgs {
                data,
                sheet,
                header_row,
                target,
                config,
                seed,
                cv_folds,
                jobs,
                no_rules,
                json,
            };
            cmd_run(&args)?;
        }
        Commands::Info { data, sheet, header_row } => {
            cmd_info(&data, &sheet, header_row)?;
        }
    }

    Ok(())
}
