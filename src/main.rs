mod cli;
mod commands;
mod config;
mod engine;
mod error;
mod probe;
mod progress;
mod resource;
mod schema;
mod session;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use engine::ApplyOptions;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub manifest: Option<String>,
    pub state: Option<String>,
    pub endpoint: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        manifest: cli.manifest,
        state: cli.state,
        endpoint: cli.endpoint,
    };

    match cli.command {
        Command::Plan(args) => commands::converge::plan(&ctx, args.target.as_deref()),
        Command::Apply(args) => commands::converge::apply(
            &ctx,
            args.target.as_deref(),
            &ApplyOptions {
                dry_run: args.dry_run,
                yes: args.yes,
                jobs: args.jobs,
                verbose: ctx.verbose > 0,
                stop_on_failure: !args.keep_going,
            },
        ),
        Command::Destroy(args) => commands::converge::destroy(
            &ctx,
            args.target.as_deref(),
            &ApplyOptions {
                dry_run: args.dry_run,
                yes: args.yes,
                jobs: 1,
                verbose: ctx.verbose > 0,
                stop_on_failure: true,
            },
        ),
        Command::Status(args) => commands::converge::status(&ctx, args.target.as_deref()),
        Command::Import { address } => commands::import::run(&ctx, &address),
        Command::Equivalent(args) => {
            if !commands::equivalent::run(&args)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "pgconverge", &mut io::stdout());
            Ok(())
        }
    }
}
