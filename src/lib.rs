pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod managers;
pub mod operations;
pub mod process;
pub mod sources;
pub mod ui;
pub mod utils;

use clap::Parser;
use std::process::exit;

/// Run the unipkg CLI entrypoint.
pub fn run_cli() {
    let args = cli::args::Cli::parse();

    // RUST_LOG wins; -v only raises the default
    let default_level = if args.global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    ui::set_quiet(args.global.quiet);

    if let Err(e) = cli::dispatcher::dispatch(&args) {
        ui::error(&format!("{}", e));
        exit(1);
    }
}
