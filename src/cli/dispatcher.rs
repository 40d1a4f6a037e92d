//! Command dispatcher
//!
//! Routes CLI commands to their handlers. Handlers that talk to package
//! managers are async and run on one multi-threaded runtime.

use crate::cli::args::{Cli, Command};
use crate::commands::{self, list::Listing, operate::OperateOptions};
use crate::core::types::OperationType;
use crate::error::Result;
use std::future::Future;

/// Dispatch the parsed CLI command to the appropriate handler
pub fn dispatch(args: &Cli) -> Result<()> {
    let global = &args.global;

    match &args.command {
        None | Some(Command::Managers) => block_on(commands::managers::run(global)),

        Some(Command::Search { query, filter }) => {
            block_on(commands::search::run(global, query, filter.manager.as_deref()))
        }

        Some(Command::Installed { filter }) => block_on(commands::list::run(
            global,
            Listing::Installed,
            filter.manager.as_deref(),
        )),

        Some(Command::Updates { filter }) => block_on(commands::list::run(
            global,
            Listing::Updates,
            filter.manager.as_deref(),
        )),

        Some(Command::Install { manager, id, options }) => block_on(commands::operate::run(
            global,
            OperateOptions {
                manager,
                id,
                operation: OperationType::Install,
                args: options,
                remove_data: false,
            },
        )),

        Some(Command::Update { manager, id, options }) => block_on(commands::operate::run(
            global,
            OperateOptions {
                manager,
                id,
                operation: OperationType::Update,
                args: options,
                remove_data: false,
            },
        )),

        Some(Command::Uninstall {
            manager,
            id,
            options,
            remove_data,
        }) => block_on(commands::operate::run(
            global,
            OperateOptions {
                manager,
                id,
                operation: OperationType::Uninstall,
                args: options,
                remove_data: *remove_data,
            },
        )),

        Some(Command::UpdateAll { filter, options }) => block_on(commands::update_all::run(
            global,
            filter.manager.as_deref(),
            options,
        )),

        Some(Command::Sources { manager, command }) => {
            block_on(commands::sources::run(global, manager, command.as_ref()))
        }

        Some(Command::Settings { command }) => commands::settings::run(command.as_ref()),

        Some(Command::OptionsDiff { file }) => commands::options_diff::run(file, global.json),

        Some(Command::Completions { shell }) => commands::completions::run(*shell),
    }
}

fn block_on<F>(future: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}
