//! Sources Command
//!
//! Lists, adds and removes the sources (repositories, buckets, feeds) of one manager.

use crate::cli::args::{GlobalFlags, SourcesCommand};
use crate::commands::Session;
use crate::core::verdict::OperationVerdict;
use crate::error::{EngineError, Result};
use crate::sources::ManagerSource;
use crate::ui as output;

pub async fn run(global: &GlobalFlags, manager: &str, command: Option<&SourcesCommand>) -> Result<()> {
    let session = Session::start(global, Some(manager)).await?;
    let manager = session.single_ready()?;

    let result = match command.unwrap_or(&SourcesCommand::List) {
        SourcesCommand::List => {
            let sources = manager.sources();
            if session.json {
                let rows: Vec<&ManagerSource> = sources.iter().map(|s| s.as_ref()).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if sources.is_empty() {
                output::info(&format!("{} has no known sources", manager.display_name()));
            } else {
                let caps = manager.capabilities().sources;
                for source in &sources {
                    let mut line = format!("{:<20} {}", source.name, source.url());
                    if caps.knows_package_count
                        && let Some(count) = source.package_count
                    {
                        line.push_str(&format!("  ({} packages)", count));
                    }
                    if caps.knows_update_date
                        && let Some(date) = &source.update_date
                    {
                        line.push_str(&format!("  updated {}", date));
                    }
                    println!("{}", line);
                }
            }
            Ok(())
        }
        SourcesCommand::Add { name, url } => {
            let verdict = manager
                .add_source(ManagerSource::new(manager.name(), name.as_str(), url.as_str()))
                .await?;
            expect_success(verdict, &format!("Added source {} to {}", name, manager.display_name()))
        }
        SourcesCommand::Remove { name } => {
            let known = manager.source_or_default(name);
            let verdict = manager
                .remove_source(ManagerSource::new(manager.name(), name.as_str(), known.url()))
                .await?;
            expect_success(verdict, &format!("Removed source {} from {}", name, manager.display_name()))
        }
    };

    session.finish();
    result
}

fn expect_success(verdict: OperationVerdict, message: &str) -> Result<()> {
    match verdict {
        OperationVerdict::Succeeded => {
            output::success(message);
            Ok(())
        }
        other => Err(EngineError::Other(format!("Source operation {}", other))),
    }
}
