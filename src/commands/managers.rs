//! Managers Command
//!
//! Initializes every registered manager and reports what was found.

use crate::cli::args::GlobalFlags;
use crate::commands::Session;
use crate::error::Result;
use crate::managers::ManagerState;
use crate::ui as output;
use colored::Colorize;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ManagerRow {
    name: String,
    display_name: String,
    state: String,
    version: String,
    executable: Option<String>,
}

pub async fn run(global: &GlobalFlags) -> Result<()> {
    let session = Session::start(global, None).await?;

    let rows: Vec<ManagerRow> = session
        .managers
        .iter()
        .map(|manager| {
            let status = manager.status();
            ManagerRow {
                name: manager.name().to_string(),
                display_name: manager.display_name().to_string(),
                state: manager.state().to_string(),
                version: status.version,
                executable: status.executable_path.map(|p| p.display().to_string()),
            }
        })
        .collect();

    if session.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        output::header("Package managers");
        for (manager, row) in session.managers.iter().zip(&rows) {
            let state = match manager.state() {
                ManagerState::Ready => row.state.green(),
                ManagerState::Disabled => row.state.bright_black(),
                _ => row.state.yellow(),
            };
            println!("{:<12} {}", row.display_name.bold(), state);
            if let Some(path) = &row.executable {
                output::indent(&format!("path: {}", path), 1);
            }
            if !row.version.is_empty() {
                output::indent(&format!("version: {}", row.version.lines().next().unwrap_or("")), 1);
            }
        }
    }

    session.finish();
    Ok(())
}
