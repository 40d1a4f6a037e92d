pub mod completions;
pub mod list;
pub mod managers;
pub mod operate;
pub mod options_diff;
pub mod search;
pub mod settings;
pub mod sources;
pub mod update_all;

use crate::cli::args::GlobalFlags;
use crate::config::{Settings, SettingsStore, keys};
use crate::core::types::{Package, PackageScope};
use crate::error::{EngineError, Result};
use crate::managers::{EngineServices, ManagerRegistry, PackageManager, initialize_all};
use crate::ui as output;
use serde::Serialize;
use std::sync::Arc;

/// Settings plus the initialized managers a command works with
pub struct Session {
    pub settings: Arc<Settings>,
    pub managers: Vec<Arc<PackageManager>>,
    task_logs: bool,
    verbose: bool,
    pub json: bool,
}

impl Session {
    /// Load settings and initialize every registered manager, or only `only`
    pub async fn start(global: &GlobalFlags, only: Option<&str>) -> Result<Self> {
        let settings = Arc::new(Settings::load()?);
        let services = EngineServices::new(Arc::clone(&settings) as Arc<dyn SettingsStore>);
        let registry = ManagerRegistry::default();

        let managers = match only {
            Some(query) => {
                let name = registry
                    .resolve_name(query)
                    .ok_or_else(|| EngineError::ManagerNotFound(query.to_string()))?;
                vec![Arc::new(registry.create_manager(name, &services)?)]
            }
            None => registry.create_all(&services)?,
        };

        let managers = initialize_all(managers).await;
        let verbose = global.verbose || settings.get(keys::VERBOSE_TASK_LOGS);

        Ok(Self {
            settings,
            managers,
            task_logs: global.task_logs,
            verbose,
            json: global.json,
        })
    }

    /// The single manager a per-manager command targets; it must be usable
    pub fn single_ready(&self) -> Result<&Arc<PackageManager>> {
        let manager = self
            .managers
            .first()
            .ok_or_else(|| EngineError::ManagerNotFound("(none)".to_string()))?;
        if !manager.is_ready() {
            return Err(EngineError::Other(format!(
                "Manager {} is {}",
                manager.display_name(),
                manager.state()
            )));
        }
        Ok(manager)
    }

    pub fn ready(&self) -> impl Iterator<Item = &Arc<PackageManager>> {
        self.managers.iter().filter(|m| m.is_ready())
    }

    /// Print the collected task logs when asked to
    pub fn finish(&self) {
        if !self.task_logs {
            return;
        }
        for manager in &self.managers {
            if manager.logger().is_empty() {
                continue;
            }
            output::header(&format!("Task logs: {}", manager.display_name()));
            for line in manager.logger().report(self.verbose) {
                output::task_log_line(&line);
            }
        }
    }
}

/// Flat, serializable view of a package for listings
#[derive(Debug, Serialize)]
pub struct PackageRow {
    pub name: String,
    pub id: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_version: Option<String>,
    pub source: String,
    pub manager: String,
    pub scope: PackageScope,
}

impl From<&Package> for PackageRow {
    fn from(package: &Package) -> Self {
        Self {
            name: package.name.clone(),
            id: package.id.clone(),
            version: package.version.clone(),
            new_version: package.new_version.clone(),
            source: package.source.clone(),
            manager: package.manager.clone(),
            scope: package.scope,
        }
    }
}

pub fn print_packages(packages: &[Arc<Package>], json: bool) -> Result<()> {
    let rows: Vec<PackageRow> = packages.iter().map(|p| PackageRow::from(p.as_ref())).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        output::info("No packages found");
        return Ok(());
    }

    let id_width = rows.iter().map(|r| r.id.len()).max().unwrap_or(0).max(2);
    let version_width = rows.iter().map(|r| r.version.len()).max().unwrap_or(0).max(7);
    for row in &rows {
        let version = match &row.new_version {
            Some(new) => format!("{:<version_width$} -> {}", row.version, new),
            None => format!("{:<version_width$}", row.version),
        };
        println!(
            "{:<id_width$}  {}  {} ({}, {})",
            row.id, version, row.manager, row.source, row.scope
        );
    }
    Ok(())
}
