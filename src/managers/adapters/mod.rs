//! Built-in manager adapters
//!
//! Each adapter exposes a `definition()` factory plus its output parsers as
//! free functions so they can be tested against captured output.

pub mod cargo;
pub mod chocolatey;
pub mod dotnet;
pub mod npm;
pub mod pip;
pub mod powershell7;
pub mod scoop;

use crate::core::types::OperationType;
use crate::managers::types::ManagerProperties;
use std::path::PathBuf;

pub(crate) fn verb(properties: &ManagerProperties, operation: OperationType) -> String {
    match operation {
        OperationType::Install => properties.install_verb.clone(),
        OperationType::Update => properties.update_verb.clone(),
        OperationType::Uninstall => properties.uninstall_verb.clone(),
    }
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
