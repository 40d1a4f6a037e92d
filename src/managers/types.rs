use crate::sources::ManagerSource;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCapabilities {
    pub knows_package_count: bool,
    pub knows_update_date: bool,
}

/// Feature flags declared once per manager type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerCapabilities {
    pub can_run_as_admin: bool,
    pub can_skip_integrity_checks: bool,
    pub can_run_interactively: bool,
    pub supports_custom_versions: bool,
    pub supports_custom_architectures: bool,
    pub supports_custom_scopes: bool,
    pub supports_custom_locations: bool,
    pub supports_custom_sources: bool,
    pub supports_pre_release: bool,
    /// The listing provider can enumerate every published version of a package
    pub supports_custom_package_versions: bool,
    pub sources: SourceCapabilities,
}

/// Static description of a manager: names, executable and verbs
#[derive(Debug, Clone, Default)]
pub struct ManagerProperties {
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// Executable names (or absolute paths) probed in order
    pub executable_names: Vec<String>,
    /// Arguments placed before every invocation (`-m pip`, `-NoProfile -Command`)
    pub executable_call_args: Vec<String>,
    /// Passed to the bare executable, without the call arguments
    pub version_args: Vec<String>,
    pub install_verb: String,
    pub update_verb: String,
    pub uninstall_verb: String,
    pub known_sources: Vec<ManagerSource>,
    pub default_source: Option<ManagerSource>,
}

impl ManagerProperties {
    pub fn default_source_name(&self) -> &str {
        self.default_source
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or(self.name.as_str())
    }
}

/// Result of executable resolution; read-only until the next reload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerStatus {
    pub found: bool,
    pub executable_path: Option<PathBuf>,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManagerState {
    #[default]
    Uninitialized,
    Initializing,
    /// Enabled and the executable was found
    Ready,
    /// Enabled but the executable was not found
    ReadyButUnavailable,
    Disabled,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManagerState::Uninitialized => "uninitialized",
            ManagerState::Initializing => "initializing",
            ManagerState::Ready => "ready",
            ManagerState::ReadyButUnavailable => "not found",
            ManagerState::Disabled => "disabled",
        };
        f.write_str(s)
    }
}
