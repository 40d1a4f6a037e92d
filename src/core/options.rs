//! Install options attached to install/update/uninstall requests
//!
//! Options round-trip through a JSON document. Only values that differ from
//! the defaults are written; missing keys are restored as defaults on load.
//! Every field is listed explicitly in the `*_fields` tables below so a new
//! field cannot be silently skipped by serialization or diffing.

use crate::core::types::{OperationType, Package, PackageScope};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

const SKIP_HASH: &str = "SkipHashCheck";
const INTERACTIVE: &str = "InteractiveInstallation";
const AS_ADMIN: &str = "RunAsAdministrator";
const PRERELEASE: &str = "PreRelease";
const SKIP_MINOR: &str = "SkipMinorUpdates";
const REMOVE_DATA_UNINST: &str = "RemoveDataOnUninstall";
const CLEAR_PREV_VER: &str = "UninstallPreviousVersionsOnUpdate";
const ABORT_PRE_INST_FAIL: &str = "AbortOnPreInstallFail";
const ABORT_PRE_UPD_FAIL: &str = "AbortOnPreUpdateFail";
const ABORT_PRE_UNINST_FAIL: &str = "AbortOnPreUninstallFail";
const AUTO_UPDATE_PACKAGE: &str = "AutoUpdatePackage";

const ARCH: &str = "Architecture";
const SCOPE: &str = "InstallationScope";
const LOCATION: &str = "CustomInstallLocation";
const VERSION: &str = "Version";
const PRE_INST_CMD: &str = "PreInstallCommand";
const POST_INST_CMD: &str = "PostInstallCommand";
const PRE_UPD_CMD: &str = "PreUpdateCommand";
const POST_UPD_CMD: &str = "PostUpdateCommand";
const PRE_UNINST_CMD: &str = "PreUninstallCommand";
const POST_UNINST_CMD: &str = "PostUninstallCommand";

const INST_PARAMS: &str = "CustomParameters_Install";
const UPD_PARAMS: &str = "CustomParameters_Update";
const UNINST_PARAMS: &str = "CustomParameters_Uninstall";
const KILL_BEFORE_OP: &str = "KillBeforeOperation";

const LEGACY_PARAMS: &str = "CustomParameters";
const OVERRIDES: &str = "OverridesNextLevelOpts";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    pub skip_hash_check: bool,
    pub interactive_installation: bool,
    pub run_as_administrator: bool,
    pub pre_release: bool,
    pub skip_minor_updates: bool,
    pub remove_data_on_uninstall: bool,
    pub uninstall_previous_versions_on_update: bool,
    pub abort_on_pre_install_fail: bool,
    pub abort_on_pre_update_fail: bool,
    pub abort_on_pre_uninstall_fail: bool,
    pub auto_update_package: bool,

    pub architecture: String,
    pub installation_scope: Option<PackageScope>,
    pub custom_install_location: String,
    pub version: String,
    pub pre_install_command: String,
    pub post_install_command: String,
    pub pre_update_command: String,
    pub post_update_command: String,
    pub pre_uninstall_command: String,
    pub post_uninstall_command: String,

    pub custom_parameters_install: Vec<String>,
    pub custom_parameters_update: Vec<String>,
    pub custom_parameters_uninstall: Vec<String>,
    pub kill_before_operation: Vec<String>,

    /// Whether these options take precedence over manager-level defaults
    pub overrides_next_level_opts: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            skip_hash_check: false,
            interactive_installation: false,
            run_as_administrator: false,
            pre_release: false,
            skip_minor_updates: false,
            remove_data_on_uninstall: false,
            uninstall_previous_versions_on_update: false,
            abort_on_pre_install_fail: true,
            abort_on_pre_update_fail: true,
            abort_on_pre_uninstall_fail: true,
            auto_update_package: false,
            architecture: String::new(),
            installation_scope: None,
            custom_install_location: String::new(),
            version: String::new(),
            pre_install_command: String::new(),
            post_install_command: String::new(),
            pre_update_command: String::new(),
            post_update_command: String::new(),
            pre_uninstall_command: String::new(),
            post_uninstall_command: String::new(),
            custom_parameters_install: Vec::new(),
            custom_parameters_update: Vec::new(),
            custom_parameters_uninstall: Vec::new(),
            kill_before_operation: Vec::new(),
            overrides_next_level_opts: false,
        }
    }
}

impl InstallOptions {
    fn bool_fields(&self) -> [(&'static str, bool, bool); 11] {
        [
            (SKIP_HASH, false, self.skip_hash_check),
            (INTERACTIVE, false, self.interactive_installation),
            (AS_ADMIN, false, self.run_as_administrator),
            (PRERELEASE, false, self.pre_release),
            (SKIP_MINOR, false, self.skip_minor_updates),
            (REMOVE_DATA_UNINST, false, self.remove_data_on_uninstall),
            (CLEAR_PREV_VER, false, self.uninstall_previous_versions_on_update),
            (ABORT_PRE_INST_FAIL, true, self.abort_on_pre_install_fail),
            (ABORT_PRE_UPD_FAIL, true, self.abort_on_pre_update_fail),
            (ABORT_PRE_UNINST_FAIL, true, self.abort_on_pre_uninstall_fail),
            (AUTO_UPDATE_PACKAGE, false, self.auto_update_package),
        ]
    }

    fn bool_fields_mut(&mut self) -> [(&'static str, bool, &mut bool); 11] {
        [
            (SKIP_HASH, false, &mut self.skip_hash_check),
            (INTERACTIVE, false, &mut self.interactive_installation),
            (AS_ADMIN, false, &mut self.run_as_administrator),
            (PRERELEASE, false, &mut self.pre_release),
            (SKIP_MINOR, false, &mut self.skip_minor_updates),
            (REMOVE_DATA_UNINST, false, &mut self.remove_data_on_uninstall),
            (CLEAR_PREV_VER, false, &mut self.uninstall_previous_versions_on_update),
            (ABORT_PRE_INST_FAIL, true, &mut self.abort_on_pre_install_fail),
            (ABORT_PRE_UPD_FAIL, true, &mut self.abort_on_pre_update_fail),
            (ABORT_PRE_UNINST_FAIL, true, &mut self.abort_on_pre_uninstall_fail),
            (AUTO_UPDATE_PACKAGE, false, &mut self.auto_update_package),
        ]
    }

    // The scope is typed, so it is handled apart from the plain strings
    fn string_fields(&self) -> [(&'static str, &str); 9] {
        [
            (ARCH, &self.architecture),
            (LOCATION, &self.custom_install_location),
            (VERSION, &self.version),
            (PRE_INST_CMD, &self.pre_install_command),
            (POST_INST_CMD, &self.post_install_command),
            (PRE_UPD_CMD, &self.pre_update_command),
            (POST_UPD_CMD, &self.post_update_command),
            (PRE_UNINST_CMD, &self.pre_uninstall_command),
            (POST_UNINST_CMD, &self.post_uninstall_command),
        ]
    }

    fn string_fields_mut(&mut self) -> [(&'static str, &mut String); 9] {
        [
            (ARCH, &mut self.architecture),
            (LOCATION, &mut self.custom_install_location),
            (VERSION, &mut self.version),
            (PRE_INST_CMD, &mut self.pre_install_command),
            (POST_INST_CMD, &mut self.post_install_command),
            (PRE_UPD_CMD, &mut self.pre_update_command),
            (POST_UPD_CMD, &mut self.post_update_command),
            (PRE_UNINST_CMD, &mut self.pre_uninstall_command),
            (POST_UNINST_CMD, &mut self.post_uninstall_command),
        ]
    }

    fn list_fields(&self) -> [(&'static str, &[String]); 4] {
        [
            (INST_PARAMS, &self.custom_parameters_install),
            (UPD_PARAMS, &self.custom_parameters_update),
            (UNINST_PARAMS, &self.custom_parameters_uninstall),
            (KILL_BEFORE_OP, &self.kill_before_operation),
        ]
    }

    fn list_fields_mut(&mut self) -> [(&'static str, &mut Vec<String>); 4] {
        [
            (INST_PARAMS, &mut self.custom_parameters_install),
            (UPD_PARAMS, &mut self.custom_parameters_update),
            (UNINST_PARAMS, &mut self.custom_parameters_uninstall),
            (KILL_BEFORE_OP, &mut self.kill_before_operation),
        ]
    }

    /// True if any field (other than `overrides_next_level_opts`) differs from its default
    pub fn differs_from_default(&self) -> bool {
        self.bool_fields().iter().any(|(_, def, val)| val != def)
            || self.installation_scope.is_some()
            || self.string_fields().iter().any(|(_, val)| !val.is_empty())
            || self.list_fields().iter().any(|(_, val)| has_entries(val))
    }

    pub fn custom_parameters(&self, operation: OperationType) -> &[String] {
        match operation {
            OperationType::Install => &self.custom_parameters_install,
            OperationType::Update => &self.custom_parameters_update,
            OperationType::Uninstall => &self.custom_parameters_uninstall,
        }
    }

    pub fn pre_command(&self, operation: OperationType) -> &str {
        match operation {
            OperationType::Install => &self.pre_install_command,
            OperationType::Update => &self.pre_update_command,
            OperationType::Uninstall => &self.pre_uninstall_command,
        }
    }

    pub fn post_command(&self, operation: OperationType) -> &str {
        match operation {
            OperationType::Install => &self.post_install_command,
            OperationType::Update => &self.post_update_command,
            OperationType::Uninstall => &self.post_uninstall_command,
        }
    }

    pub fn abort_on_pre_fail(&self, operation: OperationType) -> bool {
        match operation {
            OperationType::Install => self.abort_on_pre_install_fail,
            OperationType::Update => self.abort_on_pre_update_fail,
            OperationType::Uninstall => self.abort_on_pre_uninstall_fail,
        }
    }

    /// Scope for `package`: its own override wins over these options
    pub fn effective_scope(&self, package: &Package) -> Option<PackageScope> {
        package.overrides().scope.or(self.installation_scope)
    }

    /// Whether an operation on `package` must run elevated
    pub fn runs_elevated(&self, package: &Package) -> bool {
        self.run_as_administrator || package.overrides().run_as_admin == Some(true)
    }

    /// Build the structured document form
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();

        if self.overrides_next_level_opts || self.differs_from_default() {
            obj.insert(
                OVERRIDES.to_string(),
                Value::Bool(self.overrides_next_level_opts),
            );
        }

        for (key, def, val) in self.bool_fields() {
            if val != def {
                obj.insert(key.to_string(), Value::Bool(val));
            }
        }

        if let Some(scope) = self.installation_scope {
            obj.insert(SCOPE.to_string(), Value::String(scope.to_string()));
        }

        for (key, val) in self.string_fields() {
            if !val.is_empty() {
                obj.insert(key.to_string(), Value::String(val.to_string()));
            }
        }

        for (key, val) in self.list_fields() {
            if has_entries(val) {
                let items = val.iter().cloned().map(Value::String).collect();
                obj.insert(key.to_string(), Value::Array(items));
            }
        }

        Value::Object(obj)
    }

    /// Load from the structured document form, restoring omitted values as defaults
    pub fn from_json(data: &Value) -> Result<Self> {
        let obj = data.as_object().ok_or_else(|| {
            EngineError::InvalidOptions("options document must be a JSON object".to_string())
        })?;

        let mut options = Self::default();

        for (key, def, slot) in options.bool_fields_mut() {
            *slot = match obj.get(key) {
                Some(value) => value.as_bool().ok_or_else(|| type_error(key, "a boolean"))?,
                None => def,
            };
        }

        options.installation_scope = match obj.get(SCOPE).and_then(Value::as_str) {
            Some("") | None => None,
            Some(raw) => Some(raw.parse().map_err(EngineError::InvalidOptions)?),
        };

        for (key, slot) in options.string_fields_mut() {
            *slot = match obj.get(key) {
                Some(value) => value
                    .as_str()
                    .ok_or_else(|| type_error(key, "a string"))?
                    .to_string(),
                None => String::new(),
            };
        }

        for (key, slot) in options.list_fields_mut() {
            *slot = read_string_array(obj, key)?;
        }

        // Documents written before per-operation parameters existed
        if options.custom_parameters_install.is_empty()
            && options.custom_parameters_update.is_empty()
            && options.custom_parameters_uninstall.is_empty()
            && obj.contains_key(LEGACY_PARAMS)
        {
            let legacy = read_string_array(obj, LEGACY_PARAMS)?;
            options.custom_parameters_install = legacy.clone();
            options.custom_parameters_update = legacy.clone();
            options.custom_parameters_uninstall = legacy;
        }

        // Must run last: the fallback depends on every other field
        options.overrides_next_level_opts = match obj.get(OVERRIDES) {
            Some(value) => value.as_bool().ok_or_else(|| type_error(OVERRIDES, "a boolean"))?,
            None => options.differs_from_default(),
        };

        Ok(options)
    }
}

fn has_entries(list: &[String]) -> bool {
    list.iter().any(|item| !item.is_empty())
}

fn type_error(key: &str, expected: &str) -> EngineError {
    EngineError::InvalidOptions(format!("'{}' must be {}", key, expected))
}

fn read_string_array(obj: &Map<String, Value>, key: &str) -> Result<Vec<String>> {
    let Some(value) = obj.get(key) else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| type_error(key, "an array of strings"))?;

    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect())
}

impl Serialize for InstallOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InstallOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        InstallOptions::from_json(&value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for InstallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<InstallOptions (only non-default values are shown)")?;
        for (key, def, val) in self.bool_fields() {
            if val != def {
                write!(f, "\n\t{}: {}", key, val)?;
            }
        }
        if let Some(scope) = self.installation_scope {
            write!(f, "\n\t{}: \"{}\"", SCOPE, scope)?;
        }
        for (key, val) in self.string_fields() {
            if !val.is_empty() {
                write!(f, "\n\t{}: \"{}\"", key, val)?;
            }
        }
        for (key, val) in self.list_fields() {
            if has_entries(val) {
                write!(f, "\n\t{}: [{}]", key, val.join(", "))?;
            }
        }
        write!(f, "\n\t{}: {}>", OVERRIDES, self.overrides_next_level_opts)
    }
}
