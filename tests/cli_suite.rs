use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// Helper function to initialize the command with an isolated config directory.
fn unipkg(config: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_unipkg"));
    cmd.env("UNIPKG_CONFIG_DIR", config.path());
    cmd
}

#[test]
fn test_help_command() {
    let config = TempDir::new().unwrap();
    unipkg(&config)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Chocolatey"));
}

#[test]
fn test_version_flag() {
    let config = TempDir::new().unwrap();
    let expected = format!("unipkg {}", env!("CARGO_PKG_VERSION"));
    unipkg(&config)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
}

#[test]
fn test_unknown_command_fails() {
    let config = TempDir::new().unwrap();
    unipkg(&config)
        .arg("unknown-command-xyz")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: unipkg"));
}

#[test]
fn test_settings_round_trip() {
    let config = TempDir::new().unwrap();

    unipkg(&config)
        .args(["settings", "set", "DisableTimeoutOnPackageListingTasks", "true"])
        .assert()
        .success();
    unipkg(&config)
        .args(["settings", "get", "DisableTimeoutOnPackageListingTasks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("true"));

    unipkg(&config)
        .args(["settings", "set", "DisabledManagers", "true", "--item", "Pip"])
        .assert()
        .success();
    unipkg(&config)
        .args(["settings", "get", "DisabledManagers", "--item", "Pip"])
        .assert()
        .success()
        .stdout(predicate::str::contains("true"));

    assert!(config.path().join("settings.json").exists());
}

#[test]
fn test_settings_rejects_unknown_key() {
    let config = TempDir::new().unwrap();
    unipkg(&config)
        .args(["settings", "set", "NoSuchSetting", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown setting"));
}

#[test]
fn test_settings_dictionary_needs_item() {
    let config = TempDir::new().unwrap();
    unipkg(&config)
        .args(["settings", "set", "ManagerPaths", "/usr/bin/npm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dictionary setting"));
}

#[test]
fn test_options_diff_prints_non_default_values() {
    let config = TempDir::new().unwrap();
    let file = config.path().join("options.json");
    std::fs::write(
        &file,
        r#"{"SkipHashCheck": true, "CustomParameters": ["--quiet"], "Architecture": ""}"#,
    )
    .unwrap();

    unipkg(&config)
        .args(["options-diff", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("SkipHashCheck: true"))
        .stdout(predicate::str::contains("CustomParameters_Install: [--quiet]"))
        .stdout(predicate::str::contains("Architecture").not());
}

#[test]
fn test_options_diff_rejects_non_object() {
    let config = TempDir::new().unwrap();
    let file = config.path().join("options.json");
    std::fs::write(&file, "[1, 2]").unwrap();

    unipkg(&config)
        .args(["options-diff", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON object"));
}

#[test]
fn test_completions_for_bash() {
    let config = TempDir::new().unwrap();
    unipkg(&config)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unipkg"));
}

#[test]
fn test_install_with_unknown_manager_fails() {
    let config = TempDir::new().unwrap();
    unipkg(&config)
        .args(["install", "apt", "curl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Package manager not found: apt"));
}

/// End-to-end runs against a fake `npm` that is the only thing on PATH
#[cfg(unix)]
mod fake_npm {
    use super::*;
    use std::path::Path;

    const FAKE_NPM: &str = r#"#!/bin/sh
case "$1" in
  --version) echo "10.2.4" ;;
  list)
    if [ "$3" = "--global" ]; then
      echo '{"dependencies":{"typescript":{"version":"5.4.2"}}}'
    else
      echo '{"dependencies":{"left-pad":{"version":"1.3.0"}}}'
    fi ;;
  outdated)
    if [ "$3" = "--global" ]; then
      echo '{}'
    else
      echo '{"left-pad":{"current":"1.3.0","wanted":"1.3.0","latest":"1.3.1"}}'
    fi ;;
  install|update) echo "changed 1 package in 1s" ;;
  uninstall) echo "npm ERR! code EACCES" >&2; exit 243 ;;
  *) exit 1 ;;
esac
"#;

    const FAKE_CHOCO: &str = r#"#!/bin/sh
case "$1" in
  --version) echo "2.2.2" ;;
  source)
    echo "Chocolatey v2.2.2"
    echo "chocolatey - https://community.chocolatey.org/api/v2/ | Priority 0|Bypass Proxy - False"
    echo "internal - https://nuget.example.com/v2/ | Priority 1|Bypass Proxy - False" ;;
  *) exit 1 ;;
esac
"#;

    fn fake_path() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_executable(&dir.path().join("npm"), FAKE_NPM);
        dir
    }

    fn write_executable(path: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, body).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn fake_choco_path() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_executable(&dir.path().join("choco"), FAKE_CHOCO);
        dir
    }

    fn run(config: &TempDir, bin: &TempDir) -> Command {
        let mut cmd = unipkg(config);
        cmd.env("PATH", bin.path());
        cmd
    }

    #[test]
    fn test_managers_reports_found_and_missing() {
        let (config, bin) = (TempDir::new().unwrap(), fake_path());
        run(&config, &bin)
            .args(["--json", "managers"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"version\": \"10.2.4\""))
            .stdout(predicate::str::contains("\"state\": \"ready\""))
            .stdout(predicate::str::contains("\"state\": \"not found\""));
    }

    #[test]
    fn test_installed_lists_both_scopes() {
        let (config, bin) = (TempDir::new().unwrap(), fake_path());
        run(&config, &bin)
            .args(["--json", "installed", "-m", "npm"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"id\": \"left-pad\""))
            .stdout(predicate::str::contains("\"id\": \"typescript\""))
            .stdout(predicate::str::contains("\"scope\": \"Global\""));
    }

    #[test]
    fn test_updates_carry_new_version() {
        let (config, bin) = (TempDir::new().unwrap(), fake_path());
        run(&config, &bin)
            .args(["--json", "updates", "--manager", "npm"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"new_version\": \"1.3.1\""));
    }

    #[test]
    fn test_disabled_manager_lists_nothing() {
        let (config, bin) = (TempDir::new().unwrap(), fake_path());
        std::fs::write(
            config.path().join("settings.json"),
            r#"{"DisabledManagers": {"Npm": "true"}}"#,
        )
        .unwrap();

        run(&config, &bin)
            .args(["--json", "installed", "-m", "npm"])
            .assert()
            .success()
            .stdout(predicate::str::contains("left-pad").not());
    }

    #[test]
    fn test_install_succeeds_and_prints_task_logs() {
        let (config, bin) = (TempDir::new().unwrap(), fake_path());
        run(&config, &bin)
            .args(["install", "npm", "left-pad", "--version", "1.3.1", "--task-logs", "-v"])
            .assert()
            .success()
            .stdout(predicate::str::contains("install left-pad via Npm: succeeded"))
            .stdout(predicate::str::contains("left-pad@1.3.1"))
            .stdout(predicate::str::contains("changed 1 package"));
    }

    #[test]
    fn test_failed_uninstall_exits_with_error() {
        let (config, bin) = (TempDir::new().unwrap(), fake_path());
        run(&config, &bin)
            .args(["uninstall", "npm", "left-pad"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("uninstall left-pad via Npm: failed"))
            .stderr(predicate::str::contains("did not succeed"));
    }

    #[test]
    fn test_update_all_runs_every_update() {
        let (config, bin) = (TempDir::new().unwrap(), fake_path());
        run(&config, &bin)
            .args(["--json", "update-all", "-m", "npm", "-y"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"package_id\": \"left-pad\""))
            .stdout(predicate::str::contains("\"verdict\": \"Succeeded\""));
    }

    #[test]
    fn test_sources_unsupported_for_npm() {
        let (config, bin) = (TempDir::new().unwrap(), fake_path());
        run(&config, &bin)
            .args(["sources", "npm", "add", "mirror", "https://registry.example.test"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("does not support custom sources"));
    }

    #[test]
    fn test_sources_list_as_json() {
        let (config, bin) = (TempDir::new().unwrap(), fake_choco_path());
        run(&config, &bin)
            .args(["--json", "sources", "choco"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"name\": \"internal\""))
            .stdout(predicate::str::contains("\"url\": \"https://nuget.example.com/v2/\""))
            .stdout(predicate::str::contains("\"manager\": \"Chocolatey\""));
    }
}
