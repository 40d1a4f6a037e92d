use super::*;
use clap::{CommandFactory, Parser};

#[test]
fn parser_accepts_install_with_operation_options() {
    let parsed = Cli::try_parse_from([
        "unipkg",
        "install",
        "npm",
        "left-pad",
        "--version",
        "1.3.0",
        "--scope",
        "global",
        "--params",
        "--registry https://example.test",
        "--skip-hash-check",
    ])
    .expect("install should parse");

    let Some(Command::Install { manager, id, options }) = parsed.command else {
        panic!("expected install");
    };
    assert_eq!(manager, "npm");
    assert_eq!(id, "left-pad");
    assert_eq!(options.version.as_deref(), Some("1.3.0"));
    assert_eq!(options.scope.as_deref(), Some("global"));
    assert_eq!(options.params.as_deref(), Some("--registry https://example.test"));
    assert!(options.skip_hash_check);
    assert!(!options.admin);
}

#[test]
fn parser_accepts_global_flags_after_subcommand() {
    let parsed = Cli::try_parse_from(["unipkg", "installed", "--task-logs", "-v", "-m", "pip"])
        .expect("installed should parse");
    assert!(parsed.global.task_logs);
    assert!(parsed.global.verbose);
    let Some(Command::Installed { filter }) = parsed.command else {
        panic!("expected installed");
    };
    assert_eq!(filter.manager.as_deref(), Some("pip"));
}

#[test]
fn parser_rejects_quiet_with_verbose() {
    assert!(Cli::try_parse_from(["unipkg", "-q", "-v", "managers"]).is_err());
}

#[test]
fn parser_requires_url_when_adding_source() {
    assert!(Cli::try_parse_from(["unipkg", "sources", "scoop", "add", "extras"]).is_err());
    let parsed = Cli::try_parse_from([
        "unipkg",
        "sources",
        "scoop",
        "add",
        "extras",
        "https://github.com/ScoopInstaller/Extras",
    ])
    .expect("sources add should parse");
    assert!(matches!(
        parsed.command,
        Some(Command::Sources {
            command: Some(SourcesCommand::Add { .. }),
            ..
        })
    ));
}

#[test]
fn parser_accepts_dictionary_setting() {
    let parsed = Cli::try_parse_from([
        "unipkg",
        "settings",
        "set",
        "DisabledManagers",
        "true",
        "--item",
        "Pip",
    ])
    .expect("settings set should parse");
    let Some(Command::Settings {
        command: Some(SettingsCommand::Set { key, value, item }),
    }) = parsed.command
    else {
        panic!("expected settings set");
    };
    assert_eq!(key, "DisabledManagers");
    assert_eq!(value, "true");
    assert_eq!(item.as_deref(), Some("Pip"));
}

#[test]
fn help_uninstall_lists_operation_options() {
    let mut cmd = Cli::command();
    let uninstall = cmd
        .find_subcommand_mut("uninstall")
        .expect("uninstall subcommand exists");
    let mut out = Vec::new();
    uninstall
        .write_long_help(&mut out)
        .expect("can render uninstall help");
    let help = String::from_utf8(out).expect("help is valid utf8");
    assert!(help.contains("--remove-data"));
    assert!(help.contains("--options"));
    assert!(help.contains("--interactive"));
}

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}
