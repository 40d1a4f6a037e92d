use super::*;
use tempfile::TempDir;

#[test]
fn test_unset_bool_is_false() {
    let settings = Settings::in_memory();
    assert!(!settings.get(keys::DISABLE_TIMEOUT_ON_PACKAGE_LISTING_TASKS));
}

#[test]
fn test_set_and_get_bool() {
    let settings = Settings::in_memory();
    settings
        .set(keys::DISABLE_TIMEOUT_ON_PACKAGE_LISTING_TASKS, "true")
        .unwrap();
    assert!(settings.get(keys::DISABLE_TIMEOUT_ON_PACKAGE_LISTING_TASKS));

    settings
        .set(keys::DISABLE_TIMEOUT_ON_PACKAGE_LISTING_TASKS, "")
        .unwrap();
    assert!(settings.get_value(keys::DISABLE_TIMEOUT_ON_PACKAGE_LISTING_TASKS).is_none());
}

#[test]
fn test_validate_key_invalid() {
    let settings = Settings::in_memory();
    assert!(settings.set("color", "auto").is_err());
}

#[test]
fn test_dictionary_items() {
    let settings = Settings::in_memory();
    settings
        .set_dictionary_item(keys::DISABLED_MANAGERS, "Npm", "true")
        .unwrap();

    assert_eq!(
        settings.get_dictionary_item(keys::DISABLED_MANAGERS, "Npm"),
        Some("true".to_string())
    );
    assert!(settings.get_dictionary_item(keys::DISABLED_MANAGERS, "Pip").is_none());

    settings
        .set_dictionary_item(keys::DISABLED_MANAGERS, "Npm", "")
        .unwrap();
    assert!(settings.get_dictionary_item(keys::DISABLED_MANAGERS, "Npm").is_none());
}

#[test]
fn test_dictionary_and_plain_keys_are_not_mixed() {
    let settings = Settings::in_memory();
    assert!(settings.set(keys::MANAGER_PATHS, "/usr/bin/npm").is_err());
    assert!(
        settings
            .set_dictionary_item(keys::VERBOSE_TASK_LOGS, "Npm", "true")
            .is_err()
    );
}

#[test]
fn test_persists_to_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("settings.json");

    let settings = Settings::load_from(&path).unwrap();
    settings.set(keys::VERBOSE_TASK_LOGS, "true").unwrap();
    settings
        .set_dictionary_item(keys::MANAGER_PATHS, "Pip", "/opt/python/bin/python3")
        .unwrap();

    let reloaded = Settings::load_from(&path).unwrap();
    assert!(reloaded.get(keys::VERBOSE_TASK_LOGS));
    assert_eq!(
        reloaded.get_dictionary_item(keys::MANAGER_PATHS, "Pip"),
        Some("/opt/python/bin/python3".to_string())
    );
}

#[test]
fn test_rejects_non_object_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "[1, 2, 3]").unwrap();
    assert!(Settings::load_from(&path).is_err());
}

#[test]
fn test_all_is_sorted() {
    let settings = Settings::in_memory();
    settings.set(keys::VERBOSE_TASK_LOGS, "true").unwrap();
    settings.set(keys::ALLOW_CUSTOM_MANAGER_PATHS, "true").unwrap();

    let keys: Vec<_> = settings.all().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["AllowCustomManagerPaths", "VerboseTaskLogs"]);
}
