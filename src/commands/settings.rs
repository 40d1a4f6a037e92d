//! Settings Command
//!
//! Read and write the engine settings file.

use crate::cli::args::SettingsCommand;
use crate::config::{Settings, SettingsStore, keys};
use crate::error::{EngineError, Result};
use crate::ui as output;

pub fn run(command: Option<&SettingsCommand>) -> Result<()> {
    let settings = Settings::load()?;

    match command.unwrap_or(&SettingsCommand::List) {
        SettingsCommand::Get { key, item } => {
            let value = match item {
                Some(item) => settings.get_dictionary_item(key, item),
                None => settings.get_value(key),
            };
            match value {
                Some(value) => println!("{}", value),
                None => {
                    return Err(EngineError::Other(format!("Setting '{}' is not set", key)));
                }
            }
        }
        SettingsCommand::Set { key, value, item } => {
            match item {
                Some(item) => {
                    settings.set_dictionary_item(key, item, value)?;
                    output::success(&format!("Set {}[{}] = {}", key, item, value));
                }
                None => {
                    settings.set(key, value)?;
                    output::success(&format!("Set {} = {}", key, value));
                }
            }
        }
        SettingsCommand::List => show_all_settings(&settings),
    }

    Ok(())
}

fn show_all_settings(settings: &Settings) {
    output::header("Current Settings");

    let all = settings.all();
    if all.is_empty() {
        output::info("No settings stored");
    }
    for (key, value) in &all {
        println!("  {}: {}", key, value);
    }

    println!();
    output::info("Known settings:");
    for key in keys::ALL {
        let kind = if keys::is_dictionary(key) { "dictionary" } else { "value" };
        output::indent(&format!("{} ({})", key, kind), 1);
    }
}
