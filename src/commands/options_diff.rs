use crate::commands::operate::load_options_file;
use crate::error::Result;
use crate::ui as output;
use std::path::Path;

/// Print the values of a saved options document that differ from the defaults
pub fn run(file: &Path, json: bool) -> Result<()> {
    let options = load_options_file(file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&options.to_json())?);
    } else if options.differs_from_default() {
        println!("{}", options);
    } else {
        output::info("All options are at their defaults");
    }
    Ok(())
}
