//! Installed and Updates Commands

use crate::cli::args::GlobalFlags;
use crate::commands::{Session, print_packages};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Installed,
    Updates,
}

pub async fn run(global: &GlobalFlags, listing: Listing, manager: Option<&str>) -> Result<()> {
    let session = Session::start(global, manager).await?;

    let mut packages = Vec::new();
    for manager in session.ready() {
        let found = match listing {
            Listing::Installed => manager.get_installed_packages().await,
            Listing::Updates => manager.get_available_updates().await,
        };
        log::debug!("{} returned {} packages", manager.name(), found.len());
        packages.extend(found);
    }

    print_packages(&packages, session.json)?;
    session.finish();
    Ok(())
}
