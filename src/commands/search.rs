//! Search Command
//!
//! Queries every ready manager concurrently and prints the merged results.

use crate::cli::args::GlobalFlags;
use crate::commands::{Session, print_packages};
use crate::error::Result;
use std::sync::Arc;
use tokio::task::JoinSet;

pub async fn run(global: &GlobalFlags, query: &str, manager: Option<&str>) -> Result<()> {
    let session = Session::start(global, manager).await?;

    let mut tasks = JoinSet::new();
    for (index, manager) in session.ready().enumerate() {
        let manager = Arc::clone(manager);
        let query = query.to_string();
        tasks.spawn(async move { (index, manager.find_packages(&query).await) });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(found) => results.push(found),
            Err(e) => log::error!("Search task failed: {}", e),
        }
    }
    // Keep the registry order of managers
    results.sort_by_key(|(index, _)| *index);
    let packages: Vec<_> = results.into_iter().flat_map(|(_, found)| found).collect();

    print_packages(&packages, session.json)?;
    session.finish();
    Ok(())
}
