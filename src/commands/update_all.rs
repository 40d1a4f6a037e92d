//! Update-All Command
//!
//! Queues every available update of every ready manager, then runs the queue.

use crate::cli::args::{GlobalFlags, OperationArgs};
use crate::commands::Session;
use crate::commands::operate::{build_options, report_outcome};
use crate::core::types::OperationType;
use crate::error::Result;
use crate::operations::{OperationQueue, OperationRunner, queue_all_updates};
use crate::ui as output;

pub async fn run(global: &GlobalFlags, manager: Option<&str>, args: &OperationArgs) -> Result<()> {
    let options = build_options(args, OperationType::Update)?;
    let session = Session::start(global, manager).await?;

    let queue = OperationQueue::new();
    for manager in session.ready() {
        queue_all_updates(manager, &queue, &options).await;
    }

    if queue.is_empty() {
        output::info("Everything is up to date");
        session.finish();
        return Ok(());
    }

    if !session.json {
        output::header(&format!("{} updates queued", queue.len()));
        for op in queue.pending() {
            output::indent(&op.package.to_string(), 1);
        }
    }

    if !global.yes && !output::prompt_yes_no("Run these updates?") {
        output::info("Cancelled");
        return Ok(());
    }

    let reports = OperationRunner::new().drain(&queue).await;
    session.finish();
    report_outcome(&reports, session.json)
}
