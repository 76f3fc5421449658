use std::io::Write;
use std::time::Duration;

use super::{CommandError, Context};
use crate::feed::{build_client, run_aggregator};

/// Collect feeds every `interval` until the context's shutdown token fires.
pub(super) async fn run<W: Write>(
    ctx: &Context,
    interval: Duration,
    out: &mut W,
) -> Result<(), CommandError> {
    let client = build_client()?;
    let options = ctx.config.fetch_options();

    writeln!(out, "Collecting feeds every {:?}", interval)?;
    out.flush()?;

    let summary = run_aggregator(
        &ctx.db,
        &client,
        &options,
        interval,
        ctx.shutdown.clone(),
        |report| {
            let written = writeln!(
                out,
                "Feed {} collected, {} posts found ({} new)",
                report.feed_name, report.items, report.ingest.created
            )
            .and_then(|()| out.flush());
            if let Err(e) = written {
                tracing::warn!(error = %e, "Failed to write collection report");
            }
        },
    )
    .await;

    writeln!(
        out,
        "Stopped after {} cycles ({} failed)",
        summary.cycles, summary.failed
    )?;
    Ok(())
}
