//! Query planning and deduplication

use rusqlite::Connection;

use super::{RecordPipeline, SyncOptions};
use crate::error::Result;
use crate::rpc::{read_ordered, RemoteSession};

/// Remote ids left to import, in natural-key order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub found: usize,
    pub already_imported: usize,
    pub pending: Vec<i64>,
}

/// Search the remote side and drop ids that already have a local record.
///
/// The natural keys of every match are read in a single round trip.
pub fn plan<P: RecordPipeline + ?Sized>(
    session: &dyn RemoteSession,
    conn: &Connection,
    pipeline: &P,
    options: &SyncOptions,
) -> Result<Plan> {
    let domain = pipeline.domain(options);
    let ids = session.search(
        pipeline.remote_model(),
        &domain,
        Some(pipeline.order()),
        options.limit,
    )?;
    tracing::info!(
        "Found {} {} record(s) on {}",
        ids.len(),
        options.kind,
        pipeline.remote_model()
    );

    let mut plan = Plan {
        found: ids.len(),
        ..Plan::default()
    };
    if ids.is_empty() {
        return Ok(plan);
    }

    for key in read_ordered(session, pipeline.remote_model(), &ids, pipeline.key_fields())? {
        if pipeline.is_imported(conn, &key)? {
            plan.already_imported += 1;
        } else {
            plan.pending.push(key.id());
        }
    }

    tracing::info!(
        "{} already imported, {} pending",
        plan.already_imported,
        plan.pending.len()
    );
    Ok(plan)
}
