//! Snapshot stream: run the loop on a blocking task and publish every
//! round on a bounded channel.
//!
//! The loop stays single-threaded; the task is its only driver. Dropping
//! the receiver stops the producer at the next send.

use tokio::sync::mpsc;
use tracing::debug;

use crate::model::Query;
use crate::scheduler::{Scheduler, Snapshot};
use crate::Result;

/// Spawn the loop for `queries` and return the snapshot receiver.
///
/// Input is validated before spawning. Must be called from inside a tokio
/// runtime.
pub fn spawn_rounds(scheduler: Scheduler, queries: Vec<Query>, capacity: usize) -> Result<mpsc::Receiver<Snapshot>> {
    scheduler.config().validate()?;
    for q in &queries {
        q.validate()?;
    }

    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::task::spawn_blocking(move || {
        let Ok(rounds) = scheduler.rounds(&queries) else {
            return;
        };
        for snapshot in rounds {
            let round = snapshot.round;
            if tx.blocking_send(snapshot).is_err() {
                debug!(round, "snapshot receiver dropped");
                break;
            }
        }
    });
    Ok(rx)
}
