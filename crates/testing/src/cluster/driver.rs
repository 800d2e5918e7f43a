//! `ClusterDriver`: the reference `Driver` implementation, composing the
//! `ShardRpc` / `JournalRpc` / `IngestRpc` / `TimeRpc` boundaries into the
//! four operations the executor needs.

use crate::clock::Clock;
use crate::cluster::rpc::{IngestRpc, JournalRpc, ShardRpc, TimeRpc};
use crate::cluster::verify::verify_documents;
use crate::driver::{Driver, DriverError};
use crate::spec::{Collection, PartitionSelector, TaskName};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub struct ClusterDriver {
    shards: Arc<dyn ShardRpc>,
    journals: Arc<dyn JournalRpc>,
    ingest: Arc<dyn IngestRpc>,
    time: Arc<dyn TimeRpc>,
}

impl ClusterDriver {
    pub fn new(
        shards: Arc<dyn ShardRpc>,
        journals: Arc<dyn JournalRpc>,
        ingest: Arc<dyn IngestRpc>,
        time: Arc<dyn TimeRpc>,
    ) -> Self {
        ClusterDriver {
            shards,
            journals,
            ingest,
            time,
        }
    }
}

#[async_trait]
impl Driver for ClusterDriver {
    async fn stat(&self, task: &TaskName, read_through: &Clock) -> Result<(Clock, Clock), DriverError> {
        let shards = self.shards.list_shards(task).await?;
        if shards.is_empty() {
            return Err(DriverError::NoShardsForTask(task.clone()));
        }

        // A task's overall read-through is the minimum across its shard
        // set — a split task is only as caught-up as its slowest shard —
        // while the write clock each shard observes is merged by maximum,
        // since any shard may have seen the most recent write.
        let mut merged_read_through: Option<Clock> = None;
        let mut write_clock = Clock::new();
        for shard in &shards {
            let (shard_read_through, shard_write_at) = self.shards.stat_shard(shard, read_through).await?;
            write_clock.merge_max(&shard_write_at);

            // A shard only reports partitions matching its own selector;
            // journals it omits are min-merged back in from the request so
            // they're treated as "read through at the requested offset"
            // rather than erroneously dragging the aggregate down to zero.
            let corrected = read_through.min(&shard_read_through);
            merged_read_through = Some(match merged_read_through {
                Some(acc) => acc.min(&corrected),
                None => corrected,
            });
        }

        Ok((merged_read_through.unwrap_or_default(), write_clock))
    }

    async fn ingest(&self, collection: &Collection, documents: &[Value]) -> Result<Clock, DriverError> {
        self.ingest.append(collection, documents).await
    }

    async fn verify(
        &self,
        collection: &Collection,
        partitions: Option<&PartitionSelector>,
        key: &[String],
        from: &Clock,
        to: &Clock,
        documents: &[Value],
    ) -> Result<(), DriverError> {
        let journals = self.journals.list_journals(collection, partitions).await?;

        let mut actual = Vec::new();
        for journal in &journals {
            let lo = from.get(&journal.0);
            let hi = to.get(&journal.0);
            actual.extend(self.journals.read_journal(journal, lo, hi).await?);
        }

        let mismatches = verify_documents(key, actual, documents);
        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(DriverError::VerificationFailed(mismatches))
        }
    }

    async fn advance(&self, delta: Duration) -> Result<(), DriverError> {
        self.time.advance(delta).await
    }
}
