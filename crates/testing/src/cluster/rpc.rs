//! Narrow, local RPC-shaped traits the cluster-binding driver composes.
//! These stand in for the generated gRPC clients a real deployment would
//! use to talk to brokers and consumers: the wire format and transport are
//! deliberately out of scope here, so each trait names only the calls
//! `ClusterDriver` actually issues.

use crate::clock::Clock;
use crate::driver::DriverError;
use crate::spec::{Collection, PartitionSelector, TaskName};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JournalName(pub String);

/// Issues shard-level stat RPCs (the consumer analog of a broker's journal
/// read-head query): blocks until a shard's processed transactions have
/// caught up to the requested read-through, then reports both its current
/// read-through and the cluster write clock it observed while doing so.
#[async_trait]
pub trait ShardRpc: Send + Sync {
    async fn list_shards(&self, task: &TaskName) -> Result<Vec<ShardId>, DriverError>;

    async fn stat_shard(
        &self,
        shard: &ShardId,
        read_through: &Clock,
    ) -> Result<(Clock, Clock), DriverError>;
}

/// Issues journal-level RPCs: listing the journals backing a collection
/// (optionally narrowed by partition selector) and reading back their
/// contents for verification.
#[async_trait]
pub trait JournalRpc: Send + Sync {
    async fn list_journals(
        &self,
        collection: &Collection,
        partitions: Option<&PartitionSelector>,
    ) -> Result<Vec<JournalName>, DriverError>;

    /// Reads `journal` over the byte-offset range `[from, to)`, exclusive
    /// of `to`, in append order — not every document ever committed, only
    /// those written since the test (or warm-start) began.
    async fn read_journal(&self, journal: &JournalName, from: i64, to: i64) -> Result<Vec<Value>, DriverError>;
}

/// Issues the append RPC a capture's ingestion path would otherwise be
/// responsible for, used by `ClusterDriver::ingest` to push test-fixture
/// documents directly into a capture's journals.
#[async_trait]
pub trait IngestRpc: Send + Sync {
    async fn append(&self, collection: &Collection, documents: &[Value]) -> Result<Clock, DriverError>;
}

/// Issues the cluster's simulated-time control RPC, available only against
/// test deployments built with an injectable clock. A production cluster
/// has no such endpoint and every call returns `AdvanceDisabled`.
#[async_trait]
pub trait TimeRpc: Send + Sync {
    async fn advance(&self, delta: Duration) -> Result<(), DriverError>;
}
