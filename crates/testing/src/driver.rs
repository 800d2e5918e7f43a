//! The driver interface (C4): the sole abstraction boundary between the
//! executor and whatever actually performs ingests, stats, verifications,
//! and time advances. `cluster::ClusterDriver` is the reference
//! implementation against a live broker/consumer cluster; tests may swap in
//! a fake.

use crate::clock::Clock;
use crate::spec::{Collection, PartitionSelector, TaskName};
use async_trait::async_trait;
use serde_json::Value;

/// One location at which an actual document disagreed with an expected one,
/// surfaced by `Driver::verify`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    /// JSON pointer to the differing location, or the document index if the
    /// documents differ in count.
    pub location: String,
    pub actual: Option<Value>,
    pub expect: Option<Value>,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "at {}: actual {} != expect {}",
            self.location,
            self.actual.as_ref().map(Value::to_string).unwrap_or_else(|| "<missing>".into()),
            self.expect.as_ref().map(Value::to_string).unwrap_or_else(|| "<missing>".into()),
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("rpc transport failure talking to the cluster")]
    Transport(#[source] anyhow::Error),

    #[error("ingest was rejected by the cluster: {0}")]
    Rejected(String),

    #[error("task {0} has no assigned shards")]
    NoShardsForTask(TaskName),

    #[error("shard for task {0} is not primary")]
    ShardNotPrimary(TaskName),

    /// Not an error the executor treats as fatal: some drivers (a fully
    /// live, unpausable cluster) cannot honor a simulated time advance at
    /// all, and the executor logs this and moves on rather than aborting
    /// the test case.
    #[error("this driver cannot advance simulated time")]
    AdvanceDisabled,

    #[error("verification failed with {} mismatch(es)", .0.len())]
    VerificationFailed(Vec<Mismatch>),
}

/// The four RPC-shaped operations the executor drives the test case
/// through. Implementors own all retry/backoff policy; the executor treats
/// every call as a single logical attempt.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Requests a stat of `task`'s shards, returning once their
    /// read-through has caught up to at least `read_through` (per shard,
    /// the minimum across the task's shard set) and the cluster's current
    /// write clock.
    async fn stat(&self, task: &TaskName, read_through: &Clock) -> Result<(Clock, Clock), DriverError>;

    /// Appends `documents` to `collection`, returning the clock of the
    /// resulting journal write(s).
    async fn ingest(&self, collection: &Collection, documents: &[Value]) -> Result<Clock, DriverError>;

    /// Reads back the journal contents for `collection` written in the
    /// `[from, to)` clock window (optionally narrowed by `partitions`),
    /// combines them by `key` (empty for append-only collections), and
    /// compares the result against `documents` in order, returning
    /// `Ok(())` or a `VerificationFailed` carrying every mismatch found.
    async fn verify(
        &self,
        collection: &Collection,
        partitions: Option<&PartitionSelector>,
        key: &[String],
        from: &Clock,
        to: &Clock,
        documents: &[Value],
    ) -> Result<(), DriverError>;

    /// Advances the driver's notion of simulated time by `delta`. Drivers
    /// that cannot pause real time (e.g. a live, unthrottled cluster)
    /// return `Err(DriverError::AdvanceDisabled)`.
    async fn advance(&self, delta: std::time::Duration) -> Result<(), DriverError>;
}
