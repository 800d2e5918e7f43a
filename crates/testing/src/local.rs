//! An in-memory `Driver`, standing in for a live cluster when one isn't
//! configured. Every collection is a single unsharded journal held in
//! memory; stats resolve instantly since there's no asynchronous shard
//! processing to wait on. Useful for exercising a catalog's test cases
//! without a broker or consumer tier at all — the `flow-test` binary falls
//! back to it when no `--broker-address` is given.

use crate::clock::Clock;
use crate::cluster::verify::verify_documents;
use crate::driver::{Driver, DriverError};
use crate::spec::{Collection, PartitionSelector, TaskName};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

fn journal_name(collection: &Collection) -> String {
    format!("{collection}/part-000")
}

/// A committed record, with a synthetic `_meta/uuid` so `uuid_flags` can
/// distinguish ordinary records from the ACK this driver appends after
/// every ingest to mark a transaction boundary.
fn stamp(doc: Value, ack: bool) -> Value {
    let mut bytes = [0u8; 16];
    if ack {
        bytes[9] = 0x02;
    } else {
        bytes[9] = 0x01;
    }
    let uuid = Uuid::from_bytes(bytes);

    let mut doc = doc;
    if let Value::Object(map) = &mut doc {
        map.insert(
            "_meta".to_string(),
            json!({"uuid": uuid.to_string()}),
        );
    }
    doc
}

#[derive(Default)]
struct State {
    journals: BTreeMap<String, Vec<Value>>,
}

pub struct LocalDriver {
    state: Mutex<State>,
}

impl LocalDriver {
    pub fn new() -> Self {
        LocalDriver {
            state: Mutex::new(State::default()),
        }
    }

    fn write_clock(state: &State) -> Clock {
        state
            .journals
            .iter()
            .map(|(journal, docs)| (journal.clone(), docs.len() as i64))
            .collect()
    }
}

impl Default for LocalDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for LocalDriver {
    async fn stat(&self, task: &TaskName, read_through: &Clock) -> Result<(Clock, Clock), DriverError> {
        let state = self.state.lock().expect("local driver mutex poisoned");
        tracing::trace!(%task, "local driver: stat resolves instantly");
        Ok((read_through.copy(), Self::write_clock(&state)))
    }

    async fn ingest(&self, collection: &Collection, documents: &[Value]) -> Result<Clock, DriverError> {
        let mut state = self.state.lock().expect("local driver mutex poisoned");
        let journal = journal_name(collection);
        let records = state.journals.entry(journal.clone()).or_default();
        for doc in documents {
            records.push(stamp(doc.clone(), false));
        }
        records.push(stamp(json!({}), true));

        let offset = records.len() as i64;
        let mut clock = Clock::new();
        clock.set(journal, offset);
        Ok(clock)
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
        if partitions.is_some() {
            tracing::debug!(%collection, "local driver ignores partition selectors");
        }

        let journal = journal_name(collection);
        let lo = from.get(&journal).max(0) as usize;
        let hi = to.get(&journal).max(0) as usize;

        let actual = {
            let state = self.state.lock().expect("local driver mutex poisoned");
            state
                .journals
                .get(&journal)
                .map(|records| records.get(lo..hi.min(records.len())).unwrap_or(&[]).to_vec())
                .unwrap_or_default()
        };

        let mismatches = verify_documents(key, actual, documents);
        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(DriverError::VerificationFailed(mismatches))
        }
    }

    async fn advance(&self, delta: std::time::Duration) -> Result<(), DriverError> {
        tracing::trace!(?delta, "local driver: advance is a no-op");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn ingest_then_verify_round_trips_through_ack_filtering() {
        let driver = LocalDriver::new();
        let collection = Collection::new("greetings");

        let to = driver
            .ingest(&collection, &[json!({"msg": "hi"}), json!({"msg": "there"})])
            .await
            .unwrap();

        driver
            .verify(
                &collection,
                None,
                &[],
                &Clock::new(),
                &to,
                &[json!({"msg": "hi"}), json!({"msg": "there"})],
            )
            .await
            .unwrap();
    }

    #[rstest]
    #[tokio::test]
    async fn verify_combines_by_key_before_comparing() {
        let driver = LocalDriver::new();
        let collection = Collection::new("counters");

        let to = driver
            .ingest(&collection, &[json!({"id": 1, "n": 1}), json!({"id": 1, "n": 2})])
            .await
            .unwrap();

        driver
            .verify(
                &collection,
                None,
                &["/id".to_string()],
                &Clock::new(),
                &to,
                &[json!({"id": 1, "n": 2})],
            )
            .await
            .unwrap();
    }

    #[rstest]
    #[tokio::test]
    async fn verify_surfaces_mismatches_as_driver_error() {
        let driver = LocalDriver::new();
        let collection = Collection::new("greetings");
        let to = driver.ingest(&collection, &[json!({"msg": "hi"})]).await.unwrap();

        let err = driver
            .verify(&collection, None, &[], &Clock::new(), &to, &[json!({"msg": "bye"})])
            .await
            .unwrap_err();
        match err {
            DriverError::VerificationFailed(mismatches) => assert_eq!(mismatches.len(), 1),
            other => panic!("expected VerificationFailed, got {other:?}"),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn verify_excludes_documents_written_before_the_read_window() {
        let driver = LocalDriver::new();
        let collection = Collection::new("greetings");

        let from = driver.ingest(&collection, &[json!({"msg": "before"})]).await.unwrap();
        let to = driver.ingest(&collection, &[json!({"msg": "after"})]).await.unwrap();

        driver
            .verify(&collection, None, &[], &from, &to, &[json!({"msg": "after"})])
            .await
            .unwrap();
    }
}
