//! The test-case executor (C5): a single-threaded, cooperative loop driving
//! one `TestSpec` to completion against a `Driver`.

use crate::driver::{Driver, DriverError};
use crate::graph::{PendingStat, ReadinessGraph};
use crate::spec::{TaskName, TestSpec, TestStep};
use crate::topology::Topology;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum ExecutorError {
    #[error("step {step_index} ({step_type}) of test {test_name:?} failed")]
    Step {
        test_name: String,
        step_index: usize,
        step_type: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("test {test_name:?} deadlocked at step {step_index}: a verify step is blocked on a pending write, and no pending stat remains to advance toward")]
    Deadlock { test_name: String, step_index: usize },
}

pub struct Executor {
    driver: Arc<dyn Driver>,
    graph: ReadinessGraph,
}

impl Executor {
    pub fn new(topology: Topology, driver: Arc<dyn Driver>) -> Self {
        Executor {
            driver,
            graph: ReadinessGraph::new(topology),
        }
    }

    /// Read-only access to the underlying graph, for callers (and tests)
    /// that need to confirm the graph has reached full quiescence after a
    /// `run` call returns.
    pub fn graph(&self) -> &ReadinessGraph {
        &self.graph
    }

    /// Primes the graph's read-through and write-clock bookkeeping against
    /// a cluster that may already hold data from a prior run, by stat-ing
    /// every known task once before any test step executes. Without this, a
    /// freshly-started executor would believe every task's read-through was
    /// nil and could issue verify steps against stale, pre-existing data.
    pub async fn warm_start(&mut self, tasks: &[TaskName]) -> Result<(), DriverError> {
        for task in tasks {
            let (read_through, write_at) = self.driver.stat(task, &Default::default()).await?;
            self.graph.completed_stat(task, read_through, &write_at);
            tracing::debug!(%task, "warm-started task read-through");
        }
        Ok(())
    }

    /// Runs every step of `test` to completion, in order, and then keeps
    /// draining/advancing until no pending stat remains — a test isn't done
    /// merely because its last step ran; a delayed reader the test never
    /// names directly may still owe a stat, and `run` doesn't return until
    /// the graph is fully quiescent (spec.md §4.5's pseudocode only returns
    /// on `nextDelta == -1`, not on `stepIdx == len(steps)`).
    pub async fn run(&mut self, test: &TestSpec) -> Result<(), ExecutorError> {
        // The lower bound every `Verify` step reads from: documents written
        // before this test (or during warm-start) are excluded from every
        // comparison, no matter how many verify steps the test contains.
        let initial = self.graph.write_clock().copy();
        let mut step_index = 0;

        loop {
            let (ready, next_delta, _next_task) = self.graph.pop_ready();
            if !ready.is_empty() {
                self.stat_ready(test, step_index, ready).await?;
                continue;
            }

            if step_index < test.steps.len() {
                match &test.steps[step_index] {
                    TestStep::Ingest(ingest) => {
                        tracing::info!(
                            test = %test.name,
                            step_index,
                            collection = %ingest.collection,
                            "ingest"
                        );
                        let write_at = self
                            .driver
                            .ingest(&ingest.collection, &ingest.documents)
                            .await
                            .map_err(|source| ExecutorError::Step {
                                test_name: test.name.clone(),
                                step_index,
                                step_type: "ingest",
                                source,
                            })?;
                        self.graph.completed_ingest(&ingest.collection, &write_at);
                        step_index += 1;
                        continue;
                    }
                    TestStep::Verify(verify) => {
                        if !self.graph.has_pending_write(&verify.collection) {
                            tracing::info!(
                                test = %test.name,
                                step_index,
                                collection = %verify.collection,
                                "verify"
                            );
                            self.driver
                                .verify(
                                    &verify.collection,
                                    verify.partitions.as_ref(),
                                    &verify.key,
                                    &initial,
                                    self.graph.write_clock(),
                                    &verify.documents,
                                )
                                .await
                                .map_err(|source| ExecutorError::Step {
                                    test_name: test.name.clone(),
                                    step_index,
                                    step_type: "verify",
                                    source,
                                })?;
                            step_index += 1;
                            continue;
                        }
                        // Blocked on a pending write: fall through and
                        // advance time toward the nearest pending stat.
                    }
                }
            }

            let delta = match next_delta {
                Some(delta) => delta,
                // No steps remain and no pending stat remains either: the
                // test (and every dependent read it triggered) is done.
                None if step_index >= test.steps.len() => return Ok(()),
                // A verify step is blocked on a pending write, but nothing
                // is pending to advance toward — can't happen if the
                // graph's invariants hold, but this is a deadlock, not a
                // panic: surface it rather than looping forever.
                None => {
                    return Err(ExecutorError::Deadlock {
                        test_name: test.name.clone(),
                        step_index,
                    })
                }
            };
            self.advance(test, step_index, delta).await?;
        }
    }

    /// Issues `Driver::stat` for every just-popped ready stat, in order,
    /// feeding each response back into the graph as it arrives.
    async fn stat_ready(
        &mut self,
        test: &TestSpec,
        step_index: usize,
        ready: Vec<PendingStat>,
    ) -> Result<(), ExecutorError> {
        for stat in ready {
            tracing::debug!(task = %stat.task, ready_at = ?stat.ready_at, "stat");
            let (read_through, write_at) = self
                .driver
                .stat(&stat.task, &stat.read_through)
                .await
                .map_err(|source| ExecutorError::Step {
                    test_name: test.name.clone(),
                    step_index,
                    step_type: "stat",
                    source,
                })?;
            self.graph.completed_stat(&stat.task, read_through, &write_at);
        }
        Ok(())
    }

    /// Advances simulated time by `delta` so the nearest pending stat
    /// becomes ready on the next loop iteration.
    async fn advance(
        &mut self,
        test: &TestSpec,
        step_index: usize,
        delta: std::time::Duration,
    ) -> Result<(), ExecutorError> {
        match self.driver.advance(delta).await {
            Ok(()) => {}
            Err(DriverError::AdvanceDisabled) => {
                tracing::debug!(
                    ?delta,
                    "driver cannot advance real time; advancing simulated time bookkeeping only"
                );
            }
            Err(source) => {
                return Err(ExecutorError::Step {
                    test_name: test.name.clone(),
                    step_index,
                    step_type: "advance",
                    source,
                })
            }
        }
        self.graph.completed_advance(delta);
        Ok(())
    }
}
