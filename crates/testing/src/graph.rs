//! The dataflow readiness graph (C3): the core of this crate. Tracks
//! pending per-task reads, per-task read-through progress, and cluster-wide
//! write progress, and projects completed writes into new pending reads.

use crate::clock::Clock;
use crate::spec::{Collection, TaskName};
use crate::topology::Topology;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// A stat the executor must issue before any dependent `verify` step can be
/// trusted to have observed all upstream effects. Owned exclusively by the
/// graph; the executor only ever sees a stat as the briefly-held return
/// value of `pop_ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStat {
    pub task: TaskName,
    pub ready_at: Duration,
    pub read_through: Clock,
}

/// `TestTime` advances only through `completed_advance`, and is the
/// simulated-time axis against which `ready_at` is compared.
pub type TestTime = Duration;

pub struct ReadinessGraph {
    topology: Topology,
    at_time: TestTime,
    /// Keyed by `(task, ready_at)` so duplicate inserts max-merge for free.
    pending: BTreeMap<(TaskName, Duration), Clock>,
    read_through: BTreeMap<TaskName, Clock>,
    write_clock: Clock,
}

impl ReadinessGraph {
    pub fn new(topology: Topology) -> Self {
        ReadinessGraph {
            topology,
            at_time: Duration::ZERO,
            pending: BTreeMap::new(),
            read_through: BTreeMap::new(),
            write_clock: Clock::new(),
        }
    }

    pub fn at_time(&self) -> TestTime {
        self.at_time
    }

    pub fn write_clock(&self) -> &Clock {
        &self.write_clock
    }

    pub fn read_through(&self, task: &TaskName) -> Clock {
        self.read_through.get(task).cloned().unwrap_or_default()
    }

    /// Called after the executor performs an ingest step (or during
    /// warm-start replay of a known journal write-head).
    pub fn completed_ingest(&mut self, collection: &Collection, write_at: &Clock) {
        self.write_clock.merge_max(write_at);
        self.project_write(collection, write_at);
    }

    /// Called after a successful stat RPC returns.
    pub fn completed_stat(&mut self, task: &TaskName, read_through: Clock, write_at: &Clock) {
        self.write_clock.merge_max(write_at);
        // Replaced, not merged: the cluster reports the minimum across a
        // task's shards, and that minimum only grows over time when the
        // cluster is honest, so replacement is equivalent to a max-merge
        // but simpler.
        self.read_through.insert(task.clone(), read_through);

        for collection in self.topology.outputs(task).to_vec() {
            self.project_write(&collection, write_at);
        }
    }

    /// Advances simulated time by `delta`. Panics if doing so would pass the
    /// `ready_at` of any pending stat — a programmer error, never recovered
    /// (spec.md §7, last row).
    pub fn completed_advance(&mut self, delta: Duration) {
        let next_at = self.at_time + delta;
        if let Some((task, ready_at)) = self
            .pending
            .keys()
            .min_by_key(|(_, ready_at)| *ready_at)
            .map(|(task, ready_at)| (task, *ready_at))
        {
            if ready_at < next_at {
                tracing::error!(
                    task = %task,
                    ?ready_at,
                    attempted_at_time = ?next_at,
                    "advance would pass a pending stat's ready_at"
                );
                panic!("CompletedAdvance({delta:?}) would pass pending stat for {task} ready at {ready_at:?}");
            }
        }
        self.at_time = next_at;
        tracing::debug!(at_time = ?self.at_time, "advanced simulated time");
    }

    /// True iff any pending stat remains, regardless of task — used by
    /// callers (and tests) that need to confirm the graph has reached full
    /// quiescence, not just that one particular collection is unblocked.
    pub fn has_any_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// True iff some pending stat's task can — transitively, via
    /// `outputs`/`readers` — still write into `collection`.
    pub fn has_pending_write(&self, collection: &Collection) -> bool {
        let mut visited: HashSet<&TaskName> = HashSet::new();
        let mut frontier: Vec<&TaskName> =
            self.pending.keys().map(|(task, _)| task).collect();

        while let Some(task) = frontier.pop() {
            if !visited.insert(task) {
                continue;
            }
            for output in self.topology.outputs(task) {
                if output == collection {
                    return true;
                }
                for edge in self.topology.readers(output) {
                    if !visited.contains(&edge.task) {
                        frontier.push(&edge.task);
                    }
                }
            }
        }
        false
    }

    /// Removes and returns every pending stat whose `ready_at == at_time`,
    /// along with the minimum delta to the next-nearest pending stat (or
    /// `None` if none remain) and that stat's task, for diagnostic logging.
    pub fn pop_ready(&mut self) -> (Vec<PendingStat>, Option<Duration>, Option<TaskName>) {
        let ready_keys: Vec<(TaskName, Duration)> = self
            .pending
            .range(..)
            .filter(|((_, ready_at), _)| *ready_at == self.at_time)
            .map(|(k, _)| k.clone())
            .collect();

        let mut ready = Vec::with_capacity(ready_keys.len());
        for key in ready_keys {
            let read_through = self.pending.remove(&key).expect("key just observed present");
            ready.push(PendingStat {
                task: key.0,
                ready_at: key.1,
                read_through,
            });
        }

        let next = self
            .pending
            .keys()
            .min_by_key(|(_, ready_at)| *ready_at)
            .map(|(task, ready_at)| (task.clone(), *ready_at - self.at_time));

        match next {
            Some((task, delta)) => (ready, Some(delta), Some(task)),
            None => (ready, None, None),
        }
    }

    /// Projects a completed write into new (or merged) pending stats for
    /// every reader of `collection`.
    fn project_write(&mut self, collection: &Collection, write_at: &Clock) {
        for edge in self.topology.readers(collection).to_vec() {
            let prefix = format!("{collection}/");
            let mut read_through = Clock::new();
            for (journal, offset) in write_at.iter() {
                if let Some(_partition) = journal.strip_prefix(&prefix) {
                    read_through.set(format!("{journal}{}", edge.suffix), offset);
                }
            }

            if self.read_through(&edge.task).contains(&read_through) {
                continue; // Already read past this point.
            }

            let ready_at = self.at_time + edge.delay;
            self.pending
                .entry((edge.task.clone(), ready_at))
                .and_modify(|existing| existing.merge_max(&read_through))
                .or_insert(read_through);
        }
    }
}
