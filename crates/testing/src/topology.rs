//! The task topology index (C2): derives, once at construction, which
//! collections each task writes to and which tasks read each collection —
//! the two indices the readiness graph (`graph.rs`) projects writes over.

use crate::spec::{CatalogBundle, Collection, TaskName};
use std::collections::BTreeMap;
use std::time::Duration;

/// One edge of the reader index: a task that reads a collection, under a
/// given read-suffix and read-delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadEdge {
    pub task: TaskName,
    /// Empty for a capture's self-edge; otherwise `;<readSuffix>`.
    pub suffix: String,
    pub delay: Duration,
}

/// Immutable, shareable indices derived from a catalog's task specs.
#[derive(Debug, Default)]
pub struct Topology {
    outputs: BTreeMap<TaskName, Vec<Collection>>,
    readers: BTreeMap<Collection, Vec<ReadEdge>>,
}

impl Topology {
    /// Builds the topology from capture, derivation, and materialization
    /// specs, ignoring any task whose shard template is disabled. Order
    /// within `outputs[...]`/`readers[...]` follows input spec order and is
    /// stable, matching spec.md §4.2.
    pub fn build(bundle: &CatalogBundle) -> Topology {
        let mut outputs: BTreeMap<TaskName, Vec<Collection>> = BTreeMap::new();
        let mut readers: BTreeMap<Collection, Vec<ReadEdge>> = BTreeMap::new();

        for capture in bundle.captures.iter().filter(|c| !c.disable) {
            let targets: Vec<Collection> =
                capture.bindings.iter().map(|b| b.target.clone()).collect();
            outputs.insert(capture.name.clone(), targets);

            // Self-edge: an ingest into the capture's own pseudo-collection
            // maps back to the capture task, with no suffix — its projected
            // read-through keys equal the written journal names exactly.
            let self_collection = Collection::new(capture.name.as_str());
            readers.entry(self_collection).or_default().push(ReadEdge {
                task: capture.name.clone(),
                suffix: String::new(),
                delay: Duration::ZERO,
            });
        }

        for derivation in bundle.derivations.iter().filter(|d| !d.disable) {
            outputs.insert(
                derivation.name.clone(),
                vec![Collection::new(derivation.name.as_str())],
            );

            for transform in derivation.transforms.iter().filter(|t| !t.disable) {
                readers
                    .entry(transform.source.clone())
                    .or_default()
                    .push(ReadEdge {
                        task: derivation.name.clone(),
                        suffix: format!(";{}", transform.read_suffix),
                        delay: transform.read_delay.unwrap_or(Duration::ZERO),
                    });
            }
        }

        for materialization in bundle.materializations.iter().filter(|m| !m.disable) {
            // Materializations write nowhere the graph tracks.
            outputs.insert(materialization.name.clone(), Vec::new());

            for binding in materialization.bindings.iter().filter(|b| !b.disable) {
                readers
                    .entry(binding.source.clone())
                    .or_default()
                    .push(ReadEdge {
                        task: materialization.name.clone(),
                        suffix: format!(";{}", binding.read_suffix),
                        delay: Duration::ZERO,
                    });
            }
        }

        Topology { outputs, readers }
    }

    pub fn outputs(&self, task: &TaskName) -> &[Collection] {
        self.outputs.get(task).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn readers(&self, collection: &Collection) -> &[ReadEdge] {
        self.readers.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_known_task(&self, task: &TaskName) -> bool {
        self.outputs.contains_key(task)
    }

    pub fn known_collections(&self) -> impl Iterator<Item = &Collection> {
        self.readers.keys()
    }
}
