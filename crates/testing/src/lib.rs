//! Dataflow readiness graph and test-case executor for the Flow runtime.
//!
//! A catalog's captures, derivations, and materializations form a directed
//! (possibly cyclic) graph of tasks reading and writing collections. This
//! crate tracks, for a running test case, which tasks still have pending
//! reads against any already-ingested write — the question a `Verify` step
//! must have a `false` answer to before its comparison can be trusted — and
//! drives a `TestSpec`'s `Ingest`/`Verify` steps to completion against a
//! pluggable `Driver`.

pub mod clock;
pub mod cluster;
pub mod driver;
pub mod executor;
pub mod graph;
pub mod local;
pub mod spec;
pub mod topology;

pub use clock::Clock;
pub use driver::{Driver, DriverError, Mismatch};
pub use executor::{Executor, ExecutorError};
pub use graph::ReadinessGraph;
pub use local::LocalDriver;
pub use spec::{CatalogBundle, TaskName, TestSpec};
pub use topology::Topology;
