//! End-to-end executor scenarios, driven against the in-memory `LocalDriver`
//! rather than a fake `Driver` mock — exercising the readiness graph,
//! topology index, and executor loop together exactly as `flow-test` would.

use serde_json::json;
use std::sync::Arc;
use testing::spec::{
    CaptureBinding, CaptureSpec, CatalogBundle, DerivationSpec, TestSpec, TestStep,
    TestStepIngest, TestStepVerify, TransformSpec,
};
use testing::{Executor, LocalDriver, Topology};

fn capture_to_derivation_bundle() -> CatalogBundle {
    CatalogBundle {
        captures: vec![CaptureSpec {
            name: "acmeCo/source".into(),
            disable: false,
            bindings: vec![CaptureBinding {
                target: "acmeCo/raw".into(),
            }],
        }],
        derivations: vec![DerivationSpec {
            name: "acmeCo/doubled".into(),
            disable: false,
            transforms: vec![TransformSpec {
                source: "acmeCo/raw".into(),
                read_suffix: "derive/doubled/raw-to-doubled".to_string(),
                read_delay: None,
                disable: false,
            }],
        }],
        materializations: vec![],
    }
}

// Scenario 5 — full ingest/stat/verify call-order, end to end.
#[tokio::test]
async fn ingest_then_verify_waits_out_the_derivation_before_comparing() {
    let bundle = capture_to_derivation_bundle();
    let topology = Topology::build(&bundle);
    let driver = Arc::new(LocalDriver::new());
    let mut executor = Executor::new(topology, driver.clone());

    let test = TestSpec {
        name: "ingest then verify".to_string(),
        steps: vec![
            TestStep::Ingest(TestStepIngest {
                collection: "acmeCo/raw".into(),
                documents: vec![json!({"n": 1}), json!({"n": 2})],
            }),
            TestStep::Verify(TestStepVerify {
                collection: "acmeCo/raw".into(),
                partitions: None,
                key: vec![],
                documents: vec![json!({"n": 1}), json!({"n": 2})],
            }),
        ],
    };

    executor.run(&test).await.expect("test case should pass");
}

#[tokio::test]
async fn verify_step_reports_mismatches_without_aborting_early() {
    let bundle = capture_to_derivation_bundle();
    let topology = Topology::build(&bundle);
    let driver = Arc::new(LocalDriver::new());
    let mut executor = Executor::new(topology, driver);

    let test = TestSpec {
        name: "mismatch is reported".to_string(),
        steps: vec![
            TestStep::Ingest(TestStepIngest {
                collection: "acmeCo/raw".into(),
                documents: vec![json!({"n": 1})],
            }),
            TestStep::Verify(TestStepVerify {
                collection: "acmeCo/raw".into(),
                partitions: None,
                key: vec![],
                documents: vec![json!({"n": 99})],
            }),
        ],
    };

    let err = executor.run(&test).await.expect_err("mismatched verify should fail");
    assert!(err.to_string().contains("step 1"));
}

// Multiple ingest steps into the same collection, verified in aggregate —
// exercises the graph's write-clock max-merge across ingests.
#[tokio::test]
async fn repeated_ingests_accumulate_before_verify() {
    let bundle = capture_to_derivation_bundle();
    let topology = Topology::build(&bundle);
    let driver = Arc::new(LocalDriver::new());
    let mut executor = Executor::new(topology, driver);

    let test = TestSpec {
        name: "repeated ingest".to_string(),
        steps: vec![
            TestStep::Ingest(TestStepIngest {
                collection: "acmeCo/raw".into(),
                documents: vec![json!({"n": 1})],
            }),
            TestStep::Ingest(TestStepIngest {
                collection: "acmeCo/raw".into(),
                documents: vec![json!({"n": 2})],
            }),
            TestStep::Verify(TestStepVerify {
                collection: "acmeCo/raw".into(),
                partitions: None,
                key: vec![],
                documents: vec![json!({"n": 1}), json!({"n": 2})],
            }),
        ],
    };

    executor.run(&test).await.expect("test case should pass");
}

// A materialization-style verify combined by key, confirming last-write-wins
// reduction happens before comparison rather than a raw log compare.
#[tokio::test]
async fn verify_combines_updates_sharing_a_key() {
    let bundle = capture_to_derivation_bundle();
    let topology = Topology::build(&bundle);
    let driver = Arc::new(LocalDriver::new());
    let mut executor = Executor::new(topology, driver);

    let test = TestSpec {
        name: "combine by key".to_string(),
        steps: vec![
            TestStep::Ingest(TestStepIngest {
                collection: "acmeCo/raw".into(),
                documents: vec![json!({"id": 1, "n": 1}), json!({"id": 1, "n": 2})],
            }),
            TestStep::Verify(TestStepVerify {
                collection: "acmeCo/raw".into(),
                partitions: None,
                key: vec!["/id".to_string()],
                documents: vec![json!({"id": 1, "n": 2})],
            }),
        ],
    };

    executor.run(&test).await.expect("test case should pass");
}

// Scenario 5 — `run` must keep draining after the last step completes: a
// delayed reader the test never verifies (here, "acmeCo/slowpoke") still
// owes a stat, and `run` shouldn't return while one remains pending.
#[tokio::test]
async fn run_drains_an_uninvolved_delayed_reader_after_the_last_step() {
    let mut bundle = capture_to_derivation_bundle();
    bundle.derivations.push(DerivationSpec {
        name: "acmeCo/slowpoke".into(),
        disable: false,
        transforms: vec![TransformSpec {
            source: "acmeCo/raw".into(),
            read_suffix: "derive/slowpoke/raw-to-slowpoke".to_string(),
            read_delay: Some(std::time::Duration::from_secs(5)),
            disable: false,
        }],
    });
    let topology = Topology::build(&bundle);
    let driver = Arc::new(LocalDriver::new());
    let mut executor = Executor::new(topology, driver);

    let test = TestSpec {
        name: "drains uninvolved delayed reader".to_string(),
        steps: vec![
            TestStep::Ingest(TestStepIngest {
                collection: "acmeCo/raw".into(),
                documents: vec![json!({"n": 1})],
            }),
            TestStep::Verify(TestStepVerify {
                collection: "acmeCo/raw".into(),
                partitions: None,
                key: vec![],
                documents: vec![json!({"n": 1})],
            }),
        ],
    };

    executor.run(&test).await.expect("test case should pass");
    assert!(
        !executor.graph().has_any_pending(),
        "slowpoke's pending stat should have been drained before run() returned"
    );
}
