//! Catalog task and test specifications consumed by the readiness graph.
//!
//! These are a deliberate reduction of `models::CaptureDef` /
//! `models::CollectionDef` / `models::MaterializationDef` down to exactly the
//! fields the topology index (see `topology.rs`) and executor (see
//! `executor.rs`) need. Schemas, connector configs, and control-plane
//! bookkeeping are catalog-*authoring* concerns and are out of scope here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_newtype!(TaskName);
string_newtype!(Collection);

/// A push-ingestion capture task. Its output is the set of collections named
/// by its bindings; the core additionally treats each capture as a reader of
/// the pseudo-collection named after itself (see `topology::Topology::build`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CaptureSpec {
    pub name: TaskName,
    #[serde(default)]
    pub disable: bool,
    pub bindings: Vec<CaptureBinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CaptureBinding {
    pub target: Collection,
}

/// A derivation reads one or more source collections through transforms and
/// writes to its own, eponymous, collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DerivationSpec {
    pub name: TaskName,
    #[serde(default)]
    pub disable: bool,
    pub transforms: Vec<TransformSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TransformSpec {
    pub source: Collection,
    /// Read-suffix this transform's shards annotate onto source journal
    /// names, e.g. `"derive/B/A-to-B"`. Stored without the leading `;` —
    /// the topology index adds it when constructing reader edges.
    pub read_suffix: String,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub read_delay: Option<Duration>,
    #[serde(default)]
    pub disable: bool,
}

/// A materialization continuously exports one or more source collections
/// into an external system; it never writes back into the graph of
/// collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MaterializationSpec {
    pub name: TaskName,
    #[serde(default)]
    pub disable: bool,
    pub bindings: Vec<MaterializationBinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MaterializationBinding {
    pub source: Collection,
    pub read_suffix: String,
    #[serde(default)]
    pub disable: bool,
}

/// A catalog bundle is the minimal set of task specs the topology index is
/// built from — the parsed-down analog of a Flow catalog's `captures:`,
/// `collections:` (those with `derive:`), and `materializations:` stanzas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CatalogBundle {
    #[serde(default)]
    pub captures: Vec<CaptureSpec>,
    #[serde(default)]
    pub derivations: Vec<DerivationSpec>,
    #[serde(default)]
    pub materializations: Vec<MaterializationSpec>,
}

/// An ordered sequence of ingest/verify steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TestSpec {
    #[serde(default)]
    pub name: String,
    pub steps: Vec<TestStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase", tag = "type")]
pub enum TestStep {
    Ingest(TestStepIngest),
    Verify(TestStepVerify),
}

impl TestStep {
    pub fn collection(&self) -> &Collection {
        match self {
            TestStep::Ingest(s) => &s.collection,
            TestStep::Verify(s) => &s.collection,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TestStepIngest {
    pub collection: Collection,
    pub documents: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TestStepVerify {
    pub collection: Collection,
    #[serde(default)]
    pub partitions: Option<PartitionSelector>,
    /// JSON pointers of the collection's key, used to combine multiple
    /// reduced records sharing a key down to their final value before
    /// comparison. Empty for append-only collections, where every record
    /// read back is compared directly, in order.
    #[serde(default)]
    pub key: Vec<String>,
    pub documents: Vec<serde_json::Value>,
}

/// A selector over logical partition fields, narrowing which journals of a
/// collection a `Verify` step (or the cluster-binding driver's journal
/// listing) should read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PartitionSelector {
    #[serde(default)]
    pub include: std::collections::BTreeMap<String, Vec<serde_json::Value>>,
    #[serde(default)]
    pub exclude: std::collections::BTreeMap<String, Vec<serde_json::Value>>,
}
