//! Document combining and comparison for `Verify` steps.
//!
//! Reduction annotations and JSON-Schema-driven combine specs are a
//! catalog-authoring concern out of scope for this crate (see `spec.rs`);
//! what remains here is a deliberately simple last-write-wins combine over
//! a document's key, and a structural comparison lenient to floating-point
//! rounding.

use crate::driver::Mismatch;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Reduces `docs` to one record per distinct value of `key` (a set of JSON
/// pointers), keeping the last record seen for each key and preserving the
/// order each key was first observed in. With an empty `key`, every record
/// is kept as-is — the append-only case.
pub fn combine_last_write_wins(key: &[String], docs: Vec<Value>) -> Vec<Value> {
    if key.is_empty() {
        return docs;
    }

    let mut order = Vec::new();
    let mut by_key: BTreeMap<String, Value> = BTreeMap::new();
    for doc in docs {
        let k = key_string(key, &doc);
        if !by_key.contains_key(&k) {
            order.push(k.clone());
        }
        by_key.insert(k, doc);
    }
    order
        .into_iter()
        .map(|k| by_key.remove(&k).expect("key was just inserted"))
        .collect()
}

fn key_string(key: &[String], doc: &Value) -> String {
    let values: Vec<Value> = key
        .iter()
        .map(|ptr| doc.pointer(ptr).cloned().unwrap_or(Value::Null))
        .collect();
    serde_json::to_string(&values).expect("Vec<Value> always serializes")
}

/// True iff `actual` and `expect` are equal within a tolerance scaled to
/// their magnitude, so that e.g. `0.1 + 0.2` compares equal to `0.3`.
pub fn f64_eq(actual: f64, expect: f64) -> bool {
    let epsilon = f64::EPSILON * actual.abs().max(expect.abs()).max(1.0);
    (actual - expect).abs() <= epsilon
}

/// Recursively compares `actual` against `expect`, appending every
/// disagreement found to `out` as a `Mismatch` rather than stopping at the
/// first one, so a failed verify step reports everything wrong at once.
pub fn diff(location: &str, actual: &Value, expect: &Value, out: &mut Vec<Mismatch>) {
    match (actual, expect) {
        (Value::Object(a), Value::Object(e)) => {
            let keys: BTreeSet<&String> = a.keys().chain(e.keys()).collect();
            for k in keys {
                let next = format!("{location}/{k}");
                match (a.get(k), e.get(k)) {
                    (Some(av), Some(ev)) => diff(&next, av, ev, out),
                    (av, ev) => out.push(Mismatch {
                        location: next,
                        actual: av.cloned(),
                        expect: ev.cloned(),
                    }),
                }
            }
        }
        (Value::Array(a), Value::Array(e)) => {
            for i in 0..a.len().max(e.len()) {
                let next = format!("{location}/{i}");
                match (a.get(i), e.get(i)) {
                    (Some(av), Some(ev)) => diff(&next, av, ev, out),
                    (av, ev) => out.push(Mismatch {
                        location: next,
                        actual: av.cloned(),
                        expect: ev.cloned(),
                    }),
                }
            }
        }
        (Value::Number(a), Value::Number(e)) => {
            let equal = match (a.as_f64(), e.as_f64()) {
                (Some(a), Some(e)) => f64_eq(a, e),
                _ => a == e,
            };
            if !equal {
                out.push(Mismatch {
                    location: location.to_string(),
                    actual: Some(actual.clone()),
                    expect: Some(expect.clone()),
                });
            }
        }
        _ if actual == expect => {}
        _ => out.push(Mismatch {
            location: location.to_string(),
            actual: Some(actual.clone()),
            expect: Some(expect.clone()),
        }),
    }
}

/// Strips the reserved `/_meta` envelope (the producer's UUID placeholder,
/// used only by `uuid_flags` to recognize ACK records) from `doc`, so the
/// comparison below sees the same document shape a `Verify` fixture author
/// wrote — not the transport bookkeeping layered underneath it.
fn strip_meta(mut doc: Value) -> Value {
    if let Value::Object(map) = &mut doc {
        map.remove("_meta");
    }
    doc
}

/// Filters ACK records out of `actual`, strips their shared `/_meta`
/// envelope, combines by `key`, and compares the result against `expect` in
/// order. Returns every mismatch found, including a count mismatch surfaced
/// against the first extra or missing document.
pub fn verify_documents(key: &[String], actual: Vec<Value>, expect: &[Value]) -> Vec<Mismatch> {
    let actual = crate::cluster::uuid_flags::filter_acks(actual);
    let actual: Vec<Value> = actual.into_iter().map(strip_meta).collect();
    let actual = combine_last_write_wins(key, actual);

    let mut mismatches = Vec::new();
    for i in 0..actual.len().max(expect.len()) {
        let location = format!("/{i}");
        match (actual.get(i), expect.get(i)) {
            (Some(a), Some(e)) => diff(&location, a, e, &mut mismatches),
            (a, e) => mismatches.push(Mismatch {
                location,
                actual: a.cloned(),
                expect: e.cloned(),
            }),
        }
    }
    mismatches
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn combine_keeps_last_write_per_key_in_first_seen_order() {
        let docs = vec![
            json!({"id": 1, "v": "a"}),
            json!({"id": 2, "v": "x"}),
            json!({"id": 1, "v": "b"}),
        ];
        let combined = combine_last_write_wins(&["/id".to_string()], docs);
        assert_eq!(combined, vec![json!({"id": 1, "v": "b"}), json!({"id": 2, "v": "x"})]);
    }

    #[test]
    fn empty_key_passes_documents_through_unchanged() {
        let docs = vec![json!({"a": 1}), json!({"a": 1})];
        assert_eq!(combine_last_write_wins(&[], docs.clone()), docs);
    }

    #[test]
    fn f64_eq_tolerates_rounding_error() {
        assert!(f64_eq(0.1 + 0.2, 0.3));
        assert!(!f64_eq(1.0, 1.1));
    }

    #[test]
    fn diff_reports_every_disagreement_not_just_the_first() {
        let actual = json!({"a": 1, "b": 2});
        let expect = json!({"a": 99, "b": 2});
        let mut out = Vec::new();
        diff("", &actual, &expect, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].location, "/a");
    }

    #[test]
    fn verify_documents_reports_count_mismatch_against_missing_document() {
        let mismatches = verify_documents(&[], vec![json!({"a": 1})], &[json!({"a": 1}), json!({"a": 2})]);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].location, "/1");
        assert_eq!(mismatches[0].actual, None);
    }

    #[test]
    fn verify_documents_ignores_the_meta_envelope_carried_by_actual_records() {
        let actual = vec![json!({"a": 1, "_meta": {"uuid": "some-uuid"}})];
        let mismatches = verify_documents(&[], actual, &[json!({"a": 1})]);
        assert_eq!(mismatches, Vec::new());
    }
}
