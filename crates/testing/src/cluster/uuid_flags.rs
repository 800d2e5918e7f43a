//! Recognizes and filters transaction-acknowledgement records embedded in a
//! collection's journals. Every committed document carries a `_meta/uuid`
//! whose low bits encode a producer flag alongside the usual v1 clock
//! fields; an ACK record exists purely to commit a transaction boundary and
//! never appears in `Verify` fixtures, so the cluster-binding driver must
//! strip them before comparing documents.

use serde_json::Value;
use uuid::Uuid;

/// Low byte of the UUID's clock-sequence-and-node field carries the
/// producer flag. `CONTINUE_TXN` covers the overwhelming majority of
/// records; `ACK_TXN` marks the record that closes out a transaction.
const FLAG_MASK: u8 = 0x0f;
const ACK_TXN: u8 = 0x02;

/// Extracts the `_meta/uuid` field of `doc`, if present and well-formed.
fn document_uuid(doc: &Value) -> Option<Uuid> {
    let raw = doc.pointer("/_meta/uuid")?.as_str()?;
    Uuid::parse_str(raw).ok()
}

/// True iff `doc` is a transaction-acknowledgement record and should be
/// excluded from a `Verify` comparison.
pub fn is_ack(doc: &Value) -> bool {
    match document_uuid(doc) {
        Some(uuid) => {
            let node = uuid.as_bytes()[9];
            node & FLAG_MASK == ACK_TXN
        }
        // Documents without a recognizable UUID are never ACK records —
        // fixtures ingested by this crate's own `Driver::ingest` don't
        // carry one at all.
        None => false,
    }
}

/// Filters `docs` down to the non-ACK records, preserving order.
pub fn filter_acks(docs: Vec<Value>) -> Vec<Value> {
    docs.into_iter().filter(|d| !is_ack(d)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn doc_with_uuid_node_byte(byte: u8) -> Value {
        let mut bytes = [0u8; 16];
        bytes[9] = byte;
        let uuid = Uuid::from_bytes(bytes);
        json!({"_meta": {"uuid": uuid.to_string()}, "a": 1})
    }

    #[test]
    fn ack_flagged_record_is_recognized() {
        assert!(is_ack(&doc_with_uuid_node_byte(ACK_TXN)));
    }

    #[test]
    fn continue_flagged_record_is_not_an_ack() {
        assert!(!is_ack(&doc_with_uuid_node_byte(0x01)));
    }

    #[test]
    fn documents_without_a_uuid_are_never_acks() {
        assert!(!is_ack(&json!({"a": 1})));
    }

    #[test]
    fn filter_acks_preserves_order_of_survivors() {
        let docs = vec![
            json!({"a": 1}),
            doc_with_uuid_node_byte(ACK_TXN),
            json!({"a": 2}),
        ];
        let filtered = filter_acks(docs);
        assert_eq!(filtered, vec![json!({"a": 1}), json!({"a": 2})]);
    }
}
