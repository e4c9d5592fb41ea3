use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::event::Event;

/// Fields excluded from the content fingerprint because they are volatile
/// (mutated by the lifecycle sweep) or system-assigned rather than part of
/// what the event actually says. `timestamp` is deliberately NOT excluded:
/// two otherwise-identical events recorded at different times are different
/// events.
pub const EXCLUDED_FIELDS: &[&str] = &[
    "id",
    "lifecycle_status",
    "last_activation",
    "activation_count",
    "consolidation_score",
];

/// Compute the deterministic content hash used for deduplication.
///
/// Serializes the event to JSON, strips `EXCLUDED_FIELDS`, then re-serializes
/// with object keys sorted and no insignificant whitespace before hashing
/// with SHA-256. Two events with identical content fingerprints produce the
/// same hash regardless of field insertion order, timezone representation
/// (`chrono` always emits UTC with `Z`), or which process computed it.
pub fn hash_event(event: &Event) -> String {
    let value = serde_json::to_value(event).expect("Event always serializes");
    let mut object = match value {
        Value::Object(map) => map,
        _ => unreachable!("Event serializes to a JSON object"),
    };
    for field in EXCLUDED_FIELDS {
        object.remove(*field);
    }
    let canonical = canonicalize(Value::Object(object));
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Render a JSON value with sorted object keys and no whitespace, matching
/// `json.dumps(sort_keys=True, separators=(",", ":"), ensure_ascii=True)`.
fn canonicalize(value: Value) -> String {
    let sorted = sort_keys(value);
    serde_json::to_string(&sorted).expect("sorted value always serializes")
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            for key in keys {
                let v = map[&key].clone();
                sorted.insert(key, sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Minimal hex encoding so the crate doesn't need a second dependency just
/// for this; `sha2`'s digest output is fixed-size bytes.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        let mut out = String::with_capacity(bytes.as_ref().len() * 2);
        for byte in bytes.as_ref() {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn hash_is_deterministic() {
        let ts = Utc::now();
        let event = Event::new("proj", "sess", ts, "fixed the bug");
        assert_eq!(hash_event(&event), hash_event(&event));
    }

    #[test]
    fn hash_ignores_excluded_fields() {
        let ts = Utc::now();
        let mut a = Event::new("proj", "sess", ts, "fixed the bug");
        let mut b = a.clone();
        b.id = Uuid::new_v4();
        b.lifecycle_status = crate::LifecycleStatus::Consolidated;
        b.activation_count = 7;
        b.consolidation_score = 0.8;
        b.last_activation = ts + chrono::Duration::days(1);
        assert_eq!(hash_event(&a), hash_event(&b));

        a.content = "different content".into();
        assert_ne!(hash_event(&a), hash_event(&b));
    }

    #[test]
    fn hash_is_sensitive_to_timestamp() {
        let ts = Utc::now();
        let a = Event::new("proj", "sess", ts, "same content");
        let b = Event::new("proj", "sess", ts + chrono::Duration::seconds(1), "same content");
        assert_ne!(hash_event(&a), hash_event(&b));
    }
}
