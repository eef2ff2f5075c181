//! Entity key generation.

use md5::{Digest, Md5};

use crate::mapping::rules::KeyStrategy;
use crate::value::Row;

/// Derive the entity id for a row.
///
/// Missing or null fields stringify to the empty string, so this never fails.
/// Two rows missing every hashed field therefore share one key.
pub fn generate_key(row: &Row, strategy: &KeyStrategy) -> String {
    match strategy {
        KeyStrategy::Direct { prefix, field } => {
            format!("{}{}", prefix, field_text(row, field))
        }
        KeyStrategy::CombinatorialHash { prefix, fields } => {
            let combined: String = fields.iter().map(|f| field_text(row, f)).collect();
            let digest = Md5::digest(combined.as_bytes());
            format!("{}{}", prefix, hex::encode(digest))
        }
    }
}

fn field_text(row: &Row, field: &str) -> String {
    row.get(field).map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{row_from_json, FieldValue};
    use serde_json::json;

    fn direct(prefix: &str, field: &str) -> KeyStrategy {
        KeyStrategy::Direct {
            prefix: prefix.to_string(),
            field: field.to_string(),
        }
    }

    fn hashed(prefix: &str, fields: &[&str]) -> KeyStrategy {
        KeyStrategy::CombinatorialHash {
            prefix: prefix.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_direct_key() {
        let row = row_from_json(json!({"id": "441", "owner": "张三"}));

        assert_eq!(generate_key(&row, &direct("", "id")), "441");
        assert_eq!(generate_key(&row, &direct("PARCEL_", "id")), "PARCEL_441");
    }

    #[test]
    fn test_direct_key_missing_field() {
        let row = row_from_json(json!({"id": "441"}));

        assert_eq!(generate_key(&row, &direct("P_", "code")), "P_");
    }

    #[test]
    fn test_direct_key_numeric_fields() {
        let mut row = row_from_json(json!({"n": 12}));
        row.insert("f".to_string(), FieldValue::Float(12.0));

        assert_eq!(generate_key(&row, &direct("", "n")), "12");
        assert_eq!(generate_key(&row, &direct("", "f")), "12.0");
    }

    #[test]
    fn test_hash_key_is_md5_of_concatenation() {
        let row = row_from_json(json!({"a": "hello", "b": "world"}));

        // md5("helloworld")
        assert_eq!(
            generate_key(&row, &hashed("H_", &["a", "b"])),
            "H_fc5e038d38a57032085441e7fe7010b0"
        );
    }

    #[test]
    fn test_hash_key_ignores_column_order_but_not_field_order() {
        let row1 = row_from_json(json!({"a": "x", "b": "y"}));
        let row2 = row_from_json(json!({"b": "y", "a": "x"}));
        let rule = hashed("", &["a", "b"]);

        assert_eq!(generate_key(&row1, &rule), generate_key(&row2, &rule));
        assert_ne!(
            generate_key(&row1, &rule),
            generate_key(&row1, &hashed("", &["b", "a"]))
        );
    }

    #[test]
    fn test_hash_key_all_fields_missing_collide() {
        let row1 = row_from_json(json!({"other": 1}));
        let row2 = row_from_json(json!({"a": null}));
        let rule = hashed("K", &["a", "b"]);

        // md5("")
        assert_eq!(generate_key(&row1, &rule), "Kd41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(generate_key(&row1, &rule), generate_key(&row2, &rule));
    }

    #[test]
    fn test_key_is_deterministic() {
        let row = row_from_json(json!({"a": "1", "b": 2, "c": 3.5}));
        let rule = hashed("X", &["a", "b", "c"]);

        let first = generate_key(&row, &rule);
        for _ in 0..10 {
            assert_eq!(generate_key(&row, &rule), first);
        }
    }
}
