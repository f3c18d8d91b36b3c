//! Coercion of untyped `serde_json::Value` tool arguments into the typed
//! shapes the runtime methods expect.

use chrono::{DateTime, Utc};
use mnemo_core::{MemoryItemType, MnemoError};
use serde_json::Value;
use uuid::Uuid;

pub fn str_field<'a>(args: &'a Value, key: &str) -> Result<&'a str, MnemoError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| MnemoError::Validation(format!("missing required field '{key}'")))
}

pub fn opt_str_field<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

pub fn uuid_field(args: &Value, key: &str) -> Result<Uuid, MnemoError> {
    let raw = str_field(args, key)?;
    Uuid::parse_str(raw).map_err(|_| MnemoError::Validation(format!("field '{key}' is not a valid uuid")))
}

pub fn bool_field(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

pub fn i64_field(args: &Value, key: &str, default: i64) -> i64 {
    args.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
}

pub fn usize_field(args: &Value, key: &str, default: usize) -> usize {
    args.get(key).and_then(|v| v.as_u64()).map(|v| v as usize).unwrap_or(default)
}

pub fn f32_field(args: &Value, key: &str, default: f32) -> f32 {
    args.get(key).and_then(|v| v.as_f64()).map(|v| v as f32).unwrap_or(default)
}

pub fn opt_f32_field(args: &Value, key: &str) -> Option<f32> {
    args.get(key).and_then(|v| v.as_f64()).map(|v| v as f32)
}

pub fn metadata_field(args: &Value, key: &str) -> Value {
    args.get(key).cloned().unwrap_or_else(|| serde_json::json!({}))
}

pub fn timestamp_field(args: &Value, key: &str) -> Option<DateTime<Utc>> {
    args.get(key).and_then(|v| v.as_str()).and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|dt| dt.with_timezone(&Utc))
}

pub fn string_list_field(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

pub fn memory_item_type_list_field(args: &Value, key: &str) -> Result<Vec<MemoryItemType>, MnemoError> {
    string_list_field(args, key)
        .iter()
        .map(|s| parse_memory_item_type(s))
        .collect()
}

pub fn parse_memory_item_type(s: &str) -> Result<MemoryItemType, MnemoError> {
    match s {
        "decision" => Ok(MemoryItemType::Decision),
        "constraint" => Ok(MemoryItemType::Constraint),
        "mistake" => Ok(MemoryItemType::Mistake),
        "assumption" => Ok(MemoryItemType::Assumption),
        "open_question" => Ok(MemoryItemType::OpenQuestion),
        other => Err(MnemoError::Validation(format!("unrecognized memory item type '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn str_field_missing_is_validation_error() {
        let err = str_field(&json!({}), "role").unwrap_err();
        assert!(matches!(err, MnemoError::Validation(_)));
    }

    #[test]
    fn uuid_field_rejects_malformed_uuid() {
        let err = uuid_field(&json!({"thread_id": "not-a-uuid"}), "thread_id").unwrap_err();
        assert!(matches!(err, MnemoError::Validation(_)));
    }

    #[test]
    fn uuid_field_accepts_valid_uuid() {
        let id = Uuid::new_v4();
        let args = json!({"thread_id": id.to_string()});
        assert_eq!(uuid_field(&args, "thread_id").unwrap(), id);
    }

    #[test]
    fn bool_field_falls_back_to_default_when_absent_or_wrong_type() {
        assert!(bool_field(&json!({}), "embed_now", true));
        assert!(!bool_field(&json!({"embed_now": "yes"}), "embed_now", false));
        assert!(bool_field(&json!({"embed_now": true}), "embed_now", false));
    }

    #[test]
    fn string_list_field_ignores_non_string_entries() {
        let args = json!({"tags": ["a", 1, "b", null]});
        assert_eq!(string_list_field(&args, "tags"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn string_list_field_missing_is_empty() {
        assert!(string_list_field(&json!({}), "tags").is_empty());
    }

    #[test]
    fn memory_item_type_list_field_rejects_unrecognized_type() {
        let args = json!({"types": ["decision", "bogus"]});
        assert!(memory_item_type_list_field(&args, "types").is_err());
    }

    #[test]
    fn memory_item_type_list_field_parses_all_recognized_variants() {
        let args = json!({"types": ["decision", "constraint", "mistake", "assumption", "open_question"]});
        let parsed = memory_item_type_list_field(&args, "types").unwrap();
        assert_eq!(parsed.len(), 5);
    }

    #[test]
    fn timestamp_field_rejects_non_rfc3339_string() {
        assert!(timestamp_field(&json!({"ts": "not a timestamp"}), "ts").is_none());
    }

    #[test]
    fn timestamp_field_parses_rfc3339() {
        let args = json!({"ts": "2026-01-15T10:30:00Z"});
        assert!(timestamp_field(&args, "ts").is_some());
    }

    #[test]
    fn f32_field_falls_back_to_default_when_absent() {
        assert_eq!(f32_field(&json!({}), "importance", 0.5), 0.5);
        assert_eq!(f32_field(&json!({"importance": 0.8}), "importance", 0.5), 0.8);
    }
}
