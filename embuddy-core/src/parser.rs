//! Line-delimited JSON parsing into canonical [`Entity`] values.
//!
//! One JSON object per line, blank lines skipped. Parsing stops at the first
//! bad line: syntax problems become [`BuddyError::Format`], wrong or missing
//! fields become [`BuddyError::Schema`]. Cross-record embedding length checks
//! are left to the processor.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::entity::{Embedding, Entity};
use crate::error::{BuddyError, BuddyResult};

const UTF8_BOM: &str = "\u{feff}";

/// Parses newline-delimited JSON text.
pub fn parse_text(text: &str) -> BuddyResult<Vec<Entity>> {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    let mut entities = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|e| BuddyError::Format {
            line: line_no,
            message: e.to_string(),
        })?;
        let record = value.as_object().ok_or_else(|| {
            BuddyError::Schema(format!("line {}: record is not a JSON object", line_no))
        })?;
        entities.push(entity_from_record(record, &format!("line {}", line_no))?);
    }

    debug!(count = entities.len(), "Parsed NDJSON records");
    Ok(entities)
}

/// Decodes raw bytes as UTF-8 and parses them.
pub fn parse_bytes(bytes: &[u8]) -> BuddyResult<Vec<Entity>> {
    let text = std::str::from_utf8(bytes)?;
    parse_text(text)
}

/// Parses a browser-style data URL (`data:<mime>;base64,<payload>`).
pub fn parse_upload_contents(contents: &str) -> BuddyResult<Vec<Entity>> {
    let (header, payload) = contents
        .split_once(',')
        .ok_or_else(|| BuddyError::Encoding("data URL is missing the ',' separator".to_string()))?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(BuddyError::Encoding(format!(
            "unsupported upload header '{}', expected a base64 data URL",
            header
        )));
    }
    let decoded = STANDARD.decode(payload.trim())?;
    parse_bytes(&decoded)
}

/// Converts one decoded JSON object into an [`Entity`].
///
/// `location` names the record in error messages ("line 3", "record 7").
/// A missing or null `id` gets a fresh UUID v4.
pub(crate) fn entity_from_record(record: &Map<String, Value>, location: &str) -> BuddyResult<Entity> {
    let text = match record.get("text") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(BuddyError::Schema(format!(
                "{}: 'text' must be a string, got {}",
                location,
                type_name(other)
            )))
        }
        None => return Err(BuddyError::Schema(format!("{}: missing required field 'text'", location))),
    };

    let embedding = match record.get("embedding") {
        Some(value) => parse_embedding(value, location)?,
        None => return Err(BuddyError::Schema(format!("{}: missing required field 'embedding'", location))),
    };

    let id = match record.get("id") {
        None | Some(Value::Null) => Uuid::new_v4().to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
        Some(other) => {
            return Err(BuddyError::Schema(format!(
                "{}: 'id' must be a string or integer, got {}",
                location,
                type_name(other)
            )))
        }
    };

    Ok(Entity {
        id,
        text,
        embedding,
        category: optional_string(record, "category", location)?,
        subcategory: optional_string(record, "subcategory", location)?,
        tags: optional_tags(record, location)?,
    })
}

fn parse_embedding(value: &Value, location: &str) -> BuddyResult<Embedding> {
    let items = value.as_array().ok_or_else(|| {
        BuddyError::Schema(format!(
            "{}: 'embedding' must be an array of numbers, got {}",
            location,
            type_name(value)
        ))
    })?;
    if items.is_empty() {
        return Err(BuddyError::Schema(format!("{}: 'embedding' must not be empty", location)));
    }
    let mut vector = Vec::with_capacity(items.len());
    for (pos, item) in items.iter().enumerate() {
        let number = item.as_f64().ok_or_else(|| {
            BuddyError::Schema(format!(
                "{}: 'embedding' element {} is {}, expected a number",
                location,
                pos,
                type_name(item)
            ))
        })?;
        let value = number as f32;
        if !value.is_finite() {
            return Err(BuddyError::Schema(format!(
                "{}: 'embedding' element {} ({}) does not fit in a 32-bit float",
                location, pos, number
            )));
        }
        vector.push(value);
    }
    Ok(Embedding::from(vector))
}

fn optional_string(record: &Map<String, Value>, key: &str, location: &str) -> BuddyResult<Option<String>> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(BuddyError::Schema(format!(
            "{}: '{}' must be a string, got {}",
            location,
            key,
            type_name(other)
        ))),
    }
}

fn optional_tags(record: &Map<String, Value>, location: &str) -> BuddyResult<Option<Vec<String>>> {
    let items = match record.get("tags") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(BuddyError::Schema(format!(
                "{}: 'tags' must be an array of strings, got {}",
                location,
                type_name(other)
            )))
        }
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(BuddyError::Schema(format!(
                "{}: 'tags' must only contain strings, found {}",
                location,
                type_name(other)
            ))),
        })
        .collect::<BuddyResult<Vec<_>>>()
        .map(Some)
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_minimal_records() {
        let input = "{\"text\":\"a\",\"embedding\":[1,2,3]}\n{\"text\":\"b\",\"embedding\":[4,5,6]}";
        let entities = parse_text(input).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].text, "a");
        assert_eq!(entities[1].embedding.to_vec(), vec![4.0, 5.0, 6.0]);
        assert_ne!(entities[0].id, entities[1].id);
        assert!(entities[0].category.is_none());
        assert!(entities[0].tags.is_none());
    }

    #[test]
    fn test_blank_lines_and_crlf_skipped() {
        let input = "\r\n{\"id\":\"x\",\"text\":\"a\",\"embedding\":[1]}\r\n   \r\n";
        let entities = parse_text(input).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id, "x");
    }

    #[test]
    fn test_optional_fields_passed_through() {
        let input = r#"{"id":"d1","text":"t","embedding":[0.5],"category":"news","subcategory":"tech","tags":[]}"#;
        let entity = &parse_text(input).unwrap()[0];
        assert_eq!(entity.category.as_deref(), Some("news"));
        assert_eq!(entity.subcategory.as_deref(), Some("tech"));
        assert_eq!(entity.tags, Some(vec![]));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let input: String = (0..50)
            .map(|i| format!("{{\"text\":\"t{}\",\"embedding\":[{}]}}\n", i, i))
            .collect();
        let entities = parse_text(&input).unwrap();
        let ids: HashSet<_> = entities.iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_broken_json_is_format_error_with_line() {
        let input = "{\"text\":\"a\",\"embedding\":[1]}\n{\"text\": \"b\", \"embedding\": [1,\n";
        match parse_text(input) {
            Err(BuddyError::Format { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected Format error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_text_is_schema_error() {
        let err = parse_text(r#"{"embedding":[1,2]}"#).unwrap_err();
        assert!(matches!(err, BuddyError::Schema(ref msg) if msg.contains("'text'")));
    }

    #[test]
    fn test_non_numeric_embedding_is_schema_error() {
        let err = parse_text(r#"{"text":"a","embedding":[1,"two"]}"#).unwrap_err();
        assert!(matches!(err, BuddyError::Schema(ref msg) if msg.contains("element 1")));

        let err = parse_text(r#"{"text":"a","embedding":"1,2"}"#).unwrap_err();
        assert!(matches!(err, BuddyError::Schema(_)));
    }

    #[test]
    fn test_out_of_range_embedding_value_is_schema_error() {
        let err = parse_text(r#"{"text":"a","embedding":[1.0,1e39]}"#).unwrap_err();
        assert!(matches!(err, BuddyError::Schema(ref msg) if msg.contains("element 1")));
    }

    #[test]
    fn test_non_object_line_is_schema_error() {
        let err = parse_text("[1,2,3]").unwrap_err();
        assert!(matches!(err, BuddyError::Schema(ref msg) if msg.contains("line 1")));
    }

    #[test]
    fn test_integer_id_is_stringified() {
        let entity = &parse_text(r#"{"id":42,"text":"a","embedding":[1]}"#).unwrap()[0];
        assert_eq!(entity.id, "42");
    }

    #[test]
    fn test_invalid_utf8_is_encoding_error() {
        let bytes = b"{\"text\":\"\xff\",\"embedding\":[1]}";
        assert!(matches!(parse_bytes(bytes), Err(BuddyError::Encoding(_))));
    }

    #[test]
    fn test_parse_data_url() {
        let ndjson = "{\"text\":\"a\",\"embedding\":[1,2]}\n";
        let contents = format!("data:application/x-ndjson;base64,{}", STANDARD.encode(ndjson));
        let entities = parse_upload_contents(&contents).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "a");
    }

    #[test]
    fn test_malformed_data_url_is_encoding_error() {
        assert!(matches!(parse_upload_contents("data:text/plain;base64"), Err(BuddyError::Encoding(_))));
        assert!(matches!(parse_upload_contents("data:text/plain;base64,@@@"), Err(BuddyError::Encoding(_))));
        assert!(matches!(parse_upload_contents("data:text/plain,abc"), Err(BuddyError::Encoding(_))));
    }
}
