//! Conversion between plain JSON and Firestore typed values

use serde_json::{json, Map, Value};

use crate::document::Document;
use crate::error::{StoreError, StoreResult};

/// Encode a JSON value as a Firestore `Value`
pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // Firestore carries int64 as a decimal string
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode every field of a document
pub fn encode_fields(document: &Document) -> Map<String, Value> {
    document
        .iter()
        .map(|(name, value)| (name.clone(), encode(value)))
        .collect()
}

/// Decode a Firestore `Value` into plain JSON
pub fn decode(value: &Value) -> StoreResult<Value> {
    let object = value
        .as_object()
        .ok_or_else(|| StoreError::Decode(format!("expected typed value, got {value}")))?;
    let (kind, inner) = object
        .iter()
        .next()
        .ok_or_else(|| StoreError::Decode("empty typed value".to_string()))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(inner.clone()),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            parsed
                .map(Value::from)
                .ok_or_else(|| StoreError::Decode(format!("bad integerValue: {inner}")))
        }
        "doubleValue" => Ok(inner.clone()),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode).collect::<StoreResult<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Object(fields))
        }
        other => Err(StoreError::Decode(format!("unsupported value type: {other}"))),
    }
}

/// Decode the `fields` map of a Firestore document
pub fn decode_fields(fields: &Map<String, Value>) -> StoreResult<Document> {
    fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), decode(value)?)))
        .collect()
}
