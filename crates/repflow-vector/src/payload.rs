//! Conversions between [`ExercisePayload`] and Qdrant's payload value model.

use std::collections::HashMap;

use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::Value as QdrantValue;
use serde_json::Value;

use repflow_core::models::ExercisePayload;
use repflow_core::AppError;

/// Serialize a typed payload into the map Qdrant stores with each point.
pub fn to_qdrant_payload(
    payload: &ExercisePayload,
) -> Result<HashMap<String, QdrantValue>, AppError> {
    let value = serde_json::to_value(payload)?;
    let Value::Object(map) = value else {
        return Err(AppError::Internal(
            "exercise payload did not serialize to an object".into(),
        ));
    };
    Ok(map
        .into_iter()
        .map(|(k, v)| (k, qdrant_value_from_json(v)))
        .collect())
}

/// Parse a stored payload back into the typed form. Returns `None` when the
/// payload is malformed or lacks a parseable `database_id` back-reference;
/// such points are treated as orphans by the caller.
pub fn from_qdrant_payload(payload: HashMap<String, QdrantValue>) -> Option<ExercisePayload> {
    let map: serde_json::Map<String, Value> = payload
        .into_iter()
        .map(|(k, v)| (k, json_from_qdrant_value(v)))
        .collect();
    serde_json::from_value(Value::Object(map)).ok()
}

fn qdrant_value_from_json(value: Value) -> QdrantValue {
    let kind = match value {
        Value::Null => Kind::NullValue(0),
        Value::Bool(b) => Kind::BoolValue(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Kind::IntegerValue(i)
            } else {
                Kind::DoubleValue(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Kind::StringValue(s),
        Value::Array(items) => Kind::ListValue(qdrant_client::qdrant::ListValue {
            values: items.into_iter().map(qdrant_value_from_json).collect(),
        }),
        Value::Object(map) => Kind::StructValue(qdrant_client::qdrant::Struct {
            fields: map
                .into_iter()
                .map(|(k, v)| (k, qdrant_value_from_json(v)))
                .collect(),
        }),
    };
    QdrantValue { kind: Some(kind) }
}

pub(crate) fn json_from_qdrant_value(value: QdrantValue) -> Value {
    match value.kind {
        Some(Kind::NullValue(_)) | None => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values
                .into_iter()
                .map(json_from_qdrant_value)
                .collect(),
        ),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
    }
}
