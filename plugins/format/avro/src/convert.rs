use std::collections::HashMap;

use apache_avro::Schema;
use apache_avro::types::Value;
use avrosink_api::SinkError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::schema::{SchemaDescriptor, type_name};

// ═══════════════════════════════════════════════════════════════
//  Avro → JSON conversion
// ═══════════════════════════════════════════════════════════════

/// Convert a decoded Avro value back to JSON. Bytes and fixed values come
/// out base64-encoded, unions collapse to their branch value.
pub fn avro_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::json!(i),
        Value::Long(l) => serde_json::json!(l),
        Value::Float(f) => serde_json::json!(f),
        Value::Double(d) => serde_json::json!(d),
        Value::Bytes(b) | Value::Fixed(_, b) => serde_json::Value::String(BASE64.encode(b)),
        Value::String(s) | Value::Enum(_, s) => serde_json::Value::String(s.clone()),
        Value::Union(_, inner) => avro_to_json(inner),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(avro_to_json).collect()),
        Value::Map(entries) => {
            let map: serde_json::Map<String, serde_json::Value> = entries
                .iter()
                .map(|(k, v)| (k.clone(), avro_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
        Value::Record(fields) => {
            let map: serde_json::Map<String, serde_json::Value> = fields
                .iter()
                .map(|(k, v)| (k.clone(), avro_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
        Value::Date(d) => serde_json::json!(d),
        Value::TimeMillis(t) => serde_json::json!(t),
        Value::TimeMicros(t) => serde_json::json!(t),
        Value::TimestampMillis(t) => serde_json::json!(t),
        Value::TimestampMicros(t) => serde_json::json!(t),
        Value::TimestampNanos(t) => serde_json::json!(t),
        Value::Decimal(d) => {
            let bytes: Vec<u8> = d.try_into().unwrap_or_default();
            serde_json::Value::String(BASE64.encode(bytes))
        }
        Value::BigDecimal(d) => serde_json::Value::String(d.to_string()),
        Value::Uuid(u) => serde_json::Value::String(u.to_string()),
        Value::Duration(_) => serde_json::Value::Null,
        Value::LocalTimestampMillis(t) => serde_json::json!(t),
        Value::LocalTimestampMicros(t) => serde_json::json!(t),
        Value::LocalTimestampNanos(t) => serde_json::json!(t),
    }
}

// ═══════════════════════════════════════════════════════════════
//  JSON → Avro conversion
// ═══════════════════════════════════════════════════════════════

/// Convert a JSON record to an Avro value, checking it against the schema.
///
/// Strict: missing fields without a default, unknown fields and mistyped
/// values are all encoding errors. Nothing is coerced to null.
pub fn json_to_avro(record: &serde_json::Value, desc: &SchemaDescriptor) -> Result<Value, SinkError> {
    convert(record, desc.schema(), desc, "$")
}

fn convert(
    val: &serde_json::Value,
    schema: &Schema,
    desc: &SchemaDescriptor,
    path: &str,
) -> Result<Value, SinkError> {
    use serde_json::Value as J;

    let schema = desc.resolve(schema)?;
    match (schema, val) {
        (Schema::Null, J::Null) => Ok(Value::Null),
        (Schema::Boolean, J::Bool(b)) => Ok(Value::Boolean(*b)),
        (Schema::Int, J::Number(_)) => Ok(Value::Int(as_i32(val, schema, path)?)),
        (Schema::Long, J::Number(_)) => Ok(Value::Long(as_i64(val, schema, path)?)),
        (Schema::Float, J::Number(n)) => match n.as_f64() {
            Some(f) => Ok(Value::Float(f as f32)),
            None => Err(mismatch(path, schema, val)),
        },
        (Schema::Double, J::Number(n)) => match n.as_f64() {
            Some(f) => Ok(Value::Double(f)),
            None => Err(mismatch(path, schema, val)),
        },
        (Schema::String, J::String(s)) => Ok(Value::String(s.clone())),
        (Schema::Bytes, J::String(s)) => Ok(Value::Bytes(decode_base64(s, path)?)),
        (Schema::Fixed(fixed), J::String(s)) => {
            let bytes = decode_base64(s, path)?;
            if bytes.len() != fixed.size {
                return Err(SinkError::encoding(format!(
                    "{path}: fixed '{}' needs {} bytes, got {}",
                    fixed.name.name,
                    fixed.size,
                    bytes.len()
                )));
            }
            Ok(Value::Fixed(fixed.size, bytes))
        }
        (Schema::Enum(e), J::String(s)) => match e.symbols.iter().position(|sym| sym == s) {
            Some(idx) => Ok(Value::Enum(idx as u32, s.clone())),
            None => Err(SinkError::encoding(format!(
                "{path}: '{s}' is not a symbol of enum '{}'",
                e.name.name
            ))),
        },
        (Schema::Array(array), J::Array(items)) => {
            let items = items
                .iter()
                .enumerate()
                .map(|(i, item)| convert(item, &array.items, desc, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(items))
        }
        (Schema::Map(map), J::Object(entries)) => {
            let mut out = HashMap::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(k.clone(), convert(v, &map.types, desc, &format!("{path}.{k}"))?);
            }
            Ok(Value::Map(out))
        }
        (Schema::Record(record), J::Object(entries)) => {
            if let Some(unknown) = entries.keys().find(|k| !record.lookup.contains_key(*k)) {
                return Err(SinkError::encoding(format!(
                    "{path}: unknown field '{unknown}' for record '{}'",
                    record.name.name
                )));
            }

            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                let field_path = format!("{path}.{}", field.name);
                let value = match (entries.get(&field.name), &field.default) {
                    (Some(v), _) => convert(v, &field.schema, desc, &field_path)?,
                    (None, Some(default)) => convert(default, &field.schema, desc, &field_path)?,
                    (None, None) => {
                        return Err(SinkError::encoding(format!("{field_path}: missing required field")));
                    }
                };
                fields.push((field.name.clone(), value));
            }
            Ok(Value::Record(fields))
        }
        (Schema::Union(union), _) => {
            // First branch that accepts the value wins; null only matches
            // the null branch.
            for (idx, variant) in union.variants().iter().enumerate() {
                if let Ok(v) = convert(val, variant, desc, path) {
                    return Ok(Value::Union(idx as u32, Box::new(v)));
                }
            }
            Err(SinkError::encoding(format!(
                "{path}: {} matches no branch of the union",
                json_kind(val)
            )))
        }
        (Schema::Date, J::Number(_)) => Ok(Value::Date(as_i32(val, schema, path)?)),
        (Schema::TimeMillis, J::Number(_)) => Ok(Value::TimeMillis(as_i32(val, schema, path)?)),
        (Schema::TimeMicros, J::Number(_)) => Ok(Value::TimeMicros(as_i64(val, schema, path)?)),
        (Schema::TimestampMillis, J::Number(_)) => Ok(Value::TimestampMillis(as_i64(val, schema, path)?)),
        (Schema::TimestampMicros, J::Number(_)) => Ok(Value::TimestampMicros(as_i64(val, schema, path)?)),
        (Schema::TimestampNanos, J::Number(_)) => Ok(Value::TimestampNanos(as_i64(val, schema, path)?)),
        (Schema::LocalTimestampMillis, J::Number(_)) => {
            Ok(Value::LocalTimestampMillis(as_i64(val, schema, path)?))
        }
        (Schema::LocalTimestampMicros, J::Number(_)) => {
            Ok(Value::LocalTimestampMicros(as_i64(val, schema, path)?))
        }
        (Schema::LocalTimestampNanos, J::Number(_)) => {
            Ok(Value::LocalTimestampNanos(as_i64(val, schema, path)?))
        }
        (Schema::Uuid, J::String(s)) => uuid::Uuid::parse_str(s)
            .map(Value::Uuid)
            .map_err(|e| SinkError::encoding(format!("{path}: invalid uuid '{s}': {e}"))),
        (Schema::Decimal(_) | Schema::BigDecimal | Schema::Duration, _) => Err(SinkError::encoding(
            format!("{path}: {} fields cannot be written from JSON", type_name(schema)),
        )),
        _ => Err(mismatch(path, schema, val)),
    }
}

fn as_i64(val: &serde_json::Value, schema: &Schema, path: &str) -> Result<i64, SinkError> {
    val.as_i64().ok_or_else(|| mismatch(path, schema, val))
}

fn as_i32(val: &serde_json::Value, schema: &Schema, path: &str) -> Result<i32, SinkError> {
    let wide = as_i64(val, schema, path)?;
    i32::try_from(wide)
        .map_err(|_| SinkError::encoding(format!("{path}: {wide} is out of range for {}", type_name(schema))))
}

fn decode_base64(s: &str, path: &str) -> Result<Vec<u8>, SinkError> {
    BASE64
        .decode(s)
        .map_err(|e| SinkError::encoding(format!("{path}: bytes must be base64: {e}")))
}

fn mismatch(path: &str, schema: &Schema, val: &serde_json::Value) -> SinkError {
    SinkError::encoding(format!(
        "{path}: expected {}, got {}",
        type_name(schema),
        json_kind(val)
    ))
}

fn json_kind(val: &serde_json::Value) -> &'static str {
    match val {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) if n.is_f64() => "fractional number",
        serde_json::Value::Number(_) => "integer",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use avrosink_api::ErrorKind;
    use serde_json::json;

    use super::*;

    fn desc(fields: &str) -> SchemaDescriptor {
        SchemaDescriptor::parse(&format!(
            r#"{{"type":"record","name":"test","fields":[{fields}]}}"#
        ))
        .unwrap()
    }

    fn user() -> SchemaDescriptor {
        desc(r#"{"name":"foo1","type":"string"},{"name":"int1","type":"int"}"#)
    }

    #[test]
    fn converts_conforming_record_in_schema_order() {
        let value = json_to_avro(&json!({"int1": 1, "foo1": "bar1"}), &user()).unwrap();
        assert_eq!(
            value,
            Value::Record(vec![
                ("foo1".into(), Value::String("bar1".into())),
                ("int1".into(), Value::Int(1)),
            ])
        );
    }

    #[test]
    fn rejects_missing_extra_and_mistyped_fields() {
        let cases = [
            (json!({"foo1": "bar1"}), "missing required field"),
            (json!({"foo1": "bar1", "int1": 1, "extra": true}), "unknown field 'extra'"),
            (json!({"foo1": 7, "int1": 1}), "expected string, got integer"),
            (json!({"foo1": "bar1", "int1": 1.5}), "expected int"),
            (json!({"foo1": "bar1", "int1": 3_000_000_000_i64}), "out of range"),
            (json!(["bar1", 1]), "expected record, got array"),
        ];
        for (record, needle) in cases {
            let err = json_to_avro(&record, &user()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Encoding);
            assert!(err.message.contains(needle), "{record} -> {}", err.message);
        }
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let d = desc(r#"{"name":"a","type":"int"},{"name":"b","type":"string","default":"x"}"#);
        let value = json_to_avro(&json!({"a": 1}), &d).unwrap();
        assert_eq!(
            value,
            Value::Record(vec![
                ("a".into(), Value::Int(1)),
                ("b".into(), Value::String("x".into())),
            ])
        );
    }

    #[test]
    fn nullable_union_picks_matching_branch() {
        let d = desc(r#"{"name":"n","type":["null","long"]}"#);
        assert_eq!(
            json_to_avro(&json!({"n": null}), &d).unwrap(),
            Value::Record(vec![("n".into(), Value::Union(0, Box::new(Value::Null)))])
        );
        assert_eq!(
            json_to_avro(&json!({"n": 5}), &d).unwrap(),
            Value::Record(vec![("n".into(), Value::Union(1, Box::new(Value::Long(5))))])
        );
        assert!(json_to_avro(&json!({"n": "five"}), &d).is_err());
    }

    #[test]
    fn nested_containers_and_enums() {
        let d = desc(
            r#"{"name":"tags","type":{"type":"array","items":"string"}},
               {"name":"counts","type":{"type":"map","values":"long"}},
               {"name":"suit","type":{"type":"enum","name":"suit","symbols":["HEARTS","SPADES"]}}"#,
        );
        let value = json_to_avro(
            &json!({"tags": ["a", "b"], "counts": {"x": 1}, "suit": "SPADES"}),
            &d,
        )
        .unwrap();
        let Value::Record(fields) = value else { panic!("expected record") };
        assert_eq!(fields[2].1, Value::Enum(1, "SPADES".into()));

        let err = json_to_avro(&json!({"tags": ["a", 1], "counts": {}, "suit": "SPADES"}), &d)
            .unwrap_err();
        assert!(err.message.starts_with("$.tags[1]"), "{}", err.message);
        assert!(json_to_avro(&json!({"tags": [], "counts": {}, "suit": "CLUBS"}), &d).is_err());
    }

    #[test]
    fn bytes_round_trip_through_base64() {
        let d = desc(r#"{"name":"raw","type":"bytes"}"#);
        let value = json_to_avro(&json!({"raw": "AAEC"}), &d).unwrap();
        assert_eq!(avro_to_json(&value), json!({"raw": "AAEC"}));
        assert!(json_to_avro(&json!({"raw": "***"}), &d).is_err());
    }
}
