use std::collections::HashMap;
use std::path::Path;

use apache_avro::Schema;
use avrosink_api::SinkError;

// ═══════════════════════════════════════════════════════════════
//  SchemaDescriptor
// ═══════════════════════════════════════════════════════════════

/// Immutable record schema bound to one sink instance.
///
/// Parsed once at startup; every record is validated and encoded against
/// it until the instance stops.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    schema: Schema,
    /// Named types by full name, for resolving `Schema::Ref`.
    named: HashMap<String, Schema>,
}

impl SchemaDescriptor {
    /// Parse an Avro schema definition (JSON text).
    ///
    /// The top-level type must be a record.
    pub fn parse(text: &str) -> Result<Self, SinkError> {
        if text.trim().is_empty() {
            return Err(SinkError::schema("schema definition is empty"));
        }

        let schema = Schema::parse_str(text)
            .map_err(|e| SinkError::schema(format!("failed to parse schema: {e}")))?;
        if !matches!(schema, Schema::Record(_)) {
            return Err(SinkError::schema(format!(
                "top-level schema must be a record, got {}",
                type_name(&schema)
            )));
        }

        let mut named = HashMap::new();
        collect_named(&schema, &mut named);
        Ok(Self { schema, named })
    }

    /// Load and parse a schema file (`.avsc`).
    pub fn from_file(path: &Path) -> Result<Self, SinkError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SinkError::schema(format!("failed to read schema file '{}': {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Full name of the top-level record.
    pub fn name(&self) -> String {
        match &self.schema {
            Schema::Record(r) => r.name.fullname(None),
            other => type_name(other).to_string(),
        }
    }

    /// Follow `Schema::Ref` to the named type it points at.
    pub(crate) fn resolve<'a>(&'a self, schema: &'a Schema) -> Result<&'a Schema, SinkError> {
        match schema {
            Schema::Ref { name } => {
                let fullname = name.fullname(None);
                self.named
                    .get(&fullname)
                    .ok_or_else(|| SinkError::schema(format!("unresolved type reference '{fullname}'")))
            }
            other => Ok(other),
        }
    }
}

fn collect_named(schema: &Schema, named: &mut HashMap<String, Schema>) {
    match schema {
        Schema::Record(r) => {
            named.insert(r.name.fullname(None), schema.clone());
            for field in &r.fields {
                collect_named(&field.schema, named);
            }
        }
        Schema::Enum(e) => {
            named.insert(e.name.fullname(None), schema.clone());
        }
        Schema::Fixed(f) => {
            named.insert(f.name.fullname(None), schema.clone());
        }
        Schema::Array(a) => collect_named(&a.items, named),
        Schema::Map(m) => collect_named(&m.types, named),
        Schema::Union(u) => {
            for variant in u.variants() {
                collect_named(variant, named);
            }
        }
        _ => {}
    }
}

/// Short type name for error messages.
pub(crate) fn type_name(schema: &Schema) -> &'static str {
    match schema {
        Schema::Null => "null",
        Schema::Boolean => "boolean",
        Schema::Int => "int",
        Schema::Long => "long",
        Schema::Float => "float",
        Schema::Double => "double",
        Schema::Bytes => "bytes",
        Schema::String => "string",
        Schema::Array(_) => "array",
        Schema::Map(_) => "map",
        Schema::Union(_) => "union",
        Schema::Record(_) => "record",
        Schema::Enum(_) => "enum",
        Schema::Fixed(_) => "fixed",
        Schema::Uuid => "uuid",
        Schema::Date => "date",
        Schema::TimeMillis => "time-millis",
        Schema::TimeMicros => "time-micros",
        Schema::TimestampMillis => "timestamp-millis",
        Schema::TimestampMicros => "timestamp-micros",
        Schema::TimestampNanos => "timestamp-nanos",
        Schema::LocalTimestampMillis => "local-timestamp-millis",
        Schema::LocalTimestampMicros => "local-timestamp-micros",
        Schema::LocalTimestampNanos => "local-timestamp-nanos",
        Schema::Ref { .. } => "reference",
        _ => "unsupported",
    }
}

#[cfg(test)]
mod tests {
    use avrosink_api::ErrorKind;

    use super::*;

    const USER_SCHEMA: &str = r#"{"type":"record","name":"myrecord",
        "fields":[{"name":"foo1","type":"string"},{"name":"int1","type":"int"}]}"#;

    #[test]
    fn parses_record_schema() {
        let desc = SchemaDescriptor::parse(USER_SCHEMA).unwrap();
        assert_eq!(desc.name(), "myrecord");
        assert!(matches!(desc.schema(), Schema::Record(r) if r.fields.len() == 2));
    }

    #[test]
    fn rejects_malformed_and_empty_definitions() {
        for text in ["", "   ", "{not json", r#"{"type":"record","name":"r"}"#] {
            let err = SchemaDescriptor::parse(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Schema, "input: {text:?}");
        }
    }

    #[test]
    fn rejects_non_record_top_level() {
        let err = SchemaDescriptor::parse(r#""string""#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.message.contains("must be a record"));
    }

    #[test]
    fn resolves_named_type_references() {
        let desc = SchemaDescriptor::parse(
            r#"{"type":"record","name":"pair","namespace":"ex","fields":[
                {"name":"left","type":{"type":"record","name":"point","fields":[{"name":"x","type":"int"}]}},
                {"name":"right","type":"point"}]}"#,
        )
        .unwrap();

        let Schema::Record(r) = desc.schema() else { panic!("expected record") };
        let right = desc.resolve(&r.fields[1].schema).unwrap();
        assert!(matches!(right, Schema::Record(p) if p.name.name == "point"));
    }

    #[test]
    fn missing_schema_file_is_a_schema_error() {
        let err = SchemaDescriptor::from_file(Path::new("/definitely/not/here.avsc")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
}
