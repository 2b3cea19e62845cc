use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Structured record type attached to a topic, carried on the wire as JSON:
///
/// ```json
/// { "fields": [
///     { "name": "id", "field_index": 1, "type": { "scalar": "int64" } },
///     { "name": "tags", "field_index": 2, "type": { "list": { "scalar": "string" } } },
///     { "name": "owner", "field_index": 3, "type": { "record": { "fields": [ ... ] } } }
/// ] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RecordType {
    pub(crate) fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Field {
    pub(crate) name: String,
    pub(crate) field_index: i32,
    #[serde(rename = "type")]
    pub(crate) field_type: FieldType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FieldType {
    Scalar(ScalarType),
    Record(RecordType),
    List(Box<FieldType>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ScalarType {
    Bool,
    Int32,
    Int64,
    Float,
    Double,
    Bytes,
    String,
}

#[derive(Debug, Error)]
pub(crate) enum SchemaError {
    #[error("malformed record type: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("record type {path} has no fields")]
    NoFields { path: String },

    #[error("record type {path} has a field without a name")]
    EmptyFieldName { path: String },

    #[error("record type {path} declares field {name:?} more than once")]
    DuplicateFieldName { path: String, name: String },

    #[error("record type {path} uses field index {index} more than once")]
    DuplicateFieldIndex { path: String, index: i32 },

    #[error("field {path}.{name} has a negative index {index}")]
    NegativeFieldIndex { path: String, name: String, index: i32 },
}

impl RecordType {
    /// Decodes the JSON form and validates its structure.
    pub(crate) fn parse(raw: &str) -> Result<RecordType, SchemaError> {
        let record_type: RecordType = serde_json::from_str(raw)?;
        record_type.validate()?;
        Ok(record_type)
    }

    pub(crate) fn validate(&self) -> Result<(), SchemaError> {
        self.validate_at("$")
    }

    fn validate_at(&self, path: &str) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::NoFields {
                path: path.to_string(),
            });
        }

        let mut names = HashSet::new();
        let mut indexes = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(SchemaError::EmptyFieldName {
                    path: path.to_string(),
                });
            }
            if field.field_index < 0 {
                return Err(SchemaError::NegativeFieldIndex {
                    path: path.to_string(),
                    name: field.name.clone(),
                    index: field.field_index,
                });
            }
            if !names.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateFieldName {
                    path: path.to_string(),
                    name: field.name.clone(),
                });
            }
            if !indexes.insert(field.field_index) {
                return Err(SchemaError::DuplicateFieldIndex {
                    path: path.to_string(),
                    index: field.field_index,
                });
            }
            field
                .field_type
                .validate_at(&format!("{}.{}", path, field.name))?;
        }
        Ok(())
    }
}

impl FieldType {
    fn validate_at(&self, path: &str) -> Result<(), SchemaError> {
        match self {
            FieldType::Scalar(_) => Ok(()),
            FieldType::Record(record) => record.validate_at(path),
            FieldType::List(element) => element.validate_at(&format!("{}[]", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_record_type() {
        let raw = r#"{"fields":[
            {"name":"id","field_index":1,"type":{"scalar":"int64"}},
            {"name":"tags","field_index":2,"type":{"list":{"scalar":"string"}}},
            {"name":"owner","field_index":3,"type":{"record":{"fields":[
                {"name":"email","field_index":1,"type":{"scalar":"string"}}
            ]}}}
        ]}"#;
        let record_type = RecordType::parse(raw).expect("valid record type");
        assert_eq!(record_type.fields.len(), 3);
        assert_eq!(
            record_type.fields[1].field_type,
            FieldType::List(Box::new(FieldType::Scalar(ScalarType::String)))
        );
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            RecordType::parse("{not json"),
            Err(SchemaError::Malformed(_))
        ));
        assert!(matches!(
            RecordType::parse(r#"{"fields":[{"name":"a","field_index":1,"type":{"scalar":"uuid"}}]}"#),
            Err(SchemaError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_structural_errors() {
        assert!(matches!(
            RecordType::parse(r#"{"fields":[]}"#),
            Err(SchemaError::NoFields { .. })
        ));
        assert!(matches!(
            RecordType::parse(
                r#"{"fields":[
                    {"name":"a","field_index":1,"type":{"scalar":"bool"}},
                    {"name":"a","field_index":2,"type":{"scalar":"bool"}}
                ]}"#
            ),
            Err(SchemaError::DuplicateFieldName { .. })
        ));
        assert!(matches!(
            RecordType::parse(
                r#"{"fields":[
                    {"name":"a","field_index":1,"type":{"scalar":"bool"}},
                    {"name":"b","field_index":1,"type":{"scalar":"bool"}}
                ]}"#
            ),
            Err(SchemaError::DuplicateFieldIndex { .. })
        ));
        assert!(matches!(
            RecordType::parse(r#"{"fields":[{"name":"","field_index":1,"type":{"scalar":"bool"}}]}"#),
            Err(SchemaError::EmptyFieldName { .. })
        ));
    }

    #[test]
    fn validates_nested_types_recursively() {
        let raw = r#"{"fields":[
            {"name":"items","field_index":1,"type":{"list":{"record":{"fields":[]}}}}
        ]}"#;
        match RecordType::parse(raw) {
            Err(SchemaError::NoFields { path }) => assert_eq!(path, "$.items[]"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
