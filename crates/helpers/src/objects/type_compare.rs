use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// The kind of a JSON value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "null" => ValueKind::Null,
            "boolean" => ValueKind::Boolean,
            "number" => ValueKind::Number,
            "string" => ValueKind::String,
            "array" => ValueKind::Array,
            "object" => ValueKind::Object,
            _ => return Err(SchemaError::UnknownType(s.to_owned())),
        })
    }
}

/// A schema could not be built from its JSON shorthand.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown type name: {0}")]
    UnknownType(String),
    #[error("invalid schema: {0}")]
    InvalidShape(String),
}

/// The expected shape of a JSON value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeSchema {
    /// A value of exactly this kind.
    Kind(ValueKind),
    /// A value of any of these kinds. For arrays, every element must be of one of the kinds.
    OneOf(Vec<ValueKind>),
    /// An array whose elements all match the inner schema.
    ArrayOf(Box<TypeSchema>),
    /// An object whose keys all appear in the schema, with matching values.
    Object(BTreeMap<String, TypeSchema>),
}

impl TypeSchema {
    /// Builds a schema from its JSON shorthand.
    ///
    /// - `"string"` is a single kind,
    /// - `["number", "string"]` accepts any of the listed kinds,
    /// - `{"key": ...}` describes an object,
    /// - `[{"key": ...}]` describes an array of such objects.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        match value {
            Value::String(name) => Ok(TypeSchema::Kind(name.parse()?)),
            Value::Object(fields) => fields
                .iter()
                .map(|(key, field)| Ok::<_, SchemaError>((key.clone(), Self::from_value(field)?)))
                .collect::<Result<_, _>>()
                .map(TypeSchema::Object),
            Value::Array(items) => match items.as_slice() {
                [] => Err(SchemaError::InvalidShape("empty array".to_owned())),
                [object @ Value::Object(_)] => {
                    Ok(TypeSchema::ArrayOf(Box::new(Self::from_value(object)?)))
                }
                items => items
                    .iter()
                    .map(|item| match item {
                        Value::String(name) => name.parse(),
                        other => Err(SchemaError::InvalidShape(other.to_string())),
                    })
                    .collect::<Result<_, _>>()
                    .map(TypeSchema::OneOf),
            },
            other => Err(SchemaError::InvalidShape(other.to_string())),
        }
    }
}

/// A value did not match its [`TypeSchema`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("expected {expected_type} at {location}, received {received}")]
pub struct TypeMismatch {
    /// Dotted path to the value, starting at `target`.
    pub location: String,
    pub expected_type: String,
    /// The offending value and its kind, as `value:kind`.
    pub received: String,
}

impl TypeMismatch {
    fn new(location: &str, expected_type: impl Into<String>, received: &Value) -> Self {
        Self {
            location: location.to_owned(),
            expected_type: expected_type.into(),
            received: format!("{received}:{}", ValueKind::of(received)),
        }
    }
}

fn expect_kinds(value: &Value, kinds: &[ValueKind], location: &str) -> Result<(), TypeMismatch> {
    if kinds.contains(&ValueKind::of(value)) {
        return Ok(());
    }

    let expected: Vec<_> = kinds.iter().map(|kind| kind.as_str()).collect();
    Err(TypeMismatch::new(location, expected.join(" | "), value))
}

fn check(value: &Value, schema: &TypeSchema, location: &str) -> Result<(), TypeMismatch> {
    match schema {
        TypeSchema::Kind(kind) => expect_kinds(value, std::slice::from_ref(kind), location),
        TypeSchema::OneOf(kinds) => match value {
            Value::Array(items) if !kinds.contains(&ValueKind::Array) => items
                .iter()
                .try_for_each(|item| expect_kinds(item, kinds, location)),
            _ => expect_kinds(value, kinds, location),
        },
        TypeSchema::ArrayOf(inner) => match value {
            Value::Array(items) => items
                .iter()
                .try_for_each(|item| check(item, inner, location)),
            _ => Err(TypeMismatch::new(location, "array", value)),
        },
        TypeSchema::Object(fields) => {
            let Value::Object(entries) = value else {
                return Err(TypeMismatch::new(location, "object", value));
            };

            for (key, entry) in entries {
                let location = format!("{location}.{key}");
                match fields.get(key) {
                    Some(field) => check(entry, field, &location)?,
                    None => return Err(TypeMismatch::new(&location, "undefined", entry)),
                }
            }
            Ok(())
        }
    }
}

/// Checks that `target` has the shape described by `schema`.
///
/// Returns the first mismatch found, with its location given as a dotted path starting at
/// `target`. Keys of `target` that the schema does not mention are mismatches, keys of the schema
/// that are missing in `target` are not.
pub fn deep_type_compare(target: &Value, schema: &TypeSchema) -> Result<(), TypeMismatch> {
    check(target, schema, "target")
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;
    use serde_json::json;

    use super::*;

    fn schema(value: Value) -> TypeSchema {
        TypeSchema::from_value(&value).unwrap()
    }

    fn user_schema() -> TypeSchema {
        schema(json!({
            "name": "string",
            "age": ["number", "null"],
            "tags": ["string"],
            "address": {"city": "string"},
            "friends": [{"name": "string"}],
        }))
    }

    #[test]
    fn test_matching() {
        let user = json!({
            "name": "a",
            "age": null,
            "tags": ["x", "y"],
            "address": {"city": "b"},
            "friends": [{"name": "c"}, {"name": "d"}],
        });
        assert_eq!(deep_type_compare(&user, &user_schema()), Ok(()));

        // keys missing in the target are fine
        assert_eq!(deep_type_compare(&json!({"age": 3}), &user_schema()), Ok(()));
    }

    #[test]
    fn test_nested_mismatch() {
        let user = json!({"address": {"city": 1}});
        let mismatch = deep_type_compare(&user, &user_schema()).unwrap_err();

        assert_debug_snapshot!(mismatch, @r###"
        TypeMismatch {
            location: "target.address.city",
            expected_type: "string",
            received: "1:number",
        }
        "###);
        assert_eq!(
            mismatch.to_string(),
            "expected string at target.address.city, received 1:number"
        );
    }

    #[test]
    fn test_unknown_key() {
        let mismatch = deep_type_compare(&json!({"nickname": "x"}), &user_schema()).unwrap_err();
        assert_eq!(mismatch.location, "target.nickname");
        assert_eq!(mismatch.expected_type, "undefined");
        assert_eq!(mismatch.received, r#""x":string"#);
    }

    #[test]
    fn test_every_array_element_is_checked() {
        let mismatch = deep_type_compare(&json!({"tags": ["x", 2]}), &user_schema()).unwrap_err();
        assert_eq!(mismatch.location, "target.tags");
        assert_eq!(mismatch.received, "2:number");

        let friends = json!({"friends": [{"name": "c"}, {"name": false}]});
        let mismatch = deep_type_compare(&friends, &user_schema()).unwrap_err();
        assert_eq!(mismatch.location, "target.friends.name");
        assert_eq!(mismatch.expected_type, "string");
    }

    #[test]
    fn test_one_of() {
        let mismatch = deep_type_compare(&json!({"age": "old"}), &user_schema()).unwrap_err();
        assert_eq!(mismatch.expected_type, "number | null");

        let any_array = schema(json!({"list": ["array", "null"]}));
        assert_eq!(deep_type_compare(&json!({"list": [1, "a"]}), &any_array), Ok(()));
    }

    #[test]
    fn test_target_not_an_object() {
        let mismatch = deep_type_compare(&json!([1]), &user_schema()).unwrap_err();
        assert_eq!(mismatch.location, "target");
        assert_eq!(mismatch.expected_type, "object");
        assert_eq!(mismatch.received, "[1]:array");
    }

    #[test]
    fn test_invalid_schemas() {
        assert_eq!(
            TypeSchema::from_value(&json!({"a": "text"})),
            Err(SchemaError::UnknownType("text".to_owned()))
        );
        assert_eq!(
            TypeSchema::from_value(&json!({"a": 1})),
            Err(SchemaError::InvalidShape("1".to_owned()))
        );
        assert!(TypeSchema::from_value(&json!({"a": []})).is_err());
    }
}
