// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON schema documents.
//!
//! Lets a schema tree be authored as data instead of builder calls:
//!
//! ```json
//! {
//!   "name": "Metadata",
//!   "root": true,
//!   "version": 1,
//!   "fields": {
//!     "revision": 1,
//!     "hashes": 2,
//!     "Hashes": { "key": "hashes", "ignore": true }
//!   }
//! }
//! ```
//!
//! Each `fields` entry is classified by its value: an integer declares a leaf
//! field, an object declares a nested schema (its `key` defaults to the entry
//! name). Anything else is a [`MinimizeError::Schema`]. No file I/O happens
//! here; callers hand in text, bytes, or an already parsed `serde_json::Value`.

use serde::Deserialize;

use crate::directive::ProcessDirective;
use crate::error::{MinimizeError, Result};
use crate::schema::{FieldCode, SchemaDef};

/// Parsed, not yet validated, schema document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    /// Diagnostic name; defaults to the parent entry name, or `"Schema"`.
    #[serde(default)]
    pub name: Option<String>,
    /// Lookup key under the parent; defaults to the parent entry name.
    #[serde(default)]
    pub key: Option<String>,
    /// Pass values through untouched.
    #[serde(default)]
    pub ignore: bool,
    /// Root schema (encoded records carry the version marker).
    #[serde(default)]
    pub root: bool,
    /// Version for root schemas.
    #[serde(default)]
    pub version: Option<u32>,
    /// Process directive in its JSON form, see [`ProcessDirective::from_json`].
    #[serde(default)]
    pub process: serde_json::Value,
    /// Field codes and nested schema documents.
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl SchemaDocument {
    /// Parse a document from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse a document from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Parse a document from an already decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Turn the document (and every nested one) into a [`SchemaDef`].
    pub fn into_schema(self) -> Result<SchemaDef> {
        self.into_schema_under(None)
    }

    fn into_schema_under(self, entry: Option<&str>) -> Result<SchemaDef> {
        let name = self
            .name
            .or_else(|| entry.map(str::to_owned))
            .unwrap_or_else(|| "Schema".to_owned());

        let mut builder = SchemaDef::builder(name.as_str());
        if let Some(key) = self.key.or_else(|| entry.map(str::to_owned)) {
            builder = builder.key(key);
        }
        if self.ignore {
            builder = builder.ignore();
        }
        if self.root {
            builder = builder.root();
        }
        if let Some(version) = self.version {
            builder = builder.version(version);
        }
        if let Some(directive) = ProcessDirective::from_json(&self.process)? {
            builder = builder.process(directive);
        }

        for (field, declared) in self.fields {
            builder = match declared {
                serde_json::Value::Number(number) => {
                    builder.field(field.as_str(), field_code(&name, &field, &number)?)
                }
                serde_json::Value::Object(map) => {
                    let nested = Self::from_value(serde_json::Value::Object(map))?;
                    builder.child(nested.into_schema_under(Some(&field))?)
                }
                other => {
                    return Err(MinimizeError::schema(
                        &name,
                        format!("unrecognized field in schema: {field:?} = {other}"),
                    ))
                }
            };
        }

        Ok(builder.finish())
    }
}

fn field_code(schema: &str, field: &str, number: &serde_json::Number) -> Result<FieldCode> {
    number
        .as_u64()
        .and_then(|code| FieldCode::try_from(code).ok())
        .ok_or_else(|| {
            MinimizeError::schema(
                schema,
                format!("field {field:?} has code {number}, expected an integer in 0..=4294967295"),
            )
        })
}

/// Parse JSON text straight into a [`SchemaDef`].
pub fn load_schema(text: &str) -> Result<SchemaDef> {
    SchemaDocument::from_json_str(text)?.into_schema()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::directive::{ContainerKind, DirectiveSpec};

    #[test]
    fn nested_documents_become_children() {
        let schema = load_schema(
            r#"{
                "name": "Metadata",
                "root": true,
                "version": 1,
                "fields": {
                    "revision": 1,
                    "hashes": 2,
                    "media": 3,
                    "Hashes": {"key": "hashes", "ignore": true}
                }
            }"#,
        )
        .unwrap();
        assert!(schema.is_root());
        assert_eq!(schema.version(), Some(1));
        assert_eq!(schema.encode_key("media").unwrap(), 3);
        let hashes = schema.child_schema("hashes").unwrap();
        assert!(hashes.is_ignored());
        assert_eq!(hashes.name(), "Hashes");
    }

    #[test]
    fn nested_key_defaults_to_entry_name() {
        let schema = load_schema(
            r#"{
                "fields": {
                    "episodes": 4,
                    "episodes_schema": {"key": "episodes", "fields": {"title": 1}}
                }
            }"#,
        )
        .unwrap();
        let episodes = schema.child_schema("episodes").unwrap();
        assert_eq!(episodes.encode_key("title").unwrap(), 1);

        let schema = load_schema(r#"{"fields": {"cast": {"fields": {"actor": 1}}}}"#).unwrap();
        // `cast` is registered as a child but never declared as a code.
        assert_eq!(schema.build().unwrap_err().code(), "MIN_SCHEMA");
    }

    #[test]
    fn process_is_parsed() {
        let schema = load_schema(
            r#"{
                "key": "items",
                "process": {"children": {"supported": ["list"]}},
                "fields": {"id": 1}
            }"#,
        )
        .unwrap();
        let expected = DirectiveSpec::new()
            .with_children(DirectiveSpec::new().with_supported([ContainerKind::List]));
        assert_eq!(
            schema.process(),
            Some(&ProcessDirective::Structured(expected))
        );
    }

    #[test]
    fn unrecognized_field_kinds_fail_fast() {
        for bad in [r#""one""#, "true", "[1]", "-1", "1.5", "4294967296"] {
            let text = format!(r#"{{"fields": {{"title": {bad}}}}}"#);
            let err = load_schema(&text).unwrap_err();
            assert_eq!(err.code(), "MIN_SCHEMA", "{bad}");
        }
    }

    #[test]
    fn invalid_directive_and_unknown_keys() {
        assert_eq!(
            load_schema(r#"{"process": 5}"#).unwrap_err().code(),
            "MIN_INVALID_DIRECTIVE"
        );
        assert_eq!(
            load_schema(r#"{"protocol": {}}"#).unwrap_err().code(),
            "MIN_DOCUMENT"
        );
    }
}
