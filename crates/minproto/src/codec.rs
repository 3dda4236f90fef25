// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recursive decode/encode over value trees.
//!
//! Encoding replaces every field name with its integer code (as a string key);
//! decoding reverses it. Each step first asks the process directive whether
//! the whole value is a collection of children; if so every member is walked
//! against the same schema with the `item` override, otherwise the value must
//! be a record and its fields are translated one by one, recursing into
//! record- and list-valued fields through the matching child schema.
//!
//! Root schemas tag every encoded record with [`VERSION_MARKER`]. Decoding
//! skips the marker wherever it appears.

use tracing::{instrument, trace};

use crate::directive::{resolve, ProcessDirective, ITEM};
use crate::error::{MinimizeError, Result};
use crate::schema::{SchemaDef, SchemaTables};
use crate::value::{Record, Value};

/// Reserved key carrying the root schema version in minimized records.
pub const VERSION_MARKER: &str = "~";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Decode,
    Encode,
}

/// Expand a minimized tree back to field names.
#[instrument(level = "trace", skip_all, fields(schema = %schema.name()))]
pub fn decode(value: Value, schema: &SchemaDef) -> Result<Value> {
    walk(value, schema, None, Direction::Decode)
}

/// [`decode`] with an explicit call-site process directive.
#[instrument(level = "trace", skip_all, fields(schema = %schema.name()))]
pub fn decode_with(
    value: Value,
    schema: &SchemaDef,
    process: Option<&ProcessDirective>,
) -> Result<Value> {
    walk(value, schema, process, Direction::Decode)
}

/// Minimize a tree, replacing field names with codes.
#[instrument(level = "trace", skip_all, fields(schema = %schema.name()))]
pub fn encode(value: Value, schema: &SchemaDef) -> Result<Value> {
    walk(value, schema, None, Direction::Encode)
}

/// [`encode`] with an explicit call-site process directive.
#[instrument(level = "trace", skip_all, fields(schema = %schema.name()))]
pub fn encode_with(
    value: Value,
    schema: &SchemaDef,
    process: Option<&ProcessDirective>,
) -> Result<Value> {
    walk(value, schema, process, Direction::Encode)
}

/// Version stored under [`VERSION_MARKER`], if `value` is a minimized root record.
pub fn minimized_version(value: &Value) -> Option<i64> {
    value.as_record()?.get(VERSION_MARKER)?.as_i64()
}

fn walk(
    value: Value,
    schema: &SchemaDef,
    process: Option<&ProcessDirective>,
    direction: Direction,
) -> Result<Value> {
    if schema.is_ignored() {
        return Ok(value);
    }

    let resolution = resolve(schema.process(), process);
    if resolution.expands(value.kind(), schema.name())? {
        trace!(
            schema = %schema.name(),
            mode = ?resolution.mode,
            "walking collection members"
        );
        return match value {
            Value::Record(members) => members
                .into_iter()
                .map(|(key, member)| {
                    walk(member, schema, Some(&ITEM), direction).map(|member| (key, member))
                })
                .collect::<Result<Record>>()
                .map(Value::Record),
            Value::List(members) => members
                .into_iter()
                .map(|member| walk(member, schema, Some(&ITEM), direction))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            scalar => Ok(scalar),
        };
    }

    let tables = schema.build()?;
    let record = match value {
        Value::Record(record) => record,
        other => {
            return Err(MinimizeError::Shape {
                schema: schema.name().to_owned(),
                expected: "record",
                found: other.kind(),
            })
        }
    };

    match direction {
        Direction::Decode => decode_record(record, tables),
        Direction::Encode => encode_record(record, schema, tables),
    }
}

fn decode_record(record: Record, tables: &SchemaTables) -> Result<Value> {
    let mut out = Record::new();
    for (code, field) in record {
        if code == VERSION_MARKER {
            continue;
        }
        let name = tables.decode_key(&code)?;
        let field = translate_field(field, name, tables, Direction::Decode)?;
        out.insert(name.to_owned(), field);
    }
    Ok(Value::Record(out))
}

fn encode_record(record: Record, schema: &SchemaDef, tables: &SchemaTables) -> Result<Value> {
    let mut out = Record::new();
    for (name, field) in record {
        // Recurse first so errors name the semantic field.
        let field = translate_field(field, &name, tables, Direction::Encode)?;
        let code = tables.encode_key(&name)?;
        out.insert(code.to_string(), field);
    }

    if schema.is_root() {
        let version = schema.version().ok_or_else(|| MinimizeError::MissingVersion {
            schema: schema.name().to_owned(),
        })?;
        out.insert(VERSION_MARKER.to_owned(), Value::from(version));
    }

    Ok(Value::Record(out))
}

/// Walk one field value through the child schema registered for `name`.
///
/// Lists only need a child schema once a record member turns up; scalar and
/// nested-list members are kept as they are.
fn translate_field(
    field: Value,
    name: &str,
    tables: &SchemaTables,
    direction: Direction,
) -> Result<Value> {
    match field {
        Value::Record(_) => walk(field, tables.child(name)?, None, direction),
        Value::List(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Record(_) => walk(item, tables.child(name)?, None, direction),
                other => Ok(other),
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        scalar => Ok(scalar),
    }
}
