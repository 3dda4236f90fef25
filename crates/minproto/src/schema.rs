// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schema definitions and their compiled lookup tables.
//!
//! A [`SchemaDef`] declares one record shape: leaf fields with their integer
//! codes, nested child schemas (registered under their `key`), and the flags
//! that steer the codec (`ignore`, root/version, process directive).
//!
//! Definitions are immutable once built with [`SchemaDef::builder`]. The
//! name/code tables are compiled lazily by [`SchemaDef::build`] and cached in a
//! `OnceLock`, so a definition can be shared behind an `Arc` (or a `static`)
//! and hit by many threads at once: the first caller compiles, everyone else
//! sees the same [`SchemaTables`].
//!
//! Invariants checked at build time:
//!
//! - field codes are unique (name ↔ code is a bijection);
//! - a field name is declared once;
//! - every child schema has a `key`, and that key is also a declared field.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::directive::{DirectiveSpec, ProcessDirective};
use crate::error::{MinimizeError, Result};
use crate::value::{Record, Value};

/// Integer code a field name is minimized to.
pub type FieldCode = u32;

#[derive(Debug)]
enum Member {
    Field { name: String, code: FieldCode },
    Child(Arc<SchemaDef>),
}

/// Declarative description of one record shape.
#[derive(Debug)]
pub struct SchemaDef {
    name: String,
    key: Option<String>,
    ignore: bool,
    root: bool,
    version: Option<u32>,
    process: Option<ProcessDirective>,
    members: Arc<[Member]>,
    tables: OnceLock<Result<SchemaTables>>,
}

impl SchemaDef {
    /// Start declaring a schema. `name` only appears in logs and errors.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            key: None,
            ignore: false,
            root: false,
            version: None,
            process: None,
            members: Vec::new(),
        }
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name a parent schema uses to find this one; `None` for roots.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether values are passed through without any translation.
    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    /// Whether encoded records carry the version marker.
    pub fn is_root(&self) -> bool {
        self.root
    }

    /// Version embedded by root schemas.
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Declared process directive.
    pub fn process(&self) -> Option<&ProcessDirective> {
        self.process.as_ref()
    }

    /// Whether the lookup tables have been compiled (successfully or not).
    pub fn is_built(&self) -> bool {
        self.tables.get().is_some()
    }

    /// Compile the lookup tables, or return the cached result.
    ///
    /// Idempotent and safe to call concurrently; a definition error is cached
    /// and reported identically on every call.
    pub fn build(&self) -> Result<&SchemaTables> {
        self.tables
            .get_or_init(|| self.compile())
            .as_ref()
            .map_err(Clone::clone)
    }

    fn compile(&self) -> Result<SchemaTables> {
        let tables = SchemaTables::compile(&self.name, &self.members);
        match &tables {
            Ok(tables) => debug!(
                schema = %self.name,
                fields = tables.codes.len(),
                children = tables.children.len(),
                "compiled schema tables"
            ),
            Err(err) => warn!(schema = %self.name, %err, "schema failed to compile"),
        }
        tables
    }

    /// Field name for an encoded key. See [`SchemaTables::decode_key`].
    pub fn decode_key(&self, code: &str) -> Result<&str> {
        self.build()?.decode_key(code)
    }

    /// Integer code for a field name. See [`SchemaTables::encode_key`].
    pub fn encode_key(&self, name: &str) -> Result<FieldCode> {
        self.build()?.encode_key(name)
    }

    /// Nested schema for a field. See [`SchemaTables::child`].
    pub fn child_schema(&self, name: &str) -> Result<&Arc<SchemaDef>> {
        self.build()?.child(name)
    }

    /// Read one field of an already minimized record by its verbose name.
    ///
    /// Looks under the field's code first and falls back to the literal name,
    /// so partially minimized records still resolve. The name itself must be
    /// declared.
    pub fn get_value<'a>(&self, record: &'a Record, name: &str) -> Result<Option<&'a Value>> {
        let code = self.encode_key(name)?;
        Ok(record.get(&code.to_string()).or_else(|| record.get(name)))
    }

    /// Reuse this shape under another parent field.
    ///
    /// The derived schema gets `key`, is never a root, and shares this
    /// schema's fields and children. When `process` is given it is merged over
    /// the current directive with [`DirectiveSpec::merged`] (override wins per
    /// top-level entry); when it is `None` the derived schema has no directive.
    ///
    /// Merging a structured override into a bare-token directive is rejected
    /// with [`MinimizeError::InvalidDirective`].
    pub fn derive(&self, key: impl Into<String>, process: Option<DirectiveSpec>) -> Result<Self> {
        let process = match (process, &self.process) {
            (None, _) => None,
            (Some(over), None) => Some(ProcessDirective::Structured(over)),
            (Some(over), Some(ProcessDirective::Structured(base))) => {
                Some(ProcessDirective::Structured(base.clone().merged(over)))
            }
            (Some(_), Some(ProcessDirective::Token(token))) => {
                return Err(MinimizeError::invalid_directive(format!(
                    "cannot merge a structured directive into {}'s {token:?} token",
                    self.name
                )))
            }
        };

        Ok(Self {
            name: self.name.clone(),
            key: Some(key.into()),
            ignore: self.ignore,
            root: false,
            version: self.version,
            process,
            members: Arc::clone(&self.members),
            tables: OnceLock::new(),
        })
    }
}

/// Compiled lookup tables of one schema.
#[derive(Debug)]
pub struct SchemaTables {
    schema: String,
    names: BTreeMap<FieldCode, String>,
    codes: BTreeMap<String, FieldCode>,
    children: BTreeMap<String, Arc<SchemaDef>>,
}

impl SchemaTables {
    fn compile(schema: &str, members: &[Member]) -> Result<Self> {
        let mut names = BTreeMap::new();
        let mut codes = BTreeMap::new();
        let mut children = BTreeMap::new();

        for member in members {
            match member {
                Member::Field { name, code } => {
                    if codes.insert(name.clone(), *code).is_some() {
                        return Err(MinimizeError::schema(
                            schema,
                            format!("field {name:?} declared twice"),
                        ));
                    }
                    if let Some(existing) = names.insert(*code, name.clone()) {
                        return Err(MinimizeError::schema(
                            schema,
                            format!("code {code} shared by {existing:?} and {name:?}"),
                        ));
                    }
                }
                Member::Child(child) => {
                    let Some(key) = child.key() else {
                        return Err(MinimizeError::schema(
                            schema,
                            format!("child schema {} has no key", child.name()),
                        ));
                    };
                    if children.insert(key.to_owned(), Arc::clone(child)).is_some() {
                        return Err(MinimizeError::schema(
                            schema,
                            format!("child schema key {key:?} declared twice"),
                        ));
                    }
                }
            }
        }

        if let Some(key) = children.keys().find(|key| !codes.contains_key(*key)) {
            return Err(MinimizeError::schema(
                schema,
                format!("child schema key {key:?} is not a declared field"),
            ));
        }

        Ok(Self {
            schema: schema.to_owned(),
            names,
            codes,
            children,
        })
    }

    /// Field name owning an encoded key.
    ///
    /// `code` must parse as an integer; anything else, or a code no field owns,
    /// is [`MinimizeError::UnknownKey`].
    pub fn decode_key(&self, code: &str) -> Result<&str> {
        code.trim()
            .parse::<FieldCode>()
            .ok()
            .and_then(|parsed| self.names.get(&parsed))
            .map(String::as_str)
            .ok_or_else(|| self.unknown(code))
    }

    /// Integer code of a declared field name.
    pub fn encode_key(&self, name: &str) -> Result<FieldCode> {
        self.codes
            .get(name)
            .copied()
            .ok_or_else(|| self.unknown(name))
    }

    /// Child schema registered for `name`.
    pub fn child(&self, name: &str) -> Result<&Arc<SchemaDef>> {
        self.children
            .get(name)
            .ok_or_else(|| MinimizeError::MissingChildSchema {
                schema: self.schema.clone(),
                field: name.to_owned(),
            })
    }

    /// Number of leaf fields (child-bearing fields included).
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the schema declares no fields.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Declared `(name, code)` pairs, ordered by name.
    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldCode)> + '_ {
        self.codes.iter().map(|(name, code)| (name.as_str(), *code))
    }

    fn unknown(&self, key: &str) -> MinimizeError {
        MinimizeError::UnknownKey {
            schema: self.schema.clone(),
            key: key.to_owned(),
        }
    }
}

/// Builder returned by [`SchemaDef::builder`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    key: Option<String>,
    ignore: bool,
    root: bool,
    version: Option<u32>,
    process: Option<ProcessDirective>,
    members: Vec<Member>,
}

impl SchemaBuilder {
    /// Name a parent uses to look this schema up.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Pass values through untouched.
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Mark as a root schema; encoded records carry the version marker.
    pub fn root(mut self) -> Self {
        self.root = true;
        self
    }

    /// Version written into the marker of root records.
    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Declared process directive.
    pub fn process(mut self, directive: impl Into<ProcessDirective>) -> Self {
        self.process = Some(directive.into());
        self
    }

    /// Declare a field and its code.
    pub fn field(mut self, name: impl Into<String>, code: FieldCode) -> Self {
        self.members.push(Member::Field {
            name: name.into(),
            code,
        });
        self
    }

    /// Declare a nested schema, registered under its key.
    pub fn child(mut self, schema: impl Into<Arc<SchemaDef>>) -> Self {
        self.members.push(Member::Child(schema.into()));
        self
    }

    /// Finish the declaration. Tables are compiled on first use.
    pub fn finish(self) -> SchemaDef {
        SchemaDef {
            name: self.name,
            key: self.key,
            ignore: self.ignore,
            root: self.root,
            version: self.version,
            process: self.process,
            members: self.members.into(),
            tables: OnceLock::new(),
        }
    }
}
