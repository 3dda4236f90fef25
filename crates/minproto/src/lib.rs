// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schema-driven key minimization for JSON-shaped trees.
//!
//! `minproto` rewrites a verbose tree (records keyed by descriptive field
//! names) into a minimized tree where every field name is a short integer
//! code, and back again. The tree stays structurally self-describing; only the
//! keys shrink.
//!
//! A [`SchemaDef`] declares the name ↔ code mapping for one record shape and
//! nests child schemas for record- or list-valued fields. A
//! [`ProcessDirective`] on a schema decides whether a value is one record or a
//! homogeneous collection of child records.
//!
//! ```
//! use minproto::{decode, encode, SchemaDef, Value};
//! use serde_json::json;
//!
//! let movie = SchemaDef::builder("Movie")
//!     .root()
//!     .version(1)
//!     .field("title", 1)
//!     .field("year", 2)
//!     .finish();
//!
//! let verbose = Value::from(json!({"title": "Heat", "year": 1995}));
//! let minimized = encode(verbose.clone(), &movie)?;
//! assert_eq!(minimized, Value::from(json!({"1": "Heat", "2": 1995, "~": 1})));
//! assert_eq!(decode(minimized, &movie)?, verbose);
//! # Ok::<(), minproto::MinimizeError>(())
//! ```
//!
//! # Concurrency
//!
//! Schemas compile their lookup tables once, on first use, behind a
//! `OnceLock`. After that they are read-only and can be shared freely across
//! threads; encode/decode take no locks.
#![forbid(unsafe_code)]

pub mod codec;
pub mod directive;
pub mod document;
pub mod error;
pub mod schema;
pub mod value;

pub use codec::{decode, decode_with, encode, encode_with, minimized_version, VERSION_MARKER};
pub use directive::{resolve, ContainerKind, DirectiveSpec, Mode, ProcessDirective, Resolution};
pub use document::{load_schema, SchemaDocument};
pub use error::{MinimizeError, Result};
pub use schema::{FieldCode, SchemaBuilder, SchemaDef, SchemaTables};
pub use value::{Record, Value, ValueKind};
