// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for schema compilation and minimization.
//!
//! Every variant is a deterministic configuration or usage error. Nothing here
//! is retryable: the call that produced it is aborted and no partial result is
//! returned.

use crate::value::ValueKind;

/// Convenience alias used throughout the crate.
pub type Result<T, E = MinimizeError> = std::result::Result<T, E>;

/// Errors raised while building schemas or walking value trees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MinimizeError {
    /// The schema definition itself is malformed.
    #[error("[MIN_SCHEMA] invalid definition in {schema}: {reason}")]
    Schema {
        /// Schema being compiled.
        schema: String,
        /// What was wrong with it.
        reason: String,
    },
    /// An integer code (decode) or field name (encode) the schema does not declare.
    #[error("[MIN_UNKNOWN_KEY] missing definition in {schema} for key {key:?}")]
    UnknownKey {
        /// Schema consulted.
        schema: String,
        /// Offending code or name, as it appeared in the record.
        key: String,
    },
    /// A record- or list-valued field has no nested schema registered.
    #[error("[MIN_MISSING_CHILD] missing child schema in {schema} for field {field:?}")]
    MissingChildSchema {
        /// Parent schema.
        schema: String,
        /// Field whose value needed a child schema.
        field: String,
    },
    /// A value's container kind does not match what the schema requires.
    #[error("[MIN_SHAPE] {schema} expected {expected}, found {found}")]
    Shape {
        /// Schema the value was walked against.
        schema: String,
        /// Accepted shape(s).
        expected: &'static str,
        /// Shape actually seen.
        found: ValueKind,
    },
    /// A root schema was encoded without a configured version.
    #[error("[MIN_MISSING_VERSION] root schema {schema} has no version")]
    MissingVersion {
        /// Root schema missing its version.
        schema: String,
    },
    /// A process directive has a shape that is neither a token, a structure, nor falsy.
    #[error("[MIN_INVALID_DIRECTIVE] {reason}")]
    InvalidDirective {
        /// Description of the rejected directive.
        reason: String,
    },
    /// A schema document could not be parsed.
    #[error("[MIN_DOCUMENT] {message}")]
    Document {
        /// Parser message.
        message: String,
    },
}

impl MinimizeError {
    /// Stable machine-readable code carried in the `Display` prefix.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "MIN_SCHEMA",
            Self::UnknownKey { .. } => "MIN_UNKNOWN_KEY",
            Self::MissingChildSchema { .. } => "MIN_MISSING_CHILD",
            Self::Shape { .. } => "MIN_SHAPE",
            Self::MissingVersion { .. } => "MIN_MISSING_VERSION",
            Self::InvalidDirective { .. } => "MIN_INVALID_DIRECTIVE",
            Self::Document { .. } => "MIN_DOCUMENT",
        }
    }

    pub(crate) fn schema(schema: &str, reason: impl Into<String>) -> Self {
        Self::Schema {
            schema: schema.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_directive(reason: impl Into<String>) -> Self {
        Self::InvalidDirective {
            reason: reason.into(),
        }
    }
}

// serde_json::Error is neither Clone nor Eq; compiled schemas cache their
// errors, so only the message is kept.
impl From<serde_json::Error> for MinimizeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Document {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_code_prefix() {
        let err = MinimizeError::UnknownKey {
            schema: "Metadata".into(),
            key: "9".into(),
        };
        assert_eq!(err.code(), "MIN_UNKNOWN_KEY");
        assert_eq!(
            err.to_string(),
            "[MIN_UNKNOWN_KEY] missing definition in Metadata for key \"9\""
        );
    }

    #[test]
    fn shape_error_names_found_kind() {
        let err = MinimizeError::Shape {
            schema: "Episodes".into(),
            expected: "record or list",
            found: ValueKind::Scalar,
        };
        assert!(err.to_string().ends_with("expected record or list, found scalar"));
    }
}
