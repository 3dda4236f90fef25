// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Process directives: how a schema treats a whole value before field translation.
//!
//! By default a value walked against a schema is a single record. A directive
//! can instead mark it as a homogeneous collection of child records (keyed or
//! listed), in which case every member is walked on its own against the same
//! schema.
//!
//! Directives come in two forms:
//!
//! - a bare [`Mode`] token (`"children"` or `"item"`);
//! - a structured [`DirectiveSpec`] carrying `mode`, `optional`, `supported`
//!   and nested `children` / `item` entries.
//!
//! [`resolve`] folds the schema's declared directive and an optional call-site
//! override into a flat [`Resolution`]. The codec passes the `item` token as
//! the override when it walks members of a collection it already expanded.
//!
//! # `children` vs `item`
//!
//! With no `supported` restriction, `children` expands any record or list,
//! while `item` never expands. `item` only expands a value whose kind is
//! explicitly listed in `supported`. This asymmetry is deliberate and covered
//! by tests.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{MinimizeError, Result};
use crate::value::ValueKind;

/// Container kinds a directive can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContainerKind {
    /// String-keyed mapping of children.
    Record,
    /// Ordered sequence of children.
    List,
}

impl ContainerKind {
    /// Container kind of a value shape, `None` for scalars.
    pub fn of(kind: ValueKind) -> Option<Self> {
        match kind {
            ValueKind::Record => Some(Self::Record),
            ValueKind::List => Some(Self::List),
            ValueKind::Scalar => None,
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token {
            "record" | "dict" => Some(Self::Record),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

/// Collection-handling mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Treat the value as a collection of child records.
    Children,
    /// Walk one member of an already expanded collection.
    Item,
    /// Unrecognized token; resolves but never expands anything.
    Other(String),
}

impl Mode {
    /// Parse a mode token. Unknown tokens are kept as [`Mode::Other`].
    pub fn from_token(token: &str) -> Self {
        match token {
            "children" => Self::Children,
            "item" => Self::Item,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Token spelling of this mode.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Children => "children",
            Self::Item => "item",
            Self::Other(token) => token,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A process directive, either a bare token or a structured spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessDirective {
    /// Bare mode token.
    Token(Mode),
    /// Structured directive.
    Structured(DirectiveSpec),
}

/// Override the codec uses for members of an expanded collection.
pub(crate) static ITEM: ProcessDirective = ProcessDirective::Token(Mode::Item);

impl ProcessDirective {
    /// Shorthand for the `children` token.
    pub fn children() -> Self {
        Self::Token(Mode::Children)
    }

    /// Shorthand for the `item` token.
    pub fn item() -> Self {
        Self::Token(Mode::Item)
    }

    /// Parse a directive from its JSON authoring form.
    ///
    /// Strings become tokens, objects become structured directives, and falsy
    /// values (`null`, `false`, `0`, `""`, `[]`) mean "no directive". Anything
    /// else is rejected with [`MinimizeError::InvalidDirective`].
    pub fn from_json(value: &serde_json::Value) -> Result<Option<Self>> {
        use serde_json::Value as Json;

        match value {
            Json::Null | Json::Bool(false) => Ok(None),
            Json::String(token) if token.is_empty() => Ok(None),
            Json::Array(items) if items.is_empty() => Ok(None),
            Json::Number(n) if n.as_u64() == Some(0) => Ok(None),
            Json::String(token) => Ok(Some(Self::Token(Mode::from_token(token)))),
            Json::Object(map) => {
                let mut spec = DirectiveSpec::default();
                for (key, entry) in map {
                    match key.as_str() {
                        "mode" => {
                            spec.mode = match entry {
                                Json::Null => None,
                                Json::String(token) => Some(Mode::from_token(token)),
                                other => {
                                    return Err(MinimizeError::invalid_directive(format!(
                                        "mode must be a string, got {other}"
                                    )))
                                }
                            };
                        }
                        "optional" => {
                            spec.optional = match entry {
                                Json::Null => None,
                                Json::Bool(flag) => Some(*flag),
                                other => {
                                    return Err(MinimizeError::invalid_directive(format!(
                                        "optional must be a boolean, got {other}"
                                    )))
                                }
                            };
                        }
                        "supported" => spec.supported = parse_supported(entry)?,
                        "children" => spec.children = Some(Self::entry_from_json(entry)?),
                        "item" => spec.item = Some(Self::entry_from_json(entry)?),
                        other => {
                            return Err(MinimizeError::invalid_directive(format!(
                                "unknown directive entry {other:?}"
                            )))
                        }
                    }
                }
                Ok(Some(Self::Structured(spec)))
            }
            other => Err(MinimizeError::invalid_directive(format!(
                "expected a mode token or a directive object, got {other}"
            ))),
        }
    }

    /// A nested `children` / `item` entry counts by presence: `true` or a
    /// falsy value selects the mode with unrestricted defaults.
    fn entry_from_json(entry: &serde_json::Value) -> Result<Box<Self>> {
        let directive = match entry {
            serde_json::Value::Bool(true) => None,
            other => Self::from_json(other)?,
        };
        Ok(Box::new(directive.unwrap_or_else(|| {
            Self::Structured(DirectiveSpec::default())
        })))
    }
}

fn parse_supported(entry: &serde_json::Value) -> Result<Option<BTreeSet<ContainerKind>>> {
    use serde_json::Value as Json;

    match entry {
        Json::Null => Ok(None),
        Json::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .and_then(ContainerKind::parse)
                    .ok_or_else(|| {
                        MinimizeError::invalid_directive(format!(
                            "supported entries must be \"record\" or \"list\", got {item}"
                        ))
                    })
            })
            .collect::<Result<BTreeSet<_>>>()
            .map(Some),
        other => Err(MinimizeError::invalid_directive(format!(
            "supported must be a list, got {other}"
        ))),
    }
}

/// Structured directive. Every entry is optional; `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveSpec {
    /// Mode used when no token or `children` entry decides it.
    pub mode: Option<Mode>,
    /// Fall back to plain field translation when the shape doesn't match.
    pub optional: Option<bool>,
    /// Container kinds the mode applies to; `None` is unrestricted.
    pub supported: Option<BTreeSet<ContainerKind>>,
    /// Directive applied when the value is handled as a collection.
    pub children: Option<Box<ProcessDirective>>,
    /// Directive applied to members of an expanded collection.
    pub item: Option<Box<ProcessDirective>>,
}

impl DirectiveSpec {
    /// Empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `mode`.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set `optional`.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    /// Restrict to the given container kinds.
    pub fn with_supported(mut self, kinds: impl IntoIterator<Item = ContainerKind>) -> Self {
        self.supported = Some(kinds.into_iter().collect());
        self
    }

    /// Set the nested `children` directive.
    pub fn with_children(mut self, directive: impl Into<ProcessDirective>) -> Self {
        self.children = Some(Box::new(directive.into()));
        self
    }

    /// Set the nested `item` directive.
    pub fn with_item(mut self, directive: impl Into<ProcessDirective>) -> Self {
        self.item = Some(Box::new(directive.into()));
        self
    }

    /// Nested entry keyed by a mode token, if any.
    pub fn entry(&self, mode: &Mode) -> Option<&ProcessDirective> {
        match mode {
            Mode::Children => self.children.as_deref(),
            Mode::Item => self.item.as_deref(),
            Mode::Other(_) => None,
        }
    }

    /// Shallow merge: every entry set in `over` replaces the one in `self`.
    ///
    /// Nested `children` / `item` directives are replaced whole, not merged.
    pub fn merged(self, over: Self) -> Self {
        Self {
            mode: over.mode.or(self.mode),
            optional: over.optional.or(self.optional),
            supported: over.supported.or(self.supported),
            children: over.children.or(self.children),
            item: over.item.or(self.item),
        }
    }
}

impl From<Mode> for ProcessDirective {
    fn from(mode: Mode) -> Self {
        Self::Token(mode)
    }
}

impl From<DirectiveSpec> for ProcessDirective {
    fn from(spec: DirectiveSpec) -> Self {
        Self::Structured(spec)
    }
}

/// Effective collection handling for one encode/decode step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Effective mode, if any.
    pub mode: Option<Mode>,
    /// Whether a shape mismatch falls back to field translation.
    pub optional: bool,
    /// Container kinds the mode applies to; `None` is unrestricted.
    pub supported: Option<BTreeSet<ContainerKind>>,
}

/// Fold a schema's declared directive and a call-site override into a [`Resolution`].
pub fn resolve(
    declared: Option<&ProcessDirective>,
    call_site: Option<&ProcessDirective>,
) -> Resolution {
    let mut mode = None;
    let mut active = call_site.or(declared);

    if call_site.is_none() {
        if let Some(ProcessDirective::Structured(spec)) = active {
            if let Some(children) = spec.children.as_deref() {
                mode = Some(Mode::Children);
                active = Some(children);
            }
        }
    }

    if let Some(ProcessDirective::Token(token)) = active {
        mode = Some(token.clone());
        if let Some(ProcessDirective::Structured(spec)) = declared {
            if let Some(entry) = spec.entry(token) {
                active = Some(entry);
            }
        }
    }

    match active {
        Some(ProcessDirective::Structured(spec)) => Resolution {
            mode: mode.or_else(|| spec.mode.clone()),
            optional: spec.optional.unwrap_or(false),
            supported: spec.supported.clone(),
        },
        _ => Resolution {
            mode,
            optional: false,
            supported: None,
        },
    }
}

impl Resolution {
    fn allows(&self, kind: ContainerKind) -> bool {
        self.supported
            .as_ref()
            .is_none_or(|supported| supported.contains(&kind))
    }

    /// Whether a value of `kind` is expanded into independently walked members.
    ///
    /// Fails with [`MinimizeError::Shape`] when `children` mode meets a value it
    /// doesn't support and the directive isn't optional.
    pub fn expands(&self, kind: ValueKind, schema: &str) -> Result<bool> {
        let container = ContainerKind::of(kind);
        match &self.mode {
            Some(Mode::Children) => match container {
                Some(container) if self.allows(container) => Ok(true),
                _ if self.optional => Ok(false),
                _ => Err(MinimizeError::Shape {
                    schema: schema.to_owned(),
                    expected: "record or list",
                    found: kind,
                }),
            },
            Some(Mode::Item) => Ok(match (&self.supported, container) {
                (Some(supported), Some(container)) => supported.contains(&container),
                _ => false,
            }),
            Some(Mode::Other(_)) | None => Ok(false),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn structured(spec: DirectiveSpec) -> ProcessDirective {
        ProcessDirective::Structured(spec)
    }

    #[test]
    fn nothing_declared_resolves_to_no_mode() {
        assert_eq!(resolve(None, None), Resolution::default());
    }

    #[test]
    fn bare_children_token() {
        let declared = ProcessDirective::children();
        let res = resolve(Some(&declared), None);
        assert_eq!(res.mode, Some(Mode::Children));
        assert!(!res.optional);
        assert_eq!(res.supported, None);
    }

    #[test]
    fn children_entry_wins_without_override() {
        let declared = structured(
            DirectiveSpec::new()
                .with_mode(Mode::Item)
                .with_children(DirectiveSpec::new().with_optional(true)),
        );
        let res = resolve(Some(&declared), None);
        assert_eq!(res.mode, Some(Mode::Children));
        assert!(res.optional);
    }

    #[test]
    fn override_skips_children_entry_and_picks_item_entry() {
        let declared = structured(
            DirectiveSpec::new()
                .with_children(DirectiveSpec::new().with_supported([ContainerKind::Record]))
                .with_item(DirectiveSpec::new().with_supported([ContainerKind::List])),
        );
        let res = resolve(Some(&declared), Some(&ITEM));
        assert_eq!(res.mode, Some(Mode::Item));
        assert_eq!(res.supported, Some(BTreeSet::from([ContainerKind::List])));
    }

    #[test]
    fn item_override_without_item_entry_is_bare() {
        let declared = structured(
            DirectiveSpec::new().with_children(DirectiveSpec::new().with_optional(true)),
        );
        let res = resolve(Some(&declared), Some(&ITEM));
        assert_eq!(res.mode, Some(Mode::Item));
        assert!(!res.optional);
        assert_eq!(res.supported, None);
    }

    #[test]
    fn token_under_children_entry_looks_up_sibling_entry() {
        // children -> "item" token, then the declared `item` entry supplies the gating.
        let declared = structured(
            DirectiveSpec::new()
                .with_children(Mode::Item)
                .with_item(DirectiveSpec::new().with_optional(true)),
        );
        let res = resolve(Some(&declared), None);
        assert_eq!(res.mode, Some(Mode::Item));
        assert!(res.optional);
    }

    #[test]
    fn structured_without_children_uses_its_mode() {
        let declared = structured(
            DirectiveSpec::new()
                .with_mode(Mode::Children)
                .with_supported([ContainerKind::List]),
        );
        let res = resolve(Some(&declared), None);
        assert_eq!(res.mode, Some(Mode::Children));
        assert_eq!(res.supported, Some(BTreeSet::from([ContainerKind::List])));
    }

    #[test]
    fn unknown_token_is_a_no_op_mode() {
        let declared = ProcessDirective::Token(Mode::from_token("flatten"));
        let res = resolve(Some(&declared), None);
        assert_eq!(res.mode, Some(Mode::Other("flatten".into())));
        assert!(!res.expands(ValueKind::Record, "S").unwrap());
    }

    #[test]
    fn children_expands_any_container_when_unrestricted() {
        let res = resolve(Some(&ProcessDirective::children()), None);
        assert!(res.expands(ValueKind::Record, "S").unwrap());
        assert!(res.expands(ValueKind::List, "S").unwrap());
        let err = res.expands(ValueKind::Scalar, "S").unwrap_err();
        assert_eq!(err.code(), "MIN_SHAPE");
    }

    #[test]
    fn children_mismatch_falls_through_when_optional() {
        let declared = structured(
            DirectiveSpec::new().with_children(
                DirectiveSpec::new()
                    .with_optional(true)
                    .with_supported([ContainerKind::List]),
            ),
        );
        let res = resolve(Some(&declared), None);
        assert!(res.expands(ValueKind::List, "S").unwrap());
        assert!(!res.expands(ValueKind::Record, "S").unwrap());
        assert!(!res.expands(ValueKind::Scalar, "S").unwrap());
    }

    #[test]
    fn item_asymmetry_requires_explicit_support() {
        let bare = resolve(None, Some(&ITEM));
        assert!(!bare.expands(ValueKind::Record, "S").unwrap());
        assert!(!bare.expands(ValueKind::List, "S").unwrap());

        let declared = structured(
            DirectiveSpec::new()
                .with_item(DirectiveSpec::new().with_supported([ContainerKind::Record])),
        );
        let gated = resolve(Some(&declared), Some(&ITEM));
        assert!(gated.expands(ValueKind::Record, "S").unwrap());
        assert!(!gated.expands(ValueKind::List, "S").unwrap());
    }

    #[test]
    fn empty_supported_never_matches() {
        let declared = structured(
            DirectiveSpec::new()
                .with_mode(Mode::Children)
                .with_supported(Vec::<ContainerKind>::new()),
        );
        let res = resolve(Some(&declared), None);
        assert!(res.expands(ValueKind::List, "S").is_err());
    }

    #[test]
    fn merge_is_shallow_and_override_wins() {
        let base = DirectiveSpec::new()
            .with_optional(true)
            .with_children(DirectiveSpec::new().with_supported([ContainerKind::List]));
        let over = DirectiveSpec::new().with_children(DirectiveSpec::new().with_optional(false));
        let merged = base.merged(over);
        assert_eq!(merged.optional, Some(true));
        // The nested `children` entry is replaced whole.
        assert_eq!(
            merged.children.as_deref(),
            Some(&structured(DirectiveSpec::new().with_optional(false)))
        );
    }

    #[test]
    fn parses_json_forms() {
        assert_eq!(ProcessDirective::from_json(&json!(null)).unwrap(), None);
        assert_eq!(ProcessDirective::from_json(&json!(false)).unwrap(), None);
        assert_eq!(
            ProcessDirective::from_json(&json!("children")).unwrap(),
            Some(ProcessDirective::children())
        );
        let parsed = ProcessDirective::from_json(&json!({
            "children": {"optional": true, "supported": ["list"]},
            "item": "item"
        }))
        .unwrap();
        assert_eq!(
            parsed,
            Some(structured(
                DirectiveSpec::new()
                    .with_children(
                        DirectiveSpec::new()
                            .with_optional(true)
                            .with_supported([ContainerKind::List])
                    )
                    .with_item(Mode::Item)
            ))
        );
    }

    #[test]
    fn nested_entries_count_by_presence() {
        for entry in [json!(null), json!(false), json!(""), json!(true), json!({})] {
            let parsed = ProcessDirective::from_json(&json!({ "children": entry })).unwrap();
            let res = resolve(parsed.as_ref(), None);
            assert_eq!(res.mode, Some(Mode::Children), "{entry}");
            assert!(!res.optional);
            assert_eq!(res.supported, None);
            assert!(res.expands(ValueKind::Record, "S").unwrap());
        }

        let parsed = ProcessDirective::from_json(&json!({"item": null})).unwrap();
        let res = resolve(parsed.as_ref(), Some(&ITEM));
        assert_eq!(res, resolve(None, Some(&ITEM)));
    }

    #[test]
    fn rejects_unrecognized_json_shapes() {
        for bad in [
            json!(7),
            json!(true),
            json!(["children"]),
            json!({"supported": ["tuple"]}),
            json!({"mode": 1}),
            json!({"flatten": true}),
        ] {
            let err = ProcessDirective::from_json(&bad).unwrap_err();
            assert_eq!(err.code(), "MIN_INVALID_DIRECTIVE", "{bad}");
        }
    }
}
