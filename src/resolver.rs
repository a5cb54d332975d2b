//! Target resolution: turn an index / name / "current selection" selector into
//! exactly one entity, or a typed failure.
//!
//! Single-axis rules:
//! - two or more of {index, name, use_current = true} is ambiguous and fails
//!   with `INVALID_PARAMETER` before any lookup runs;
//! - nothing provided (or use_current = true) resolves the current selection;
//! - an explicit `use_current = false` is not counted as a provided field, so
//!   `false` plus an identifier resolves by that identifier, and `false` alone
//!   describes no target at all.
//!
//! Composite resolution (e.g. a device addressed through its track) is either
//! fully selected-entity mode or fully identifier mode, never a mix.

use serde::{Deserialize, Serialize};

use crate::error::{CommandError, ErrorCode};

/// A successfully resolved entity: its position and name in its collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub index: usize,
    pub name: String,
}

impl EntityRef {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Track,
    Device,
    Scene,
    Clip,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Device => "device",
            Self::Scene => "scene",
            Self::Clip => "clip",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Track => "Track",
            Self::Device => "Device",
            Self::Scene => "Scene",
            Self::Clip => "Clip",
        }
    }

    pub fn not_found(self) -> ErrorCode {
        match self {
            Self::Track => ErrorCode::TrackNotFound,
            Self::Device => ErrorCode::DeviceNotFound,
            Self::Scene => ErrorCode::SceneNotFound,
            Self::Clip => ErrorCode::ClipNotFound,
        }
    }

    pub fn not_selected(self) -> ErrorCode {
        match self {
            Self::Track => ErrorCode::TrackNotSelected,
            Self::Device => ErrorCode::DeviceNotSelected,
            Self::Scene => ErrorCode::SceneNotSelected,
            Self::Clip => ErrorCode::ClipNotFound,
        }
    }
}

/// The three ways a caller can address one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub index: Option<usize>,
    pub name: Option<String>,
    pub use_current: Option<bool>,
}

/// What a valid selector asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    Index(usize),
    Name(&'a str),
    Current,
}

impl Selector {
    pub fn new(index: Option<usize>, name: Option<String>, use_current: Option<bool>) -> Self {
        Self {
            index,
            name,
            use_current,
        }
    }

    pub fn by_index(index: usize) -> Self {
        Self::new(Some(index), None, None)
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self::new(None, Some(name.into()), None)
    }

    pub fn current() -> Self {
        Self::default()
    }

    pub fn has_identifier(&self) -> bool {
        self.index.is_some() || self.name.is_some()
    }

    fn provided_fields(&self) -> usize {
        usize::from(self.index.is_some())
            + usize::from(self.name.is_some())
            + usize::from(self.use_current == Some(true))
    }

    /// Validate the selector and decide which lookup it calls for.
    pub fn selection(&self, kind: EntityKind) -> Result<Selection<'_>, CommandError> {
        let label = kind.label();
        if self.provided_fields() > 1 {
            return Err(CommandError::invalid_parameter(format!(
                "Ambiguous target selector: provide at most one of {label}_index, {label}_name or the current-selection flag"
            )));
        }
        match (self.index, self.name.as_deref()) {
            (Some(index), _) => Ok(Selection::Index(index)),
            (None, Some(name)) if name.trim().is_empty() => Err(CommandError::invalid_parameter(
                format!("{label}_name must not be empty"),
            )),
            (None, Some(name)) => Ok(Selection::Name(name)),
            (None, None) if self.use_current == Some(false) => {
                Err(CommandError::invalid_parameter(format!(
                    "No {label} identifier provided and current selection disabled"
                )))
            }
            (None, None) => Ok(Selection::Current),
        }
    }

    fn check_identifier_axis(&self, kind: EntityKind) -> Result<(), CommandError> {
        if self.index.is_some() && self.name.is_some() {
            let label = kind.label();
            return Err(CommandError::invalid_parameter(format!(
                "Ambiguous target selector: provide only one of {label}_index or {label}_name"
            )));
        }
        Ok(())
    }
}

/// Lookup primitives a collection offers to the resolver.
pub trait Lookup {
    fn by_index(&self, index: usize) -> Option<EntityRef>;
    fn by_name(&self, name: &str) -> Option<EntityRef>;
    fn current(&self) -> Option<EntityRef>;
}

fn not_selected(kind: EntityKind) -> CommandError {
    CommandError::new(
        kind.not_selected(),
        format!("No {} is currently selected", kind.label()),
    )
}

/// Resolve a single-axis selector against `lookup`.
pub fn resolve(
    selector: &Selector,
    kind: EntityKind,
    lookup: &impl Lookup,
) -> Result<EntityRef, CommandError> {
    match selector.selection(kind)? {
        Selection::Index(index) => lookup.by_index(index).ok_or_else(|| {
            CommandError::new(
                kind.not_found(),
                format!("{} at index {index} not found", kind.title()),
            )
        }),
        Selection::Name(name) => lookup.by_name(name).ok_or_else(|| {
            CommandError::new(
                kind.not_found(),
                format!("{} with name '{name}' not found", kind.title()),
            )
        }),
        Selection::Current => lookup.current().ok_or_else(|| not_selected(kind)),
    }
}

/// A two-axis selector: an outer entity (usually a track) and an inner entity
/// addressed within it, plus one shared current-selection flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeSelector {
    pub outer: Selector,
    pub inner: Selector,
    pub use_current: Option<bool>,
}

/// Resolve a [`CompositeSelector`].
///
/// `inner_lookup` builds the inner collection for an already-resolved outer
/// entity. `current` returns the selected (outer, inner) pair, or the kind of
/// the axis that has nothing selected.
pub fn resolve_composite<L, F, C>(
    selector: &CompositeSelector,
    kinds: (EntityKind, EntityKind),
    outer_lookup: &impl Lookup,
    inner_lookup: F,
    current: C,
) -> Result<(EntityRef, EntityRef), CommandError>
where
    L: Lookup,
    F: FnOnce(&EntityRef) -> L,
    C: FnOnce() -> Result<(EntityRef, EntityRef), EntityKind>,
{
    let (outer_kind, inner_kind) = kinds;
    selector.outer.check_identifier_axis(outer_kind)?;
    selector.inner.check_identifier_axis(inner_kind)?;

    let identifiers = selector.outer.has_identifier() || selector.inner.has_identifier();
    match (selector.use_current, identifiers) {
        (Some(true), true) => Err(CommandError::invalid_parameter(format!(
            "Cannot combine the current-{} flag with explicit identifiers",
            inner_kind.label()
        ))),
        (Some(false), false) => Err(CommandError::invalid_parameter(format!(
            "Provide {outer}_index or {outer}_name together with {inner}_index or {inner}_name, or use the current {inner}",
            outer = outer_kind.label(),
            inner = inner_kind.label(),
        ))),
        (_, false) => current().map_err(not_selected),
        (_, true) => {
            for (axis, kind) in [(&selector.outer, outer_kind), (&selector.inner, inner_kind)] {
                if !axis.has_identifier() {
                    let label = kind.label();
                    return Err(CommandError::invalid_parameter(format!(
                        "Exactly one of {label}_index or {label}_name must be provided"
                    )));
                }
            }
            let outer = resolve(&selector.outer, outer_kind, outer_lookup)?;
            let inner = resolve(&selector.inner, inner_kind, &inner_lookup(&outer))?;
            Ok((outer, inner))
        }
    }
}
