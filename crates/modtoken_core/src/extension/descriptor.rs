//! Extension descriptor declaration and validation.
//!
//! # Responsibility
//! - Describe what one candidate extension implements: lifecycle events with
//!   their declared mode, and entrypoints routed through the core.
//! - Reject malformed descriptors before any registry row is written.
//!
//! # Invariants
//! - A valid descriptor only names events of the installing core's catalog.
//! - Event and entrypoint selectors are unique and never overlap.

use crate::model::event::{CoreVariant, EventCatalog, EventSet, HandlerMode, LifecycleEvent, Selector};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lowercase alphanumeric segments joined by single `.`, `_` or `-`.
static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[._-][a-z0-9]+)*$").expect("valid descriptor name regex")
});
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+$").expect("valid descriptor version regex"));

/// One lifecycle event implemented by an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDeclaration {
    pub event: LifecycleEvent,
    pub mode: HandlerMode,
}

/// One callable entrypoint exposed through the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrypointDeclaration {
    pub selector: Selector,
    /// Human-readable signature, e.g. `setClaimCondition(uint256)`.
    pub name: String,
    /// Caller must pass the permission gate.
    pub restricted: bool,
}

/// Static metadata a candidate extension reports at install time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionDescriptor {
    /// Stable extension name, e.g. `claim.allowlist`.
    pub name: String,
    /// Semantic version string (`major.minor.patch`).
    pub version: String,
    pub events: Vec<EventDeclaration>,
    pub entrypoints: Vec<EntrypointDeclaration>,
    /// Empty means any core variant.
    pub supported_variants: Vec<CoreVariant>,
}

impl ExtensionDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            events: Vec::new(),
            entrypoints: Vec::new(),
            supported_variants: Vec::new(),
        }
    }

    /// Declares one lifecycle event by its canonical signature.
    pub fn with_event(mut self, signature: &str, mode: HandlerMode) -> Self {
        self.events.push(EventDeclaration {
            event: Selector::from_signature(signature),
            mode,
        });
        self
    }

    /// Declares one entrypoint; the selector is derived from `signature`.
    pub fn with_entrypoint(mut self, signature: &str, restricted: bool) -> Self {
        self.entrypoints.push(EntrypointDeclaration {
            selector: Selector::from_signature(signature),
            name: signature.to_string(),
            restricted,
        });
        self
    }

    pub fn for_variants(mut self, variants: &[CoreVariant]) -> Self {
        self.supported_variants = variants.to_vec();
        self
    }

    pub fn event_set(&self) -> EventSet {
        self.events.iter().map(|decl| decl.event).collect()
    }

    pub fn entrypoint_set(&self) -> BTreeSet<Selector> {
        self.entrypoints.iter().map(|decl| decl.selector).collect()
    }

    /// Validates declaration-level invariants against one core catalog.
    pub fn validate(&self, catalog: &EventCatalog) -> Result<(), DescriptorValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DescriptorValidationError::EmptyName);
        }
        if !NAME_RE.is_match(name) {
            return Err(DescriptorValidationError::InvalidName(self.name.clone()));
        }

        let version = self.version.trim();
        if version.is_empty() {
            return Err(DescriptorValidationError::EmptyVersion);
        }
        if !VERSION_RE.is_match(version) {
            return Err(DescriptorValidationError::InvalidVersion(
                self.version.clone(),
            ));
        }

        if !self.supported_variants.is_empty()
            && !self.supported_variants.contains(&catalog.variant())
        {
            return Err(DescriptorValidationError::IncompatibleCore(
                catalog.variant(),
            ));
        }

        if self.events.is_empty() && self.entrypoints.is_empty() {
            return Err(DescriptorValidationError::MissingDeclarations);
        }

        let mut events = BTreeSet::new();
        for decl in &self.events {
            if !catalog.contains(decl.event) {
                return Err(DescriptorValidationError::UnsupportedEvent(decl.event));
            }
            if !events.insert(decl.event) {
                return Err(DescriptorValidationError::DuplicateEvent(decl.event));
            }
        }

        let mut selectors = BTreeSet::new();
        for decl in &self.entrypoints {
            if decl.name.trim().is_empty() {
                return Err(DescriptorValidationError::EmptyEntrypointName(
                    decl.selector,
                ));
            }
            if catalog.contains(decl.selector) {
                return Err(DescriptorValidationError::EntrypointCollidesWithEvent(
                    decl.selector,
                ));
            }
            if !selectors.insert(decl.selector) {
                return Err(DescriptorValidationError::DuplicateEntrypoint(
                    decl.selector,
                ));
            }
        }
        Ok(())
    }
}

/// Descriptor validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorValidationError {
    EmptyName,
    InvalidName(String),
    EmptyVersion,
    InvalidVersion(String),
    MissingDeclarations,
    UnsupportedEvent(LifecycleEvent),
    DuplicateEvent(LifecycleEvent),
    EmptyEntrypointName(Selector),
    DuplicateEntrypoint(Selector),
    EntrypointCollidesWithEvent(Selector),
    IncompatibleCore(CoreVariant),
}

impl Display for DescriptorValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "descriptor name must not be empty"),
            Self::InvalidName(value) => write!(f, "descriptor name is invalid: {value}"),
            Self::EmptyVersion => write!(f, "descriptor version must not be empty"),
            Self::InvalidVersion(value) => write!(
                f,
                "descriptor version is invalid: {value} (expected major.minor.patch)"
            ),
            Self::MissingDeclarations => {
                write!(f, "descriptor must declare at least one event or entrypoint")
            }
            Self::UnsupportedEvent(event) => {
                write!(f, "event is not in the core catalog: {event}")
            }
            Self::DuplicateEvent(event) => write!(f, "event is declared twice: {event}"),
            Self::EmptyEntrypointName(selector) => {
                write!(f, "entrypoint name must not be empty: {selector}")
            }
            Self::DuplicateEntrypoint(selector) => {
                write!(f, "entrypoint is declared twice: {selector}")
            }
            Self::EntrypointCollidesWithEvent(selector) => {
                write!(f, "entrypoint selector collides with a lifecycle event: {selector}")
            }
            Self::IncompatibleCore(variant) => {
                write!(f, "extension does not support {variant} cores")
            }
        }
    }
}

impl Error for DescriptorValidationError {}
