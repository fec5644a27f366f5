//! Domain model shared by the registry, dispatcher and token cores.
//!
//! # Responsibility
//! - Define addresses, selectors, event catalogs and hook payloads.
//! - Define registry and notification records exposed to callers.
//!
//! # Invariants
//! - Every lifecycle event belongs to exactly one catalog row per variant.
//! - Records are plain data; all writes go through registry/ledger code.

pub mod address;
pub mod event;
pub mod hook;
pub mod record;
