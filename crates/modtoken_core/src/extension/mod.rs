//! Extension kernel: registry, dispatcher and permission gate.
//!
//! The kernel lets an owner attach and detach behavior modules after a core
//! is created, routes each lifecycle event to at most one installed module,
//! and keeps every registry change all-or-nothing.

pub mod descriptor;
pub mod dispatch;
pub(crate) mod envelope;
pub mod error;
pub mod host;
pub mod kernel;
pub mod permission;
pub mod registry;
