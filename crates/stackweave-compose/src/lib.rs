//! # stackweave-compose
//!
//! Composition model for declarative topologies.
//!
//! Handles:
//! - **Construct**: the tree of units, grouping constructs, and resources.
//! - **Resource**: resource kinds and opaque references minted by the context.
//! - **Graph**: the unit dependency graph and its ordering.
//! - **Context**: [`App`](context::App), the one-shot composition context.
//! - **Validator**: whole-topology checks run before synthesis.
//! - **Assembly**: synthesis of the described topology into templates.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod assembly;
pub mod construct;
pub mod context;
pub mod graph;
pub mod resource;
pub mod validator;

pub use context::{App, Scope};
pub use resource::{ResourceKind, ResourceRef};
