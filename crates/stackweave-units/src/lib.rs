//! # stackweave-units
//!
//! Deployment units of the topology.
//!
//! Provides three units, leaves first:
//! - [`NetworkUnit`](network::NetworkUnit): virtual network, subnets, and the
//!   application security group.
//! - [`ApplicationUnit`](application::ApplicationUnit): the input contract of
//!   the application resources, with a pluggable body.
//! - [`RootUnit`](root::RootUnit): wires the two together and orders them.
//!
//! # Example
//!
//! ```rust,no_run
//! use stackweave_common::config::TopologyConfig;
//!
//! let (app, root) = stackweave_units::root::describe(TopologyConfig::default())?;
//! let assembly = app.synth()?;
//! # let _ = (root, assembly);
//! # Ok::<(), stackweave_common::error::TopologyError>(())
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod application;
pub mod handles;
pub mod network;
pub mod root;
