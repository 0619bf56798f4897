//! # stackweave-net
//!
//! Network primitives used to describe a virtual network.
//!
//! This crate provides validated value types over:
//! - **CIDR**: IPv4 blocks, containment, overlap, and aligned allocation.
//! - **VPC**: network properties and the subnet plan derived from them.
//! - **Security groups**: protocols, ports, peers, and ordered rule sets.
//!
//! Nothing here registers resources anywhere; the composition layer turns
//! a validated plan into declared resources.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cidr;
pub mod security_group;
pub mod vpc;
