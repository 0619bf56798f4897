//! Capability-typed handles passed between units.
//!
//! A handle wraps references minted by the composition context; it can be
//! read and passed on but never rebuilt from primitive data.

use std::fmt;

use stackweave_common::types::AvailabilityZone;
use stackweave_compose::ResourceRef;
use stackweave_net::cidr::Ipv4Cidr;
use stackweave_net::security_group::Rule;

/// Capability of referring to a virtual network.
pub trait NetworkRef: fmt::Debug {
    /// The network resource.
    fn network(&self) -> &ResourceRef;
    /// Address block of the network.
    fn cidr(&self) -> Ipv4Cidr;
    /// Zones the network spans.
    fn availability_zones(&self) -> &[AvailabilityZone];
    /// Internet-routable subnets, one per zone.
    fn public_subnets(&self) -> &[ResourceRef];
    /// Subnets with outbound access through NAT, one per zone.
    fn private_subnets(&self) -> &[ResourceRef];
    /// Subnets with no internet route, one per zone.
    fn isolated_subnets(&self) -> &[ResourceRef];
}

/// Capability of referring to a security group.
pub trait SecurityGroupRef: fmt::Debug {
    /// The security-group resource.
    fn security_group(&self) -> &ResourceRef;
    /// Network the group is attached to.
    fn attached_network(&self) -> &ResourceRef;
    /// Inbound rules in insertion order.
    fn ingress_rules(&self) -> &[Rule];
}

/// Handle to a network described by a [`NetworkUnit`](crate::network::NetworkUnit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcHandle {
    pub(crate) vpc: ResourceRef,
    pub(crate) cidr: Ipv4Cidr,
    pub(crate) zones: Vec<AvailabilityZone>,
    pub(crate) public_subnets: Vec<ResourceRef>,
    pub(crate) private_subnets: Vec<ResourceRef>,
    pub(crate) isolated_subnets: Vec<ResourceRef>,
}

impl NetworkRef for VpcHandle {
    fn network(&self) -> &ResourceRef {
        &self.vpc
    }

    fn cidr(&self) -> Ipv4Cidr {
        self.cidr
    }

    fn availability_zones(&self) -> &[AvailabilityZone] {
        &self.zones
    }

    fn public_subnets(&self) -> &[ResourceRef] {
        &self.public_subnets
    }

    fn private_subnets(&self) -> &[ResourceRef] {
        &self.private_subnets
    }

    fn isolated_subnets(&self) -> &[ResourceRef] {
        &self.isolated_subnets
    }
}

/// Handle to a security group described by a [`NetworkUnit`](crate::network::NetworkUnit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupHandle {
    pub(crate) group: ResourceRef,
    pub(crate) network: ResourceRef,
    pub(crate) name: Option<String>,
    pub(crate) ingress: Vec<Rule>,
}

impl SecurityGroupHandle {
    /// Physical group name, if one was set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl SecurityGroupRef for SecurityGroupHandle {
    fn security_group(&self) -> &ResourceRef {
        &self.group
    }

    fn attached_network(&self) -> &ResourceRef {
        &self.network
    }

    fn ingress_rules(&self) -> &[Rule] {
        &self.ingress
    }
}
