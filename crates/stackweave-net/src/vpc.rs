//! Virtual network properties and subnet planning.
//!
//! [`plan`] validates [`VpcProps`] against the zones available to the
//! environment and lays subnets out inside the network block: for each
//! subnet group in declaration order, for each zone in order, the next free
//! block of the group's mask.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use stackweave_common::error::{Result, TopologyError};
use stackweave_common::types::AvailabilityZone;

use crate::cidr::{CidrAllocator, Ipv4Cidr};

/// Shortest prefix the engine accepts for networks and subnets.
pub const MIN_PREFIX: u8 = 16;

/// Longest prefix the engine accepts for networks and subnets.
pub const MAX_PREFIX: u8 = 28;

/// Routing class of a subnet group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SubnetType {
    /// Routed to and from the internet through an internet gateway.
    Public,
    /// No route to or from the internet.
    PrivateIsolated,
    /// Outbound internet access through a NAT gateway.
    PrivateWithEgress,
}

impl SubnetType {
    /// Tag value describing the routing class.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Public => "Public",
            Self::PrivateIsolated => "Isolated",
            Self::PrivateWithEgress => "Private",
        }
    }
}

impl fmt::Display for SubnetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One subnet group, instantiated once per zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetConfiguration {
    /// Group name, used in construct ids and tags.
    pub name: String,
    /// Prefix length of every subnet in the group.
    pub cidr_mask: u8,
    /// Routing class.
    pub subnet_type: SubnetType,
}

impl SubnetConfiguration {
    /// Creates a subnet group.
    #[must_use]
    pub fn new(name: impl Into<String>, cidr_mask: u8, subnet_type: SubnetType) -> Self {
        Self {
            name: name.into(),
            cidr_mask,
            subnet_type,
        }
    }
}

/// Properties of a virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VpcProps {
    /// Address block in CIDR notation.
    pub cidr: String,
    /// Number of NAT gateways to place in public subnets.
    pub nat_gateways: usize,
    /// Number of zones to span.
    pub max_azs: usize,
    /// Assign DNS hostnames to instances.
    pub enable_dns_hostnames: bool,
    /// Resolve DNS through the provider's resolver.
    pub enable_dns_support: bool,
    /// Subnet groups in allocation order.
    pub subnet_configuration: Vec<SubnetConfiguration>,
}

impl Default for VpcProps {
    /// `10.0.0.0/20` over two zones with a public and an isolated /22 group
    /// and no NAT gateways.
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/20".into(),
            nat_gateways: 0,
            max_azs: 2,
            enable_dns_hostnames: true,
            enable_dns_support: true,
            subnet_configuration: vec![
                SubnetConfiguration::new("public", 22, SubnetType::Public),
                SubnetConfiguration::new("private", 22, SubnetType::PrivateIsolated),
            ],
        }
    }
}

/// A subnet with its zone and allocated block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedSubnet {
    /// Name of the group this subnet belongs to.
    pub group: String,
    /// Routing class.
    pub subnet_type: SubnetType,
    /// Zone the subnet lives in.
    pub zone: AvailabilityZone,
    /// Allocated address block.
    pub cidr: Ipv4Cidr,
    /// Construct id, e.g. `publicSubnet1`.
    pub construct_id: String,
}

/// A validated network layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkPlan {
    /// Network address block.
    pub cidr: Ipv4Cidr,
    /// Zones spanned, in order.
    pub zones: Vec<AvailabilityZone>,
    /// Subnets in allocation order.
    pub subnets: Vec<PlannedSubnet>,
    /// Number of NAT gateways.
    pub nat_gateways: usize,
    /// DNS hostnames flag.
    pub enable_dns_hostnames: bool,
    /// DNS support flag.
    pub enable_dns_support: bool,
}

impl NetworkPlan {
    /// Subnets of the given routing class, in allocation order.
    pub fn subnets_of(&self, subnet_type: SubnetType) -> impl Iterator<Item = &PlannedSubnet> {
        self.subnets
            .iter()
            .filter(move |s| s.subnet_type == subnet_type)
    }

    /// Whether any subnet group is public.
    #[must_use]
    pub fn has_public(&self) -> bool {
        self.subnets_of(SubnetType::Public).next().is_some()
    }
}

/// Validates `props` and allocates every subnet.
///
/// # Checks performed
///
/// 1. Network CIDR parses and its prefix is within [`MIN_PREFIX`]..=[`MAX_PREFIX`].
/// 2. Zone count is nonzero and no larger than `available`.
/// 3. DNS hostnames require DNS support.
/// 4. Subnet groups exist, have unique non-empty names and valid masks.
/// 5. NAT gateway count is consistent with the groups and zones.
/// 6. Every subnet fits in the remaining space of the block.
///
/// # Errors
///
/// Returns a configuration error for the first failed check.
pub fn plan(props: &VpcProps, available: &[AvailabilityZone]) -> Result<NetworkPlan> {
    let cidr: Ipv4Cidr = props.cidr.parse()?;
    check_prefix("network", cidr.prefix())?;
    let zones = select_zones(props.max_azs, available)?;
    if props.enable_dns_hostnames && !props.enable_dns_support {
        return Err(TopologyError::config(
            "DNS hostnames require DNS support to be enabled",
        ));
    }
    check_subnet_groups(props, cidr)?;
    check_nat_gateways(props, zones.len())?;

    let mut allocator = CidrAllocator::new(cidr);
    let mut subnets = Vec::with_capacity(props.subnet_configuration.len() * zones.len());
    for group in &props.subnet_configuration {
        for (index, zone) in zones.iter().enumerate() {
            let block = allocator.allocate(group.cidr_mask).map_err(|_| {
                TopologyError::config(format!(
                    "subnet group \"{}\" (/{}) does not fit in {cidr} across {} zone(s)",
                    group.name,
                    group.cidr_mask,
                    zones.len()
                ))
            })?;
            tracing::debug!(group = %group.name, zone = %zone, cidr = %block, "allocated subnet");
            subnets.push(PlannedSubnet {
                group: group.name.clone(),
                subnet_type: group.subnet_type,
                zone: zone.clone(),
                cidr: block,
                construct_id: format!("{}Subnet{}", group.name, index + 1),
            });
        }
    }

    Ok(NetworkPlan {
        cidr,
        zones,
        subnets,
        nat_gateways: props.nat_gateways,
        enable_dns_hostnames: props.enable_dns_hostnames,
        enable_dns_support: props.enable_dns_support,
    })
}

fn check_prefix(what: &str, prefix: u8) -> Result<()> {
    if !(MIN_PREFIX..=MAX_PREFIX).contains(&prefix) {
        return Err(TopologyError::config(format!(
            "{what} mask /{prefix} must be between /{MIN_PREFIX} and /{MAX_PREFIX}"
        )));
    }
    Ok(())
}

fn select_zones(max_azs: usize, available: &[AvailabilityZone]) -> Result<Vec<AvailabilityZone>> {
    if max_azs == 0 {
        return Err(TopologyError::config("zone count must be at least 1"));
    }
    if max_azs > available.len() {
        return Err(TopologyError::config(format!(
            "zone count {max_azs} exceeds the {} available zone(s)",
            available.len()
        )));
    }
    Ok(available[..max_azs].to_vec())
}

fn check_subnet_groups(props: &VpcProps, cidr: Ipv4Cidr) -> Result<()> {
    if props.subnet_configuration.is_empty() {
        return Err(TopologyError::config(
            "at least one subnet group is required",
        ));
    }
    let mut seen = HashSet::new();
    for group in &props.subnet_configuration {
        if group.name.is_empty() {
            return Err(TopologyError::config("subnet group name must not be empty"));
        }
        if !seen.insert(group.name.as_str()) {
            return Err(TopologyError::config(format!(
                "duplicate subnet group name: \"{}\"",
                group.name
            )));
        }
        check_prefix(&format!("subnet group \"{}\"", group.name), group.cidr_mask)?;
        if group.cidr_mask < cidr.prefix() {
            return Err(TopologyError::config(format!(
                "subnet group \"{}\" mask /{} is wider than the network {cidr}",
                group.name, group.cidr_mask
            )));
        }
    }
    Ok(())
}

fn check_nat_gateways(props: &VpcProps, zone_count: usize) -> Result<()> {
    let has = |t: SubnetType| props.subnet_configuration.iter().any(|g| g.subnet_type == t);
    if props.nat_gateways > 0 && !has(SubnetType::Public) {
        return Err(TopologyError::config(
            "NAT gateways require a public subnet group",
        ));
    }
    if props.nat_gateways > zone_count {
        return Err(TopologyError::config(format!(
            "{} NAT gateway(s) requested but the network spans {zone_count} zone(s)",
            props.nat_gateways
        )));
    }
    if props.nat_gateways == 0 && has(SubnetType::PrivateWithEgress) {
        return Err(TopologyError::config(
            "private subnets with egress require at least one NAT gateway",
        ));
    }
    Ok(())
}
