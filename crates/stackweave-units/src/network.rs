//! The network unit: virtual network, subnets, routing, and the
//! application security group.

use serde_json::{Map, Value, json};
use stackweave_common::error::Result;
use stackweave_compose::{App, ResourceKind, ResourceRef, Scope};
use stackweave_net::security_group::{Peer, Port, Rule, SecurityGroupProps};
use stackweave_net::vpc::{self, NetworkPlan, PlannedSubnet, SubnetType, VpcProps};

use crate::handles::{SecurityGroupHandle, VpcHandle};

/// Construct id of the network inside the unit.
pub const VPC_ID: &str = "app-vpc";

/// Construct id and physical name of the application security group.
pub const APPLICATION_SG_ID: &str = "application-sg";

/// Properties of a network unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProps {
    /// Network layout.
    pub vpc: VpcProps,
    /// Application security group.
    pub security_group: SecurityGroupProps,
}

impl Default for NetworkProps {
    fn default() -> Self {
        Self {
            vpc: VpcProps::default(),
            security_group: application_security_group(),
        }
    }
}

/// `application-sg` allowing TCP/80 from any IPv4 address.
#[must_use]
pub fn application_security_group() -> SecurityGroupProps {
    let mut props = SecurityGroupProps::named(APPLICATION_SG_ID);
    let _ = props.add_ingress_rule(Peer::AnyIpv4, Port::tcp(80), None);
    props
}

/// A described network unit and its output handles.
#[derive(Debug, Clone)]
pub struct NetworkUnit {
    scope: Scope,
    plan: NetworkPlan,
    vpc: VpcHandle,
    application_sg: SecurityGroupHandle,
}

impl NetworkUnit {
    /// Describes the network unit with its fixed configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid or taken, or the environment
    /// offers fewer zones than the network spans.
    pub fn new(app: &mut App, parent: Scope, id: &str) -> Result<Self> {
        Self::with_props(app, parent, id, &NetworkProps::default())
    }

    /// Describes the network unit with explicit properties.
    ///
    /// Properties are validated before anything is registered.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a malformed CIDR, mask, zone count,
    /// or security-group name, and an id error if `id` is invalid or taken.
    pub fn with_props(app: &mut App, parent: Scope, id: &str, props: &NetworkProps) -> Result<Self> {
        let plan = vpc::plan(&props.vpc, &app.availability_zones())?;
        props.security_group.validate()?;

        let scope = app.add_nested_stack(parent, id)?;
        let vpc = describe_vpc(app, scope, &plan)?;
        let application_sg = describe_security_group(app, scope, &vpc.vpc, &props.security_group)?;
        tracing::info!(
            unit = %app.path(scope),
            cidr = %plan.cidr,
            subnets = plan.subnets.len(),
            zones = plan.zones.len(),
            "described network unit"
        );
        Ok(Self {
            scope,
            plan,
            vpc,
            application_sg,
        })
    }

    /// Scope of the unit.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// The validated layout the unit was described from.
    #[must_use]
    pub const fn plan(&self) -> &NetworkPlan {
        &self.plan
    }

    /// Network output handle.
    #[must_use]
    pub const fn vpc(&self) -> &VpcHandle {
        &self.vpc
    }

    /// Security-group output handle.
    #[must_use]
    pub const fn application_sg(&self) -> &SecurityGroupHandle {
        &self.application_sg
    }
}

fn props(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn name_tag(app: &App, scope: Scope) -> Value {
    json!([{ "Key": "Name", "Value": app.path(scope) }])
}

struct SubnetResources {
    subnet: ResourceRef,
    scope: Scope,
    route_table: ResourceRef,
    association: ResourceRef,
    default_route: Option<ResourceRef>,
}

fn describe_vpc(app: &mut App, unit: Scope, plan: &NetworkPlan) -> Result<VpcHandle> {
    let group = app.add_group(unit, VPC_ID)?;
    let vpc = app.add_resource(
        group,
        "Resource",
        ResourceKind::Vpc,
        props(vec![
            ("CidrBlock", json!(plan.cidr)),
            ("EnableDnsHostnames", json!(plan.enable_dns_hostnames)),
            ("EnableDnsSupport", json!(plan.enable_dns_support)),
            ("InstanceTenancy", json!("default")),
            ("Tags", name_tag(app, group)),
        ]),
    )?;

    let gateway = if plan.has_public() {
        let igw = app.add_resource(
            group,
            "IGW",
            ResourceKind::InternetGateway,
            props(vec![("Tags", name_tag(app, group))]),
        )?;
        let attachment = app.add_resource(
            group,
            "VPCGW",
            ResourceKind::VpcGatewayAttachment,
            props(vec![
                ("InternetGatewayId", igw.ref_token()),
                ("VpcId", vpc.ref_token()),
            ]),
        )?;
        Some((igw, attachment))
    } else {
        None
    };

    let mut described = Vec::with_capacity(plan.subnets.len());
    for planned in &plan.subnets {
        let resources = describe_subnet(app, group, &vpc, planned, gateway.as_ref())?;
        described.push((planned, resources));
    }

    let nat_gateways = describe_nat_gateways(app, plan, &described)?;
    let egress = described
        .iter()
        .filter(|(p, _)| p.subnet_type == SubnetType::PrivateWithEgress);
    for (index, (_, resources)) in egress.enumerate() {
        let Some(nat) = nat_gateways.get(index % nat_gateways.len().max(1)) else {
            break;
        };
        let _ = app.add_resource(
            resources.scope,
            "DefaultRoute",
            ResourceKind::Route,
            props(vec![
                ("DestinationCidrBlock", json!("0.0.0.0/0")),
                ("NatGatewayId", nat.ref_token()),
                ("RouteTableId", resources.route_table.ref_token()),
            ]),
        )?;
    }

    let of_type = |t: SubnetType| -> Vec<ResourceRef> {
        described
            .iter()
            .filter(|(p, _)| p.subnet_type == t)
            .map(|(_, r)| r.subnet.clone())
            .collect()
    };
    Ok(VpcHandle {
        cidr: plan.cidr,
        zones: plan.zones.clone(),
        public_subnets: of_type(SubnetType::Public),
        private_subnets: of_type(SubnetType::PrivateWithEgress),
        isolated_subnets: of_type(SubnetType::PrivateIsolated),
        vpc,
    })
}

fn describe_subnet(
    app: &mut App,
    vpc_group: Scope,
    vpc: &ResourceRef,
    planned: &PlannedSubnet,
    gateway: Option<&(ResourceRef, ResourceRef)>,
) -> Result<SubnetResources> {
    let scope = app.add_group(vpc_group, &planned.construct_id)?;
    let public = planned.subnet_type == SubnetType::Public;
    let subnet = app.add_resource(
        scope,
        "Subnet",
        ResourceKind::Subnet,
        props(vec![
            ("AvailabilityZone", json!(planned.zone)),
            ("CidrBlock", json!(planned.cidr)),
            ("MapPublicIpOnLaunch", json!(public)),
            (
                "Tags",
                json!([
                    { "Key": "Name", "Value": app.path(scope) },
                    { "Key": "stackweave:subnet-name", "Value": planned.group },
                    { "Key": "stackweave:subnet-type", "Value": planned.subnet_type.label() },
                ]),
            ),
            ("VpcId", vpc.ref_token()),
        ]),
    )?;
    let route_table = app.add_resource(
        scope,
        "RouteTable",
        ResourceKind::RouteTable,
        props(vec![
            ("Tags", name_tag(app, scope)),
            ("VpcId", vpc.ref_token()),
        ]),
    )?;
    let association = app.add_resource(
        scope,
        "RouteTableAssociation",
        ResourceKind::SubnetRouteTableAssociation,
        props(vec![
            ("RouteTableId", route_table.ref_token()),
            ("SubnetId", subnet.ref_token()),
        ]),
    )?;

    let default_route = match (public, gateway) {
        (true, Some((igw, attachment))) => {
            let route = app.add_resource(
                scope,
                "DefaultRoute",
                ResourceKind::Route,
                props(vec![
                    ("DestinationCidrBlock", json!("0.0.0.0/0")),
                    ("GatewayId", igw.ref_token()),
                    ("RouteTableId", route_table.ref_token()),
                ]),
            )?;
            app.add_resource_dependency(&route, attachment)?;
            Some(route)
        }
        _ => None,
    };
    tracing::debug!(subnet = %app.path(scope), cidr = %planned.cidr, zone = %planned.zone, "described subnet");

    Ok(SubnetResources {
        subnet,
        scope,
        route_table,
        association,
        default_route,
    })
}

fn describe_nat_gateways(
    app: &mut App,
    plan: &NetworkPlan,
    described: &[(&PlannedSubnet, SubnetResources)],
) -> Result<Vec<ResourceRef>> {
    let public = described
        .iter()
        .filter(|(p, _)| p.subnet_type == SubnetType::Public)
        .take(plan.nat_gateways);
    let mut gateways = Vec::with_capacity(plan.nat_gateways);
    for (_, resources) in public {
        let eip = app.add_resource(
            resources.scope,
            "EIP",
            ResourceKind::Eip,
            props(vec![
                ("Domain", json!("vpc")),
                ("Tags", name_tag(app, resources.scope)),
            ]),
        )?;
        let nat = app.add_resource(
            resources.scope,
            "NATGateway",
            ResourceKind::NatGateway,
            props(vec![
                ("AllocationId", eip.get_att("AllocationId")),
                ("SubnetId", resources.subnet.ref_token()),
                ("Tags", name_tag(app, resources.scope)),
            ]),
        )?;
        app.add_resource_dependency(&nat, &resources.association)?;
        if let Some(route) = &resources.default_route {
            app.add_resource_dependency(&nat, route)?;
        }
        gateways.push(nat);
    }
    Ok(gateways)
}

fn rule_json(rule: &Rule) -> Value {
    let mut entry = props(vec![
        ("CidrIp", json!(rule.peer.cidr())),
        ("Description", json!(rule.description)),
        ("IpProtocol", json!(rule.port.protocol().as_str())),
    ]);
    if let (Some(from), Some(to)) = (rule.port.from_port(), rule.port.to_port()) {
        let _ = entry.insert("FromPort".into(), json!(from));
        let _ = entry.insert("ToPort".into(), json!(to));
    }
    Value::Object(entry)
}

fn describe_security_group(
    app: &mut App,
    unit: Scope,
    vpc: &ResourceRef,
    sg: &SecurityGroupProps,
) -> Result<SecurityGroupHandle> {
    let group = app.add_group(unit, APPLICATION_SG_ID)?;
    let description = sg
        .description
        .clone()
        .unwrap_or_else(|| app.path(group));
    let mut properties = props(vec![
        ("GroupDescription", json!(description)),
        (
            "SecurityGroupIngress",
            Value::Array(sg.ingress.rules().iter().map(rule_json).collect()),
        ),
        ("VpcId", vpc.ref_token()),
    ]);
    if let Some(name) = &sg.name {
        let _ = properties.insert("GroupName".into(), json!(name));
    }
    let egress = sg.egress();
    if !egress.is_empty() {
        let _ = properties.insert(
            "SecurityGroupEgress".into(),
            Value::Array(egress.rules().iter().map(rule_json).collect()),
        );
    }
    let group_ref = app.add_resource(group, "Resource", ResourceKind::SecurityGroup, properties)?;
    tracing::debug!(
        group = %group_ref,
        ingress = sg.ingress.len(),
        "described security group"
    );
    Ok(SecurityGroupHandle {
        group: group_ref,
        network: vpc.clone(),
        name: sg.name.clone(),
        ingress: sg.ingress.rules().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use stackweave_common::config::TopologyConfig;
    use stackweave_common::error::TopologyError;
    use stackweave_net::vpc::SubnetConfiguration;

    use super::*;
    use crate::handles::{NetworkRef, SecurityGroupRef};

    fn describe(props: &NetworkProps) -> Result<(App, NetworkUnit)> {
        let mut app = App::new(TopologyConfig::default());
        let root = app.add_stack("root")?;
        let unit = NetworkUnit::with_props(&mut app, root, "net", props)?;
        Ok((app, unit))
    }

    fn count(app: &App, unit: &NetworkUnit, kind: ResourceKind) -> usize {
        app.tree()
            .resources_of(unit.scope().node())
            .iter()
            .filter(|(_, d)| d.kind == kind)
            .count()
    }

    #[test]
    fn default_network_resources() {
        let (app, unit) = describe(&NetworkProps::default()).expect("valid");
        assert_eq!(count(&app, &unit, ResourceKind::Vpc), 1);
        assert_eq!(count(&app, &unit, ResourceKind::Subnet), 4);
        assert_eq!(count(&app, &unit, ResourceKind::RouteTable), 4);
        assert_eq!(count(&app, &unit, ResourceKind::SubnetRouteTableAssociation), 4);
        assert_eq!(count(&app, &unit, ResourceKind::Route), 2);
        assert_eq!(count(&app, &unit, ResourceKind::InternetGateway), 1);
        assert_eq!(count(&app, &unit, ResourceKind::NatGateway), 0);
        assert_eq!(count(&app, &unit, ResourceKind::SecurityGroup), 1);
    }

    #[test]
    fn handles_expose_subnets_by_type() {
        let (_, unit) = describe(&NetworkProps::default()).expect("valid");
        let vpc = unit.vpc();
        assert_eq!(vpc.public_subnets().len(), 2);
        assert_eq!(vpc.isolated_subnets().len(), 2);
        assert!(vpc.private_subnets().is_empty());
        assert_eq!(vpc.cidr().to_string(), "10.0.0.0/20");
        assert_eq!(vpc.availability_zones().len(), 2);
        assert_eq!(vpc.network().kind(), ResourceKind::Vpc);
        assert_eq!(vpc.network().path(), "root/net/app-vpc/Resource");
    }

    #[test]
    fn security_group_has_single_http_rule() {
        let (_, unit) = describe(&NetworkProps::default()).expect("valid");
        let sg = unit.application_sg();
        assert_eq!(sg.name(), Some("application-sg"));
        assert_eq!(sg.attached_network(), unit.vpc().network());
        let rules = sg.ingress_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].peer, Peer::AnyIpv4);
        assert_eq!(rules[0].port, Port::tcp(80));
    }

    #[test]
    fn isolated_subnets_have_no_routes() {
        let (app, unit) = describe(&NetworkProps::default()).expect("valid");
        let isolated: Vec<String> = unit
            .vpc()
            .isolated_subnets()
            .iter()
            .map(|s| s.path().trim_end_matches("/Subnet").to_string())
            .collect();
        let routes = app
            .tree()
            .iter()
            .filter(|(_, n)| n.id.as_str() == "DefaultRoute")
            .map(|(id, _)| app.tree().path(id));
        for route in routes {
            assert!(
                !isolated.iter().any(|s| route.starts_with(&format!("{s}/"))),
                "isolated subnet has a route: {route}"
            );
        }
    }

    #[test]
    fn invalid_props_register_nothing() {
        let mut app = App::new(TopologyConfig::default());
        let root = app.add_stack("root").expect("root");
        let mut props = NetworkProps::default();
        props.vpc.cidr = "10.0.0.0/33".into();
        let err = NetworkUnit::with_props(&mut app, root, "net", &props).unwrap_err();
        assert!(matches!(err, TopologyError::Config { .. }));
        assert_eq!(app.tree().len(), 1);
    }

    #[test]
    fn three_zones_on_two_available_fails() {
        let mut props = NetworkProps::default();
        props.vpc.max_azs = 3;
        assert!(describe(&props).is_err());
    }

    #[test]
    fn nat_gateways_route_egress_subnets() {
        let props = NetworkProps {
            vpc: VpcProps {
                nat_gateways: 1,
                subnet_configuration: vec![
                    SubnetConfiguration::new("public", 22, SubnetType::Public),
                    SubnetConfiguration::new("app", 22, SubnetType::PrivateWithEgress),
                ],
                ..VpcProps::default()
            },
            ..NetworkProps::default()
        };
        let (app, unit) = describe(&props).expect("valid");
        assert_eq!(count(&app, &unit, ResourceKind::NatGateway), 1);
        assert_eq!(count(&app, &unit, ResourceKind::Eip), 1);
        assert_eq!(count(&app, &unit, ResourceKind::Route), 4);
        assert_eq!(unit.vpc().private_subnets().len(), 2);
    }

    #[test]
    fn reserved_security_group_name_fails() {
        let props = NetworkProps {
            security_group: SecurityGroupProps::named("sg-app"),
            ..NetworkProps::default()
        };
        assert!(describe(&props).is_err());
    }
}
