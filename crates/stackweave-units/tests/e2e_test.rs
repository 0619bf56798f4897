//! End-to-end tests for the described topology.
//!
//! These tests drive the full pipeline the binary runs:
//! 1. Describe the root, network, and application units
//! 2. Validate the unit dependency graph
//! 3. Synthesize templates and the manifest
//! 4. Write the assembly to disk

#![allow(clippy::expect_used, clippy::unwrap_used)]

use serde_json::{Map, Value, json};
use stackweave_common::config::TopologyConfig;
use stackweave_common::error::{Result, TopologyError};
use stackweave_common::types::Environment;
use stackweave_compose::graph::EdgeKind;
use stackweave_compose::{App, ResourceKind, Scope};
use stackweave_net::cidr::Ipv4Cidr;
use stackweave_net::security_group::{Peer, Port};
use stackweave_net::vpc::{SubnetConfiguration, SubnetType};
use stackweave_units::application::{ApplicationBody, ApplicationInputs, ImportedInputs};
use stackweave_units::handles::{NetworkRef, SecurityGroupRef};
use stackweave_units::network::{NetworkProps, NetworkUnit};
use stackweave_units::root::{self, RootUnit};

const NETWORK: &str = "root-stack/base-resources";
const APPLICATION: &str = "root-stack/app-resources";

fn described() -> (App, RootUnit) {
    root::describe(TopologyConfig::default()).expect("describe")
}

// ── Unit structure ───────────────────────────────────────────────────

#[test]
fn root_creates_one_network_and_one_application_unit() {
    let (app, root) = described();
    let nested: Vec<String> = app
        .tree()
        .nested_units_of(root.scope().node())
        .into_iter()
        .map(|u| app.tree().path(u))
        .collect();
    assert_eq!(nested, vec![NETWORK.to_string(), APPLICATION.to_string()]);
    assert!(
        app.graph()
            .dependencies_of(APPLICATION)
            .contains(&(NETWORK.to_string(), EdgeKind::Explicit))
    );
    assert!(app.graph().dependencies_of(NETWORK).is_empty());
}

#[test]
fn root_has_no_incoming_edges() {
    let (app, _) = described();
    assert!(
        app.graph()
            .edges()
            .iter()
            .all(|e| e.dependent != "root-stack" && e.dependency != "root-stack")
    );
}

#[test]
fn unknown_account_is_accepted() {
    let config = TopologyConfig {
        environment: Environment::new(None, "us-west-2"),
        ..TopologyConfig::default()
    };
    let (app, root) = root::describe(config).expect("describe");
    assert!(app.environment().account.is_none());
    assert_eq!(root.network().vpc().network().kind(), ResourceKind::Vpc);
    assert_eq!(
        root.network().application_sg().security_group().kind(),
        ResourceKind::SecurityGroup
    );
    let imported = root.application().imported();
    assert!(imported.network.get("Ref").is_some());
    assert!(imported.application_security_group.get("Ref").is_some());
}

#[test]
fn explicit_account_reaches_manifest() {
    let config = TopologyConfig {
        environment: Environment::new(Some("123456789012".into()), "us-west-2"),
        ..TopologyConfig::default()
    };
    let (app, _) = root::describe(config).expect("describe");
    let assembly = app.synth().expect("synth");
    assert_eq!(
        assembly.manifest.environment.account.as_deref(),
        Some("123456789012")
    );
}

// ── Network layout ───────────────────────────────────────────────────

#[test]
fn four_disjoint_subnets_inside_network() {
    let (_, root) = described();
    let plan = root.network().plan();
    let parent: Ipv4Cidr = "10.0.0.0/20".parse().unwrap();
    assert_eq!(plan.cidr, parent);
    assert_eq!(plan.subnets.len(), 4);
    for (i, a) in plan.subnets.iter().enumerate() {
        assert_eq!(a.cidr.prefix(), 22);
        assert!(parent.contains(&a.cidr), "{} outside {parent}", a.cidr);
        for b in &plan.subnets[i + 1..] {
            assert!(!a.cidr.overlaps(&b.cidr), "{} overlaps {}", a.cidr, b.cidr);
        }
    }
    let blocks: Vec<String> = plan.subnets.iter().map(|s| s.cidr.to_string()).collect();
    assert_eq!(
        blocks,
        vec!["10.0.0.0/22", "10.0.4.0/22", "10.0.8.0/22", "10.0.12.0/22"]
    );
}

#[test]
fn security_group_allows_only_http() {
    let (_, root) = described();
    let sg = root.network().application_sg();
    assert_eq!(sg.name(), Some("application-sg"));
    let rules = sg.ingress_rules();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].peer, Peer::AnyIpv4);
    assert_eq!(rules[0].peer.cidr(), "0.0.0.0/0");
    assert_eq!(rules[0].port, Port::tcp(80));
}

#[test]
fn mask_21_does_not_fit() {
    let mut app = App::new(TopologyConfig::default());
    let scope = app.add_stack("root-stack").unwrap();
    let mut props = NetworkProps::default();
    for group in &mut props.vpc.subnet_configuration {
        group.cidr_mask = 21;
    }
    let err = NetworkUnit::with_props(&mut app, scope, "base-resources", &props).unwrap_err();
    assert!(matches!(err, TopologyError::Config { .. }));
    assert!(err.to_string().contains("does not fit"), "got: {err}");
}

#[test]
fn explicit_zone_names_are_used() {
    let config = TopologyConfig {
        availability_zones: Some(vec!["us-west-2a".into(), "us-west-2b".into()]),
        ..TopologyConfig::default()
    };
    let (app, root) = root::describe(config).expect("describe");
    let zones: Vec<String> = root
        .network()
        .vpc()
        .availability_zones()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(zones, vec!["us-west-2a", "us-west-2b"]);

    let assembly = app.synth().expect("synth");
    let template = assembly.template(NETWORK).expect("network template");
    let zones: Vec<&Value> = template
        .resources_of_type("AWS::EC2::Subnet")
        .map(|(_, r)| &r["Properties"]["AvailabilityZone"])
        .collect();
    assert!(zones.contains(&&json!("us-west-2a")));
}

#[test]
fn custom_layout_with_egress_subnets() {
    let mut app = App::new(TopologyConfig::default());
    let scope = app.add_stack("root-stack").unwrap();
    let mut props = NetworkProps::default();
    props.vpc.nat_gateways = 2;
    props.vpc.subnet_configuration = vec![
        SubnetConfiguration::new("ingress", 24, SubnetType::Public),
        SubnetConfiguration::new("app", 24, SubnetType::PrivateWithEgress),
        SubnetConfiguration::new("data", 24, SubnetType::PrivateIsolated),
    ];
    let network = NetworkUnit::with_props(&mut app, scope, "base-resources", &props).unwrap();
    assert_eq!(network.vpc().public_subnets().len(), 2);
    assert_eq!(network.vpc().private_subnets().len(), 2);
    assert_eq!(network.vpc().isolated_subnets().len(), 2);

    let assembly = app.synth().expect("synth");
    let template = assembly.template(NETWORK).expect("network template");
    assert_eq!(template.resources_of_type("AWS::EC2::NatGateway").count(), 2);
    assert_eq!(template.resources_of_type("AWS::EC2::EIP").count(), 2);
}

// ── Synthesis ────────────────────────────────────────────────────────

#[test]
fn description_is_idempotent() {
    let (first, _) = described();
    let (second, _) = described();
    let a = first.synth().expect("synth");
    let b = second.synth().expect("synth");
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn network_template_contents() {
    let (app, _) = described();
    let assembly = app.synth().expect("synth");
    let template = assembly.template(NETWORK).expect("network template");

    assert_eq!(template.resources_of_type("AWS::EC2::VPC").count(), 1);
    assert_eq!(template.resources_of_type("AWS::EC2::Subnet").count(), 4);
    assert_eq!(template.resources_of_type("AWS::EC2::NatGateway").count(), 0);
    assert_eq!(template.resources_of_type("AWS::EC2::InternetGateway").count(), 1);

    let (_, vpc) = template.resources_of_type("AWS::EC2::VPC").next().unwrap();
    assert_eq!(vpc["Properties"]["CidrBlock"], "10.0.0.0/20");
    assert_eq!(vpc["Properties"]["EnableDnsHostnames"], true);
    assert_eq!(vpc["Properties"]["EnableDnsSupport"], true);

    let (_, sg) = template
        .resources_of_type("AWS::EC2::SecurityGroup")
        .next()
        .unwrap();
    assert_eq!(sg["Properties"]["GroupName"], "application-sg");
    assert_eq!(
        sg["Properties"]["SecurityGroupIngress"],
        json!([{
            "CidrIp": "0.0.0.0/0",
            "Description": "from 0.0.0.0/0:80",
            "FromPort": 80,
            "IpProtocol": "tcp",
            "ToPort": 80,
        }])
    );
    assert_eq!(template.outputs.len(), 2);
}

#[test]
fn application_template_takes_parameters() {
    let (app, _) = described();
    let assembly = app.synth().expect("synth");
    let template = assembly.template(APPLICATION).expect("application template");
    assert!(template.resources.is_empty());
    assert_eq!(template.parameters.len(), 2);
    assert!(template.parameters.keys().all(|k| k.starts_with("referenceto")));

    let root = assembly.template("root-stack").expect("root template");
    let stacks: Vec<_> = root
        .resources_of_type("AWS::CloudFormation::Stack")
        .collect();
    assert_eq!(stacks.len(), 2);
    let (_, app_stack) = stacks
        .iter()
        .find(|(_, r)| r["Properties"]["TemplateURL"] == "root-stack.app-resources.template.json")
        .unwrap();
    assert_eq!(app_stack["DependsOn"].as_array().map(Vec::len), Some(1));
    assert_eq!(
        app_stack["Properties"]["Parameters"].as_object().map(Map::len),
        Some(2)
    );
}

#[test]
fn manifest_records_both_edges() {
    let (app, _) = described();
    let manifest = app.synth().expect("synth").manifest;
    let unit = manifest
        .units
        .iter()
        .find(|u| u.path == APPLICATION)
        .unwrap();
    assert_eq!(unit.depends_on, vec![NETWORK.to_string()]);
    assert_eq!(unit.references, vec![NETWORK.to_string()]);
    assert_eq!(unit.parent.as_deref(), Some("root-stack"));
}

#[test]
fn assembly_written_to_disk() {
    let (app, _) = described();
    let dir = tempfile::tempdir().unwrap();
    let written = app.synth().unwrap().write_to(dir.path()).unwrap();
    assert_eq!(written.len(), 4);
    for file in [
        "manifest.json",
        "root-stack.template.json",
        "root-stack.base-resources.template.json",
        "root-stack.app-resources.template.json",
    ] {
        let body = std::fs::read_to_string(dir.path().join(file)).unwrap();
        let _: Value = serde_json::from_str(&body).unwrap();
    }
}

// ── Application bodies ───────────────────────────────────────────────

struct WebServer;

impl ApplicationBody for WebServer {
    fn describe(
        &self,
        app: &mut App,
        unit: Scope,
        inputs: &ApplicationInputs<'_>,
        imported: &ImportedInputs,
    ) -> Result<()> {
        let subnet = inputs
            .network
            .public_subnets()
            .first()
            .ok_or_else(|| TopologyError::contract("web", "no public subnet"))?;
        let subnet = app.import(unit, subnet)?;
        let mut props = Map::new();
        let _ = props.insert("SubnetId".into(), subnet);
        let _ = props.insert(
            "SecurityGroupIds".into(),
            json!([imported.application_security_group]),
        );
        let _ = app.add_resource(unit, "web", ResourceKind::Other("AWS::EC2::Instance"), props)?;
        Ok(())
    }
}

#[test]
fn body_resources_land_in_application_template() {
    let (app, _) = root::describe_with(TopologyConfig::default(), &WebServer).expect("describe");
    let assembly = app.synth().expect("synth");
    let template = assembly.template(APPLICATION).unwrap();
    assert_eq!(template.resources_of_type("AWS::EC2::Instance").count(), 1);
    assert_eq!(template.parameters.len(), 3);
    let network = assembly.template(NETWORK).unwrap();
    assert_eq!(network.outputs.len(), 3);
}

#[test]
fn missing_explicit_edge_fails_synthesis() {
    let mut app = App::new(TopologyConfig::default());
    let scope = app.add_stack("root-stack").unwrap();
    let network = NetworkUnit::new(&mut app, scope, "base-resources").unwrap();
    let inputs = ApplicationInputs {
        network: network.vpc(),
        application_security_group: network.application_sg(),
    };
    let _ = stackweave_units::application::ApplicationUnit::new(&mut app, scope, "app-resources", &inputs)
        .unwrap();
    let err = app.synth().unwrap_err();
    assert!(matches!(err, TopologyError::ContractMismatch { .. }), "got: {err}");
}
