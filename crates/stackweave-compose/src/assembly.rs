//! Synthesis of a described topology into a cloud assembly.
//!
//! One template per unit plus a manifest naming every unit, its template
//! digest, and the dependency edges. Output is deterministic: describing
//! the same topology twice yields byte-identical files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use stackweave_common::constants::{APP_NAME, MANIFEST_FILE, TEMPLATE_SUFFIX};
use stackweave_common::error::{Result, TopologyError};
use stackweave_common::types::Environment;

use crate::construct::NodeId;
use crate::context::App;
use crate::graph::{Dependency, EdgeKind};

/// Assembly format version.
pub const ASSEMBLY_VERSION: &str = "1.0";

/// A unit's template.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Template {
    /// Inputs supplied by the parent unit.
    #[serde(rename = "Parameters", skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
    /// Declared resources by logical id.
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, Value>,
    /// Values exported to sibling units.
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Value>,
}

impl Template {
    /// Resources of the given engine type.
    pub fn resources_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = (&'a String, &'a Value)> {
        self.resources
            .iter()
            .filter(move |(_, r)| r["Type"] == type_name)
    }

    /// Hex SHA-256 of the serialized template.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn digest(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(Sha256::digest(&bytes)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect())
    }
}

/// Manifest entry for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitManifest {
    /// Construct path.
    pub path: String,
    /// Parent unit path; `None` for the root.
    pub parent: Option<String>,
    /// Template file name inside the assembly.
    pub template_file: String,
    /// Hex SHA-256 of the template.
    pub template_digest: String,
    /// Units this unit is explicitly ordered after.
    pub depends_on: Vec<String>,
    /// Units whose outputs this unit consumes.
    pub references: Vec<String>,
}

/// Assembly manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// Format version.
    pub version: String,
    /// Producing tool.
    pub producer: String,
    /// Environment of the root unit.
    pub environment: Environment,
    /// Units in creation order, root first.
    pub units: Vec<UnitManifest>,
    /// Unit paths in deployment order.
    pub deployment_order: Vec<String>,
    /// Every unit dependency edge.
    pub dependencies: Vec<Dependency>,
}

/// The synthesized output handed to the provisioning engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloudAssembly {
    /// The manifest.
    pub manifest: Manifest,
    /// Templates keyed by file name.
    pub templates: BTreeMap<String, Template>,
}

impl CloudAssembly {
    /// Template of the unit at `path`.
    #[must_use]
    pub fn template(&self, path: &str) -> Option<&Template> {
        self.manifest
            .units
            .iter()
            .find(|u| u.path == path)
            .and_then(|u| self.templates.get(&u.template_file))
    }

    /// Writes `manifest.json` and every template into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a file cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        tracing::info!(dir = %dir.display(), "writing cloud assembly");
        std::fs::create_dir_all(dir).map_err(|source| TopologyError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut written = Vec::with_capacity(self.templates.len() + 1);
        written.push(write_json(&dir.join(MANIFEST_FILE), &self.manifest)?);
        for (file, template) in &self.templates {
            written.push(write_json(&dir.join(file), template)?);
        }
        Ok(written)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    std::fs::write(path, body).map_err(|source| TopologyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "wrote assembly file");
    Ok(path.to_path_buf())
}

/// Template file name for a unit path.
///
/// Path separators become `.`, which construct ids never contain, so
/// distinct unit paths always map to distinct file names.
#[must_use]
pub fn template_file_name(path: &str) -> String {
    format!("{}{TEMPLATE_SUFFIX}", path.replace('/', "."))
}

/// Builds the assembly for a described topology.
///
/// Callers normally go through [`App::synth`], which validates first.
///
/// # Errors
///
/// Returns an error if a template cannot be serialized or the graph is cyclic.
pub fn synthesize(app: &App) -> Result<CloudAssembly> {
    let tree = app.tree();
    let units = app.units();
    let lifted = app.sibling_dependencies();

    let mut templates = BTreeMap::new();
    let mut manifests = Vec::with_capacity(units.len());
    for scope in &units {
        let unit = scope.node();
        let path = tree.path(unit);
        let template = unit_template(app, unit, &lifted)?;
        let file = template_file_name(&path);
        let deps = app.graph().dependencies_of(&path);
        let of_kind = |kind: EdgeKind| -> Vec<String> {
            deps.iter()
                .filter(|(_, k)| *k == kind)
                .map(|(p, _)| p.clone())
                .collect()
        };
        manifests.push(UnitManifest {
            parent: tree
                .get(unit)?
                .parent
                .and_then(|p| tree.enclosing_unit(p))
                .map(|p| tree.path(p)),
            template_digest: template.digest()?,
            template_file: file.clone(),
            depends_on: of_kind(EdgeKind::Explicit),
            references: of_kind(EdgeKind::Reference),
            path,
        });
        tracing::debug!(file = %file, resources = template.resources.len(), "synthesized template");
        if templates.insert(file.clone(), template).is_some() {
            return Err(TopologyError::DuplicateId {
                scope: "assembly".into(),
                id: file,
            });
        }
    }

    let manifest = Manifest {
        version: ASSEMBLY_VERSION.into(),
        producer: APP_NAME.into(),
        environment: app.environment().clone(),
        units: manifests,
        deployment_order: app.graph().resolve_order()?,
        dependencies: app.graph().edges(),
    };
    tracing::info!(units = manifest.units.len(), "synthesized cloud assembly");
    Ok(CloudAssembly {
        manifest,
        templates,
    })
}

fn unit_template(app: &App, unit: NodeId, lifted: &[(NodeId, NodeId, NodeId)]) -> Result<Template> {
    let tree = app.tree();
    let mut template = Template::default();

    for (node, decl) in tree.resources_of(unit) {
        let mut entry = Map::new();
        let _ = entry.insert("Type".into(), json!(decl.kind.type_name()));
        if !decl.properties.is_empty() {
            let _ = entry.insert("Properties".into(), json!(decl.properties));
        }
        if !decl.depends_on.is_empty() {
            let mut on: Vec<String> = decl
                .depends_on
                .iter()
                .map(|&d| tree.logical_id(d).to_string())
                .collect();
            on.sort();
            let _ = entry.insert("DependsOn".into(), json!(on));
        }
        let _ = template
            .resources
            .insert(tree.logical_id(node).to_string(), Value::Object(entry));
    }

    for child in tree.nested_units_of(unit) {
        let child_path = tree.path(child);
        let mut properties = Map::new();
        let _ = properties.insert(
            "TemplateURL".into(),
            json!(template_file_name(&child_path)),
        );
        if let Some(params) = app.parameters_of(child) {
            let wiring: Map<String, Value> = params
                .iter()
                .map(|(name, binding)| (name.clone(), binding.value.clone()))
                .collect();
            let _ = properties.insert("Parameters".into(), Value::Object(wiring));
        }
        let mut entry = Map::new();
        let _ = entry.insert("Type".into(), json!("AWS::CloudFormation::Stack"));
        let _ = entry.insert("Properties".into(), Value::Object(properties));
        let mut on: Vec<String> = lifted
            .iter()
            .filter(|&&(ancestor, dependent, _)| ancestor == unit && dependent == child)
            .map(|&(_, _, dependency)| tree.logical_id(dependency).to_string())
            .collect();
        on.sort();
        on.dedup();
        if !on.is_empty() {
            let _ = entry.insert("DependsOn".into(), json!(on));
        }
        let _ = template
            .resources
            .insert(tree.logical_id(child).to_string(), Value::Object(entry));
    }

    if let Some(params) = app.parameters_of(unit) {
        for name in params.keys() {
            let _ = template
                .parameters
                .insert(name.clone(), json!({ "Type": "String" }));
        }
    }
    if let Some(outputs) = app.outputs_of(unit) {
        template.outputs.clone_from(outputs);
    }
    Ok(template)
}

#[cfg(test)]
mod tests {
    use stackweave_common::config::TopologyConfig;

    use super::*;
    use crate::resource::ResourceKind;

    fn wired_app() -> App {
        let mut app = App::new(TopologyConfig::default());
        let root = app.add_stack("root").expect("root");
        let net = app.add_nested_stack(root, "net").expect("net");
        let svc = app.add_nested_stack(root, "svc").expect("svc");
        let vpc = app
            .add_resource(net, "vpc", ResourceKind::Vpc, Map::new())
            .expect("vpc");
        let token = app.import(svc, &vpc).expect("import");
        let mut props = Map::new();
        let _ = props.insert("VpcId".into(), token);
        let _ = app
            .add_resource(svc, "thing", ResourceKind::Other("AWS::Custom::Thing"), props)
            .expect("thing");
        app.add_dependency(svc, net).expect("edge");
        app
    }

    #[test]
    fn one_template_per_unit() {
        let assembly = wired_app().synth().expect("synth");
        assert_eq!(assembly.templates.len(), 3);
        assert_eq!(assembly.manifest.units[0].path, "root");
        assert!(assembly.manifest.units[0].parent.is_none());
        assert_eq!(assembly.manifest.units[1].parent.as_deref(), Some("root"));
        assert!(assembly.templates.contains_key("root.net.template.json"));
    }

    #[test]
    fn root_template_wires_parameters_and_depends_on() {
        let assembly = wired_app().synth().expect("synth");
        let root = assembly.template("root").expect("root template");
        let stacks: Vec<_> = root.resources_of_type("AWS::CloudFormation::Stack").collect();
        assert_eq!(stacks.len(), 2);

        let (_, svc) = stacks
            .iter()
            .find(|(_, r)| r["Properties"]["TemplateURL"] == "root.svc.template.json")
            .expect("svc stack");
        let params = svc["Properties"]["Parameters"]
            .as_object()
            .expect("parameters");
        assert_eq!(params.len(), 1);
        let binding = params.values().next().expect("binding");
        assert!(binding["Fn::GetAtt"][1]
            .as_str()
            .expect("attribute")
            .starts_with("Outputs."));
        assert_eq!(svc["DependsOn"].as_array().expect("depends on").len(), 1);
    }

    #[test]
    fn producer_outputs_and_consumer_parameters_match() {
        let assembly = wired_app().synth().expect("synth");
        let net = assembly.template("root/net").expect("net");
        let svc = assembly.template("root/svc").expect("svc");
        assert_eq!(net.outputs.len(), 1);
        assert_eq!(svc.parameters.len(), 1);
        let param = svc.parameters.keys().next().expect("param");
        let (_, thing) = svc
            .resources_of_type("AWS::Custom::Thing")
            .next()
            .expect("thing");
        assert_eq!(thing["Properties"]["VpcId"]["Ref"], param.as_str());
    }

    #[test]
    fn manifest_records_both_edge_kinds() {
        let assembly = wired_app().synth().expect("synth");
        let svc = &assembly.manifest.units[2];
        assert_eq!(svc.depends_on, vec!["root/net"]);
        assert_eq!(svc.references, vec!["root/net"]);
        assert_eq!(assembly.manifest.dependencies.len(), 2);
        let pos = |p: &str| {
            assembly
                .manifest
                .deployment_order
                .iter()
                .position(|u| u == p)
                .expect(p)
        };
        assert!(pos("root/net") < pos("root/svc"));
    }

    #[test]
    fn synthesis_is_deterministic() {
        let a = wired_app().synth().expect("synth");
        let b = wired_app().synth().expect("synth");
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).expect("json"),
            serde_json::to_string(&b).expect("json")
        );
    }

    #[test]
    fn synth_refuses_unordered_references() {
        let mut app = App::new(TopologyConfig::default());
        let root = app.add_stack("root").expect("root");
        let net = app.add_nested_stack(root, "net").expect("net");
        let svc = app.add_nested_stack(root, "svc").expect("svc");
        let vpc = app
            .add_resource(net, "vpc", ResourceKind::Vpc, Map::new())
            .expect("vpc");
        let _ = app.import(svc, &vpc).expect("import");
        assert!(app.synth().is_err());
    }

    #[test]
    fn write_to_creates_manifest_and_templates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("assembly");
        let written = wired_app()
            .synth()
            .expect("synth")
            .write_to(&out)
            .expect("write");
        assert_eq!(written.len(), 4);
        let manifest = std::fs::read_to_string(out.join(MANIFEST_FILE)).expect("manifest");
        let value: Value = serde_json::from_str(&manifest).expect("json");
        assert_eq!(value["version"], ASSEMBLY_VERSION);
        assert!(out.join("root.svc.template.json").exists());
    }

    #[test]
    fn dashed_and_nested_paths_get_distinct_templates() {
        let mut app = App::new(TopologyConfig::default());
        let root = app.add_stack("root").expect("root");
        let _ = app.add_nested_stack(root, "a-b").expect("a-b");
        let a = app.add_nested_stack(root, "a").expect("a");
        let _ = app.add_nested_stack(a, "b").expect("b");

        let assembly = app.synth().expect("synth");
        assert_eq!(assembly.templates.len(), assembly.manifest.units.len());
        assert_eq!(template_file_name("root/a-b"), "root.a-b.template.json");
        assert_eq!(template_file_name("root/a/b"), "root.a.b.template.json");
        assert!(assembly.template("root/a-b").is_some());
        assert!(assembly.template("root/a/b").is_some());
        assert_ne!(
            assembly.template("root/a-b").expect("a-b"),
            assembly.template("root").expect("root")
        );
    }

    #[test]
    fn cross_branch_edge_is_lifted_to_common_parent() {
        let mut app = App::new(TopologyConfig::default());
        let root = app.add_stack("root").expect("root");
        let net = app.add_nested_stack(root, "net").expect("net");
        let grp = app.add_nested_stack(root, "grp").expect("grp");
        let svc = app.add_nested_stack(grp, "svc").expect("svc");
        app.add_dependency(svc, net).expect("edge");

        let assembly = app.synth().expect("synth");
        let root_template = assembly.template("root").expect("root template");
        let (_, grp_stack) = root_template
            .resources_of_type("AWS::CloudFormation::Stack")
            .find(|(_, r)| r["Properties"]["TemplateURL"] == "root.grp.template.json")
            .expect("grp stack");
        let net_id = app.tree().logical_id(net.node()).to_string();
        assert_eq!(grp_stack["DependsOn"], json!([net_id]));

        let grp_template = assembly.template("root/grp").expect("grp template");
        let (_, svc_stack) = grp_template
            .resources_of_type("AWS::CloudFormation::Stack")
            .next()
            .expect("svc stack");
        assert!(svc_stack.get("DependsOn").is_none());
    }
}
