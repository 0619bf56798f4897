//! The application unit: its input contract and a pluggable body.
//!
//! The unit validates the handles it receives, imports them into its own
//! template, and hands the imported tokens to an [`ApplicationBody`] that
//! declares the actual application resources.

use serde_json::Value;
use stackweave_common::error::{Result, TopologyError};
use stackweave_compose::{App, ResourceKind, ResourceRef, Scope};

use crate::handles::{NetworkRef, SecurityGroupRef};

/// Required inputs of the application unit.
#[derive(Debug, Clone, Copy)]
pub struct ApplicationInputs<'a> {
    /// The network to deploy into.
    pub network: &'a dyn NetworkRef,
    /// The security group guarding application traffic.
    pub application_security_group: &'a dyn SecurityGroupRef,
}

/// Tokens for the inputs, valid inside the application unit's template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedInputs {
    /// `Ref` to the network id parameter.
    pub network: Value,
    /// `Ref` to the security-group id parameter.
    pub application_security_group: Value,
}

/// Declares the resources of an application unit.
pub trait ApplicationBody {
    /// Called once the unit exists and its inputs have been imported.
    ///
    /// # Errors
    ///
    /// Any error aborts the description.
    fn describe(
        &self,
        app: &mut App,
        unit: Scope,
        inputs: &ApplicationInputs<'_>,
        imported: &ImportedInputs,
    ) -> Result<()>;
}

/// A body that declares nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyBody;

impl ApplicationBody for EmptyBody {
    fn describe(
        &self,
        _app: &mut App,
        _unit: Scope,
        _inputs: &ApplicationInputs<'_>,
        _imported: &ImportedInputs,
    ) -> Result<()> {
        Ok(())
    }
}

/// A described application unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationUnit {
    scope: Scope,
    imported: ImportedInputs,
}

impl ApplicationUnit {
    /// Describes the application unit with an empty body.
    ///
    /// # Errors
    ///
    /// See [`ApplicationUnit::with_body`].
    pub fn new(app: &mut App, parent: Scope, id: &str, inputs: &ApplicationInputs<'_>) -> Result<Self> {
        Self::with_body(app, parent, id, inputs, &EmptyBody)
    }

    /// Describes the application unit and runs `body` inside it.
    ///
    /// # Errors
    ///
    /// Returns a contract-mismatch error if the inputs were not minted by
    /// `app`, reference the wrong kind of resource, or the security group is
    /// attached to another network. Errors from `body` are passed through.
    pub fn with_body(
        app: &mut App,
        parent: Scope,
        id: &str,
        inputs: &ApplicationInputs<'_>,
        body: &dyn ApplicationBody,
    ) -> Result<Self> {
        let consumer = format!("{}/{id}", app.path(parent));
        check_contract(app, &consumer, inputs)?;

        let scope = app.add_nested_stack(parent, id)?;
        let imported = ImportedInputs {
            network: app.import(scope, inputs.network.network())?,
            application_security_group: app.import_attribute(
                scope,
                inputs.application_security_group.security_group(),
                "GroupId",
            )?,
        };
        tracing::info!(
            unit = %app.path(scope),
            network = %inputs.network.network(),
            security_group = %inputs.application_security_group.security_group(),
            "described application unit"
        );
        body.describe(app, scope, inputs, &imported)?;
        Ok(Self { scope, imported })
    }

    /// Scope of the unit.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// Tokens of the imported inputs.
    #[must_use]
    pub const fn imported(&self) -> &ImportedInputs {
        &self.imported
    }
}

fn check_contract(app: &App, consumer: &str, inputs: &ApplicationInputs<'_>) -> Result<()> {
    let network = inputs.network;
    let sg = inputs.application_security_group;

    let mut owned = vec![network.network(), sg.security_group(), sg.attached_network()];
    owned.extend(network.public_subnets());
    owned.extend(network.private_subnets());
    owned.extend(network.isolated_subnets());
    if let Some(foreign) = owned.into_iter().find(|r| !app.owns(r)) {
        return Err(TopologyError::contract(
            consumer,
            format!("{foreign} was not declared in this composition context"),
        ));
    }

    expect_kind(consumer, "network", network.network(), ResourceKind::Vpc)?;
    expect_kind(
        consumer,
        "applicationSecurityGroup",
        sg.security_group(),
        ResourceKind::SecurityGroup,
    )?;
    if sg.attached_network() != network.network() {
        return Err(TopologyError::contract(
            consumer,
            format!(
                "security group {} is attached to {}, not to {}",
                sg.security_group(),
                sg.attached_network(),
                network.network()
            ),
        ));
    }
    Ok(())
}

fn expect_kind(consumer: &str, input: &str, reference: &ResourceRef, kind: ResourceKind) -> Result<()> {
    if reference.kind() == kind {
        Ok(())
    } else {
        Err(TopologyError::contract(
            consumer,
            format!("input {input} must reference a {kind}, got {}", reference.kind()),
        ))
    }
}
