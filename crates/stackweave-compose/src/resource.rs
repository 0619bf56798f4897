//! Resource kinds and opaque resource references.

use std::fmt;

use serde_json::{Value, json};
use stackweave_common::types::LogicalId;

use crate::construct::NodeId;

/// Kinds of resources a topology can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Virtual network.
    Vpc,
    /// Subnet of a virtual network.
    Subnet,
    /// Route table attached to one subnet.
    RouteTable,
    /// Association of a subnet with its route table.
    SubnetRouteTableAssociation,
    /// A route in a route table.
    Route,
    /// Internet gateway.
    InternetGateway,
    /// Attachment of a gateway to a network.
    VpcGatewayAttachment,
    /// Elastic IP address.
    Eip,
    /// NAT gateway.
    NatGateway,
    /// Security group.
    SecurityGroup,
    /// Any other engine resource type.
    Other(&'static str),
}

impl ResourceKind {
    /// Engine type name.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Vpc => "AWS::EC2::VPC",
            Self::Subnet => "AWS::EC2::Subnet",
            Self::RouteTable => "AWS::EC2::RouteTable",
            Self::SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            Self::Route => "AWS::EC2::Route",
            Self::InternetGateway => "AWS::EC2::InternetGateway",
            Self::VpcGatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            Self::Eip => "AWS::EC2::EIP",
            Self::NatGateway => "AWS::EC2::NatGateway",
            Self::SecurityGroup => "AWS::EC2::SecurityGroup",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Opaque reference to a declared resource.
///
/// Only [`App`](crate::context::App) mints these; there is no public
/// constructor, so consumers cannot rebuild a reference from primitive
/// data. Inside its own unit a reference renders as a `Ref` token; other
/// units must go through [`App::import`](crate::context::App::import).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub(crate) context: u64,
    pub(crate) node: NodeId,
    pub(crate) unit: NodeId,
    pub(crate) kind: ResourceKind,
    pub(crate) logical_id: LogicalId,
    pub(crate) path: String,
}

impl ResourceRef {
    /// Kind of the referenced resource.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Logical id inside the owning unit's template.
    #[must_use]
    pub const fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// Construct path of the resource.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `{"Ref": ...}` token, valid only inside the owning unit.
    #[must_use]
    pub fn ref_token(&self) -> Value {
        json!({ "Ref": self.logical_id })
    }

    /// `{"Fn::GetAtt": [...]}` token, valid only inside the owning unit.
    #[must_use]
    pub fn get_att(&self, attribute: &str) -> Value {
        json!({ "Fn::GetAtt": [self.logical_id, attribute] })
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.kind)
    }
}
