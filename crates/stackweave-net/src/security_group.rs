//! Security-group rules: protocols, ports, peers, and ordered rule sets.

use std::fmt;

use serde::Serialize;
use stackweave_common::error::{Result, TopologyError};

use crate::cidr::Ipv4Cidr;

/// IP protocol matched by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Protocol {
    /// Transmission Control Protocol.
    Tcp,
    /// User Datagram Protocol.
    Udp,
    /// Every protocol.
    All,
}

impl Protocol {
    /// Protocol identifier as the engine expects it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::All => "-1",
        }
    }
}

/// A protocol and port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Port {
    protocol: Protocol,
    range: Option<(u16, u16)>,
}

impl Port {
    /// A single TCP port.
    #[must_use]
    pub const fn tcp(port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            range: Some((port, port)),
        }
    }

    /// A single UDP port.
    #[must_use]
    pub const fn udp(port: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            range: Some((port, port)),
        }
    }

    /// An inclusive TCP port range.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `from > to`.
    pub fn tcp_range(from: u16, to: u16) -> Result<Self> {
        if from > to {
            return Err(TopologyError::config(format!(
                "invalid port range {from}-{to}"
            )));
        }
        Ok(Self {
            protocol: Protocol::Tcp,
            range: Some((from, to)),
        })
    }

    /// Every protocol on every port.
    #[must_use]
    pub const fn all_traffic() -> Self {
        Self {
            protocol: Protocol::All,
            range: None,
        }
    }

    /// Matched protocol.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// First port of the range, if the protocol has ports.
    #[must_use]
    pub const fn from_port(&self) -> Option<u16> {
        match self.range {
            Some((from, _)) => Some(from),
            None => None,
        }
    }

    /// Last port of the range, if the protocol has ports.
    #[must_use]
    pub const fn to_port(&self) -> Option<u16> {
        match self.range {
            Some((_, to)) => Some(to),
            None => None,
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.protocol, self.range) {
            (Protocol::All, _) | (_, None) => f.write_str("ALL TRAFFIC"),
            (Protocol::Udp, Some((from, to))) if from == to => write!(f, "UDP {from}"),
            (Protocol::Udp, Some((from, to))) => write!(f, "UDP {from}-{to}"),
            (Protocol::Tcp, Some((from, to))) if from == to => write!(f, "{from}"),
            (Protocol::Tcp, Some((from, to))) => write!(f, "{from}-{to}"),
        }
    }
}

/// Source (ingress) or destination (egress) of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Peer {
    /// `0.0.0.0/0`.
    AnyIpv4,
    /// A specific IPv4 block.
    Ipv4(Ipv4Cidr),
}

impl Peer {
    /// Peer for a CIDR string.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the CIDR is malformed.
    pub fn ipv4(cidr: &str) -> Result<Self> {
        Ok(Self::Ipv4(cidr.parse()?))
    }

    /// CIDR notation of the peer.
    #[must_use]
    pub fn cidr(&self) -> String {
        match self {
            Self::AnyIpv4 => "0.0.0.0/0".into(),
            Self::Ipv4(block) => block.to_string(),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cidr())
    }
}

/// A single traffic rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Rule {
    /// Source or destination.
    pub peer: Peer,
    /// Protocol and ports.
    pub port: Port,
    /// Human-readable description.
    pub description: String,
}

/// Insertion-ordered set of rules; re-adding an equal rule is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Adds a rule unless an equal peer/port pair is already present.
    ///
    /// Returns whether the rule was added.
    pub fn add(&mut self, peer: Peer, port: Port, description: Option<String>) -> bool {
        if self
            .rules
            .iter()
            .any(|r| r.peer == peer && r.port == port)
        {
            tracing::debug!(%peer, %port, "ignoring duplicate rule");
            return false;
        }
        let description = description.unwrap_or_else(|| format!("from {peer}:{port}"));
        self.rules.push(Rule {
            peer,
            port,
            description,
        });
        true
    }

    /// Rules in insertion order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Properties of a security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityGroupProps {
    /// Physical group name; the engine generates one when unset.
    pub name: Option<String>,
    /// Group description; defaults to the construct path.
    pub description: Option<String>,
    /// Whether all outbound traffic is allowed.
    pub allow_all_outbound: bool,
    /// Inbound rules.
    pub ingress: RuleSet,
}

impl SecurityGroupProps {
    /// Group with the given physical name, outbound allowed, no ingress.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: None,
            allow_all_outbound: true,
            ingress: RuleSet::default(),
        }
    }

    /// Adds an inbound rule; see [`RuleSet::add`].
    pub fn add_ingress_rule(&mut self, peer: Peer, port: Port, description: Option<String>) -> bool {
        self.ingress.add(peer, port, description)
    }

    /// Outbound rules implied by the properties.
    #[must_use]
    pub fn egress(&self) -> RuleSet {
        let mut egress = RuleSet::default();
        if self.allow_all_outbound {
            let _ = egress.add(
                Peer::AnyIpv4,
                Port::all_traffic(),
                Some("Allow all outbound traffic by default".into()),
            );
        }
        egress
    }

    /// Checks the physical name against the engine's naming rules.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is empty, longer than 255
    /// characters, or starts with `sg-`.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.is_empty() || name.len() > 255 {
                return Err(TopologyError::config(format!(
                    "security group name \"{name}\" must be 1-255 characters"
                )));
            }
            if name.starts_with("sg-") {
                return Err(TopologyError::config(format!(
                    "security group name \"{name}\" must not start with \"sg-\""
                )));
            }
        }
        Ok(())
    }
}
