//! Domain primitive types used across the stackweave workspace.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::constants::LOGICAL_ID_HASH_LEN;
use crate::error::{Result, TopologyError};

/// Path segments left out of the readable part of a logical id.
const HIDDEN_SEGMENTS: [&str; 2] = ["Resource", "Default"];

/// Identifier of a construct, unique within its parent scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstructId(String);

impl ConstructId {
    /// Creates a construct id after checking the naming rules.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::InvalidId`] if the id is empty or contains
    /// characters other than ASCII alphanumerics, `-` and `_`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(TopologyError::InvalidId {
                id,
                reason: "must not be empty",
            });
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TopologyError::InvalidId {
                id,
                reason: "only ASCII alphanumerics, '-' and '_' are allowed",
            });
        }
        Ok(Self(id))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConstructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Template-local name of a resource.
///
/// Derived from the construct path relative to the owning unit: the
/// alphanumeric characters of every path segment except `Resource` and
/// `Default`, followed by a short SHA-256 digest of the full relative path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Computes the logical id for a path relative to its owning unit.
    #[must_use]
    pub fn from_path<S: AsRef<str>>(segments: &[S]) -> Self {
        let human: String = segments
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !HIDDEN_SEGMENTS.contains(s))
            .flat_map(str::chars)
            .filter(char::is_ascii_alphanumeric)
            .collect();
        let joined = segments
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<&str>>()
            .join("/");
        let digest = Sha256::digest(joined.as_bytes());
        let hash: String = digest
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<String>()
            .chars()
            .take(LOGICAL_ID_HASH_LEN)
            .collect();
        Self(format!("{human}{hash}"))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deployment environment a topology is bound to.
///
/// An absent account is legal: the engine resolves it at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Target account, if known at description time.
    pub account: Option<String>,
    /// Target region.
    pub region: String,
}

impl Environment {
    /// Creates an environment descriptor.
    #[must_use]
    pub fn new(account: Option<String>, region: impl Into<String>) -> Self {
        Self {
            account,
            region: region.into(),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(None, crate::constants::DEFAULT_REGION)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.account {
            Some(account) => write!(f, "aws://{account}/{}", self.region),
            None => write!(f, "aws://unknown-account/{}", self.region),
        }
    }
}

/// An availability zone a network may span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AvailabilityZone {
    /// A zone known by name at description time.
    Named(String),
    /// The n-th zone of the region, resolved by the engine.
    Resolved(usize),
}

impl AvailabilityZone {
    /// Short label used in construct ids and log lines.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Named(name) => name.clone(),
            Self::Resolved(index) => format!("az{}", index + 1),
        }
    }
}

impl fmt::Display for AvailabilityZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for AvailabilityZone {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Named(name) => serializer.serialize_str(name),
            Self::Resolved(index) => {
                serde_json::json!({ "Fn::Select": [index, { "Fn::GetAZs": "" }] })
                    .serialize(serializer)
            }
        }
    }
}
