//! Configuration model for a description pass.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ACCOUNT_ENV_VAR, DEFAULT_OUTDIR, DEFAULT_REGION, DEFAULT_ZONE_COUNT, OUTDIR_ENV_VAR,
};
use crate::types::{AvailabilityZone, Environment};

/// Root configuration for describing and synthesizing a topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Environment the root unit is bound to.
    pub environment: Environment,
    /// Directory the assembly is written to.
    pub outdir: PathBuf,
    /// Explicit zone names. When unset the engine resolves
    /// [`DEFAULT_ZONE_COUNT`] zones of the region.
    pub availability_zones: Option<Vec<String>>,
}

impl TopologyConfig {
    /// Builds the configuration from the process environment.
    ///
    /// The account comes from `CDK_DEFAULT_ACCOUNT` (absent is fine) and the
    /// assembly directory from `CDK_OUTDIR`. The region is fixed.
    #[must_use]
    pub fn from_env() -> Self {
        let account = std::env::var(ACCOUNT_ENV_VAR)
            .ok()
            .filter(|a| !a.is_empty());
        let outdir = std::env::var(OUTDIR_ENV_VAR)
            .map_or_else(|_| PathBuf::from(DEFAULT_OUTDIR), PathBuf::from);
        Self {
            environment: Environment::new(account, DEFAULT_REGION),
            outdir,
            availability_zones: None,
        }
    }

    /// Zones available to networks described under this configuration.
    #[must_use]
    pub fn zones(&self) -> Vec<AvailabilityZone> {
        self.availability_zones.as_ref().map_or_else(
            || {
                (0..DEFAULT_ZONE_COUNT)
                    .map(AvailabilityZone::Resolved)
                    .collect()
            },
            |names| {
                names
                    .iter()
                    .cloned()
                    .map(AvailabilityZone::Named)
                    .collect()
            },
        )
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            outdir: PathBuf::from(DEFAULT_OUTDIR),
            availability_zones: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_fixed_region() {
        let config = TopologyConfig::default();
        assert_eq!(config.environment.region, "us-west-2");
        assert!(config.environment.account.is_none());
    }

    #[test]
    fn default_zones_are_engine_resolved() {
        let zones = TopologyConfig::default().zones();
        assert_eq!(
            zones,
            vec![AvailabilityZone::Resolved(0), AvailabilityZone::Resolved(1)]
        );
    }

    #[test]
    fn explicit_zones_are_named() {
        let config = TopologyConfig {
            availability_zones: Some(vec!["us-west-2a".into(), "us-west-2b".into()]),
            ..TopologyConfig::default()
        };
        assert_eq!(config.zones()[1], AvailabilityZone::Named("us-west-2b".into()));
    }
}
