//! Fixed names and defaults.

/// Region every topology is bound to.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Environment variable the engine's runner sets with the target account.
pub const ACCOUNT_ENV_VAR: &str = "CDK_DEFAULT_ACCOUNT";

/// Environment variable the engine's runner sets with the assembly directory.
pub const OUTDIR_ENV_VAR: &str = "CDK_OUTDIR";

/// Assembly directory used when [`OUTDIR_ENV_VAR`] is unset.
pub const DEFAULT_OUTDIR: &str = "stackweave.out";

/// Identifier of the root unit.
pub const ROOT_STACK_ID: &str = "root-stack";

/// Identifier of the network unit under the root.
pub const NETWORK_UNIT_ID: &str = "base-resources";

/// Identifier of the application unit under the root.
pub const APPLICATION_UNIT_ID: &str = "app-resources";

/// Number of zones the engine resolves when no explicit list is configured.
pub const DEFAULT_ZONE_COUNT: usize = 2;

/// File name of the assembly manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Suffix of per-unit template files.
pub const TEMPLATE_SUFFIX: &str = ".template.json";

/// Number of hex characters appended to logical ids.
pub const LOGICAL_ID_HASH_LEN: usize = 8;

/// Application name used in CLI output.
pub const APP_NAME: &str = "stackweave";
