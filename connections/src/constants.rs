// =============================================================================
// User Connections Constants
// =============================================================================
// Central location for the tunables used throughout the crate.

// =============================================================================
// TOKEN GENERATION
// =============================================================================

/// Default length of a connection token
pub const DEFAULT_TOKEN_LENGTH: usize = 20;

/// Upper bound on a requested token length
pub const MAX_TOKEN_LENGTH: usize = 50;

/// How many candidate tokens to try before giving up. A collision in the
/// alphanumeric token space is astronomically unlikely, so hitting this cap
/// means the deployment is misconfigured (e.g. token length 1 on a large
/// table) and the caller gets a hard error instead of a silent spin.
pub const MAX_TOKEN_ATTEMPTS: u32 = 32;

// =============================================================================
// CHOICE PROJECTION
// =============================================================================

/// Synthetic choice token representing the viewing user themselves
pub const SELF_TOKEN: &str = "self";

/// Display label paired with [`SELF_TOKEN`]
pub const SELF_LABEL: &str = "Me";

// =============================================================================
// DATABASE CONFIGURATION
// =============================================================================

/// Default connection pool size if not specified in the environment
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
