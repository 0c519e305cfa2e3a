//! Default constants for builder configuration.
//!
//! All tunables are centralized here.

// =============================================================================
// Job Defaults
// =============================================================================

/// Default job name when none is configured
pub const DEFAULT_JOB_NAME: &str = "spgbuild";

/// Default project id
pub const DEFAULT_PROJECT_ID: i64 = 0;

// =============================================================================
// Batch Processing Defaults
// =============================================================================

/// Default number of records handed to one worker
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Default number of batches processed concurrently.
/// Uses number of CPU cores.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

// =============================================================================
// Backend Defaults
// =============================================================================

/// Default graph-store connection URL
pub const DEFAULT_GRAPH_STORE_URL: &str = "memory://graph";

/// Default search-engine connection URL
pub const DEFAULT_SEARCH_ENGINE_URL: &str = "memory://search";

/// Candidates requested from the search engine per linking/fusing lookup
pub const DEFAULT_SEARCH_TOP_K: usize = 10;

// =============================================================================
// Reasoning Defaults
// =============================================================================

/// Causal (lead-to) reasoning runs after taxonomy reasoning unless disabled
pub const DEFAULT_ENABLE_LEAD_TO: bool = true;
