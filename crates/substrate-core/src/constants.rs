//! Shared numeric and naming constants.

/// Tool-result content larger than this is moved to blob storage and
/// replaced in the event payload with a reference.
pub const BLOB_INLINE_THRESHOLD_BYTES: usize = 1024 * 1024;

/// Default page size for paginated listing APIs.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Default SQLite busy-timeout retry budget.
pub const DEFAULT_BUSY_RETRY_ATTEMPTS: u32 = 5;

/// Default broadcast channel capacity for live event fan-out.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Environment variable prefix for settings overrides.
pub const ENV_PREFIX: &str = "SUBSTRATE_";

/// Directory name under `$HOME` holding settings and local state.
pub const HOME_DIR_NAME: &str = ".substrate";
