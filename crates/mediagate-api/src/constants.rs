/// Prefix of every versioned route.
pub const API_PREFIX: &str = "/api/v1";

/// JSON bodies are small; the file bytes go straight to object storage.
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

pub const REQUEST_TIMEOUT_SECONDS: u64 = 60;
