pub const APP_NAME: &str = "shelf";

/// Metadata key holding the comma-joined owner set.
pub const PRODUCT_META_KEY: &str = "rh-products";

/// Metadata key holding the lowercase hex content digest.
pub const CHECKSUM_META_KEY: &str = "checksum";

pub const OWNER_DELIMITER: char = ',';

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "SHELF_CONFIG";

pub const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_PARALLELISM: usize = 8;

pub const DEFAULT_CONFLICT_RETRIES: u32 = 5;

pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 10;

pub const DEFAULT_REGION: &str = "us-east-1";
