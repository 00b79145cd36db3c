/// Network names
pub const NETWORK_NAMES: [&'static str; 4] = ["testnet", "regtest", "signet", "bitcoin"];

/// Default network for script addresses
pub const DEFAULT_NETWORK: &str = "regtest";

/// Default data directory, relative to the home directory
pub const DEFAULT_DIR: &str = ".picopayments";

/// Base name of the log file in the data directory
pub const LOG_NAME: &str = "pico-cli";
