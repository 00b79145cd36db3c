/// Cryptographic utilities
pub mod crypto_utils;
/// Logging macros
#[macro_use]
#[allow(unused_macros)]
pub mod macro_logger;
/// Logging
pub mod log_utils;
/// Serialization helpers
pub mod ser_util;
#[allow(missing_docs)]
#[cfg(any(test, feature = "test_utils"))]
#[macro_use]
pub mod test_utils;
