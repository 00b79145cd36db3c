use log::LevelFilter;
use picopayments::util::log_utils::parse_log_level_filter;
use std::env;

/// The deployment environment, `DEVELOPMENT` if unset
pub fn deployment_environment() -> String {
    env::var("DEPLOYMENT_ENV").unwrap_or("DEVELOPMENT".to_string())
}

/// The log level from `PICO_LOG_LEVEL`, if set and valid
pub fn log_level() -> Option<LevelFilter> {
    let level = env::var("PICO_LOG_LEVEL").ok()?;
    match parse_log_level_filter(level) {
        Ok(filter) => Some(filter),
        Err(e) => {
            eprintln!("ignoring PICO_LOG_LEVEL: {}", e);
            None
        }
    }
}

/// Compare environment variable to a value
pub fn compare_env_var(key: &str, value: &str) -> bool {
    match env::var(key) {
        Ok(val) => val == value,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // env vars are process-wide, so everything touching them is in one test
    #[test]
    fn env_var_test() {
        env::remove_var("DEPLOYMENT_ENV");
        assert_eq!(deployment_environment(), "DEVELOPMENT");
        env::set_var("DEPLOYMENT_ENV", "PRODUCTION");
        assert_eq!(deployment_environment(), "PRODUCTION");
        assert!(compare_env_var("DEPLOYMENT_ENV", "PRODUCTION"));
        assert!(!compare_env_var("DEPLOYMENT_ENV", "STAGING"));
        env::remove_var("DEPLOYMENT_ENV");
        assert!(!compare_env_var("DEPLOYMENT_ENV", "PRODUCTION"));

        env::set_var("PICO_LOG_LEVEL", "debug");
        assert_eq!(log_level(), Some(LevelFilter::Debug));
        env::set_var("PICO_LOG_LEVEL", "chatty");
        assert_eq!(log_level(), None);
        env::remove_var("PICO_LOG_LEVEL");
        assert_eq!(log_level(), None);
    }
}
