use std::env;
use std::str::FromStr;

use super::ServiceConfig;
use super::merge::merge_config;
use super::utils::parse_bool;

/// Reads a variable, treating empty values as unset.
pub(super) fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Reads and parses a variable.
///
/// # Errors
/// Returns an error naming the variable if it is set but does not parse.
pub(super) fn env_parse<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {name} environment variable: {e}").into()),
        None => Ok(None),
    }
}

/// Reads a boolean variable using [`parse_bool`].
pub(super) fn env_bool(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match env_string(name) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid {name} environment variable: {raw:?}").into()),
        None => Ok(None),
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    ///
    /// Reads configuration from environment variables, with defaults for
    /// everything unset. The `.env` file is loaded by the binary at startup,
    /// so its values are visible here as ordinary variables.
    ///
    /// # Errors
    /// Returns an error if a variable is malformed or the resulting
    /// configuration fails validation.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = merge_config(None)?;
        config.validate()?;
        Ok(config)
    }
}
