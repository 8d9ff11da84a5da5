//! Narrow typed error for the one place a caller might want to match on failure kind
//! instead of treating it as an opaque `anyhow::Error`. Everything else in the crate
//! propagates through `anyhow`.

use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(reason) => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_message_names_the_failure_kind() {
        assert!(ConfigError::Invalid("bad hz".into()).to_string().contains("invalid"));
    }
}
