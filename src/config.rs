use crate::error::Error;
use serde::Deserialize;
use std::path::Path;

/// Capacity limits for one session.
///
/// Every limit is enforced with an explicit `Error::Capacity` rather than by
/// overwriting or truncating.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Deepest nesting of rule matches while parsing.
    pub max_parse_depth: usize,
    /// Deepest stack of saved lexer positions while backtracking.
    pub max_backtrack: usize,
    /// Total symbols across all scopes.
    pub max_symbols: usize,
    pub max_scopes: usize,
    pub max_call_depth: usize,
    pub max_operands: usize,
    /// Longest single token, in bytes.
    pub max_token_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_parse_depth: 200,
            max_backtrack: 512,
            max_symbols: 1024,
            max_scopes: 256,
            max_call_depth: 64,
            max_operands: 256,
            max_token_len: 256,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = Config::from_json(r#"{ "max_call_depth": 4 }"#).unwrap();
        assert_eq!(config.max_call_depth, 4);
        assert_eq!(config.max_operands, Config::default().max_operands);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(Config::from_json(r#"{ "max_stack": 4 }"#).is_err());
    }
}
