use std::time::Duration;

use thiserror::Error;

pub const ENV_COUNTERPARTY_TIMEOUT_MS: &str = "ACCORD_COUNTERPARTY_TIMEOUT_MS";
pub const ENV_NOTARY_TIMEOUT_MS: &str = "ACCORD_NOTARY_TIMEOUT_MS";
pub const ENV_MAX_ACCEPTED_FUND_VALUE: &str = "ACCORD_MAX_ACCEPTED_FUND_VALUE";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// What a counterparty is willing to sign beyond what the rule table allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptancePolicy {
    /// Largest fund value this node will countersign; `None` accepts any.
    pub max_fund_value: Option<i64>,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            max_fund_value: Some(100_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// How long to wait for each counterparty's signature.
    pub counterparty_timeout: Duration,
    /// How long to wait for the notary's verdict.
    pub notary_timeout: Duration,
    pub inbox_capacity: usize,
    pub acceptance: AcceptancePolicy,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            counterparty_timeout: Duration::from_secs(30),
            notary_timeout: Duration::from_secs(30),
            inbox_capacity: 64,
            acceptance: AcceptancePolicy::default(),
        }
    }
}

impl NodeConfig {
    /// Defaults overridden by `ACCORD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`NodeConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_COUNTERPARTY_TIMEOUT_MS) {
            config.counterparty_timeout = parse_millis(ENV_COUNTERPARTY_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_NOTARY_TIMEOUT_MS) {
            config.notary_timeout = parse_millis(ENV_NOTARY_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_ACCEPTED_FUND_VALUE) {
            config.acceptance.max_fund_value = parse_limit(ENV_MAX_ACCEPTED_FUND_VALUE, &value)?;
        }
        Ok(config)
    }
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_millis(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let millis: u64 = value.trim().parse().map_err(|e| invalid(var, value, e))?;
    if millis == 0 {
        return Err(invalid(var, value, "timeout must be positive"));
    }
    Ok(Duration::from_millis(millis))
}

fn parse_limit(var: &'static str, value: &str) -> Result<Option<i64>, ConfigError> {
    match value.trim() {
        "none" | "off" | "" => Ok(None),
        other => other.parse().map(Some).map_err(|e| invalid(var, value, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = NodeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.counterparty_timeout, Duration::from_secs(30));
        assert_eq!(config.notary_timeout, Duration::from_secs(30));
        assert_eq!(config.inbox_capacity, 64);
        assert_eq!(config.acceptance.max_fund_value, Some(100_000));
    }

    #[test]
    fn overrides_are_applied() {
        let config = NodeConfig::from_lookup(lookup(&[
            (ENV_COUNTERPARTY_TIMEOUT_MS, "250"),
            (ENV_NOTARY_TIMEOUT_MS, "1500"),
            (ENV_MAX_ACCEPTED_FUND_VALUE, "none"),
        ]))
        .unwrap();
        assert_eq!(config.counterparty_timeout, Duration::from_millis(250));
        assert_eq!(config.notary_timeout, Duration::from_millis(1500));
        assert_eq!(config.acceptance.max_fund_value, None);
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = NodeConfig::from_lookup(lookup(&[(ENV_NOTARY_TIMEOUT_MS, "soon")])).unwrap_err();
        let ConfigError::Invalid { var, .. } = err;
        assert_eq!(var, ENV_NOTARY_TIMEOUT_MS);
        assert!(NodeConfig::from_lookup(lookup(&[(ENV_COUNTERPARTY_TIMEOUT_MS, "0")])).is_err());
    }
}
