use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::events::ParameterWakePolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// When `wait_for_parameter` callers are woken
    #[serde(default)]
    pub parameter_wake: ParameterWakePolicy,

    /// Upper bound applied to every script wait; unbounded when absent
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
}

impl WaitConfig {
    /// Clamp a script-supplied timeout to the configured maximum
    pub fn clamp(&self, timeout: Duration) -> Duration {
        match self.max_wait_secs {
            Some(secs) => timeout.min(Duration::from_secs(secs)),
            None => timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp() {
        let unbounded = WaitConfig::default();
        assert_eq!(
            unbounded.clamp(Duration::from_secs(3600)),
            Duration::from_secs(3600)
        );

        let bounded = WaitConfig {
            max_wait_secs: Some(10),
            ..WaitConfig::default()
        };
        assert_eq!(
            bounded.clamp(Duration::from_secs(3600)),
            Duration::from_secs(10)
        );
        assert_eq!(
            bounded.clamp(Duration::from_secs(2)),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_parse_policy() {
        let config: WaitConfig = toml::from_str("parameter_wake = \"value_change\"").unwrap();
        assert_eq!(config.parameter_wake, ParameterWakePolicy::ValueChange);
        assert_eq!(config.max_wait_secs, None);
    }
}
