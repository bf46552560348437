use serde::{Deserialize, Serialize};

use crate::activity::dispatcher::DEFAULT_RETAINED_ACTIVITIES;

fn default_retained() -> usize {
    DEFAULT_RETAINED_ACTIVITIES
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Finished activity instances kept for status queries; older ones are forgotten
    #[serde(default = "default_retained")]
    pub retained: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            retained: default_retained(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retained_default() {
        let config: ActivityConfig = toml::from_str("").unwrap();
        assert_eq!(config.retained, DEFAULT_RETAINED_ACTIVITIES);

        let config: ActivityConfig = toml::from_str("retained = 16").unwrap();
        assert_eq!(config.retained, 16);
    }
}
