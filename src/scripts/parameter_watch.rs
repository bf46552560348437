use anyhow::{bail, Context};
use serde::Deserialize;
use std::time::Duration;

use crate::events::WaitOutcome;
use crate::scripting::{Script, ScriptManager};

#[derive(Debug, Clone, Deserialize)]
struct WatchConfig {
    parameter: String,
    /// Raised with qualifier `below-threshold` when a sample drops under `threshold`
    event: String,
    threshold: f64,
    #[serde(default = "default_samples")]
    samples: usize,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

fn default_samples() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            parameter: "/sys/power/bus_voltage".to_string(),
            event: "/sys/power/undervoltage".to_string(),
            threshold: 26.0,
            samples: default_samples(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Watches a parameter and raises an event whenever it falls below a threshold
#[derive(Default)]
pub struct ParameterWatchScript {
    config: WatchConfig,
}

impl Script for ParameterWatchScript {
    fn id(&self) -> &'static str {
        "parameter_watch"
    }

    fn name(&self) -> &'static str {
        "Parameter Watch"
    }

    fn description(&self) -> &'static str {
        "Raises an event when a parameter drops below a threshold"
    }

    fn configure(&mut self, config: &toml::Value) -> anyhow::Result<()> {
        self.config = config
            .clone()
            .try_into()
            .context("invalid parameter_watch config")?;
        Ok(())
    }

    fn run(&mut self, manager: &dyn ScriptManager) -> anyhow::Result<()> {
        let config = &self.config;
        let timeout = Duration::from_secs(config.timeout_secs);

        for _ in 0..config.samples {
            let sample = match manager.wait_for_parameter(&config.parameter, timeout)? {
                WaitOutcome::Received(sample) => sample,
                WaitOutcome::TimedOut => {
                    manager.warning(&format!(
                        "no sample for {} within {}s",
                        config.parameter, config.timeout_secs
                    ))?;
                    continue;
                }
                WaitOutcome::Cancelled => bail!("watch of {} cancelled", config.parameter),
            };

            let Some(value) = sample.value.as_f64() else {
                manager.warning(&format!("{} is not numeric: {}", config.parameter, sample.value))?;
                continue;
            };

            if sample.valid && value < config.threshold {
                manager.raise_event(
                    &config.event,
                    Some("below-threshold".to_string()),
                    Some(format!("{} = {} < {}", config.parameter, value, config.threshold)),
                )?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityId, ParameterSample, Value};
    use crate::scripting::MockScriptManager;

    fn script() -> ParameterWatchScript {
        let mut script = ParameterWatchScript::default();
        script
            .configure(
                &toml::from_str(
                    r#"
                    parameter = "/sys/power/voltage"
                    event = "/sys/power/low"
                    threshold = 27.0
                    samples = 3
                    "#,
                )
                .unwrap(),
            )
            .unwrap();
        script
    }

    #[test]
    fn test_raises_only_below_threshold() {
        let mut outcomes = vec![
            WaitOutcome::Received(ParameterSample::new(EntityId::new(0), Value::Real(28.0))),
            WaitOutcome::Received(ParameterSample::new(EntityId::new(0), Value::Real(26.5))),
            WaitOutcome::TimedOut,
        ]
        .into_iter();

        let mut mock = MockScriptManager::new();
        mock.expect_wait_for_parameter()
            .withf(|path, timeout| {
                path == "/sys/power/voltage" && *timeout == Duration::from_secs(60)
            })
            .times(3)
            .returning(move |_, _| Ok(outcomes.next().unwrap_or(WaitOutcome::TimedOut)));
        mock.expect_raise_event()
            .withf(|path, qualifier, report| {
                path == "/sys/power/low"
                    && qualifier.as_deref() == Some("below-threshold")
                    && report.as_deref().is_some_and(|r| r.contains("26.5"))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        mock.expect_warning().times(1).returning(|_| Ok(()));

        script().run(&mock).unwrap();
    }

    #[test]
    fn test_cancelled_wait_stops_script() {
        let mut mock = MockScriptManager::new();
        mock.expect_wait_for_parameter()
            .times(1)
            .returning(|_, _| Ok(WaitOutcome::Cancelled));
        mock.expect_raise_event().never();

        assert!(script().run(&mock).is_err());
    }

    #[test]
    fn test_missing_field_rejected() {
        let mut script = ParameterWatchScript::default();
        let err = script
            .configure(&toml::from_str("parameter = \"/x\"").unwrap())
            .unwrap_err();
        assert!(format!("{:#}", err).contains("invalid parameter_watch config"));
    }
}
