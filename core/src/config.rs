use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables consumed directly by the core's services and background sweeps.
/// Parsing these out of a config file or environment is left to the
/// integrator; this struct only carries the parsed values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    #[serde(with = "humantime_serde_duration")]
    pub lock_default_ttl: Duration,
    #[serde(with = "humantime_serde_duration")]
    pub lock_refresh_threshold: Duration,
    #[serde(with = "humantime_serde_duration")]
    pub task_timeout_sweep_interval: Duration,
    #[serde(with = "humantime_serde_duration")]
    pub workflow_metrics_refresh_interval: Duration,
    pub max_subtasks_per_task: u32,
    pub max_steps_per_workflow: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            lock_default_ttl: Duration::from_secs(300),
            lock_refresh_threshold: Duration::from_secs(30),
            task_timeout_sweep_interval: Duration::from_secs(30),
            workflow_metrics_refresh_interval: Duration::from_secs(60),
            max_subtasks_per_task: 1024,
            max_steps_per_workflow: 256,
        }
    }
}

/// Minimal `Duration <-> seconds` (de)serializer so `CoreConfig` stays
/// dependency-light; avoids pulling in a whole humantime crate for six
/// fields.
mod humantime_serde_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CoreConfig::default();
        assert_eq!(config.lock_default_ttl, Duration::from_secs(300));
        assert_eq!(config.lock_refresh_threshold, Duration::from_secs(30));
        assert_eq!(config.max_subtasks_per_task, 1024);
        assert_eq!(config.max_steps_per_workflow, 256);
    }

    #[test]
    fn round_trips_through_json() {
        let config = CoreConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: CoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
