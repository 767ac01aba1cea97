//! Configuration for schedulers, nodes and the prober.

use crate::Error;
use blockstream_utils::serde::{deserialize_duration, serialize_duration};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduling policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Priority,
    Latency,
    #[default]
    PriorityThenLatency,
}

/// Static properties of a block node.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Properties {
    /// Address of the node.
    pub endpoint: String,

    /// Lower values are preferred.
    #[serde(default)]
    pub priority: i32,
}

/// Configuration for the background [crate::Prober].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probes that may wait for the one running.
    pub backlog: usize,

    /// Maximum time to wait for the probed block.
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub timeout: Duration,

    /// How often the driver should call [crate::Prober::schedule].
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub interval: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            backlog: 1,
            timeout: Duration::from_secs(5),
            interval: Duration::from_secs(5),
        }
    }
}

/// Configuration shared by every [crate::Node].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Consecutive stream failures after which a node is marked inactive.
    pub max_subscribe_attempts: usize,

    /// How long an inactive node waits before it may be readmitted.
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub readmit_delay: Duration,

    /// Number of recent latency measurements averaged.
    pub latency_window: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            max_subscribe_attempts: 3,
            readmit_delay: Duration::from_secs(60),
            latency_window: 5,
        }
    }
}

/// Configuration for a [crate::Scheduler].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub kind: Kind,

    /// When processing the previous block took longer than this, the latency of the next block is
    /// not attributed to the node.
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub max_post_processing_latency: Duration,

    /// Minimum time between selecting a node and asking to reschedule.
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub min_reschedule_interval: Duration,

    /// How much slower than another node the current node must be to reschedule.
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub reschedule_latency_threshold: Duration,

    pub probe: ProbeConfig,
    pub node: NodeConfig,
    pub nodes: Vec<Properties>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kind: Kind::default(),
            max_post_processing_latency: Duration::from_secs(1),
            min_reschedule_interval: Duration::from_secs(10),
            reschedule_latency_threshold: Duration::from_secs(1),
            probe: ProbeConfig::default(),
            node: NodeConfig::default(),
            nodes: Vec::new(),
        }
    }
}

impl Config {
    /// Parses a YAML document. Missing fields take their default values.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.kind, Kind::PriorityThenLatency);
        assert_eq!(config.probe.backlog, 1);
        assert_eq!(config.node.latency_window, 5);
    }

    #[test]
    fn test_full() {
        let yaml = r#"
kind: latency
max_post_processing_latency: 500ms
min_reschedule_interval: 30s
reschedule_latency_threshold: 250ms
probe:
  backlog: 2
  timeout: 3s
  interval: 1m
node:
  max_subscribe_attempts: 5
  readmit_delay: 2m
  latency_window: 10
nodes:
  - endpoint: node-a:40840
    priority: 0
  - endpoint: node-b:40840
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.kind, Kind::Latency);
        assert_eq!(config.max_post_processing_latency, Duration::from_millis(500));
        assert_eq!(config.min_reschedule_interval, Duration::from_secs(30));
        assert_eq!(config.reschedule_latency_threshold, Duration::from_millis(250));
        assert_eq!(
            config.probe,
            ProbeConfig {
                backlog: 2,
                timeout: Duration::from_secs(3),
                interval: Duration::from_secs(60),
            }
        );
        assert_eq!(
            config.node,
            NodeConfig {
                max_subscribe_attempts: 5,
                readmit_delay: Duration::from_secs(120),
                latency_window: 10,
            }
        );
        assert_eq!(
            config.nodes,
            vec![
                Properties {
                    endpoint: "node-a:40840".into(),
                    priority: 0,
                },
                Properties {
                    endpoint: "node-b:40840".into(),
                    priority: 0,
                },
            ]
        );
    }

    #[test]
    fn test_partial_section() {
        let config = Config::from_yaml("probe:\n  backlog: 4\n").unwrap();
        assert_eq!(config.probe.backlog, 4);
        assert_eq!(config.probe.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_round_trip() {
        let config = Config {
            kind: Kind::Priority,
            max_post_processing_latency: Duration::from_millis(1_500),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert_eq!(Config::from_yaml(&yaml).unwrap(), config);
    }

    #[test_case("kind: fastest"; "unknown kind")]
    #[test_case("min_reschedule_interval: 10 fortnights"; "unknown unit")]
    #[test_case("probe:\n  timeout: soon"; "invalid duration")]
    #[test_case("nodes:\n  - priority: 1"; "missing endpoint")]
    fn test_invalid(yaml: &str) {
        assert!(matches!(Config::from_yaml(yaml), Err(Error::Config(_))));
    }
}
