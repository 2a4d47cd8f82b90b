use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ip::math::GatewayPolicy;

/// Default bound on the number of free addresses listed per pool
pub const DEFAULT_FREE_SAMPLE_LIMIT: usize = 100;

/// How a pool is exposed by the virtualization platform
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolKind {
    /// Platform IP space (allocations listed per space)
    #[serde(rename = "ipSpace")]
    IpSpace,
    /// External network (used addresses listed per network)
    #[serde(rename = "externalNetwork")]
    ExternalNetwork,
}

/// Top-level configuration: report settings plus every cloud and its pools
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub report: ReportConfig,
    pub clouds: BTreeMap<String, CloudConfig>,
}

impl Config {
    /// Validate the configuration
    ///
    /// Only whole-file problems are rejected here. Individual pools (names,
    /// networks) are checked when the registry is built, where a bad pool is
    /// dropped with a warning rather than failing the whole configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.report.free_sample_limit == 0 {
            return Err(ValidationError::InvalidReport(
                "free_sample_limit must be at least 1".to_string(),
            ));
        }

        if self.clouds.is_empty() {
            return Err(ValidationError::InvalidCloud(
                "at least one cloud must be configured".to_string(),
            ));
        }

        if self.clouds.keys().any(|id| id.trim().is_empty()) {
            return Err(ValidationError::InvalidCloud(
                "cloud id cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Cloud ids in the order every report iterates them
    pub fn cloud_ids(&self) -> impl Iterator<Item = &str> {
        self.clouds.keys().map(String::as_str)
    }
}

/// Report generation settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReportConfig {
    #[serde(default = "default_free_sample_limit")]
    pub free_sample_limit: usize,
    #[serde(default)]
    pub gateway_policy: GatewayPolicy,
}

fn default_free_sample_limit() -> usize {
    DEFAULT_FREE_SAMPLE_LIMIT
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            free_sample_limit: DEFAULT_FREE_SAMPLE_LIMIT,
            gateway_policy: GatewayPolicy::default(),
        }
    }
}

/// One cloud tenancy
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CloudConfig {
    /// Connection details for the external collector, never read by the core
    #[serde(default, skip_serializing_if = "serde_yaml::Value::is_null")]
    pub connection: serde_yaml::Value,
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

/// A configured address pool, exactly as written in the file
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PoolConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub network: String,
    #[serde(rename = "type")]
    pub kind: PoolKind,
    #[serde(default)]
    pub shared_with: Vec<String>,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid cloud configuration: {0}")]
    InvalidCloud(String),
    #[error("Invalid report configuration: {0}")]
    InvalidReport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
report:
  free_sample_limit: 50
clouds:
  vcd:
    connection:
      url: "https://vcd.example"
      api_version: "38.0"
    pools:
      - id: "urn:vcloud:ipSpace:1"
        name: "87.255.215.0/24"
        network: "87.255.215.0/24"
        type: ipSpace
        shared_with: ["vcd02"]
  vcd02:
    pools:
      - id: "urn:vcloud:network:2"
        name: "ExtNet-87.255.215.0m24-INTERNET"
        network: "87.255.215.0/24"
        type: externalNetwork
"#;

    #[test]
    fn test_parse_config() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.report.free_sample_limit, 50);
        assert_eq!(config.report.gateway_policy, GatewayPolicy::FirstHost);
        assert_eq!(config.cloud_ids().collect::<Vec<_>>(), vec!["vcd", "vcd02"]);

        let vcd = &config.clouds["vcd"];
        assert_eq!(vcd.pools[0].kind, PoolKind::IpSpace);
        assert_eq!(vcd.pools[0].shared_with, vec!["vcd02".to_string()]);
        assert!(!vcd.connection.is_null());

        let vcd02 = &config.clouds["vcd02"];
        assert_eq!(vcd02.pools[0].kind, PoolKind::ExternalNetwork);
        assert!(vcd02.pools[0].shared_with.is_empty());
        assert!(vcd02.connection.is_null());
    }

    #[test]
    fn test_report_defaults() {
        let yaml = r#"
clouds:
  vcd:
    pools: []
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.report, ReportConfig::default());
        assert_eq!(config.report.free_sample_limit, DEFAULT_FREE_SAMPLE_LIMIT);
    }

    #[test]
    fn test_gateway_policy_override() {
        let yaml = r#"
report:
  gateway_policy: none
clouds:
  vcd:
    pools: []
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.report.gateway_policy, GatewayPolicy::None);
    }

    #[test]
    fn test_pool_level_problems_are_not_validation_errors() {
        let yaml = r#"
clouds:
  vcd:
    pools:
      - name: "a"
        network: "10.0.0.0/24"
        type: ipSpace
      - name: "a"
        network: "10.0.1.0/24"
        type: ipSpace
      - name: ""
        network: "10.0.2.0/24"
        type: ipSpace
  vcd02:
    pools: []
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_clouds_and_zero_sample() {
        let config: Config = serde_yaml::from_str("clouds: {}").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidCloud(_))
        ));

        let yaml = r#"
report:
  free_sample_limit: 0
clouds:
  vcd:
    pools: []
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidReport(_))
        ));
    }

    #[test]
    fn test_invalid_cidr_is_not_a_validation_error() {
        let yaml = r#"
clouds:
  vcd:
    pools:
      - name: "broken"
        network: "not-a-network"
        type: externalNetwork
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
    }
}
