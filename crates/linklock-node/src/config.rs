use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSettings,
    pub gate: GateConfig,
    pub api: ApiConfig,
    pub geo: GeoConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Seconds the advertiser page must stay open before a started task
    /// auto-completes.
    pub dwell_secs: u64,
    /// Whether a visit with zero eligible tasks opens as an immediate free
    /// unlock (original behavior) or is rejected at open time.
    pub allow_empty_gate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Country assumed when the lookup fails or no address is available.
    /// Gating degrades to this rather than blocking the visit.
    pub fallback_country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeSettings {
                name: "linklock-node".to_string(),
            },
            gate: GateConfig {
                dwell_secs: 60,
                allow_empty_gate: true,
            },
            api: ApiConfig {
                enabled: true,
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            geo: GeoConfig {
                endpoint: "https://ipapi.co".to_string(),
                timeout_secs: 3,
                fallback_country: "US".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trip() {
        let config = NodeConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: NodeConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.gate.dwell_secs, 60);
        assert!(parsed.gate.allow_empty_gate);
        assert_eq!(parsed.geo.fallback_country, "US");
        assert_eq!(parsed.api.port, 8080);
    }
}
