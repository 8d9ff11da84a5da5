// src/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::broadcaster::DEFAULT_BROADCAST_HZ;
use crate::error::ConfigError;
use crate::scheduler::DEFAULT_REFRESH_HZ;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: General,
    pub artnet: ArtNetCfg,
    pub output: OutputCfg,
    pub broadcast: BroadcastCfg,
    #[serde(default)]
    pub devices: Vec<DeviceCfg>,
    pub relay: Option<RelayCfg>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: General::default(),
            artnet: ArtNetCfg::default(),
            output: OutputCfg::default(),
            broadcast: BroadcastCfg::default(),
            devices: Vec::new(),
            relay: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct General {
    pub universe_count: u16, // number of DMX universes the merge buffer holds
    #[serde(default)]
    pub json_logs: bool, // structured JSON logs to stdout
    #[serde(default)]
    pub rt_priority: Option<i32>, // SCHED_FIFO priority for the output thread (Linux, best-effort)
}

impl Default for General {
    fn default() -> Self {
        Self {
            universe_count: 4,
            json_logs: false,
            rt_priority: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtNetCfg {
    pub target_ip: String, // e.g. "255.255.255.255" for broadcast
    pub port: u16,
}

impl Default for ArtNetCfg {
    fn default() -> Self {
        Self {
            target_ip: "255.255.255.255".to_string(),
            port: 6454,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputCfg {
    pub hz: f64, // pacing rate of the Art-Net output scheduler
}

impl Default for OutputCfg {
    fn default() -> Self {
        Self { hz: DEFAULT_REFRESH_HZ }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastCfg {
    pub hz: f64, // pacing rate of the dirty-driven state broadcaster
    pub ws_bind: Option<String>, // e.g. "0.0.0.0:9090"; None disables the websocket listener
}

impl Default for BroadcastCfg {
    fn default() -> Self {
        Self {
            hz: DEFAULT_BROADCAST_HZ,
            ws_bind: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCfg {
    pub name: String,
    pub universe: u16,
    #[serde(default)]
    pub kind: DeviceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    #[default]
    Artnet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayCfg {
    pub endpoint: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl AppConfig {
    /// Loads configuration from `path`, falling back to [`Default`] with a warning if the
    /// file does not exist. A file that exists but fails to parse is a fatal error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!("config file {} not found, using defaults", path.display());
            let cfg = Self::default();
            cfg.validate()?;
            return Ok(cfg);
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Fails fast on configuration that would otherwise surface as a confusing runtime
    /// failure deep in the engine (a zero-Hz scheduler that never ticks, a universe count
    /// of zero that silently drops every action).
    pub fn validate(&self) -> Result<()> {
        if self.general.universe_count == 0 {
            return Err(ConfigError::Invalid("general.universe_count must be greater than zero".into()).into());
        }
        if !(self.output.hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "output.hz must be greater than zero, got {}",
                self.output.hz
            ))
            .into());
        }
        if !(self.broadcast.hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "broadcast.hz must be greater than zero, got {}",
                self.broadcast.hz
            ))
            .into());
        }
        if self.artnet.port == 0 {
            return Err(ConfigError::Invalid("artnet.port must be nonzero".into()).into());
        }
        for device in &self.devices {
            if device.universe >= self.general.universe_count {
                return Err(ConfigError::Invalid(format!(
                    "device '{}' targets universe {} but only {} universes are configured",
                    device.name, device.universe, self.general.universe_count
                ))
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_output_hz_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.output.hz = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_universe_count_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.general.universe_count = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn device_targeting_out_of_range_universe_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.devices.push(DeviceCfg {
            name: "spot-1".into(),
            universe: cfg.general.universe_count,
            kind: DeviceKind::Artnet,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_a_minimal_toml_document() {
        let toml_text = r#"
            [general]
            universe_count = 8

            [artnet]
            target_ip = "10.0.0.255"

            [output]
            hz = 40.0

            [broadcast]
            hz = 10.0
        "#;
        let cfg: AppConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(cfg.general.universe_count, 8);
        assert_eq!(cfg.artnet.target_ip, "10.0.0.255");
        assert_eq!(cfg.output.hz, 40.0);
        assert_eq!(cfg.broadcast.hz, 10.0);
        cfg.validate().unwrap();
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let cfg = AppConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.general.universe_count, 4);
        assert_eq!(parsed.artnet.target_ip, "255.255.255.255");
        assert_eq!(parsed.artnet.port, 6454);
        assert_eq!(parsed.output.hz, DEFAULT_REFRESH_HZ);
        assert_eq!(parsed.broadcast.hz, DEFAULT_BROADCAST_HZ);
    }
}
