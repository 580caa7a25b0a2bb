use anyhow::{Context, Result};
use probe::{SimulationProfile, StageKind};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "wizard.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ServerConfig {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub sni: Option<String>,
}

/// Per-stage overrides of the simulated probe profiles.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct SimulateConfig {
    pub reachability: Option<SimulationProfile>,
    pub handshake: Option<SimulationProfile>,
    pub protocol_probe: Option<SimulationProfile>,
}

impl SimulateConfig {
    /// Reject overrides the simulated stages cannot use.
    pub fn check(&self) -> Result<()> {
        for (name, over) in [
            ("reachability", &self.reachability),
            ("handshake", &self.handshake),
            ("protocol_probe", &self.protocol_probe),
        ] {
            if let Some(p) = over {
                p.check().map_err(anyhow::Error::msg).with_context(|| format!("scan.simulate.{name}"))?;
            }
        }
        Ok(())
    }

    pub fn profile(&self, kind: StageKind) -> SimulationProfile {
        let over = match kind {
            StageKind::Reachability => self.reachability,
            StageKind::Handshake => self.handshake,
            StageKind::ProtocolProbe => self.protocol_probe,
        };
        over.unwrap_or_else(|| SimulationProfile::for_kind(kind))
    }
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ScanConfig {
    pub urls: Option<Vec<String>>,
    pub list_file: Option<PathBuf>,
    pub fetch_timeout_ms: Option<u64>,
    pub max_candidates: Option<usize>,
    pub stage_timeout_ms: Option<u64>,
    pub run_budget_ms: Option<u64>,
    pub simulate: Option<SimulateConfig>,
    pub seed: Option<u64>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct LogConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub scan: Option<ScanConfig>,
    pub log: Option<LogConfig>,
}

/// Load `path`, or `./wizard.yaml` when no path is given. A missing default
/// file is not an error; an explicit path that cannot be read or parsed is.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let cfg: Config = serde_yaml::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    if let Some(sim) = cfg.scan.as_ref().and_then(|s| s.simulate.as_ref()) {
        sim.check().with_context(|| format!("invalid {}", path.display()))?;
    }
    Ok(Some(cfg))
}
