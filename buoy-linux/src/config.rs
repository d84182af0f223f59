//! Load config from file and environment.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use buoy_core::HardwareAddress;
use serde::Deserialize;
use tracing::warn;

/// Daemon configuration. File: ~/.config/buoy/config.toml or /etc/buoy/config.toml.
/// Env overrides: BUOY_RADIO_PORT, BUOY_GROUP, BUOY_BOOTSTRAP_MS, BUOY_ADDRESS.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// UDP port standing in for the radio channel (default 45680).
    #[serde(default = "default_radio_port")]
    pub radio_port: u16,
    /// Multicast group every buoy joins (default 239.255.60.61).
    #[serde(default = "default_group")]
    pub group: Ipv4Addr,
    /// How long to wait for a MASTER_REPLY before taking the master role.
    #[serde(default = "default_bootstrap_ms")]
    pub bootstrap_ms: u64,
    /// Hardware address of this buoy. Random locally-administered when unset.
    #[serde(default)]
    pub address: Option<HardwareAddress>,
}

fn default_radio_port() -> u16 {
    45680
}
fn default_group() -> Ipv4Addr {
    Ipv4Addr::new(239, 255, 60, 61)
}
fn default_bootstrap_ms() -> u64 {
    3000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            radio_port: default_radio_port(),
            group: default_group(),
            bootstrap_ms: default_bootstrap_ms(),
            address: None,
        }
    }
}

/// Load config: an explicit file must parse; otherwise the first default path that
/// exists is used, falling back to defaults. Env vars are applied on top.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let mut c = match explicit {
        Some(path) => read_file(path)?,
        None => load_default_file().unwrap_or_default(),
    };
    apply_env(&mut c, |key| std::env::var(key).ok());
    Ok(c)
}

fn read_file(path: &Path) -> anyhow::Result<Config> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parsing config {}", path.display()))
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/buoy/config.toml"));
    }
    out.push(PathBuf::from("/etc/buoy/config.toml"));
    out
}

fn load_default_file() -> Option<Config> {
    let path = config_paths().into_iter().find(|p| p.exists())?;
    match read_file(&path) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "ignoring config file");
            None
        }
    }
}

/// Apply `BUOY_*` overrides. Unparseable values are logged and skipped.
pub fn apply_env(c: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    override_with(&lookup, "BUOY_RADIO_PORT", &mut c.radio_port);
    override_with(&lookup, "BUOY_GROUP", &mut c.group);
    override_with(&lookup, "BUOY_BOOTSTRAP_MS", &mut c.bootstrap_ms);
    if let Some(s) = lookup("BUOY_ADDRESS") {
        match s.parse() {
            Ok(addr) => c.address = Some(addr),
            Err(e) => warn!(value = %s, error = %e, "ignoring BUOY_ADDRESS"),
        }
    }
}

fn override_with<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    if let Some(s) = lookup(key) {
        match s.parse::<T>() {
            Ok(v) => *slot = v,
            Err(_) => warn!(key, value = %s, "ignoring unparseable override"),
        }
    }
}
