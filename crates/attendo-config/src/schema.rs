//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Check-in windows and sweep triggers per record kind
    #[serde(default)]
    pub schedule: RawSchedule,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path
    pub socket_path: Option<PathBuf>,

    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// Close records left open on earlier days when the service starts
    pub catch_up_on_start: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSchedule {
    pub face_to_face: Option<RawKindSchedule>,

    #[serde(rename = "async")]
    pub asynchronous: Option<RawKindSchedule>,
}

/// Schedule for one record kind; unset fields take the built-in defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawKindSchedule {
    /// Window start (HH:MM)
    pub start: Option<String>,

    /// Window end, exclusive (HH:MM)
    pub end: Option<String>,

    /// Daily auto-timeout trigger (HH:MM), not before `end`
    pub sweep_at: Option<String>,

    /// When the presence photo is taken: "check_in" or "check_out"
    pub evidence: Option<String>,
}
