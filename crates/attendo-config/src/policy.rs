//! Validated policy structures

use crate::schema::{RawConfig, RawKindSchedule, RawServiceConfig};
use crate::validation::{parse_evidence, parse_time};
use attendo_api::RecordKind;
use attendo_util::{TimeWindow, WallClock, data_dir_without_env, socket_path_without_env};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Validated policy ready for use by the core engine
#[derive(Debug, Clone)]
pub struct Policy {
    /// Service configuration
    pub service: ServiceConfig,

    pub face_to_face: KindSchedule,

    pub asynchronous: KindSchedule,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            face_to_face: KindSchedule::from_raw(RecordKind::FaceToFace, raw.schedule.face_to_face),
            asynchronous: KindSchedule::from_raw(RecordKind::Async, raw.schedule.asynchronous),
        }
    }

    pub fn schedule(&self, kind: RecordKind) -> &KindSchedule {
        match kind {
            RecordKind::FaceToFace => &self.face_to_face,
            RecordKind::Async => &self.asynchronous,
        }
    }

    /// Legal check-in/check-out window for a kind
    pub fn window(&self, kind: RecordKind) -> TimeWindow {
        self.schedule(kind).window
    }

    /// When the face-to-face presence photo is taken
    pub fn evidence_timing(&self) -> EvidenceTiming {
        self.face_to_face.evidence
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            face_to_face: KindSchedule::default_for(RecordKind::FaceToFace),
            asynchronous: KindSchedule::default_for(RecordKind::Async),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
    pub catch_up_on_start: bool,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(socket_path_without_env),
            data_dir: raw.data_dir.unwrap_or_else(data_dir_without_env),
            catch_up_on_start: raw.catch_up_on_start.unwrap_or(true),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// When the face-to-face presence photo is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceTiming {
    #[default]
    CheckIn,
    CheckOut,
}

/// Window and sweep trigger for one record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSchedule {
    pub window: TimeWindow,
    /// Daily auto-timeout trigger
    pub sweep_at: WallClock,
    pub evidence: EvidenceTiming,
}

impl KindSchedule {
    /// Built-in hours: face-to-face 08:00-17:00, async 08:00-19:00,
    /// each swept at its window end
    pub fn default_for(kind: RecordKind) -> Self {
        let start = WallClock { hour: 8, minute: 0 };
        let end = match kind {
            RecordKind::FaceToFace => WallClock { hour: 17, minute: 0 },
            RecordKind::Async => WallClock { hour: 19, minute: 0 },
        };
        Self {
            window: TimeWindow::new(start, end),
            sweep_at: end,
            evidence: EvidenceTiming::CheckIn,
        }
    }

    fn from_raw(kind: RecordKind, raw: Option<RawKindSchedule>) -> Self {
        let defaults = Self::default_for(kind);
        let Some(raw) = raw else {
            return defaults;
        };

        let time = |value: &Option<String>, fallback: WallClock| {
            value
                .as_deref()
                .and_then(|v| parse_time(v).ok())
                .unwrap_or(fallback)
        };

        let start = time(&raw.start, defaults.window.start);
        let end = time(&raw.end, defaults.window.end);
        Self {
            window: TimeWindow::new(start, end),
            sweep_at: time(&raw.sweep_at, end),
            evidence: raw
                .evidence
                .as_deref()
                .and_then(parse_evidence)
                .unwrap_or_default(),
        }
    }
}
