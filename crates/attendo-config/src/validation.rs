//! Configuration validation

use crate::policy::{EvidenceTiming, KindSchedule};
use crate::schema::{RawConfig, RawKindSchedule};
use attendo_api::RecordKind;
use attendo_util::WallClock;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("schedule.{kind}.{field}: invalid time '{value}': {message}")]
    InvalidTimeFormat {
        kind: RecordKind,
        field: &'static str,
        value: String,
        message: String,
    },

    #[error("schedule.{kind}: window start {start} must be before end {end}")]
    EmptyWindow {
        kind: RecordKind,
        start: WallClock,
        end: WallClock,
    },

    #[error("schedule.{kind}: sweep_at {sweep_at} is before the window end {end}")]
    SweepBeforeWindowEnd {
        kind: RecordKind,
        sweep_at: WallClock,
        end: WallClock,
    },

    #[error("schedule.{kind}.evidence: unknown value '{value}' (expected check_in or check_out)")]
    UnknownEvidenceTiming { kind: RecordKind, value: String },

    #[error("schedule.{0}.evidence: evidence timing only applies to face_to_face")]
    EvidenceNotApplicable(RecordKind),
}

/// Validate a raw configuration, collecting every problem
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let default = RawKindSchedule::default();

    errors.extend(validate_schedule(
        RecordKind::FaceToFace,
        config.schedule.face_to_face.as_ref().unwrap_or(&default),
    ));
    errors.extend(validate_schedule(
        RecordKind::Async,
        config.schedule.asynchronous.as_ref().unwrap_or(&default),
    ));

    errors
}

fn validate_schedule(kind: RecordKind, raw: &RawKindSchedule) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let defaults = KindSchedule::default_for(kind);

    let mut field = |name: &'static str, value: &Option<String>, fallback: WallClock| match value
    {
        None => Some(fallback),
        Some(value) => match parse_time(value) {
            Ok(time) => Some(time),
            Err(message) => {
                errors.push(ValidationError::InvalidTimeFormat {
                    kind,
                    field: name,
                    value: value.clone(),
                    message,
                });
                None
            }
        },
    };

    let start = field("start", &raw.start, defaults.window.start);
    let end = field("end", &raw.end, defaults.window.end);
    // Sweep defaults to the window end, not to the built-in sweep time
    let sweep_at = field("sweep_at", &raw.sweep_at, end.unwrap_or(defaults.sweep_at));

    if let (Some(start), Some(end)) = (start, end)
        && start >= end
    {
        errors.push(ValidationError::EmptyWindow { kind, start, end });
    }

    if let (Some(sweep_at), Some(end)) = (sweep_at, end)
        && sweep_at < end
    {
        errors.push(ValidationError::SweepBeforeWindowEnd {
            kind,
            sweep_at,
            end,
        });
    }

    if let Some(value) = &raw.evidence {
        if kind != RecordKind::FaceToFace {
            errors.push(ValidationError::EvidenceNotApplicable(kind));
        } else if parse_evidence(value).is_none() {
            errors.push(ValidationError::UnknownEvidenceTiming {
                kind,
                value: value.clone(),
            });
        }
    }

    errors
}

/// Parse HH:MM time format
pub fn parse_time(s: &str) -> Result<WallClock, String> {
    let (hour, minute) = s
        .trim()
        .split_once(':')
        .ok_or_else(|| "Expected HH:MM format".to_string())?;

    let hour: u8 = hour.parse().map_err(|_| "Invalid hour".to_string())?;
    let minute: u8 = minute.parse().map_err(|_| "Invalid minute".to_string())?;

    if hour >= 24 {
        return Err("Hour must be 0-23".into());
    }
    if minute >= 60 {
        return Err("Minute must be 0-59".into());
    }

    WallClock::new(hour, minute).ok_or_else(|| "Invalid time".to_string())
}

/// Parse an evidence timing value
pub fn parse_evidence(s: &str) -> Option<EvidenceTiming> {
    match s.trim().to_lowercase().as_str() {
        "check_in" | "check-in" => Some(EvidenceTiming::CheckIn),
        "check_out" | "check-out" => Some(EvidenceTiming::CheckOut),
        _ => None,
    }
}
