//! Shared enumerations and small value types for the attendod API

use attendo_util::{InternId, RecordId, TimeWindow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure to parse a stored enum value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $label,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// How the intern attended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// On-site attendance with a presence task and evidence photo
    FaceToFace,
    /// Remote work reported as a list of work items
    Async,
}

string_enum!(RecordKind, "record kind", {
    FaceToFace => "face_to_face",
    Async => "async",
});

/// Attendance record state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Checked in, not yet checked out
    Ongoing,
    /// Checked out by the intern, awaiting evaluation
    Sent,
    /// Counted toward the intern's quota
    Validated,
    /// Rejected pending correction (or auto-timed-out)
    Flagged,
}

string_enum!(RecordStatus, "record status", {
    Ongoing => "ongoing",
    Sent => "sent",
    Validated => "validated",
    Flagged => "flagged",
});

impl RecordStatus {
    /// Whether the record has been closed (submitted or forced)
    pub fn is_closed(&self) -> bool {
        !matches!(self, RecordStatus::Ongoing)
    }
}

/// Intern completion status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternStatus {
    Ongoing,
    Passed,
    Completed,
    Dropped,
}

string_enum!(InternStatus, "intern status", {
    Ongoing => "ongoing",
    Passed => "passed",
    Completed => "completed",
    Dropped => "dropped",
});

impl InternStatus {
    /// Whether an intern in this status may open new records
    pub fn may_check_in(&self) -> bool {
        matches!(self, InternStatus::Ongoing)
    }

    /// Whether the intern (and all their records) may be deleted
    pub fn may_be_deleted(&self) -> bool {
        matches!(self, InternStatus::Completed | InternStatus::Dropped)
    }
}

/// Evaluator verdict on a submitted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Validate,
    Flag,
}

/// Which end of a session is being attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckAction {
    CheckIn,
    CheckOut,
}

impl fmt::Display for CheckAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckAction::CheckIn => f.write_str("check-in"),
            CheckAction::CheckOut => f.write_str("check-out"),
        }
    }
}

/// Structured reasons why a check-in/check-out (or deletion) is not allowed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ReasonCode {
    /// Outside the allowed hours for this record kind
    OutsideTimeWindow {
        kind: RecordKind,
        action: CheckAction,
        window: TimeWindow,
    },
    /// A record was already submitted today
    AlreadySubmittedToday { record_id: RecordId },
    /// The intern already has an open record
    RecordAlreadyOpen { record_id: RecordId },
    /// The internship has not started yet
    BeforeStartDate { start_date: NaiveDate },
    /// The intern's status does not allow new records
    InternIneligible { status: InternStatus },
    /// The record was opened on an earlier day
    RecordFromPreviousDay { day: NaiveDate },
    /// Only completed or dropped interns may be deleted
    InternNotRemovable { status: InternStatus },
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasonCode::OutsideTimeWindow { kind, action, window } => {
                write!(f, "{} {} is only allowed between {}", kind, action, window)
            }
            ReasonCode::AlreadySubmittedToday { .. } => {
                f.write_str("attendance was already submitted today")
            }
            ReasonCode::RecordAlreadyOpen { .. } => {
                f.write_str("already checked in; check out first")
            }
            ReasonCode::BeforeStartDate { start_date } => {
                write!(f, "internship starts on {}", start_date)
            }
            ReasonCode::InternIneligible { status } => {
                write!(f, "intern status '{}' does not allow check-in", status)
            }
            ReasonCode::RecordFromPreviousDay { day } => {
                write!(f, "record from {} can no longer be checked out", day)
            }
            ReasonCode::InternNotRemovable { status } => {
                write!(f, "intern status '{}' does not allow deletion", status)
            }
        }
    }
}

/// Already-authenticated caller identity, supplied with every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Actor {
    Intern { intern_id: InternId },
    Evaluator { name: String },
}

impl Actor {
    pub fn intern_id(&self) -> Option<InternId> {
        match self {
            Actor::Intern { intern_id } => Some(*intern_id),
            Actor::Evaluator { .. } => None,
        }
    }

    pub fn is_evaluator(&self) -> bool {
        matches!(self, Actor::Evaluator { .. })
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Intern { intern_id } => write!(f, "intern:{}", intern_id),
            Actor::Evaluator { name } => write!(f, "evaluator:{}", name),
        }
    }
}

/// Role of a socket peer, derived from its credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Authenticated front end relaying intern requests
    Gateway,
    /// Local administrator; may also assert evaluator identities
    Admin,
}

impl ClientRole {
    pub fn can_evaluate(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientRole::Gateway => "gateway",
            ClientRole::Admin => "admin",
        }
    }
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendo_util::WallClock;

    #[test]
    fn enums_round_trip_through_storage_strings() {
        for kind in RecordKind::ALL {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), *kind);
        }
        for status in RecordStatus::ALL {
            assert_eq!(status.as_str().parse::<RecordStatus>().unwrap(), *status);
        }
        for status in InternStatus::ALL {
            assert_eq!(status.as_str().parse::<InternStatus>().unwrap(), *status);
        }

        let err = "pending".parse::<RecordStatus>().unwrap_err();
        assert_eq!(err.kind, "record status");
    }

    #[test]
    fn storage_strings_match_serde_names() {
        let json = serde_json::to_string(&RecordKind::FaceToFace).unwrap();
        assert_eq!(json, "\"face_to_face\"");
        assert_eq!(RecordKind::FaceToFace.as_str(), "face_to_face");
    }

    #[test]
    fn only_ongoing_interns_check_in() {
        assert!(InternStatus::Ongoing.may_check_in());
        assert!(!InternStatus::Passed.may_check_in());
        assert!(!InternStatus::Completed.may_check_in());
        assert!(!InternStatus::Dropped.may_check_in());
    }

    #[test]
    fn reason_code_serialization() {
        let reason = ReasonCode::OutsideTimeWindow {
            kind: RecordKind::FaceToFace,
            action: CheckAction::CheckIn,
            window: TimeWindow::new(WallClock::new(8, 0).unwrap(), WallClock::new(17, 0).unwrap()),
        };

        let json = serde_json::to_string(&reason).unwrap();
        assert!(json.contains("outside_time_window"));
        assert_eq!(
            reason.to_string(),
            "face_to_face check-in is only allowed between 08:00-17:00"
        );
    }

    #[test]
    fn actor_serialization() {
        let actor = Actor::Evaluator { name: "hr".into() };
        let json = serde_json::to_string(&actor).unwrap();
        assert!(json.contains("\"type\":\"evaluator\""));
        assert!(actor.is_evaluator());
        assert_eq!(actor.intern_id(), None);
    }
}
