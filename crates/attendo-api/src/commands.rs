//! Command types for the attendod protocol

use attendo_util::{ClientId, InternId, RecordId, TaskId, duration_from_hours};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    API_VERSION, Actor, AttendanceRecord, Evaluation, Evidence, ExportSnapshot, FieldError,
    HealthStatus, Intern, InternStatus, ReasonCode, RecordDetail, RecordKind, SweepReport, Verdict,
};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Authenticated caller the request is made on behalf of
    pub actor: Actor,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, actor: Actor, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            actor,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    PolicyRejected,
    ValidationFailed,
    InvalidTransition,
    NotFound,
    PermissionDenied,
    AggregationFailure,
    RateLimited,
    InternalError,
}

/// Open a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRequest {
    pub kind: RecordKind,
    /// Presence photo (face-to-face, when evidence is taken at check-in)
    #[serde(default)]
    pub evidence: Option<Evidence>,
    /// Work item descriptions (async only, at least one)
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// Remark and evidence for an existing task of the record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub task_id: TaskId,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

/// Close an open record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutRequest {
    pub record_id: RecordId,
    #[serde(default)]
    pub task_updates: Vec<TaskUpdate>,
    /// Work discovered during the session
    #[serde(default)]
    pub new_tasks: Vec<String>,
    /// Presence photo (face-to-face, when evidence is taken at check-out)
    #[serde(default)]
    pub evidence: Option<Evidence>,
}

/// Evaluator verdict on a sent record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub record_id: RecordId,
    pub verdict: Verdict,
    /// Required when flagging
    #[serde(default)]
    pub remark: Option<String>,
}

/// Credit a flagged record with an evaluator-chosen duration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReevaluateRequest {
    pub record_id: RecordId,
    /// Credited time in hours, as evaluators enter it
    #[serde(rename = "duration")]
    pub hours: f64,
    #[serde(default)]
    pub remark: Option<String>,
}

impl ReevaluateRequest {
    /// The credited hours as a whole-second duration
    pub fn duration(&self) -> Result<Duration, FieldError> {
        duration_from_hours(self.hours)
            .ok_or_else(|| FieldError::new("duration", "must be a non-negative number of hours"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInternRequest {
    pub email: String,
    pub full_name: String,
    pub start_date: NaiveDate,
    pub quota: Duration,
}

/// Change intern details; unset fields are left alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateInternRequest {
    pub intern_id: InternId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub quota: Option<Duration>,
    #[serde(default)]
    pub admin_remark: Option<String>,
}

/// Lock an intern's status to a value, or release the lock with `None`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetInternStatusRequest {
    pub intern_id: InternId,
    pub status: Option<InternStatus>,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    // Intern commands
    CheckIn(CheckInRequest),
    CheckOut(CheckOutRequest),

    // Evaluator commands
    GiveFeedback(FeedbackRequest),
    Reevaluate(ReevaluateRequest),

    /// Run the auto-timeout sweep for a kind now (or as of a given instant)
    SweepTimeouts {
        kind: RecordKind,
        #[serde(default)]
        as_of: Option<DateTime<Local>>,
    },

    /// Close open records left over from earlier days
    SweepOverdue,

    CreateIntern(CreateInternRequest),
    UpdateIntern(UpdateInternRequest),
    SetInternStatus(SetInternStatusRequest),
    DeleteIntern { intern_id: InternId },
    ListInterns,
    ExportSnapshot,

    // Shared; interns only see their own data
    GetIntern { intern_id: InternId },
    ListRecords {
        intern_id: InternId,
        #[serde(default)]
        day: Option<NaiveDate>,
    },

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    /// Unsubscribe from events
    UnsubscribeEvents,

    /// Get health status
    GetHealth,

    /// Ping for keepalive
    Ping,
}

impl Command {
    /// Whether only evaluators may issue this command
    pub fn requires_evaluator(&self) -> bool {
        matches!(
            self,
            Command::GiveFeedback(_)
                | Command::Reevaluate(_)
                | Command::SweepTimeouts { .. }
                | Command::SweepOverdue
                | Command::CreateIntern(_)
                | Command::UpdateIntern(_)
                | Command::SetInternStatus(_)
                | Command::DeleteIntern { .. }
                | Command::ListInterns
                | Command::ExportSnapshot
        )
    }

    /// Whether only interns may issue this command
    pub fn requires_intern(&self) -> bool {
        matches!(self, Command::CheckIn(_) | Command::CheckOut(_))
    }

    /// Short name for logs and audit entries
    pub fn name(&self) -> &'static str {
        match self {
            Command::CheckIn(_) => "check_in",
            Command::CheckOut(_) => "check_out",
            Command::GiveFeedback(_) => "give_feedback",
            Command::Reevaluate(_) => "reevaluate",
            Command::SweepTimeouts { .. } => "sweep_timeouts",
            Command::SweepOverdue => "sweep_overdue",
            Command::CreateIntern(_) => "create_intern",
            Command::UpdateIntern(_) => "update_intern",
            Command::SetInternStatus(_) => "set_intern_status",
            Command::DeleteIntern { .. } => "delete_intern",
            Command::ListInterns => "list_interns",
            Command::ExportSnapshot => "export_snapshot",
            Command::GetIntern { .. } => "get_intern",
            Command::ListRecords { .. } => "list_records",
            Command::SubscribeEvents => "subscribe_events",
            Command::UnsubscribeEvents => "unsubscribe_events",
            Command::GetHealth => "get_health",
            Command::Ping => "ping",
        }
    }
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    CheckedIn(RecordDetail),
    CheckedOut(AttendanceRecord),
    /// Check-in or check-out not allowed right now; every violated rule is listed
    Rejected { reasons: Vec<ReasonCode> },
    Evaluated(Evaluation),
    Swept(SweepReport),
    Intern(Intern),
    Interns { interns: Vec<Intern> },
    Records { records: Vec<AttendanceRecord> },
    InternDeleted { intern_id: InternId },
    Export(ExportSnapshot),
    Health(HealthStatus),
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Pong,
}
