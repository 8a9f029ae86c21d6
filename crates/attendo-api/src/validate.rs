//! Request validation
//!
//! Shape checks that need nothing but the request itself. Rules that depend
//! on stored state or configuration (window hours, evidence timing, the
//! elapsed time of a record) are enforced by the engine.

use std::collections::HashSet;
use thiserror::Error;

use crate::{
    CheckInRequest, CheckOutRequest, CreateInternRequest, Evidence, FeedbackRequest, RecordKind,
    ReevaluateRequest, UpdateInternRequest, Verdict,
};

/// A malformed request field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), FieldError>;
}

/// Trimmed text, or `None` if blank
pub fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

fn check_evidence(field: &'static str, evidence: &Evidence) -> Result<(), FieldError> {
    if evidence.handle.trim().is_empty() {
        return Err(FieldError::new(field, "evidence handle must not be empty"));
    }
    Ok(())
}

fn check_descriptions(field: &'static str, descriptions: &[String]) -> Result<(), FieldError> {
    if descriptions.iter().any(|d| d.trim().is_empty()) {
        return Err(FieldError::new(field, "task descriptions must not be empty"));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), FieldError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(FieldError::new("email", format!("'{}' is not an email address", email))),
    }
}

impl Validate for CheckInRequest {
    fn validate(&self) -> Result<(), FieldError> {
        if let Some(evidence) = &self.evidence {
            check_evidence("evidence", evidence)?;
        }

        match self.kind {
            RecordKind::Async => {
                if self.tasks.is_empty() {
                    return Err(FieldError::new(
                        "tasks",
                        "async check-in needs at least one work item",
                    ));
                }
                check_descriptions("tasks", &self.tasks)
            }
            RecordKind::FaceToFace => {
                if !self.tasks.is_empty() {
                    return Err(FieldError::new(
                        "tasks",
                        "work items are only reported for async records",
                    ));
                }
                Ok(())
            }
        }
    }
}

impl Validate for CheckOutRequest {
    fn validate(&self) -> Result<(), FieldError> {
        let mut seen = HashSet::new();
        for update in &self.task_updates {
            if !seen.insert(update.task_id) {
                return Err(FieldError::new(
                    "task_updates",
                    format!("task {} listed twice", update.task_id),
                ));
            }
            for evidence in &update.evidence {
                check_evidence("task_updates.evidence", evidence)?;
            }
        }

        check_descriptions("new_tasks", &self.new_tasks)?;

        if let Some(evidence) = &self.evidence {
            check_evidence("evidence", evidence)?;
        }
        Ok(())
    }
}

impl Validate for FeedbackRequest {
    fn validate(&self) -> Result<(), FieldError> {
        if self.verdict == Verdict::Flag && non_blank(self.remark.as_deref()).is_none() {
            return Err(FieldError::new("remark", "a flag needs a remark"));
        }
        Ok(())
    }
}

impl Validate for ReevaluateRequest {
    fn validate(&self) -> Result<(), FieldError> {
        self.duration().map(|_| ())
    }
}

impl Validate for CreateInternRequest {
    fn validate(&self) -> Result<(), FieldError> {
        check_email(&self.email)?;
        if self.full_name.trim().is_empty() {
            return Err(FieldError::new("full_name", "must not be empty"));
        }
        if self.quota.is_zero() {
            return Err(FieldError::new("quota", "must be greater than zero"));
        }
        Ok(())
    }
}

impl Validate for UpdateInternRequest {
    fn validate(&self) -> Result<(), FieldError> {
        if self.email.is_none()
            && self.full_name.is_none()
            && self.start_date.is_none()
            && self.quota.is_none()
            && self.admin_remark.is_none()
        {
            return Err(FieldError::new("intern_id", "nothing to update"));
        }
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        if let Some(name) = &self.full_name {
            if name.trim().is_empty() {
                return Err(FieldError::new("full_name", "must not be empty"));
            }
        }
        if self.quota.is_some_and(|q| q.is_zero()) {
            return Err(FieldError::new("quota", "must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskUpdate;
    use attendo_util::{InternId, RecordId, TaskId};
    use chrono::NaiveDate;
    use std::time::Duration;

    fn evidence(handle: &str) -> Evidence {
        Evidence {
            handle: handle.into(),
            content_type: Some("image/jpeg".into()),
        }
    }

    #[test]
    fn async_check_in_needs_described_tasks() {
        let mut req = CheckInRequest {
            kind: RecordKind::Async,
            evidence: None,
            tasks: vec![],
        };
        assert_eq!(req.validate().unwrap_err().field, "tasks");

        req.tasks = vec!["fix login page".into(), "   ".into()];
        assert_eq!(req.validate().unwrap_err().field, "tasks");

        req.tasks = vec!["fix login page".into()];
        assert!(req.validate().is_ok());
    }

    #[test]
    fn face_to_face_check_in_shape() {
        let mut req = CheckInRequest {
            kind: RecordKind::FaceToFace,
            evidence: Some(evidence("uploads/1.jpg")),
            tasks: vec![],
        };
        assert!(req.validate().is_ok());

        req.evidence = Some(evidence(" "));
        assert_eq!(req.validate().unwrap_err().field, "evidence");

        req.evidence = None;
        req.tasks = vec!["x".into()];
        assert!(req.validate().is_err());
    }

    #[test]
    fn check_out_rejects_duplicate_task_updates() {
        let task_id = TaskId::new();
        let update = TaskUpdate {
            task_id,
            remark: Some("done".into()),
            evidence: vec![evidence("uploads/2.jpg")],
        };
        let req = CheckOutRequest {
            record_id: RecordId::new(),
            task_updates: vec![update.clone(), update],
            new_tasks: vec![],
            evidence: None,
        };
        assert_eq!(req.validate().unwrap_err().field, "task_updates");
    }

    #[test]
    fn flag_requires_remark() {
        let mut req = FeedbackRequest {
            record_id: RecordId::new(),
            verdict: Verdict::Flag,
            remark: Some("  ".into()),
        };
        assert_eq!(req.validate().unwrap_err().field, "remark");

        req.remark = Some("photo is blurry".into());
        assert!(req.validate().is_ok());

        req.verdict = Verdict::Validate;
        req.remark = None;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn reevaluate_hours_must_be_non_negative() {
        let mut req = ReevaluateRequest {
            record_id: RecordId::new(),
            hours: -1.0,
            remark: None,
        };
        assert_eq!(req.validate().unwrap_err().field, "duration");

        req.hours = f64::INFINITY;
        assert!(req.validate().is_err());

        req.hours = 0.0;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn intern_requests() {
        let mut create = CreateInternRequest {
            email: "intern@example.com".into(),
            full_name: "Ada Intern".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            quota: Duration::from_secs(486 * 3600),
        };
        assert!(create.validate().is_ok());

        create.email = "intern.example.com".into();
        assert_eq!(create.validate().unwrap_err().field, "email");

        let update = UpdateInternRequest {
            intern_id: InternId::new(),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = UpdateInternRequest {
            intern_id: InternId::new(),
            quota: Some(Duration::ZERO),
            ..Default::default()
        };
        assert_eq!(update.validate().unwrap_err().field, "quota");
    }

    #[test]
    fn non_blank_trims() {
        assert_eq!(non_blank(Some("  ok ")), Some("ok"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
