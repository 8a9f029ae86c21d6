//! Intern notification hook
//!
//! Fired after an intern create/update commits. Delivery is best-effort: a
//! failure is logged by the engine and never undoes the change.

use attendo_api::Intern;
use thiserror::Error;

#[derive(Debug, Clone)]
pub enum InternNotice {
    /// Account created
    Welcome(Intern),
    /// Details, quota or status changed
    Updated(Intern),
}

impl InternNotice {
    pub fn intern(&self) -> &Intern {
        match self {
            InternNotice::Welcome(intern) | InternNotice::Updated(intern) => intern,
        }
    }
}

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

pub trait InternNotifier: Send + Sync {
    fn notify(&self, notice: &InternNotice) -> Result<(), NotifyError>;
}

/// Discards every notice
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl InternNotifier for NoopNotifier {
    fn notify(&self, _notice: &InternNotice) -> Result<(), NotifyError> {
        Ok(())
    }
}
