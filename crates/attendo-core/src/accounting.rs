//! Rendered-time accounting
//!
//! `rendered` is always recomputed in full from the intern's validated
//! records, inside the transaction of the transition that triggered it.

use attendo_api::{Intern, InternStatus};
use attendo_store::{AuditEvent, AuditEventType, StoreTx};
use attendo_util::InternId;
use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::debug;

use crate::{CoreError, CoreResult};

/// Intern totals after a recomputation
#[derive(Debug, Clone)]
pub struct Totals {
    pub intern: Intern,
    /// Whether `rendered` or `status` differ from what was stored
    pub changed: bool,
}

/// Status implied by the totals. Dropped and evaluator-locked interns keep
/// their status.
pub fn derive_status(
    current: InternStatus,
    locked: bool,
    rendered: Duration,
    quota: Duration,
) -> InternStatus {
    if locked || current == InternStatus::Dropped {
        return current;
    }
    if rendered >= quota {
        InternStatus::Passed
    } else {
        InternStatus::Ongoing
    }
}

/// Recompute an intern's rendered time and status within `tx`.
///
/// Any failure is reported as [`CoreError::AggregationFailure`]; the caller
/// must then let the transaction roll back.
pub fn recompute(tx: &dyn StoreTx, intern_id: &InternId, now: DateTime<Local>) -> CoreResult<Totals> {
    let aggregation = |e: attendo_store::StoreError| {
        CoreError::AggregationFailure(format!("intern {}: {}", intern_id, e))
    };

    let mut intern = tx
        .get_intern(intern_id)
        .map_err(aggregation)?
        .ok_or_else(|| CoreError::AggregationFailure(format!("intern {} vanished", intern_id)))?;

    let rendered = tx.sum_validated(intern_id).map_err(aggregation)?;
    let status = derive_status(intern.status, intern.status_locked, rendered, intern.quota);

    let changed = rendered != intern.rendered || status != intern.status;
    if changed {
        intern.rendered = rendered;
        intern.status = status;
        tx.update_intern(&intern).map_err(aggregation)?;

        let _ = tx.append_audit(AuditEvent::at(
            now,
            AuditEventType::TotalsRecomputed {
                intern_id: *intern_id,
                rendered,
                status,
            },
        ));
    }

    debug!(
        intern_id = %intern_id,
        rendered_secs = rendered.as_secs(),
        status = %status,
        changed,
        "Totals recomputed"
    );

    Ok(Totals { intern, changed })
}
