//! Request dispatch: one protocol command in, one response (plus the events
//! to broadcast) out.

use attendo_api::{
    Actor, Command, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus, Response,
    ResponsePayload,
};
use attendo_core::{AttendanceEngine, CoreError, CoreEvent, CoreResult, Outcome};
use attendo_ipc::PeerInfo;
use attendo_util::ClientId;
use chrono::{DateTime, Local};
use tracing::{debug, warn};

/// Response for the caller and events for subscribers
#[derive(Debug)]
pub struct Dispatched {
    pub response: Response,
    pub events: Vec<Event>,
}

impl Dispatched {
    fn reply(response: Response) -> Self {
        Self {
            response,
            events: Vec::new(),
        }
    }
}

pub fn handle_command(
    engine: &AttendanceEngine,
    client_id: ClientId,
    peer: PeerInfo,
    request_id: u64,
    actor: &Actor,
    command: Command,
    now: DateTime<Local>,
) -> Dispatched {
    if actor.is_evaluator() && !peer.role.can_evaluate() {
        warn!(
            client_id = %client_id,
            role = %peer.role,
            command = command.name(),
            "Evaluator identity from a non-admin peer"
        );
        let error = CoreError::PermissionDenied("evaluator requests need an admin connection".into());
        return Dispatched::reply(Response::error(request_id, error.to_error_info()));
    }

    debug!(client_id = %client_id, actor = %actor, command = command.name(), "Dispatching");

    match command {
        Command::CheckIn(req) => respond(
            request_id,
            engine.check_in(actor, &req, now),
            ResponsePayload::CheckedIn,
        ),

        Command::CheckOut(req) => respond(
            request_id,
            engine.check_out(actor, &req, now),
            ResponsePayload::CheckedOut,
        ),

        Command::GiveFeedback(req) => respond(
            request_id,
            engine.give_feedback(actor, &req, now),
            ResponsePayload::Evaluated,
        ),

        Command::Reevaluate(req) => respond(
            request_id,
            engine.reevaluate(actor, &req, now),
            ResponsePayload::Evaluated,
        ),

        Command::SweepTimeouts { kind, as_of } => {
            let result = require_evaluator(actor)
                .and_then(|()| engine.sweep_timeouts(kind, as_of.unwrap_or(now)));
            respond(request_id, result, ResponsePayload::Swept)
        }

        Command::SweepOverdue => {
            let result = require_evaluator(actor).and_then(|()| engine.sweep_overdue(now));
            respond(request_id, result, ResponsePayload::Swept)
        }

        Command::CreateIntern(req) => respond(
            request_id,
            engine.create_intern(actor, &req, now),
            ResponsePayload::Intern,
        ),

        Command::UpdateIntern(req) => respond(
            request_id,
            engine.update_intern(actor, &req, now),
            ResponsePayload::Intern,
        ),

        Command::SetInternStatus(req) => respond(
            request_id,
            engine.set_intern_status(actor, &req, now),
            ResponsePayload::Intern,
        ),

        Command::DeleteIntern { intern_id } => respond(
            request_id,
            engine.delete_intern(actor, &intern_id, now),
            |()| ResponsePayload::InternDeleted { intern_id },
        ),

        Command::ListInterns => reply(request_id, engine.list_interns(actor), |interns| {
            ResponsePayload::Interns { interns }
        }),

        Command::ExportSnapshot => reply(
            request_id,
            engine.export_snapshot(actor, now),
            ResponsePayload::Export,
        ),

        Command::GetIntern { intern_id } => reply(
            request_id,
            engine.get_intern(actor, &intern_id),
            ResponsePayload::Intern,
        ),

        Command::ListRecords { intern_id, day } => reply(
            request_id,
            engine.list_records(actor, &intern_id, day),
            |records| ResponsePayload::Records { records },
        ),

        // The IPC layer has already flipped the subscription flag
        Command::SubscribeEvents => Dispatched::reply(Response::success(
            request_id,
            ResponsePayload::Subscribed { client_id },
        )),

        Command::UnsubscribeEvents => {
            Dispatched::reply(Response::success(request_id, ResponsePayload::Unsubscribed))
        }

        Command::GetHealth => {
            let store_ok = engine.is_healthy();
            Dispatched::reply(Response::success(
                request_id,
                ResponsePayload::Health(HealthStatus {
                    live: true,
                    ready: store_ok,
                    store_ok,
                }),
            ))
        }

        Command::Ping => Dispatched::reply(Response::success(request_id, ResponsePayload::Pong)),
    }
}

/// Wire event for a core event
pub fn to_event(event: CoreEvent) -> Event {
    let payload = match event {
        CoreEvent::RecordCheckedIn {
            record_id,
            intern_id,
            kind,
            time_in,
        } => EventPayload::RecordCheckedIn {
            record_id,
            intern_id,
            kind,
            time_in,
        },
        CoreEvent::RecordSubmitted {
            record_id,
            intern_id,
            time_out,
        } => EventPayload::RecordSubmitted {
            record_id,
            intern_id,
            time_out,
        },
        CoreEvent::RecordEvaluated {
            record_id,
            intern_id,
            status,
            work_duration,
        } => EventPayload::RecordEvaluated {
            record_id,
            intern_id,
            status,
            work_duration,
        },
        CoreEvent::RecordTimedOut {
            record_id,
            intern_id,
            kind,
            time_out,
        } => EventPayload::RecordTimedOut {
            record_id,
            intern_id,
            kind,
            time_out,
        },
        CoreEvent::InternTotalsChanged {
            intern_id,
            rendered,
            status,
        } => EventPayload::InternTotalsChanged {
            intern_id,
            rendered,
            status,
        },
        CoreEvent::InternChanged { intern_id } => EventPayload::InternChanged { intern_id },
        CoreEvent::InternRemoved { intern_id } => EventPayload::InternRemoved { intern_id },
        CoreEvent::SweepCompleted {
            kind,
            closed,
            skipped,
            failed,
        } => EventPayload::SweepCompleted {
            kind,
            closed,
            skipped,
            failed,
        },
    };
    Event::new(payload)
}

fn require_evaluator(actor: &Actor) -> CoreResult<()> {
    if actor.is_evaluator() {
        Ok(())
    } else {
        Err(CoreError::PermissionDenied("evaluator operation".into()))
    }
}

/// Map a mutating operation's result; policy rejections are an answer, not an error
fn respond<T>(
    request_id: u64,
    result: CoreResult<Outcome<T>>,
    payload: impl FnOnce(T) -> ResponsePayload,
) -> Dispatched {
    match result {
        Ok(outcome) => Dispatched {
            response: Response::success(request_id, payload(outcome.value)),
            events: outcome.events.into_iter().map(to_event).collect(),
        },
        Err(e) => Dispatched::reply(error_response(request_id, e)),
    }
}

fn reply<T>(
    request_id: u64,
    result: CoreResult<T>,
    payload: impl FnOnce(T) -> ResponsePayload,
) -> Dispatched {
    match result {
        Ok(value) => Dispatched::reply(Response::success(request_id, payload(value))),
        Err(e) => Dispatched::reply(error_response(request_id, e)),
    }
}

fn error_response(request_id: u64, error: CoreError) -> Response {
    match error {
        CoreError::PolicyRejected { reasons } => {
            Response::success(request_id, ResponsePayload::Rejected { reasons })
        }
        CoreError::Store(ref e) => {
            tracing::error!(request_id, error = %e, "Store failure");
            Response::error(
                request_id,
                ErrorInfo::new(ErrorCode::InternalError, "internal storage error"),
            )
        }
        other => Response::error(request_id, other.to_error_info()),
    }
}
