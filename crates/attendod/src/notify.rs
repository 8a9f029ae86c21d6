//! Intern notifications handed to a background task

use attendo_core::{InternNotice, InternNotifier, NotifyError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Queues notices for [`spawn_delivery`]; never blocks the caller
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<InternNotice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InternNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl InternNotifier for ChannelNotifier {
    fn notify(&self, notice: &InternNotice) -> Result<(), NotifyError> {
        self.tx
            .send(notice.clone())
            .map_err(|_| NotifyError("delivery task is gone".into()))
    }
}

/// Drain queued notices. Mail delivery is not wired in; notices are logged.
pub fn spawn_delivery(mut rx: mpsc::UnboundedReceiver<InternNotice>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notice) = rx.recv().await {
            let intern = notice.intern();
            let kind = match notice {
                InternNotice::Welcome(_) => "welcome",
                InternNotice::Updated(_) => "updated",
            };
            info!(
                intern_id = %intern.id,
                email = %intern.email,
                kind,
                "Intern notice queued for delivery"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendo_api::Intern;
    use chrono::{Local, NaiveDate};
    use std::time::Duration;

    fn intern() -> Intern {
        Intern::new(
            "ada@example.com",
            "Ada",
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            Duration::from_secs(3600),
            Local::now(),
        )
    }

    #[test]
    fn notices_reach_the_receiver() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(&InternNotice::Welcome(intern())).unwrap();

        let notice = rx.try_recv().unwrap();
        assert!(matches!(notice, InternNotice::Welcome(ref i) if i.email == "ada@example.com"));
    }

    #[test]
    fn closed_channel_is_an_error() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        assert!(notifier.notify(&InternNotice::Updated(intern())).is_err());
    }
}
