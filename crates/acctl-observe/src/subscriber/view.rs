use std::borrow::Borrow;

use acctl_core::{Event, EventKind};
use tracing::{debug, info, trace, warn};

/// Field accessors used when rendering an [`Event`] as a log line.
pub trait View {
    fn as_account(&self) -> &str;
    fn as_task(&self) -> &str;
    fn as_reason(&self) -> &str;
    fn position(&self) -> usize;
    fn kind(&self) -> EventKind;
    fn has_reason(&self) -> bool;
}

impl<T> View for T
where
    T: Borrow<Event>,
{
    #[inline]
    fn as_account(&self) -> &str {
        self.borrow().account.as_str()
    }
    #[inline]
    fn as_task(&self) -> &str {
        self.borrow().task.as_ref().map_or("none", |t| t.as_str())
    }
    #[inline]
    fn as_reason(&self) -> &str {
        self.borrow().reason.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn position(&self) -> usize {
        self.borrow().queue_position.unwrap_or(0)
    }
    #[inline]
    fn kind(&self) -> EventKind {
        self.borrow().kind
    }
    #[inline]
    fn has_reason(&self) -> bool {
        self.borrow().reason.is_some()
    }
}

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // admission
        EventKind::Admitted => "task admitted",
        EventKind::Queued => "task queued behind running work",
        EventKind::Promoted => "queued task promoted to running",
        EventKind::Cancelled => "waiting task cancelled",

        // completion
        EventKind::Released => "task released",
        EventKind::StaleRelease => "release rejected",

        // administrative
        EventKind::CooldownSet => "cooldown set",
        EventKind::CooldownCleared => "cooldown cleared",
        EventKind::Suspended => "account suspended",
        EventKind::Resumed => "account resumed",
    }
}

#[inline]
pub fn log_event<E: View>(e: E) {
    let msg = message_for(e.kind());

    match e.kind() {
        EventKind::Admitted => debug!(account = e.as_account(), task = e.as_task(), "{msg}"),
        EventKind::Queued => debug!(
            account = e.as_account(),
            task = e.as_task(),
            position = e.position(),
            "{msg}"
        ),
        EventKind::Promoted => info!(account = e.as_account(), task = e.as_task(), "{msg}"),
        EventKind::Cancelled => trace!(account = e.as_account(), task = e.as_task(), "{msg}"),

        EventKind::Released => {
            if e.has_reason() {
                debug!(
                    account = e.as_account(),
                    task = e.as_task(),
                    outcome = e.as_reason(),
                    "{msg}"
                );
            } else {
                debug!(account = e.as_account(), task = e.as_task(), "{msg}");
            }
        }
        EventKind::StaleRelease => warn!(
            account = e.as_account(),
            task = e.as_task(),
            reason = e.as_reason(),
            "{msg}"
        ),

        EventKind::CooldownSet => {
            warn!(account = e.as_account(), reason = e.as_reason(), "{msg}")
        }
        EventKind::CooldownCleared => info!(account = e.as_account(), "{msg}"),
        EventKind::Suspended => warn!(account = e.as_account(), "{msg}"),
        EventKind::Resumed => info!(account = e.as_account(), "{msg}"),
    }
}
