//! Single-flight export controller.
//!
//! ## Why a watch cell?
//!
//! The controller's only shared state is "is a job running, and which kind".
//! A [`tokio::sync::watch`] channel holds it so the check-and-set is one
//! atomic step ([`watch::Sender::send_if_modified`]) and a UI can
//! [`subscribe`](ExportController::subscribe) to grey out both triggers
//! while a job runs.
//!
//! ## Scope
//!
//! Single-flight holds per controller. An application keeps one controller
//! for the whole process and shares it (behind an `Arc` across tasks), which
//! makes the guarantee process-wide. The `sections2doc` binary builds exactly
//! one.
//!
//! ## Recovery
//!
//! The running state is released by a drop guard, so the controller returns
//! to [`ExportState::Idle`] on success, on failure, on panic, and when the
//! caller drops the trigger future half-way.

use crate::error::ExportError;
use crate::export::{run_export, ExportContext, ExportReport};
use crate::section::{ContentSection, ExportKind};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Whether an export job is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportState {
    #[default]
    Idle,
    Running(ExportKind),
}

impl ExportState {
    /// The state after a trigger for `kind`, or `None` if the trigger must be
    /// dropped.
    pub fn start(self, kind: ExportKind) -> Option<ExportState> {
        match self {
            ExportState::Idle => Some(ExportState::Running(kind)),
            ExportState::Running(_) => None,
        }
    }

    /// The state once the active job has ended, however it ended.
    pub fn settle(self) -> ExportState {
        ExportState::Idle
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ExportState::Idle)
    }

    pub fn running(&self) -> Option<ExportKind> {
        match self {
            ExportState::Idle => None,
            ExportState::Running(kind) => Some(*kind),
        }
    }
}

/// What became of one trigger.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// Another job was running; nothing happened.
    Dropped,
    /// The artifact was produced and handed to the sink.
    Saved(ExportReport),
    /// The job aborted; the operator got a notice and nothing was saved.
    Failed(ExportError),
}

impl TriggerOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, TriggerOutcome::Dropped)
    }

    pub fn report(&self) -> Option<&ExportReport> {
        match self {
            TriggerOutcome::Saved(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ExportError> {
        match self {
            TriggerOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Resets the controller to idle when dropped.
struct RunningGuard<'a> {
    state: &'a watch::Sender<ExportState>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| *s = s.settle());
    }
}

/// Owns the export state and runs at most one job at a time.
#[derive(Debug)]
pub struct ExportController {
    state: watch::Sender<ExportState>,
    ctx: ExportContext,
}

impl ExportController {
    pub fn new(ctx: ExportContext) -> Self {
        let (state, _) = watch::channel(ExportState::Idle);
        Self { state, ctx }
    }

    pub fn context(&self) -> &ExportContext {
        &self.ctx
    }

    pub fn state(&self) -> ExportState {
        *self.state.borrow()
    }

    pub fn is_idle(&self) -> bool {
        self.state().is_idle()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<ExportState> {
        self.state.subscribe()
    }

    /// Export `sections` as `kind`, unless a job is already running.
    ///
    /// A trigger while running is dropped, not queued. Failures never
    /// escape: they are logged, reported to the notice sink, and returned as
    /// [`TriggerOutcome::Failed`].
    pub async fn trigger(&self, kind: ExportKind, sections: &[ContentSection]) -> TriggerOutcome {
        let mut accepted = false;
        self.state.send_if_modified(|state| match state.start(kind) {
            Some(next) => {
                *state = next;
                accepted = true;
                true
            }
            None => false,
        });
        if !accepted {
            info!("{} export requested while {:?}; dropped", kind, self.state());
            return TriggerOutcome::Dropped;
        }
        let _guard = RunningGuard { state: &self.state };

        match run_export(kind, sections, &self.ctx).await {
            Ok(report) => TriggerOutcome::Saved(report),
            Err(e) => {
                match &e {
                    ExportError::EmptyContent => warn!("{} export: {}", kind, e),
                    _ => error!("{} export failed: {}", kind, e),
                }
                self.ctx.notices().notify(e.notice());
                TriggerOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportConfig;
    use crate::error::Notice;
    use crate::sink::{MemoryNotices, MemorySink};
    use std::sync::Arc;

    #[test]
    fn transitions() {
        let idle = ExportState::Idle;
        let running = idle.start(ExportKind::Pdf).unwrap();
        assert_eq!(running, ExportState::Running(ExportKind::Pdf));
        assert_eq!(running.start(ExportKind::Deck), None);
        assert_eq!(running.start(ExportKind::Pdf), None);
        assert_eq!(running.settle(), ExportState::Idle);
        assert_eq!(idle.settle(), ExportState::Idle);
        assert_eq!(running.running(), Some(ExportKind::Pdf));
    }

    #[tokio::test]
    async fn empty_content_notifies_and_returns_to_idle() {
        let sink = Arc::new(MemorySink::new());
        let notices = Arc::new(MemoryNotices::new());
        let ctx = ExportContext::new(ExportConfig::default())
            .unwrap()
            .with_sink(sink.clone())
            .with_notices(notices.clone());
        let controller = ExportController::new(ctx);
        let mut states = controller.subscribe();

        let outcome = controller.trigger(ExportKind::Pdf, &[]).await;

        assert!(matches!(outcome.error(), Some(ExportError::EmptyContent)));
        assert_eq!(notices.notices(), vec![Notice::NoContent]);
        assert!(sink.is_empty());
        assert!(controller.is_idle());
        // Running then back to Idle.
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ExportState::Idle);
    }
}
