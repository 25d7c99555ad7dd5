//! Registration page: live preview plus "capture and register".

use super::{CaptureFeed, Transition};
use crate::engine::EngineHandle;
use crate::error::KioskError;
use crate::ui::{Page, PageContext, TimerEvent, TimerKind, UiEvent};
use facegate_core::{IdentityRecord, IdentityStore};
use facegate_hw::CaptureSession;

const PAGE: Page = Page::Registration;
const INITIALIZING: &str = "Initializing camera...";
const IN_PROGRESS: &str = "Registration in progress...";

pub struct RegistrationPresenter {
    feed: CaptureFeed,
    engine: EngineHandle,
    activation: u64,
    /// An enroll request is with the worker.
    pending: bool,
}

impl RegistrationPresenter {
    pub fn new(session: CaptureSession, engine: EngineHandle) -> Self {
        Self {
            feed: CaptureFeed::new(session),
            engine,
            activation: 0,
            pending: false,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.feed.is_running()
    }

    /// Start capture and the preview/readiness timers. On failure the page
    /// stays up without a camera until it is shown again.
    pub fn activate(&mut self, ctx: &mut PageContext<'_>) -> Result<(), KioskError> {
        self.activation += 1;
        self.pending = false;
        ctx.display.set_status(PAGE, INITIALIZING);
        ctx.display.set_capture_enabled(false);

        self.feed.start()?;

        self.schedule(ctx, ctx.timings.preview_tick, TimerKind::Preview);
        self.schedule(ctx, ctx.timings.readiness_poll, TimerKind::Readiness);
        Ok(())
    }

    /// Stop capture. Outstanding timers and worker replies become stale.
    pub fn deactivate(&mut self, ctx: &mut PageContext<'_>) {
        let was_running = self.feed.is_running();
        self.activation += 1;
        self.pending = false;
        self.feed.stop();
        if was_running {
            ctx.display.set_status(PAGE, INITIALIZING);
            ctx.display.set_capture_enabled(false);
        }
    }

    pub fn on_timer(&mut self, timer: &TimerEvent, ctx: &mut PageContext<'_>) {
        if timer.activation != self.activation || !self.feed.is_running() {
            return;
        }
        match timer.kind {
            TimerKind::Preview => {
                if let Some(frame) = self.feed.refresh() {
                    ctx.display.set_preview(PAGE, frame);
                }
                self.schedule(ctx, ctx.timings.preview_tick, TimerKind::Preview);
            }
            TimerKind::Readiness => {
                if self.feed.is_ready() {
                    tracing::debug!("registration camera ready");
                    ctx.display.set_status(PAGE, "Camera ready");
                    ctx.display.set_capture_enabled(true);
                } else {
                    self.schedule(ctx, ctx.timings.readiness_poll, TimerKind::Readiness);
                }
            }
            _ => {}
        }
    }

    /// Validate the form and hand the newest frame to the worker.
    pub fn submit(&mut self, name: &str, ctx: &mut PageContext<'_>) -> Result<(), KioskError> {
        let name = IdentityStore::validate_name(name)
            .map_err(|e| KioskError::InvalidInput(e.to_string()))?;

        if self.pending {
            tracing::debug!(name, "registration already in progress; ignoring submit");
            ctx.display.set_hint(PAGE, IN_PROGRESS);
            return Ok(());
        }

        let frame = if self.feed.is_ready() {
            self.feed.freshest()
        } else {
            None
        };
        let frame = frame.ok_or(KioskError::NoFaceFrame)?;

        tracing::info!(name, sequence = frame.sequence, "registration submitted");
        let reply = self
            .engine
            .enroll(name, frame)
            .map_err(KioskError::EmbeddingFailed)?;
        self.pending = true;

        let activation = self.activation;
        ctx.scheduler
            .forward(reply, move |result| UiEvent::Enrolled { activation, result });
        Ok(())
    }

    /// Worker finished a registration.
    pub fn on_enrolled(
        &mut self,
        activation: u64,
        result: Result<IdentityRecord, crate::engine::EngineError>,
        ctx: &mut PageContext<'_>,
    ) -> Option<Transition> {
        if activation != self.activation {
            tracing::debug!("stale registration reply ignored");
            return None;
        }
        self.pending = false;

        match result {
            Ok(record) => {
                ctx.display
                    .show_info("Success", &format!("Face registered for {}", record.name));
                self.feed.stop();
                Some(Transition::to(Page::Login))
            }
            Err(e) => {
                tracing::warn!(error = %e, "registration failed");
                let err = KioskError::EmbeddingFailed(e);
                ctx.display.show_error("Error", &err.to_string());
                None
            }
        }
    }

    fn schedule(&self, ctx: &PageContext<'_>, delay: std::time::Duration, kind: TimerKind) {
        ctx.scheduler.schedule_after(
            delay,
            UiEvent::Timer(TimerEvent {
                page: PAGE,
                activation: self.activation,
                kind,
            }),
        );
    }
}
