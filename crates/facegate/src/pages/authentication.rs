//! Authentication page: scan animation, warm-up, one recognition attempt,
//! then a timed hand-off to the secure page or back to login.

use super::{CaptureFeed, Transition};
use crate::engine::{EngineError, EngineHandle};
use crate::error::KioskError;
use crate::ui::{AuthOutcome, Indicator, Page, PageContext, TimerEvent, TimerKind, UiEvent};
use facegate_core::MatchResult;
use facegate_hw::CaptureSession;
use std::time::Duration;

const PAGE: Page = Page::Authentication;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Not shown, or shown without a camera.
    Idle,
    /// Waiting for the camera to settle.
    WarmingUp,
    /// Looking for a frame to submit.
    Polling,
    /// One attempt is with the worker.
    Recognizing,
    /// Outcome shown; waiting to leave the page.
    Finished,
}

pub struct AuthenticationPresenter {
    feed: CaptureFeed,
    engine: EngineHandle,
    activation: u64,
    phase: Phase,
    scan_step: bool,
}

impl AuthenticationPresenter {
    pub fn new(session: CaptureSession, engine: EngineHandle) -> Self {
        Self {
            feed: CaptureFeed::new(session),
            engine,
            activation: 0,
            phase: Phase::Idle,
            scan_step: false,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.feed.is_running()
    }

    /// True while a recognition attempt is outstanding.
    pub fn is_recognizing(&self) -> bool {
        self.phase == Phase::Recognizing
    }

    pub fn activate(&mut self, ctx: &mut PageContext<'_>) -> Result<(), KioskError> {
        self.activation += 1;
        self.phase = Phase::Idle;
        self.scan_step = false;
        ctx.display.set_status(PAGE, "SCANNING...");
        ctx.display.set_indicator(PAGE, Indicator::Scanning(self.scan_step));

        self.feed.start()?;
        self.phase = Phase::WarmingUp;

        self.schedule(ctx, ctx.timings.preview_tick, TimerKind::Preview);
        self.schedule(ctx, ctx.timings.scan_cadence, TimerKind::Scan);
        self.schedule(ctx, ctx.timings.warm_up, TimerKind::Poll);
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.activation += 1;
        self.phase = Phase::Idle;
        self.feed.stop();
    }

    pub fn on_timer(&mut self, timer: &TimerEvent, ctx: &mut PageContext<'_>) -> Option<Transition> {
        if timer.activation != self.activation {
            return None;
        }
        match &timer.kind {
            TimerKind::Preview if self.feed.is_running() => {
                if let Some(frame) = self.feed.refresh() {
                    ctx.display.set_preview(PAGE, frame);
                }
                self.schedule(ctx, ctx.timings.preview_tick, TimerKind::Preview);
            }
            TimerKind::Scan if self.feed.is_running() => {
                self.scan_step = !self.scan_step;
                ctx.display.set_indicator(PAGE, Indicator::Scanning(self.scan_step));
                self.schedule(ctx, ctx.timings.scan_cadence, TimerKind::Scan);
            }
            TimerKind::Poll if self.feed.is_running() => self.poll(ctx),
            TimerKind::Finish(outcome) if self.phase == Phase::Finished => {
                return Some(match outcome {
                    AuthOutcome::Granted(identity) => Transition::secure(identity.clone()),
                    AuthOutcome::Denied => Transition::to(Page::Login),
                });
            }
            _ => {}
        }
        None
    }

    /// Submit the newest frame, or re-poll shortly if none has arrived.
    fn poll(&mut self, ctx: &mut PageContext<'_>) {
        if !matches!(self.phase, Phase::WarmingUp | Phase::Polling) {
            return;
        }
        self.phase = Phase::Polling;

        let Some(frame) = self.feed.freshest() else {
            tracing::debug!("no frame yet; re-polling");
            self.schedule(ctx, ctx.timings.repoll, TimerKind::Poll);
            return;
        };

        tracing::info!(sequence = frame.sequence, "recognition attempt submitted");
        match self.engine.identify(frame) {
            Ok(reply) => {
                self.phase = Phase::Recognizing;
                let activation = self.activation;
                ctx.scheduler
                    .forward(reply, move |result| UiEvent::Identified { activation, result });
            }
            Err(e) => self.conclude(Err(e), ctx),
        }
    }

    /// Worker finished the recognition attempt.
    pub fn on_identified(
        &mut self,
        activation: u64,
        result: Result<MatchResult, EngineError>,
        ctx: &mut PageContext<'_>,
    ) {
        if activation != self.activation || self.phase != Phase::Recognizing {
            tracing::debug!("stale recognition reply ignored");
            return;
        }
        self.conclude(result, ctx);
    }

    /// Stop capture, show the outcome, and schedule the page change.
    /// Worker errors count as a denial.
    fn conclude(&mut self, result: Result<MatchResult, EngineError>, ctx: &mut PageContext<'_>) {
        self.feed.stop();
        self.phase = Phase::Finished;

        let outcome = match result {
            Ok(MatchResult {
                matched: true,
                identity: Some(identity),
                ..
            }) => AuthOutcome::Granted(identity),
            Ok(_) => AuthOutcome::Denied,
            Err(e) => {
                tracing::warn!(error = %KioskError::MatchError(e), "treating as denied");
                AuthOutcome::Denied
            }
        };

        let delay: Duration = match &outcome {
            AuthOutcome::Granted(identity) => {
                tracing::info!(identity = %identity, "access granted");
                ctx.display
                    .set_status(PAGE, &format!("ACCESS GRANTED: Welcome, {identity}"));
                ctx.display.set_indicator(PAGE, Indicator::Granted);
                ctx.timings.granted_display
            }
            AuthOutcome::Denied => {
                tracing::info!("access denied");
                ctx.display.set_status(PAGE, "ACCESS DENIED");
                ctx.display.set_indicator(PAGE, Indicator::Denied);
                ctx.timings.denied_display
            }
        };
        self.schedule(ctx, delay, TimerKind::Finish(outcome));
    }

    fn schedule(&self, ctx: &PageContext<'_>, delay: Duration, kind: TimerKind) {
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
