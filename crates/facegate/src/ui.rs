//! The UI side of the kiosk: pages, events, the timer primitive, and the
//! display boundary.
//!
//! Everything here runs on one cooperative UI context. Timers and worker
//! replies arrive as [`UiEvent`]s on a single channel that the
//! [`NavigationController`](crate::navigation::NavigationController)
//! drains; nothing on the UI side ever blocks.

use crate::engine::EngineError;
use facegate_core::{IdentityRecord, MatchResult};
use facegate_hw::Frame;
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Login,
    Registration,
    Authentication,
    Secure,
}

impl Page {
    /// Pages that own a running capture session while shown.
    pub fn captures(self) -> bool {
        matches!(self, Page::Registration | Page::Authentication)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Page::Login => "login",
            Page::Registration => "registration",
            Page::Authentication => "authentication",
            Page::Secure => "secure",
        };
        f.write_str(name)
    }
}

/// Outcome of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Granted(String),
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind {
    /// Refresh the preview from the frame buffer.
    Preview,
    /// Check whether the first frame has landed.
    Readiness,
    /// Alternate the scanning indicator.
    Scan,
    /// Look for a frame to submit for recognition.
    Poll,
    /// Leave the authentication page after showing the outcome.
    Finish(AuthOutcome),
}

/// A timer that fired. `activation` ties it to one showing of `page`;
/// timers from an earlier showing are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEvent {
    pub page: Page,
    pub activation: u64,
    pub kind: TimerKind,
}

#[derive(Debug)]
pub enum UiEvent {
    /// The user picked a page (button press).
    Navigate(Page),
    /// The registration form was submitted.
    Submit(String),
    Logout,
    Timer(TimerEvent),
    Enrolled {
        activation: u64,
        result: Result<IdentityRecord, EngineError>,
    },
    Identified {
        activation: u64,
        result: Result<MatchResult, EngineError>,
    },
    Quit,
}

/// Posts events to the UI loop, now or after a delay.
#[derive(Clone)]
pub struct Scheduler {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl Scheduler {
    /// Create a scheduler and the receiving end the UI loop drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn post(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("UI loop gone; event dropped");
        }
    }

    /// Deliver `event` after `delay`. Must be called from within the
    /// runtime driving the UI loop.
    pub fn schedule_after(&self, delay: Duration, event: UiEvent) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
    }

    /// Deliver a worker reply as a UI event once it arrives.
    pub fn forward<T: Send + 'static>(
        &self,
        reply: oneshot::Receiver<Result<T, EngineError>>,
        into: impl FnOnce(Result<T, EngineError>) -> UiEvent + Send + 'static,
    ) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = reply.await.unwrap_or(Err(EngineError::ChannelClosed));
            let _ = tx.send(into(result));
        });
    }
}

/// Visual state of the authentication page's indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// Scanning animation; the flag alternates on every step.
    Scanning(bool),
    Granted,
    Denied,
}

/// The widget toolkit boundary. Implementations render; they never call
/// back into the kiosk.
pub trait Display {
    fn show_page(&mut self, page: Page);
    fn set_preview(&mut self, page: Page, frame: &Frame);
    fn set_status(&mut self, page: Page, text: &str);
    /// Inline message next to the page's input (e.g. a rejected name).
    fn set_hint(&mut self, page: Page, text: &str);
    fn set_indicator(&mut self, page: Page, indicator: Indicator);
    /// Enable or disable the registration page's capture button.
    fn set_capture_enabled(&mut self, enabled: bool);
    fn set_welcome(&mut self, identity: &str);
    fn show_error(&mut self, title: &str, message: &str);
    fn show_info(&mut self, title: &str, message: &str);
}

/// Borrowed view of the UI resources a presenter may touch.
pub struct PageContext<'a> {
    pub display: &'a mut dyn Display,
    pub scheduler: &'a Scheduler,
    pub timings: &'a crate::config::Timings,
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Shown {
        Page(Page),
        Preview(Page, u32),
        Status(Page, String),
        Hint(Page, String),
        Indicator(Page, Indicator),
        CaptureEnabled(bool),
        Welcome(String),
        Error(String, String),
        Info(String, String),
    }

    /// Display that records every call.
    #[derive(Clone, Default)]
    pub struct RecordingDisplay {
        pub log: Arc<Mutex<Vec<Shown>>>,
    }

    impl RecordingDisplay {
        pub fn events(&self) -> Vec<Shown> {
            self.log.lock().clone()
        }

        pub fn contains(&self, shown: &Shown) -> bool {
            self.log.lock().contains(shown)
        }

        pub fn errors(&self) -> Vec<String> {
            self.log
                .lock()
                .iter()
                .filter_map(|s| match s {
                    Shown::Error(_, msg) => Some(msg.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn previews(&self, page: Page) -> usize {
            self.log
                .lock()
                .iter()
                .filter(|s| matches!(s, Shown::Preview(p, _) if *p == page))
                .count()
        }
    }

    impl Display for RecordingDisplay {
        fn show_page(&mut self, page: Page) {
            self.log.lock().push(Shown::Page(page));
        }
        fn set_preview(&mut self, page: Page, frame: &Frame) {
            self.log.lock().push(Shown::Preview(page, frame.sequence));
        }
        fn set_status(&mut self, page: Page, text: &str) {
            self.log.lock().push(Shown::Status(page, text.to_string()));
        }
        fn set_hint(&mut self, page: Page, text: &str) {
            self.log.lock().push(Shown::Hint(page, text.to_string()));
        }
        fn set_indicator(&mut self, page: Page, indicator: Indicator) {
            self.log.lock().push(Shown::Indicator(page, indicator));
        }
        fn set_capture_enabled(&mut self, enabled: bool) {
            self.log.lock().push(Shown::CaptureEnabled(enabled));
        }
        fn set_welcome(&mut self, identity: &str) {
            self.log.lock().push(Shown::Welcome(identity.to_string()));
        }
        fn show_error(&mut self, title: &str, message: &str) {
            self.log.lock().push(Shown::Error(title.to_string(), message.to_string()));
        }
        fn show_info(&mut self, title: &str, message: &str) {
            self.log.lock().push(Shown::Info(title.to_string(), message.to_string()));
        }
    }

    /// Compressed timings so page flows finish in milliseconds.
    pub fn fast_timings() -> crate::config::Timings {
        crate::config::Timings {
            capture_interval: Duration::from_millis(2),
            preview_tick: Duration::from_millis(2),
            readiness_poll: Duration::from_millis(5),
            scan_cadence: Duration::from_millis(5),
            warm_up: Duration::from_millis(20),
            repoll: Duration::from_millis(5),
            granted_display: Duration::from_millis(10),
            denied_display: Duration::from_millis(20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schedule_after_delivers_in_order() {
        let (scheduler, mut rx) = Scheduler::channel();
        scheduler.schedule_after(Duration::from_millis(30), UiEvent::Logout);
        scheduler.schedule_after(Duration::from_millis(5), UiEvent::Quit);
        scheduler.post(UiEvent::Navigate(Page::Registration));

        assert!(matches!(rx.recv().await, Some(UiEvent::Navigate(Page::Registration))));
        assert!(matches!(rx.recv().await, Some(UiEvent::Quit)));
        assert!(matches!(rx.recv().await, Some(UiEvent::Logout)));
    }

    #[tokio::test]
    async fn test_forward_maps_dropped_sender_to_closed() {
        let (scheduler, mut rx) = Scheduler::channel();
        let (tx, reply) = oneshot::channel::<Result<MatchResult, EngineError>>();
        drop(tx);
        scheduler.forward(reply, |result| UiEvent::Identified { activation: 3, result });

        match rx.recv().await {
            Some(UiEvent::Identified { activation: 3, result: Err(EngineError::ChannelClosed) }) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_capturing_pages() {
        assert!(Page::Registration.captures());
        assert!(Page::Authentication.captures());
        assert!(!Page::Login.captures());
        assert!(!Page::Secure.captures());
    }
}
