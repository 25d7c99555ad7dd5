//! Page presenters for the two capturing pages.
//!
//! Each presenter owns a [`CaptureSession`] and is the only consumer of its
//! frame buffer. Presenters never switch pages themselves; they return a
//! [`Transition`] for the controller to carry out.

pub mod authentication;
pub mod registration;

pub use authentication::AuthenticationPresenter;
pub use registration::RegistrationPresenter;

use crate::ui::Page;
use facegate_hw::{CameraError, CaptureSession, Frame};

/// A page change requested by a presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub page: Page,
    /// Authenticated identity; only ever set for [`Page::Secure`].
    pub identity: Option<String>,
}

impl Transition {
    pub fn to(page: Page) -> Self {
        Self {
            page,
            identity: None,
        }
    }

    pub fn secure(identity: String) -> Self {
        Self {
            page: Page::Secure,
            identity: Some(identity),
        }
    }
}

/// Capture session plus the most recent frame taken from its buffer.
pub(crate) struct CaptureFeed {
    session: CaptureSession,
    latest: Option<Frame>,
}

impl CaptureFeed {
    pub(crate) fn new(session: CaptureSession) -> Self {
        Self {
            session,
            latest: None,
        }
    }

    pub(crate) fn start(&mut self) -> Result<(), CameraError> {
        self.latest = None;
        self.session.start()
    }

    pub(crate) fn stop(&mut self) {
        self.session.stop();
        self.latest = None;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.session.is_running()
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// Take a new frame from the buffer if one arrived since the last call.
    pub(crate) fn refresh(&mut self) -> Option<&Frame> {
        let frame = self.session.buffer().try_take()?;
        self.latest = Some(frame);
        self.latest.as_ref()
    }

    /// The newest frame seen so far, refreshing first.
    pub(crate) fn freshest(&mut self) -> Option<Frame> {
        self.refresh();
        self.latest.clone()
    }
}
