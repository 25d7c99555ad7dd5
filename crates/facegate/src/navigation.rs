//! Page state machine.
//!
//! Every transition stops capture on all pages before the destination page
//! starts its own, so at most one camera handle is open at any time. The
//! authenticated identity exists only as the payload of a transition into
//! [`Page::Secure`] and is owned here.

use crate::config::Timings;
use crate::pages::{AuthenticationPresenter, RegistrationPresenter, Transition};
use crate::ui::{Display, Page, PageContext, Scheduler, UiEvent};
use std::ops::ControlFlow;
use tokio::sync::mpsc;

pub struct NavigationController {
    current: Page,
    identity: Option<String>,
    registration: RegistrationPresenter,
    authentication: AuthenticationPresenter,
    display: Box<dyn Display>,
    scheduler: Scheduler,
    timings: Timings,
}

impl NavigationController {
    /// Build the controller on the login page.
    pub fn new(
        registration: RegistrationPresenter,
        authentication: AuthenticationPresenter,
        mut display: Box<dyn Display>,
        scheduler: Scheduler,
        timings: Timings,
    ) -> Self {
        display.show_page(Page::Login);
        Self {
            current: Page::Login,
            identity: None,
            registration,
            authentication,
            display,
            scheduler,
            timings,
        }
    }

    pub fn current_page(&self) -> Page {
        self.current
    }

    /// Identity carried into the secure page, if that is where we are.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Number of pages with a running capture session.
    pub fn active_captures(&self) -> usize {
        usize::from(self.registration.is_capturing()) + usize::from(self.authentication.is_capturing())
    }

    /// Switch pages. `identity` is kept only when `page` is the secure page.
    pub fn navigate_to(&mut self, page: Page, identity: Option<String>) {
        let mut ctx = PageContext {
            display: self.display.as_mut(),
            scheduler: &self.scheduler,
            timings: &self.timings,
        };

        self.registration.deactivate(&mut ctx);
        self.authentication.deactivate();

        tracing::info!(from = %self.current, to = %page, "navigate");
        self.current = page;
        self.identity = if page == Page::Secure { identity } else { None };
        ctx.display.show_page(page);

        let started = match page {
            Page::Secure => {
                ctx.display.set_welcome(self.identity.as_deref().unwrap_or_default());
                Ok(())
            }
            Page::Registration => self.registration.activate(&mut ctx),
            Page::Authentication => self.authentication.activate(&mut ctx),
            Page::Login => Ok(()),
        };

        if let Err(e) = started {
            tracing::error!(page = %page, error = %e, "page could not start capture");
            ctx.display.show_error("Camera Error", &e.to_string());
        }
    }

    /// Return to login and forget any authenticated identity.
    pub fn logout(&mut self) {
        tracing::info!(identity = ?self.identity, "logout");
        self.navigate_to(Page::Login, None);
    }

    /// Handle one UI event. Breaks when the kiosk should exit.
    pub fn handle(&mut self, event: UiEvent) -> ControlFlow<()> {
        let mut ctx = PageContext {
            display: self.display.as_mut(),
            scheduler: &self.scheduler,
            timings: &self.timings,
        };

        let transition = match event {
            UiEvent::Navigate(Page::Secure) => {
                tracing::warn!("secure page is only reachable through authentication");
                None
            }
            UiEvent::Navigate(page) => Some(Transition::to(page)),
            UiEvent::Logout => {
                self.logout();
                None
            }
            UiEvent::Submit(name) => {
                if self.current != Page::Registration {
                    tracing::warn!(page = %self.current, "submit outside registration ignored");
                } else if let Err(e) = self.registration.submit(&name, &mut ctx) {
                    tracing::info!(error = %e, "registration rejected");
                    if e.is_inline() {
                        ctx.display.set_hint(Page::Registration, &e.to_string());
                    } else {
                        ctx.display.show_error("Error", &e.to_string());
                    }
                }
                None
            }
            UiEvent::Timer(timer) => match timer.page {
                _ if timer.page != self.current => None,
                Page::Registration => {
                    self.registration.on_timer(&timer, &mut ctx);
                    None
                }
                Page::Authentication => self.authentication.on_timer(&timer, &mut ctx),
                Page::Login | Page::Secure => None,
            },
            UiEvent::Enrolled { activation, result } => {
                self.registration.on_enrolled(activation, result, &mut ctx)
            }
            UiEvent::Identified { activation, result } => {
                self.authentication.on_identified(activation, result, &mut ctx);
                None
            }
            UiEvent::Quit => return ControlFlow::Break(()),
        };

        if let Some(Transition { page, identity }) = transition {
            self.navigate_to(page, identity);
        }
        ControlFlow::Continue(())
    }

    /// Drain events until `Quit`, then release every camera.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<UiEvent>) {
        while let Some(event) = events.recv().await {
            if self.handle(event).is_break() {
                break;
            }
        }
        self.shutdown();
    }

    /// Stop all capture sessions.
    pub fn shutdown(&mut self) {
        let mut ctx = PageContext {
            display: self.display.as_mut(),
            scheduler: &self.scheduler,
            timings: &self.timings,
        };
        self.registration.deactivate(&mut ctx);
        self.authentication.deactivate();
        tracing::info!("kiosk shut down");
    }
}
