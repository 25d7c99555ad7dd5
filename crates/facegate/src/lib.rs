//! facegate — face registration and camera-gated access to a secure screen.
//!
//! The kiosk has four pages. Registration and authentication each own a
//! capture session; the [`NavigationController`] makes sure only the page on
//! screen has its camera open. Embedding and matching run on a separate
//! worker thread ([`engine`]) so the UI loop never blocks.

pub mod config;
pub mod engine;
pub mod error;
pub mod navigation;
pub mod pages;
pub mod terminal;
pub mod ui;

pub use config::{Config, ConfigError, Timings};
pub use engine::{spawn_engine, EngineError, EngineHandle};
pub use error::KioskError;
pub use navigation::NavigationController;
pub use pages::{AuthenticationPresenter, RegistrationPresenter, Transition};
pub use terminal::TerminalDisplay;
pub use ui::{Display, Indicator, Page, Scheduler, UiEvent};
