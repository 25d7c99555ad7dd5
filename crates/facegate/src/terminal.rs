//! Line-oriented stand-in for the kiosk screens.
//!
//! Pages, statuses and dialogs are printed; button presses are typed on
//! stdin, one command per line.

use crate::ui::{Display, Indicator, Page, Scheduler, UiEvent};
use facegate_hw::Frame;
use std::io::{self, BufRead, Write};

pub const HELP: &str = "commands: scan | register | submit <name> | back | logout | quit";

/// Renders the kiosk to a text stream.
pub struct TerminalDisplay<W: Write> {
    out: W,
    previews: u64,
}

impl TerminalDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out, previews: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            tracing::warn!(error = %e, "terminal write failed");
        }
    }
}

impl<W: Write> Display for TerminalDisplay<W> {
    fn show_page(&mut self, page: Page) {
        match page {
            Page::Login => self.line(format_args!("== CLASSIFIED ACCESS ==  [register] [scan]")),
            Page::Registration => self.line(format_args!("== REGISTER ==  submit <name> | back")),
            Page::Authentication => self.line(format_args!("== AUTHENTICATE ==  back")),
            Page::Secure => self.line(format_args!("== SECURE AREA ==  logout")),
        }
    }

    fn set_preview(&mut self, page: Page, frame: &Frame) {
        // Frames are not drawable here; keep a trace of the preview rate.
        self.previews += 1;
        tracing::trace!(
            page = %page,
            sequence = frame.sequence,
            brightness = frame.avg_brightness(),
            total = self.previews,
            "preview updated"
        );
    }

    fn set_status(&mut self, page: Page, text: &str) {
        self.line(format_args!("[{page}] {text}"));
    }

    fn set_hint(&mut self, page: Page, text: &str) {
        self.line(format_args!("[{page}] ! {text}"));
    }

    fn set_indicator(&mut self, page: Page, indicator: Indicator) {
        match indicator {
            // The scanning animation would flood the terminal.
            Indicator::Scanning(_) => {}
            Indicator::Granted => self.line(format_args!("[{page}] (green)")),
            Indicator::Denied => self.line(format_args!("[{page}] (red)")),
        }
    }

    fn set_capture_enabled(&mut self, enabled: bool) {
        if enabled {
            self.line(format_args!("[registration] capture enabled"));
        }
    }

    fn set_welcome(&mut self, identity: &str) {
        self.line(format_args!("WELCOME AGENT {identity}!!  TOP SECRET TERMINAL"));
        self.line(format_args!(
            "This terminal contains classified information. Proceed with caution."
        ));
    }

    fn show_error(&mut self, title: &str, message: &str) {
        self.line(format_args!("** {title}: {message}"));
    }

    fn show_info(&mut self, title: &str, message: &str) {
        self.line(format_args!("-- {title}: {message}"));
    }
}

/// Map one input line to a UI event.
pub fn parse_command(line: &str) -> Option<UiEvent> {
    let line = line.trim();
    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let event = match command.to_ascii_lowercase().as_str() {
        "scan" | "authenticate" => UiEvent::Navigate(Page::Authentication),
        "register" => UiEvent::Navigate(Page::Registration),
        "submit" => UiEvent::Submit(rest.to_string()),
        "back" | "login" => UiEvent::Navigate(Page::Login),
        "logout" => UiEvent::Logout,
        "quit" | "exit" => UiEvent::Quit,
        _ => return None,
    };
    Some(event)
}

/// Forward commands from `input` until EOF, then ask the kiosk to quit.
///
/// Blocks; run it on its own thread.
pub fn read_commands(input: impl BufRead, scheduler: &Scheduler) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Some(UiEvent::Quit) => break,
            Some(event) => scheduler.post(event),
            None => println!("{HELP}"),
        }
    }
    scheduler.post(UiEvent::Quit);
}
