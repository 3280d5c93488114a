// Diagnostic system
//
//  Copyright (C) 2014-2022 Ryan Specialty Group, LLC.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Diagnostic system for error reporting.
//!
//! Every user-visible error,
//!   warning,
//!   and verbose message produced by the linker and binder flows through a
//!   single emission point:
//!     [`Messages`].
//! A message carries
//!   the chain of source locations it pertains to,
//!   a numeric id,
//!   a severity [`Level`],
//!   a resource name identifying the message template,
//!   and the arguments that were formatted into it.
//!
//! Emitting an error flips a sticky "encountered error" flag.
//! Downstream stages check that flag and skip their own destructive work
//!   once it is set,
//!     so that failures do not compound on top of already-broken state.
//! Warnings never set the flag
//!   (unless promoted by [`MessageOptions::warnings_as_errors`]).
//!
//! Errors that abort processing outright are ordinary [`Result`] errors;
//!   they too implement [`Diagnostic`] so that the caller can report them
//!   through the same channel before exiting.

mod report;

pub use report::{Reporter, VisualReporter};

use crate::span::SourceLineNumberCollection;
use std::error::Error;
use std::fmt::{self, Display};
use std::slice;

/// Diagnostic report.
///
/// This describes an error condition or other special event in terms of
///   a stable numeric id and a named message resource,
///     with the human-readable text provided by [`Display`].
pub trait Diagnostic: Error {
    /// Stable numeric identifier of this message.
    ///
    /// Rendered as `WIXnnnn`.
    fn id(&self) -> u32;

    /// Name of the message template.
    fn resource(&self) -> &'static str;

    /// Values formatted into the message template,
    ///   in order.
    fn args(&self) -> Vec<String> {
        Vec::new()
    }

    fn level(&self) -> Level {
        Level::Error
    }

    /// Source locations that this diagnostic pertains to,
    ///   if known.
    fn sources(&self) -> Option<&SourceLineNumberCollection> {
        None
    }
}

/// Diagnostic severity level.
///
/// Lower levels are more severe
///   (e.g. level 1 is the worst).
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[repr(u8)]
pub enum Level {
    /// The build cannot succeed.
    Error = 1,

    /// Something is likely wrong,
    ///   but processing may continue to a successful result.
    Warning,

    /// Informational progress output.
    Verbose,
}

impl Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
            Level::Verbose => write!(f, "verbose"),
        }
    }
}

/// A rendered diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    sources: Option<SourceLineNumberCollection>,
    id: u32,
    level: Level,
    resource: &'static str,
    args: Vec<String>,
    text: String,
}

impl Message {
    pub fn from_diagnostic<D: Diagnostic + ?Sized>(diag: &D) -> Self {
        Self {
            sources: diag.sources().cloned(),
            id: diag.id(),
            level: diag.level(),
            resource: diag.resource(),
            args: diag.args(),
            text: diag.to_string(),
        }
    }

    /// Verbose progress message not associated with any diagnostic type.
    pub fn verbose<S: Into<String>>(text: S) -> Self {
        Self {
            sources: None,
            id: 0,
            level: Level::Verbose,
            resource: "Verbose",
            args: Vec::new(),
            text: text.into(),
        }
    }

    pub fn sources(&self) -> Option<&SourceLineNumberCollection> {
        self.sources.as_ref()
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Switches affecting how messages are filtered and promoted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageOptions {
    /// Treat every warning as an error.
    pub warnings_as_errors: bool,

    /// Drop warnings entirely.
    ///
    /// Has no effect on warnings promoted by
    ///   [`Self::warnings_as_errors`].
    pub suppress_warnings: bool,

    /// Forward [`Level::Verbose`] messages to the reporter.
    pub verbose: bool,
}

/// The single emission point for messages.
///
/// Every emitted message that survives filtering is recorded and
///   forwarded to the [`Reporter`],
///     if any.
pub struct Messages {
    reporter: Option<Box<dyn Reporter>>,
    opts: MessageOptions,
    log: Vec<Message>,
    error_count: usize,
    warning_count: usize,
}

impl Messages {
    pub fn new<R: Reporter + 'static>(reporter: R, opts: MessageOptions) -> Self {
        Self {
            reporter: Some(Box::new(reporter)),
            opts,
            log: Vec::new(),
            error_count: 0,
            warning_count: 0,
        }
    }

    /// Messages are only recorded,
    ///   never rendered.
    pub fn buffered(opts: MessageOptions) -> Self {
        Self {
            reporter: None,
            opts,
            log: Vec::new(),
            error_count: 0,
            warning_count: 0,
        }
    }

    pub fn emit<D: Diagnostic + ?Sized>(&mut self, diag: &D) {
        self.emit_message(Message::from_diagnostic(diag))
    }

    pub fn emit_message(&mut self, mut msg: Message) {
        match msg.level {
            Level::Warning if self.opts.warnings_as_errors => {
                msg.level = Level::Error;
            }
            Level::Warning if self.opts.suppress_warnings => return,
            Level::Verbose if !self.opts.verbose => return,
            _ => (),
        }

        match msg.level {
            Level::Error => self.error_count += 1,
            Level::Warning => self.warning_count += 1,
            Level::Verbose => (),
        }

        if let Some(reporter) = self.reporter.as_mut() {
            reporter.report(&msg);
        }

        self.log.push(msg);
    }

    pub fn verbose<S: Into<String>>(&mut self, text: S) {
        self.emit_message(Message::verbose(text))
    }

    /// Whether any error has been emitted.
    ///
    /// This flag never resets.
    pub fn encountered_error(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Every message that was emitted and not filtered,
    ///   in emission order.
    pub fn iter(&self) -> slice::Iter<'_, Message> {
        self.log.iter()
    }

    /// Messages emitted with the given resource name.
    pub fn with_resource<'a>(
        &'a self,
        resource: &'a str,
    ) -> impl Iterator<Item = &'a Message> + 'a {
        self.log.iter().filter(move |msg| msg.resource == resource)
    }
}

impl Default for Messages {
    fn default() -> Self {
        Self::buffered(MessageOptions::default())
    }
}
