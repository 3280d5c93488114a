// Diagnostic system rendering
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

//! Rendering of diagnostic information.

// NB: `write!` together with `\n` is preferred to `writeln!` so that there
//   is only a single sequence of characters to search for while tracking
//   down newlines,
//     rather than using both.

use super::{Level, Message};
use std::io::Write;

pub trait Reporter {
    /// Report a single message.
    ///
    /// This method _does not return [`Result`]_ and should never fail;
    ///   a reporter that cannot write has no better channel to complain
    ///   through.
    fn report(&mut self, msg: &Message);
}

/// Render messages in the traditional `file(line) : error WIXnnnn : text`
///   format understood by editors and build systems.
///
/// Each message is rendered to a buffer in full before being written,
///   so that output is not interleaved with other processes
///   (e.g. when invoked using `make -jN`).
pub struct VisualReporter<W: Write> {
    dest: W,
    program: String,
}

impl<W: Write> VisualReporter<W> {
    /// `program` prefixes messages having no source location.
    pub fn new<S: Into<String>>(dest: W, program: S) -> Self {
        Self {
            dest,
            program: program.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.dest
    }

    pub fn render(&self, msg: &Message) -> String {
        let mut buf = String::new();

        match msg.sources().and_then(|s| s.first()) {
            Some(sln) => buf.push_str(&sln.to_string()),
            None => buf.push_str(&self.program),
        }

        match msg.level() {
            Level::Verbose => buf.push_str(&format!(" : {}\n", msg.text())),
            level => buf.push_str(&format!(
                " : {} WIX{:04} : {}\n",
                level,
                msg.id(),
                msg.text()
            )),
        }

        if let Some(sources) = msg.sources() {
            for include in sources.includes() {
                buf.push_str(&format!("    included from {}\n", include));
            }
        }

        buf
    }
}

impl<W: Write> Reporter for VisualReporter<W> {
    fn report(&mut self, msg: &Message) {
        let rendered = self.render(msg);
        let _ = self.dest.write_all(rendered.as_bytes());
        let _ = self.dest.flush();
    }
}
