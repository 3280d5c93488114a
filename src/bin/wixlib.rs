// Windows Installer librarian
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

//! This is the librarian.
//!
//! `wixlib` combines object and library files into a single library
//!   that can later be linked by [`wixld`](../wixld).
//! Sections are not resolved,
//!   so no entry section is required;
//!     duplicate symbols are nonetheless reported.

extern crate wixer;

use getopts::{Fail, Options};
use std::{
    env,
    error::Error,
    fmt::{self, Display},
    fs,
    io::{self, BufWriter, Write},
    path::PathBuf,
};
use wixer::{
    diagnose::{Diagnostic, MessageOptions, Messages, VisualReporter},
    ld::{Linker, LinkerOptions},
    obj::ObjWriter,
    row::RowCounter,
    schema::TableDefinitionCollection,
    xir::XirError,
};

/// Types of commands
enum Command {
    Combine(CombineCommand),
    Usage,
}

struct CombineCommand {
    inputs: Vec<String>,
    output: PathBuf,
    linker: LinkerOptions,
    messages: MessageOptions,
}

/// Entrypoint for the librarian
pub fn main() {
    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = get_opts();
    let usage = opts.usage(&format!("Usage: {} -o OUTPUT [OPTIONS] INPUT...", program));

    match parse_options(opts, args) {
        Ok(Command::Combine(cmd)) => {
            let mut messages = Messages::new(
                VisualReporter::new(io::stdout(), "wixlib"),
                cmd.messages,
            );

            if !combine(&cmd, &mut messages) {
                println!(
                    "fatal: failed to create `{}` due to previous {} error(s)",
                    cmd.output.display(),
                    messages.error_count().max(1)
                );

                std::process::exit(1);
            }
        }
        Ok(Command::Usage) => {
            println!("{}", usage);
            std::process::exit(exitcode::OK);
        }
        Err(e) => {
            eprintln!("{}", e);
            println!("{}", usage);
            std::process::exit(exitcode::USAGE);
        }
    }
}

/// Combine the inputs of `cmd` into a library.
///
/// The library is written only if no error was encountered.
fn combine(cmd: &CombineCommand, messages: &mut Messages) -> bool {
    let defs = match TableDefinitionCollection::builtin() {
        Ok(defs) => defs,
        Err(e) => {
            messages.emit(&e);
            return false;
        }
    };

    let mut counter = RowCounter::new();

    let library = {
        let mut linker = Linker::new(&defs, &mut counter, messages, cmd.linker);

        linker
            .load(&cmd.inputs)
            .map(|intermediates| linker.combine(intermediates))
    };

    let library = match library {
        Ok(library) => library,
        Err(e) => {
            messages.emit(&e);
            return false;
        }
    };

    if messages.encountered_error() {
        return false;
    }

    let written = fs::File::create(&cmd.output)
        .map_err(WixlibError::Io)
        .and_then(|file| {
            let mut writer = ObjWriter::new(BufWriter::new(file));
            writer.write_library(&library).map_err(WixlibError::Xir)?;
            writer.into_inner().flush().map_err(WixlibError::Io)
        });

    match written {
        Ok(()) => {
            messages.verbose(format!("wrote library `{}`", cmd.output.display()));
            true
        }
        Err(e) => {
            messages.emit(&e);
            false
        }
    }
}

/// Get 'Options'
fn get_opts() -> Options {
    let mut opts = Options::new();
    opts.optopt("o", "output", "set output file name", "OUTPUT");
    opts.optflag("", "sv", "suppress object and library version checks");
    opts.optflag("", "wx", "treat warnings as errors");
    opts.optflag("", "sw", "suppress warnings");
    opts.optflag("v", "verbose", "emit verbose messages");
    opts.optflag("h", "help", "print this help menu");

    opts
}

/// Option parser
fn parse_options(opts: Options, args: Vec<String>) -> Result<Command, Fail> {
    let matches = opts.parse(&args[1..])?;

    if matches.opt_present("h") {
        return Ok(Command::Usage);
    }

    if matches.free.is_empty() {
        return Err(Fail::OptionMissing(String::from("INPUT")));
    }

    let output = match matches.opt_str("o") {
        Some(output) => PathBuf::from(output),
        None => return Err(Fail::OptionMissing(String::from("-o OUTPUT"))),
    };

    Ok(Command::Combine(CombineCommand {
        inputs: matches.free.clone(),
        output,
        linker: LinkerOptions {
            suppress_version_check: matches.opt_present("sv"),
        },
        messages: MessageOptions {
            warnings_as_errors: matches.opt_present("wx"),
            suppress_warnings: matches.opt_present("sw"),
            verbose: matches.opt_present("v"),
        },
    }))
}

/// Librarian (`wixlib`) error writing its output.
#[derive(Debug)]
enum WixlibError {
    Io(io::Error),
    Xir(XirError),
}

impl Display for WixlibError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot create library: {e}"),
            Self::Xir(e) => write!(f, "cannot write library: {e}"),
        }
    }
}

impl Error for WixlibError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Xir(e) => Some(e),
        }
    }
}

impl Diagnostic for WixlibError {
    fn id(&self) -> u32 {
        1
    }

    fn resource(&self) -> &'static str {
        "LibraryWriteFailed"
    }

    fn args(&self) -> Vec<String> {
        vec![self.to_string()]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("program")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parse_options_help() {
        match parse_options(get_opts(), args(&["--help"])) {
            Ok(Command::Usage) => {}
            _ => panic!("Help option did not parse"),
        }
    }

    #[test]
    fn parse_options_invalid() {
        match parse_options(get_opts(), args(&["-q"])) {
            Err(Fail::UnrecognizedOption(_)) => {}
            _ => panic!("Invalid option not caught"),
        }
    }

    #[test]
    fn parse_options_missing_output() {
        match parse_options(get_opts(), args(&["a.wixobj"])) {
            Err(Fail::OptionMissing(opt)) => assert_eq!("-o OUTPUT", opt),
            _ => panic!("Missing output not caught"),
        }
    }

    #[test]
    fn parse_options_missing_input() {
        match parse_options(get_opts(), args(&["-o", "out.wixlib"])) {
            Err(Fail::OptionMissing(opt)) => assert_eq!("INPUT", opt),
            _ => panic!("Missing input not caught"),
        }
    }

    #[test]
    fn parse_options_combine() {
        let result = parse_options(
            get_opts(),
            args(&["-o", "out.wixlib", "--sv", "--wx", "a.wixobj", "b.wixobj"]),
        );

        match result {
            Ok(Command::Combine(cmd)) => {
                assert_eq!(PathBuf::from("out.wixlib"), cmd.output);
                assert_eq!(vec!["a.wixobj", "b.wixobj"], cmd.inputs);
                assert!(cmd.linker.suppress_version_check);
                assert!(cmd.messages.warnings_as_errors);
                assert!(!cmd.messages.suppress_warnings);
            }
            _ => panic!("Unable to parse options"),
        }
    }
}
