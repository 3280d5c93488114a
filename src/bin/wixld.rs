// Windows Installer linker and binder
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

//! This is the linker and binder.
//!
//! `wixld` links object and library files produced by the compiler into
//!   a single output and binds it into an installer database along with
//!   its cabinets and uncompressed files.
//!
//! For more information,
//!   see the [`wixer::ld`] and [`wixer::bind`] modules.

extern crate wixer;

use getopts::{Fail, Options};
use std::{
    env, io,
    path::{Path, PathBuf},
    time::Duration,
};
use wixer::{
    bind::{Binder, BinderOptions, CompressionLevel, FolderArchiver, IdtDirectorySink},
    diagnose::{MessageOptions, Messages, VisualReporter},
    fs::VanillaFilesystem,
    ld::{Linker, LinkerOptions, OutputType},
    row::RowCounter,
    schema::TableDefinitionCollection,
};

/// Types of commands
enum Command {
    Link(LinkCommand),
    Usage,
}

/// Everything needed to link and bind a set of inputs.
struct LinkCommand {
    inputs: Vec<String>,
    output: Option<PathBuf>,
    linker: LinkerOptions,
    binder: BinderOptions,
    messages: MessageOptions,
}

/// Entrypoint for the linker
pub fn main() {
    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = get_opts();
    let usage = opts.usage(&format!("Usage: {} [OPTIONS] INPUT...", program));

    match parse_options(opts, args) {
        Ok(Command::Link(cmd)) => {
            let mut messages = Messages::new(
                VisualReporter::new(io::stdout(), "wixld"),
                cmd.messages,
            );

            if !link(&cmd, &mut messages) {
                println!(
                    "fatal: failed to link due to previous {} error(s)",
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

/// Link the inputs of `cmd` and bind the result.
///
/// Yields whether the build succeeded;
///   all diagnostics are reported through `messages`.
fn link(cmd: &LinkCommand, messages: &mut Messages) -> bool {
    let defs = match TableDefinitionCollection::builtin() {
        Ok(defs) => defs,
        Err(e) => {
            messages.emit(&e);
            return false;
        }
    };

    let mut counter = RowCounter::new();

    let linked = {
        let mut linker = Linker::new(&defs, &mut counter, messages, cmd.linker);

        linker
            .load(&cmd.inputs)
            .and_then(|intermediates| linker.link(intermediates))
    };

    let mut output = match linked {
        Ok(output) => output,
        Err(e) => {
            messages.emit(&e);
            return false;
        }
    };

    if messages.encountered_error() {
        return false;
    }

    let path = cmd
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cmd.inputs[0], output.ty()));

    Binder::new(
        VanillaFilesystem,
        FolderArchiver::new(VanillaFilesystem),
        IdtDirectorySink::new(VanillaFilesystem),
        messages,
        cmd.binder.clone(),
    )
    .bind(&mut output, &path)
}

/// Output path derived from the first input,
///   with an extension determined by the type of output.
fn default_output(input: &str, ty: OutputType) -> PathBuf {
    let ext = match ty {
        OutputType::Product => "msi",
        OutputType::Module => "msm",
        OutputType::PatchCreation => "pcp",
    };

    Path::new(input)
        .file_stem()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("out"))
        .with_extension(ext)
}

/// Get 'Options'
///
/// ```
/// use getopts::Options;
///
/// let opts = get_opts();
/// ```
fn get_opts() -> Options {
    let mut opts = Options::new();
    opts.optopt("o", "output", "set output file name", "OUTPUT");
    opts.optmulti("b", "base-path", "search PATH for source files", "PATH");
    opts.optopt("", "layout", "lay out files beneath DIR", "DIR");
    opts.optopt("", "temp", "place temporary files in DIR", "DIR");
    opts.optopt(
        "",
        "dcl",
        "default cabinet compression level",
        "none|low|medium|high|mszip",
    );
    opts.optopt(
        "",
        "retry-delay",
        "milliseconds to wait before retrying a file transfer",
        "MS",
    );
    opts.optflag("", "sv", "suppress object and library version checks");
    opts.optflag("", "sa", "suppress resetting ACLs of laid out files");
    opts.optflag("", "sl", "suppress layout of files and cabinets");
    opts.optflag("", "keep-temp", "do not delete temporary files");
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

    let default_compression = match matches.opt_str("dcl") {
        Some(level) => level.parse::<CompressionLevel>().map_err(|_| {
            Fail::UnrecognizedOption(format!("--dcl {level}"))
        })?,
        None => CompressionLevel::default(),
    };

    let retry_delay = match matches.opt_str("retry-delay") {
        Some(ms) => ms
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| Fail::UnrecognizedOption(format!("--retry-delay {ms}")))?,
        None => BinderOptions::default().retry_delay,
    };

    let binder = BinderOptions {
        suppress_acl_reset: matches.opt_present("sa"),
        suppress_layout: matches.opt_present("sl"),
        keep_temp: matches.opt_present("keep-temp"),
        default_compression,
        retry_delay,
        temp_dir: matches.opt_str("temp").map(PathBuf::from),
        layout_dir: matches.opt_str("layout").map(PathBuf::from),
        base_paths: matches.opt_strs("b").into_iter().map(PathBuf::from).collect(),
    };

    Ok(Command::Link(LinkCommand {
        inputs: matches.free.clone(),
        output: matches.opt_str("o").map(PathBuf::from),
        linker: LinkerOptions {
            suppress_version_check: matches.opt_present("sv"),
        },
        binder,
        messages: MessageOptions {
            warnings_as_errors: matches.opt_present("wx"),
            suppress_warnings: matches.opt_present("sw"),
            verbose: matches.opt_present("v"),
        },
    }))
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
        let result = parse_options(get_opts(), args(&["-h"]));

        match result {
            Ok(Command::Usage) => {}
            _ => panic!("Help option did not parse"),
        }
    }

    #[test]
    fn parse_options_invalid() {
        let result = parse_options(get_opts(), args(&["-q"]));

        match result {
            Err(Fail::UnrecognizedOption(_)) => {}
            _ => panic!("Invalid option not caught"),
        }
    }

    #[test]
    fn parse_options_missing_input() {
        let result = parse_options(get_opts(), args(&["-o", "foo.msi"]));

        match result {
            Err(Fail::OptionMissing(opt)) => assert_eq!("INPUT", opt),
            _ => panic!("Missing input not caught"),
        }
    }

    #[test]
    fn parse_options_invalid_compression_level() {
        let result = parse_options(get_opts(), args(&["--dcl", "extreme", "a.wixobj"]));

        match result {
            Err(Fail::UnrecognizedOption(opt)) => assert_eq!("--dcl extreme", opt),
            _ => panic!("Invalid compression level not caught"),
        }
    }

    #[test]
    fn parse_options_defaults() {
        let result = parse_options(get_opts(), args(&["a.wixobj", "b.wixlib"]));

        match result {
            Ok(Command::Link(cmd)) => {
                assert_eq!(vec!["a.wixobj", "b.wixlib"], cmd.inputs);
                assert_eq!(None, cmd.output);
                assert!(!cmd.linker.suppress_version_check);
                assert!(!cmd.binder.suppress_layout);
                assert_eq!(CompressionLevel::Mszip, cmd.binder.default_compression);
                assert!(cmd.binder.base_paths.is_empty());
                assert!(!cmd.messages.verbose);
            }
            _ => panic!("Unable to parse defaults"),
        }
    }

    #[test]
    fn parse_options_all() {
        let result = parse_options(
            get_opts(),
            args(&[
                "-o", "out.msi", "-b", "one", "-b", "two", "--layout", "img",
                "--temp", "tmp", "--dcl", "high", "--retry-delay", "5", "--sv",
                "--sa", "--sl", "--keep-temp", "--wx", "--sw", "-v", "a.wixobj",
            ]),
        );

        match result {
            Ok(Command::Link(cmd)) => {
                assert_eq!(Some(PathBuf::from("out.msi")), cmd.output);
                assert!(cmd.linker.suppress_version_check);

                let b = cmd.binder;
                assert_eq!(vec![PathBuf::from("one"), PathBuf::from("two")], b.base_paths);
                assert_eq!(Some(PathBuf::from("img")), b.layout_dir);
                assert_eq!(Some(PathBuf::from("tmp")), b.temp_dir);
                assert_eq!(CompressionLevel::High, b.default_compression);
                assert_eq!(Duration::from_millis(5), b.retry_delay);
                assert!(b.suppress_acl_reset && b.suppress_layout && b.keep_temp);

                let m = cmd.messages;
                assert!(m.warnings_as_errors && m.suppress_warnings && m.verbose);
            }
            _ => panic!("Unable to parse options"),
        }
    }

    #[test]
    fn default_output_follows_output_type() {
        assert_eq!(
            PathBuf::from("product.msi"),
            default_output("obj/product.wixobj", OutputType::Product)
        );
        assert_eq!(
            PathBuf::from("module.msm"),
            default_output("module.wixobj", OutputType::Module)
        );
    }
}
