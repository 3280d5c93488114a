// Windows Installer linker library
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

//! The [linker][] is responsible for combining individually compiled
//!   object files into a single [`Output`] ready for binding.
//!
//! Its user-facing binary is [`wixld`][wixld];
//!   [`wixlib`][wixlib] uses the same machinery to combine objects into a
//!   reusable library without resolving them.
//!
//! [linker]: https://en.wikipedia.org/wiki/Linker_(computing)
//! [wixld]: ../../wixld
//! [wixlib]: ../../wixlib
//!
//! Linking proceeds in passes:
//!
//!   1. Every input is [loaded](Linker::load) once,
//!        with libraries expanded into their constituent intermediates.
//!   2. The single entry section is located
//!        (see [`find_entry_section`]).
//!   3. A symbol table is built over every section,
//!        reporting each duplicate definition.
//!   4. The [`SectionGraph`] is walked from the entry section;
//!        sections not reached are pruned,
//!        and every unresolved reference of a reached section is reported.
//!   5. Tables of reachable sections are merged into the [`Output`],
//!        complex references and feature backlinks are materialized,
//!        and actions are scheduled into their sequence tables.
//!   6. Primary keys are validated across every output table.
//!
//! Errors of steps 3 through 6 are emitted through [`Messages`] and do not
//!   abort the link,
//!     so that as many as possible are reported at once;
//!       the caller must consult [`Messages::encountered_error`] before
//!       using the output.

mod complex;
mod error;
mod output;
mod resolve;
mod sequence;

pub use error::LinkError;
pub use output::{Output, OutputRow, OutputTable, OutputType};
pub use resolve::{build_symbols, find_entry_section, SectionGraph};

use crate::action::ActionTable;
use crate::diagnose::Messages;
use crate::fs::{Input, InputFiles};
use crate::obj::{load_any, Intermediate, Library, Object, Section};
use crate::row::RowCounter;
use crate::schema::TableDefinitionCollection;
use std::path::Path;

/// Options controlling the loading and linking of inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkerOptions {
    /// Accept object and library files of any format version.
    pub suppress_version_check: bool,
}

/// Links intermediates into an [`Output`] or combines them into a
///   [`Library`].
pub struct Linker<'a> {
    defs: &'a TableDefinitionCollection,
    counter: &'a mut RowCounter,
    messages: &'a mut Messages,
    opts: LinkerOptions,
}

impl<'a> Linker<'a> {
    pub fn new(
        defs: &'a TableDefinitionCollection,
        counter: &'a mut RowCounter,
        messages: &'a mut Messages,
        opts: LinkerOptions,
    ) -> Self {
        Self {
            defs,
            counter,
            messages,
            opts,
        }
    }

    /// Load every object and library file of `paths`,
    ///   each at most once.
    ///
    /// Libraries are expanded into their intermediates,
    ///   preserving input order.
    pub fn load<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
    ) -> Result<Vec<Intermediate>, LinkError> {
        let mut inputs: InputFiles = InputFiles::new();
        let mut intermediates = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let display = path.display().to_string();

            let input = inputs
                .open(path)
                .map_err(|e| LinkError::Io(display.clone(), e))?;

            let reader = match input {
                Input::Unvisited(_, reader) => reader,
                Input::Visited => {
                    self.messages
                        .verbose(format!("skipping `{display}`: already loaded"));
                    continue;
                }
            };

            let object = load_any(
                reader,
                self.defs,
                self.counter,
                self.opts.suppress_version_check,
            )
            .map_err(|e| LinkError::Load(display.clone(), e))?;

            match object {
                Object::Intermediate(intermediate) => {
                    self.messages.verbose(format!("loaded object `{display}`"));
                    intermediates.push(intermediate);
                }
                Object::Library(library) => {
                    self.messages.verbose(format!(
                        "loaded library `{display}` ({} objects)",
                        library.intermediates().len()
                    ));
                    intermediates.extend(library.into_intermediates());
                }
            }
        }

        Ok(intermediates)
    }

    /// Resolve `intermediates` against their single entry section.
    ///
    /// Only a missing or ambiguous entry section and failure to load the
    ///   built-in standard actions abort the link;
    ///     all other errors are emitted to [`Messages`].
    pub fn link(
        &mut self,
        intermediates: Vec<Intermediate>,
    ) -> Result<Output, LinkError> {
        let sections: Vec<Section> = intermediates
            .into_iter()
            .flat_map(Intermediate::into_sections)
            .collect();

        let entry = find_entry_section(&sections)?;
        let symbols = build_symbols(&sections, self.messages);

        let graph = SectionGraph::build(&sections, &symbols);
        let reachable = graph.reachable_from(entry);

        graph.report_unresolved(&sections, &reachable, self.messages);

        self.messages.verbose(format!(
            "{} of {} sections reachable from entry section ({} edges)",
            reachable.count_ones(..),
            sections.len(),
            graph.edge_count(),
        ));

        let crefs = resolve::reachable_complex_references(&sections, &reachable);

        let backlinks: Vec<_> = reachable
            .ones()
            .map(|index| &sections[index])
            .flat_map(|section| {
                let sources = section.sources().cloned();

                section
                    .feature_backlinks()
                    .iter()
                    .map(move |backlink| (backlink.clone(), sources.clone()))
            })
            .collect();

        let entry_section = &sections[entry];
        let ty = OutputType::for_section(entry_section.ty())
            .ok_or(LinkError::MissingEntrySection)?;

        let mut output = Output::new(
            ty,
            entry_section.id().unwrap_or_default(),
            entry_section.codepage(),
        );

        for (index, section) in sections.into_iter().enumerate() {
            if !reachable.contains(index) {
                continue;
            }

            for ignore in section.ignore_modularizations() {
                output.add_ignore_modularization(ignore.name());
            }

            let section_id = section.id().map(String::from);

            for table in section.into_tables() {
                output.ensure_table(table.definition());

                for row in table.into_rows() {
                    output.add_row(row, section_id.as_deref());
                }
            }
        }

        let result = complex::process_complex_references(
            &crefs,
            &mut output,
            self.defs,
            self.counter,
            self.messages,
        );

        complex::process_feature_backlinks(
            &backlinks,
            &result.component_features,
            &mut output,
            self.messages,
        );

        let standard = ActionTable::standard()?;

        sequence::sequence_actions(
            &mut output,
            &standard,
            self.defs,
            self.counter,
            self.messages,
        );

        for e in output.validate_primary_keys() {
            self.messages.emit(&e);
        }

        Ok(output)
    }

    /// Combine `intermediates` into a [`Library`] without resolving them.
    ///
    /// Duplicate symbols are still reported,
    ///   but no entry section is required.
    pub fn combine(&mut self, intermediates: Vec<Intermediate>) -> Library {
        let sections: Vec<Section> = intermediates
            .iter()
            .flat_map(|i| i.sections().iter().cloned())
            .collect();

        let symbols = build_symbols(&sections, self.messages);

        self.messages.verbose(format!(
            "combined {} sections defining {} symbols",
            sections.len(),
            symbols.len(),
        ));

        let mut library = Library::new();

        for intermediate in intermediates {
            library.add(intermediate);
        }

        library
    }
}

#[cfg(test)]
mod test;
