// Object and library file writer
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

//! Writer for object (`wixObject`) and library (`wixLibrary`) files.
//!
//! The output is read back by [`ObjReader`](super::ObjReader) into an
//!   equal [`Intermediate`] or [`Library`].

use super::{Intermediate, Library, Section};
use crate::global;
use crate::row::Row;
use crate::xir::{XirResult, XmlWriter};
use std::io::Write;

/// Object and library file writer.
pub struct ObjWriter<W: Write> {
    writer: XmlWriter<W>,
}

impl<W: Write> ObjWriter<W> {
    pub fn new(dest: W) -> Self {
        Self {
            writer: XmlWriter::new(dest),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    pub fn write_intermediate(&mut self, intermediate: &Intermediate) -> XirResult<()> {
        self.writer.declaration()?;
        self.intermediate(intermediate)
    }

    pub fn write_library(&mut self, library: &Library) -> XirResult<()> {
        self.writer.declaration()?.open(
            "wixLibrary",
            &[
                ("xmlns", Some(global::LIBRARY_NAMESPACE)),
                ("version", Some(global::LIBRARY_FORMAT_VERSION)),
            ],
        )?;

        for intermediate in library.intermediates() {
            self.intermediate(intermediate)?;
        }

        self.writer.close("wixLibrary")?;
        Ok(())
    }

    fn intermediate(&mut self, intermediate: &Intermediate) -> XirResult<()> {
        self.writer.open(
            "wixObject",
            &[
                ("xmlns", Some(global::OBJECT_NAMESPACE)),
                ("src", intermediate.source_path()),
                ("version", Some(global::OBJECT_FORMAT_VERSION)),
            ],
        )?;

        for section in intermediate.sections() {
            self.section(section)?;
        }

        self.writer.close("wixObject")?;
        Ok(())
    }

    fn section(&mut self, section: &Section) -> XirResult<()> {
        let codepage = section.codepage().map(|cp| cp.to_string());

        self.writer.open(
            "section",
            &[
                ("id", section.id()),
                ("type", Some(section.ty().as_str())),
                ("codepage", codepage.as_deref()),
            ],
        )?;

        for reference in section.references() {
            self.writer.empty(
                "reference",
                &[
                    ("table", Some(reference.table())),
                    ("symbol", Some(reference.symbol())),
                ],
            )?;
        }

        for cref in section.complex_references() {
            self.writer.empty(
                "complexReference",
                &[
                    ("parentType", Some(cref.parent_type().as_str())),
                    ("parent", Some(cref.parent())),
                    ("parentLanguage", cref.parent_language()),
                    ("childType", Some(cref.child_type().as_str())),
                    ("child", Some(cref.child())),
                    ("primary", cref.is_primary().then_some("yes")),
                ],
            )?;
        }

        for backlink in section.feature_backlinks() {
            self.writer.empty(
                "featureBacklink",
                &[
                    ("type", Some(backlink.ty().as_str())),
                    ("targetSymbol", Some(backlink.target())),
                    ("component", Some(backlink.component())),
                ],
            )?;
        }

        for ignore in section.ignore_modularizations() {
            self.writer.empty(
                "ignoreModularization",
                &[("name", Some(ignore.name())), ("type", Some(ignore.ty()))],
            )?;
        }

        for table in section.tables().iter() {
            self.writer.open("table", &[("name", Some(table.name()))])?;

            for row in table.iter() {
                self.row(row)?;
            }

            self.writer.close("table")?;
        }

        self.writer.close("section")?;
        Ok(())
    }

    fn row(&mut self, row: &Row) -> XirResult<()> {
        let sources = row.sources().map(|s| s.encode());

        self.writer.open(
            "tuple",
            &[
                ("sectionId", row.section_id()),
                ("sourceLineNumber", sources.as_deref()),
            ],
        )?;

        for field in row.fields() {
            match field.to_text() {
                Some(text) => {
                    let cdata = field.column().uses_cdata();
                    self.writer.text_element("field", &[], &text, cdata)?;
                }
                None => {
                    self.writer.empty("field", &[])?;
                }
            }
        }

        self.writer.close("tuple")?;
        Ok(())
    }
}
