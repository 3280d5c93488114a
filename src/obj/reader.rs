// Object and library file reader
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

//! Reader for object (`wixObject`) and library (`wixLibrary`) files.
//!
//! ```xml
//! <wixObject src="product.wxs" version="2.0.5805.0">
//!   <section id="FragA" type="fragment">
//!     <reference table="Directory" symbol="TARGETDIR" />
//!     <complexReference parentType="Feature" parent="Main"
//!                       childType="Component" child="CompX" primary="yes" />
//!     <table name="Component">
//!       <tuple sourceLineNumber="product.wxs*12">
//!         <field>CompX</field>
//!         ...
//!       </tuple>
//!     </table>
//!   </section>
//! </wixObject>
//! ```
//!
//! A library is a `wixLibrary` element containing one `wixObject` per
//!   constituent intermediate.
//!
//! Every tuple must have exactly as many `field`s as its table has
//!   columns;
//!     an empty `field` is null.

use super::{IgnoreModularization, Intermediate, Library, ObjError, Section};
use crate::global;
use crate::row::{FieldData, RowCounter};
use crate::schema::TableDefinitionCollection;
use crate::span::SourceLineNumberCollection;
use crate::sym::{ComplexReference, FeatureBacklink, Reference};
use crate::xir::{self, Attrs, Event};
use std::io::BufRead;
use std::str::FromStr;

pub type ObjResult<T> = Result<T, ObjError>;

/// Contents of a file read by [`ObjReader::read`].
#[derive(Debug, PartialEq, Eq)]
pub enum Object {
    Intermediate(Intermediate),
    Library(Library),
}

/// Read either an object or a library file,
///   determined by its root element.
pub fn load_any<B: BufRead>(
    src: B,
    defs: &TableDefinitionCollection,
    counter: &mut RowCounter,
    suppress_version_check: bool,
) -> ObjResult<Object> {
    ObjReader::new(src, defs, counter)
        .suppress_version_check(suppress_version_check)
        .read()
}

/// A node of interest while reading.
enum Node {
    Start(Attrs),
    End,
}

/// Object and library file reader.
///
/// Rows are numbered by the provided [`RowCounter`] in document order.
pub struct ObjReader<'a, B: BufRead> {
    reader: quick_xml::Reader<B>,
    buf: Vec<u8>,
    defs: &'a TableDefinitionCollection,
    counter: &'a mut RowCounter,
    suppress_version_check: bool,
}

impl<'a, B: BufRead> ObjReader<'a, B> {
    pub fn new(
        src: B,
        defs: &'a TableDefinitionCollection,
        counter: &'a mut RowCounter,
    ) -> Self {
        Self {
            reader: xir::reader(src),
            buf: Vec::new(),
            defs,
            counter,
            suppress_version_check: false,
        }
    }

    /// Accept files of any format version.
    pub fn suppress_version_check(mut self, suppress: bool) -> Self {
        self.suppress_version_check = suppress;
        self
    }

    /// Read an object or library,
    ///   whichever the root element indicates.
    pub fn read(mut self) -> ObjResult<Object> {
        match self.next()? {
            Node::Start(attrs) => match attrs.element() {
                "wixObject" => self.read_object(attrs).map(Object::Intermediate),
                "wixLibrary" => self.read_library(attrs).map(Object::Library),
                other => Err(ObjError::UnexpectedRoot(other.into())),
            },
            Node::End => Err(ObjError::UnexpectedEof),
        }
    }

    /// Read an object file,
    ///   failing if it is not one.
    pub fn read_intermediate(self) -> ObjResult<Intermediate> {
        match self.read()? {
            Object::Intermediate(i) => Ok(i),
            Object::Library(_) => Err(ObjError::UnexpectedRoot("wixLibrary".into())),
        }
    }

    /// Read a library file,
    ///   failing if it is not one.
    pub fn read_library_file(self) -> ObjResult<Library> {
        match self.read()? {
            Object::Library(l) => Ok(l),
            Object::Intermediate(_) => {
                Err(ObjError::UnexpectedRoot("wixObject".into()))
            }
        }
    }

    fn next(&mut self) -> ObjResult<Node> {
        loop {
            self.buf.clear();

            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(ele) => return Ok(Node::Start(Attrs::parse(&ele)?)),
                Event::End(_) => return Ok(Node::End),
                Event::Eof => return Err(ObjError::UnexpectedEof),
                _ => (),
            }
        }
    }

    /// Consume through the end of the current element,
    ///   which must have no children.
    fn expect_end(&mut self, parent: &Attrs) -> ObjResult<()> {
        match self.next()? {
            Node::End => Ok(()),
            Node::Start(attrs) => Err(unexpected(parent, &attrs)),
        }
    }

    fn check_version(
        &self,
        attrs: &Attrs,
        kind: &'static str,
        expected: &'static str,
    ) -> ObjResult<()> {
        let found = attrs.get("version");

        if self.suppress_version_check || found == Some(expected) {
            return Ok(());
        }

        Err(ObjError::VersionMismatch {
            kind,
            found: found.map(String::from),
            expected,
        })
    }

    fn read_library(&mut self, root: Attrs) -> ObjResult<Library> {
        self.check_version(&root, "library", global::LIBRARY_FORMAT_VERSION)?;

        let mut library = Library::new();

        loop {
            match self.next()? {
                Node::Start(attrs) if attrs.element() == "wixObject" => {
                    library.add(self.read_object(attrs)?);
                }
                Node::Start(attrs) => return Err(unexpected(&root, &attrs)),
                Node::End => return Ok(library),
            }
        }
    }

    fn read_object(&mut self, root: Attrs) -> ObjResult<Intermediate> {
        self.check_version(&root, "object", global::OBJECT_FORMAT_VERSION)?;

        let mut intermediate = Intermediate::new(root.get("src").map(String::from));

        loop {
            match self.next()? {
                Node::Start(attrs) if attrs.element() == "section" => {
                    intermediate.add_section(self.read_section(attrs)?);
                }
                Node::Start(attrs) => return Err(unexpected(&root, &attrs)),
                Node::End => return Ok(intermediate),
            }
        }
    }

    fn read_section(&mut self, attrs: Attrs) -> ObjResult<Section> {
        let codepage = attrs
            .get("codepage")
            .map(|cp| parse_num("codepage", cp))
            .transpose()?;

        let mut section = Section::new(
            attrs.get("id").map(String::from),
            attrs.require("type")?.parse()?,
            codepage,
        )?;

        loop {
            let child = match self.next()? {
                Node::Start(child) => child,
                Node::End => return Ok(section),
            };

            match child.element() {
                "reference" => {
                    section.add_reference(Reference::new(
                        child.require("table")?,
                        child.require("symbol")?,
                    ));
                    self.expect_end(&child)?;
                }

                "complexReference" => {
                    section.add_complex_reference(ComplexReference::new(
                        child.require("parentType")?.parse()?,
                        child.require("parent")?,
                        child.get("parentLanguage").map(String::from),
                        child.require("childType")?.parse()?,
                        child.require("child")?,
                        child.flag("primary"),
                    )?);
                    self.expect_end(&child)?;
                }

                "featureBacklink" => {
                    section.add_feature_backlink(FeatureBacklink::new(
                        child.require("component")?,
                        child.require("type")?.parse()?,
                        child.require("targetSymbol")?,
                    ));
                    self.expect_end(&child)?;
                }

                "ignoreModularization" => {
                    section.add_ignore_modularization(IgnoreModularization::new(
                        child.require("name")?,
                        child.get("type").unwrap_or_default(),
                    ));
                    self.expect_end(&child)?;
                }

                "table" => self.read_table(&mut section, child)?,

                _ => return Err(unexpected(&attrs, &child)),
            }
        }
    }

    fn read_table(&mut self, section: &mut Section, attrs: Attrs) -> ObjResult<()> {
        let name = attrs.require("name")?;
        let def = self
            .defs
            .get(name)
            .ok_or_else(|| ObjError::UnknownTable(name.into()))?
            .clone();

        // ensure that the table exists even if it has no rows
        section.tables_mut().ensure_table(&def);

        loop {
            let tuple = match self.next()? {
                Node::Start(tuple) if tuple.element() == "tuple" => tuple,
                Node::Start(other) => return Err(unexpected(&attrs, &other)),
                Node::End => return Ok(()),
            };

            let sources = tuple
                .get("sourceLineNumber")
                .map(SourceLineNumberCollection::parse);

            let fields = self.read_fields(&tuple)?;

            if fields.len() != def.len() {
                return Err(ObjError::FieldCountMismatch {
                    table: name.into(),
                    expected: def.len(),
                    found: fields.len(),
                    sources,
                });
            }

            let row = section
                .tables_mut()
                .ensure_table(&def)
                .create_row(self.counter);

            row.set_sources(sources.clone());
            row.set_section_id(tuple.get("sectionId").map(String::from));

            for (i, value) in fields.into_iter().enumerate() {
                row.set(i, value.map(FieldData::String))
                    .map_err(|e| ObjError::Field(e, sources.clone()))?;
            }
        }
    }

    fn read_fields(&mut self, tuple: &Attrs) -> ObjResult<Vec<Option<String>>> {
        let mut fields = Vec::new();

        loop {
            match self.next()? {
                Node::Start(field) if field.element() == "field" => {
                    fields.push(xir::read_text(&mut self.reader, &mut self.buf)?);
                }
                Node::Start(other) => return Err(unexpected(tuple, &other)),
                Node::End => return Ok(fields),
            }
        }
    }
}

fn unexpected(parent: &Attrs, ele: &Attrs) -> ObjError {
    ObjError::UnexpectedElement {
        parent: parent.element().into(),
        ele: ele.element().into(),
    }
}

fn parse_num<T: FromStr>(attr: &str, value: &str) -> ObjResult<T> {
    value.parse().map_err(|_| ObjError::InvalidNumber {
        attr: attr.into(),
        value: value.into(),
    })
}
