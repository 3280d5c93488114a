// Sections, intermediates, and libraries
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

//! Object file construction and processing.
//!
//! An _intermediate_ is the compiled form of a single source file:
//!   an ordered collection of [`Section`]s,
//!     each being a unit of resolution that contributes rows to tables,
//!     defines symbols,
//!     and references symbols of other sections.
//! A [`Library`] combines many intermediates into a single reusable unit
//!   while still exposing each constituent section for resolution.
//!
//! Both are persisted as XML;
//!   see [`ObjReader`] and [`ObjWriter`] for the format.
//! It is the responsibility of the [linker](super::ld) to select which
//!   sections participate in the final output.

mod error;
mod reader;
mod writer;

pub use error::ObjError;
pub use reader::{load_any, Object, ObjReader};
pub use writer::ObjWriter;

use crate::row::TableCollection;
use crate::span::SourceLineNumberCollection;
use crate::sym::{
    ComplexReference, DuplicateSymbolError, FeatureBacklink, Reference, RowRef,
    SectionIndex, Symbol, SymbolCollection,
};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{self, Display};

str_enum! {
    /// Type of a [`Section`].
    pub enum SectionType {
        Fragment => "fragment",
        Module => "module",
        Product => "product",
        PatchCreation => "patchCreation",
    }
}

impl SectionType {
    /// Whether a section of this type may anchor a link.
    pub fn is_entry(&self) -> bool {
        !matches!(self, Self::Fragment)
    }

    /// Prefix of the name of the symbol of a section of this type.
    pub fn symbol_prefix(&self) -> &'static str {
        match self {
            Self::Fragment => "Fragment",
            Self::Module => "Module",
            Self::Product => "Product",
            Self::PatchCreation => "PatchCreation",
        }
    }
}

/// An identifier that must not be rewritten during modularization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IgnoreModularization {
    name: String,
    ty: String,
}

impl IgnoreModularization {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, ty: T) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &str {
        &self.ty
    }
}

/// Unit of resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    id: Option<String>,
    ty: SectionType,
    codepage: Option<i32>,
    tables: TableCollection,
    references: BTreeSet<Reference>,
    complex_references: Vec<ComplexReference>,
    feature_backlinks: Vec<FeatureBacklink>,
    ignore_modularizations: Vec<IgnoreModularization>,
}

impl Section {
    /// Create an empty section.
    ///
    /// Only fragments may be anonymous.
    pub fn new(
        id: Option<String>,
        ty: SectionType,
        codepage: Option<i32>,
    ) -> Result<Self, SectionError> {
        if id.is_none() && ty != SectionType::Fragment {
            return Err(SectionError::MissingId(ty));
        }

        Ok(Self {
            id,
            ty,
            codepage,
            tables: Default::default(),
            references: Default::default(),
            complex_references: Default::default(),
            feature_backlinks: Default::default(),
            ignore_modularizations: Default::default(),
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn ty(&self) -> SectionType {
        self.ty
    }

    pub fn codepage(&self) -> Option<i32> {
        self.codepage
    }

    pub fn tables(&self) -> &TableCollection {
        &self.tables
    }

    pub fn tables_mut(&mut self) -> &mut TableCollection {
        &mut self.tables
    }

    pub fn into_tables(self) -> TableCollection {
        self.tables
    }

    /// References in name order;
    ///   each reference appears only once.
    pub fn references(&self) -> &BTreeSet<Reference> {
        &self.references
    }

    /// Add a reference,
    ///   returning `false` if it was already present.
    pub fn add_reference(&mut self, reference: Reference) -> bool {
        self.references.insert(reference)
    }

    pub fn complex_references(&self) -> &[ComplexReference] {
        &self.complex_references
    }

    pub fn add_complex_reference(&mut self, cref: ComplexReference) {
        self.complex_references.push(cref);
    }

    pub fn feature_backlinks(&self) -> &[FeatureBacklink] {
        &self.feature_backlinks
    }

    pub fn add_feature_backlink(&mut self, backlink: FeatureBacklink) {
        self.feature_backlinks.push(backlink);
    }

    pub fn ignore_modularizations(&self) -> &[IgnoreModularization] {
        &self.ignore_modularizations
    }

    pub fn add_ignore_modularization(&mut self, ignore: IgnoreModularization) {
        self.ignore_modularizations.push(ignore);
    }

    /// Name of the symbol of the section itself,
    ///   if it is not anonymous.
    pub fn symbol_name(&self) -> Option<String> {
        self.id
            .as_ref()
            .map(|id| format!("{}:{}", self.ty.symbol_prefix(), id))
    }

    /// Symbols defined by this section,
    ///   along with any symbols defined more than once within it.
    ///
    /// `index` is the index of this section among all sections of the
    ///   link and is recorded on each symbol.
    pub fn symbols(&self, index: SectionIndex) -> SectionSymbols {
        let mut seen = SymbolCollection::new();
        let mut symbols = Vec::new();
        let mut duplicates = Vec::new();

        let section_sym = self
            .symbol_name()
            .map(|name| Symbol::new(name, index, None, self.sources().cloned()));

        let row_syms = self.tables.iter().flat_map(|table| {
            table.iter().enumerate().filter_map(move |(i, row)| {
                row.symbol_name().map(|name| {
                    let row_ref = RowRef {
                        table: table.name().into(),
                        index: i,
                    };

                    Symbol::new(name, index, Some(row_ref), row.sources().cloned())
                })
            })
        });

        for symbol in section_sym.into_iter().chain(row_syms) {
            match seen.insert(symbol.clone()) {
                Ok(()) => symbols.push(symbol),
                Err(e) => duplicates.push(e),
            }
        }

        SectionSymbols {
            symbols,
            duplicates,
        }
    }

    /// Source locations of the first row of the section,
    ///   used to locate diagnostics pertaining to the section as a whole.
    pub fn sources(&self) -> Option<&SourceLineNumberCollection> {
        self.tables.rows().find_map(|row| row.sources())
    }
}

/// Result of [`Section::symbols`].
#[derive(Debug, Default)]
pub struct SectionSymbols {
    /// Each distinct symbol,
    ///   in definition order.
    pub symbols: Vec<Symbol>,

    /// Symbols defined more than once within the section.
    pub duplicates: Vec<DuplicateSymbolError>,
}

/// A [`Section`] could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    /// A section other than a fragment has no id.
    MissingId(SectionType),
}

impl Display for SectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingId(ty) => write!(f, "{ty} section is missing an id"),
        }
    }
}

impl Error for SectionError {}

/// Sections compiled from a single source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intermediate {
    source_path: Option<String>,
    sections: Vec<Section>,
}

impl Intermediate {
    pub fn new(source_path: Option<String>) -> Self {
        Self {
            source_path,
            sections: Vec::new(),
        }
    }

    /// Path of the source file this intermediate was compiled from.
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn add_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn into_sections(self) -> Vec<Section> {
        self.sections
    }
}

/// Reusable combination of [`Intermediate`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Library {
    intermediates: Vec<Intermediate>,
}

impl Library {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn intermediates(&self) -> &[Intermediate] {
        &self.intermediates
    }

    pub fn add(&mut self, intermediate: Intermediate) {
        self.intermediates.push(intermediate);
    }

    /// Every section of every intermediate,
    ///   in order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.intermediates.iter().flat_map(|i| i.sections.iter())
    }

    pub fn into_intermediates(self) -> Vec<Intermediate> {
        self.intermediates
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::row::RowCounter;
    use crate::schema::TableDefinitionCollection;

    #[test]
    fn only_fragments_may_be_anonymous() {
        assert!(Section::new(None, SectionType::Fragment, None).is_ok());
        assert_eq!(
            Err(SectionError::MissingId(SectionType::Product)),
            Section::new(None, SectionType::Product, None)
        );
    }

    #[test]
    fn references_are_a_set() {
        let mut sut = Section::new(None, SectionType::Fragment, None).unwrap();

        assert!(sut.add_reference(Reference::new("Component", "A")));
        assert!(!sut.add_reference(Reference::new("Component", "A")));
        assert_eq!(1, sut.references().len());
    }

    #[test]
    fn symbols_include_section_and_rows() {
        let defs = TableDefinitionCollection::builtin().unwrap();
        let mut counter = RowCounter::new();
        let mut sut =
            Section::new(Some("FragA".into()), SectionType::Fragment, None)
                .unwrap();

        let comp = defs.get("Component").unwrap();
        let table = sut.tables_mut().ensure_table(comp);
        table
            .create_row(&mut counter)
            .set(0, Some("CompX".into()))
            .unwrap();
        table
            .create_row(&mut counter)
            .set(0, Some("CompX".into()))
            .unwrap();

        let SectionSymbols {
            symbols,
            duplicates,
        } = sut.symbols(7);

        assert_eq!(
            vec!["Fragment:FragA", "Component:CompX"],
            symbols.iter().map(Symbol::name).collect::<Vec<_>>()
        );
        assert!(symbols.iter().all(|s| s.section() == 7));
        assert_eq!(
            Some(&RowRef {
                table: "Component".into(),
                index: 0
            }),
            symbols[1].row()
        );

        assert_eq!(1, duplicates.len());
        assert_eq!("Component:CompX", duplicates[0].name());
    }

    #[test]
    fn section_symbol_carries_row_sources() {
        let defs = TableDefinitionCollection::builtin().unwrap();
        let mut counter = RowCounter::new();
        let mut sut =
            Section::new(Some("Prod".into()), SectionType::Product, None)
                .unwrap();
        let sources = SourceLineNumberCollection::parse("a.wxs*3");

        let comp = defs.get("Component").unwrap();
        let row = sut.tables_mut().ensure_table(comp).create_row(&mut counter);
        row.set_sources(Some(sources.clone()));
        row.set(0, Some("CompX".into())).unwrap();

        let SectionSymbols { symbols, .. } = sut.symbols(0);

        assert_eq!("Product:Prod", symbols[0].name());
        assert_eq!(Some(&sources), symbols[0].sources());
    }

    #[test]
    fn library_exposes_every_section() {
        let mut a = Intermediate::new(Some("a.wxs".into()));
        a.add_section(Section::new(None, SectionType::Fragment, None).unwrap());
        let mut b = Intermediate::new(Some("b.wxs".into()));
        b.add_section(Section::new(None, SectionType::Fragment, None).unwrap());
        b.add_section(
            Section::new(Some("P".into()), SectionType::Product, None).unwrap(),
        );

        let mut sut = Library::new();
        sut.add(a);
        sut.add(b);

        assert_eq!(3, sut.sections().count());
    }
}
