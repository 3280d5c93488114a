// Linker output
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

//! The result of linking:
//!   the union of the tables of every reachable section.
//!
//! After resolution,
//!   tables and rows are no longer owned by any section;
//!     each row instead records the id of the section that contributed it
//!     (see [`Row::section_id`]).
//! [`OutputTable`] and [`OutputRow`] name the table and row types in this
//!   post-resolution role.

use super::LinkError;
use crate::obj::SectionType;
use crate::row::{Row, Table, TableCollection};
use crate::schema::TableDefinition;
use crate::span::SourceLineNumberCollection;
use fxhash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::rc::Rc;

/// A table of the [`Output`].
pub type OutputTable = Table;

/// A row of an [`OutputTable`].
pub type OutputRow = Row;

str_enum! {
    /// Kind of package produced from an [`Output`].
    pub enum OutputType {
        Product => "Product",
        Module => "Module",
        PatchCreation => "PatchCreation",
    }
}

impl OutputType {
    /// Output type anchored by an entry section of the given type.
    pub fn for_section(ty: SectionType) -> Option<Self> {
        match ty {
            SectionType::Product => Some(Self::Product),
            SectionType::Module => Some(Self::Module),
            SectionType::PatchCreation => Some(Self::PatchCreation),
            SectionType::Fragment => None,
        }
    }
}

/// Resolved tables ready for binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    ty: OutputType,
    entry_id: String,
    codepage: Option<i32>,
    tables: TableCollection,
    ignore_modularizations: FxHashSet<String>,
    merge_features: BTreeMap<String, Vec<String>>,
}

impl Output {
    pub fn new<S: Into<String>>(
        ty: OutputType,
        entry_id: S,
        codepage: Option<i32>,
    ) -> Self {
        Self {
            ty,
            entry_id: entry_id.into(),
            codepage,
            tables: Default::default(),
            ignore_modularizations: Default::default(),
            merge_features: Default::default(),
        }
    }

    pub fn ty(&self) -> OutputType {
        self.ty
    }

    /// Id of the entry section.
    pub fn entry_id(&self) -> &str {
        &self.entry_id
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

    /// Append a row contributed by the section `section_id`.
    pub fn add_row(&mut self, mut row: Row, section_id: Option<&str>) {
        row.set_section_id(section_id.map(String::from));

        let def = row.definition().clone();
        self.tables.ensure_table(&def).push(row);
    }

    /// Ensure that a table exists even if no rows are contributed to it.
    pub fn ensure_table(&mut self, def: &Rc<TableDefinition>) -> &mut OutputTable {
        self.tables.ensure_table(def)
    }

    /// Exempt an identifier from modularization.
    pub fn add_ignore_modularization<S: Into<String>>(&mut self, name: S) {
        self.ignore_modularizations.insert(name.into());
    }

    pub fn ignore_modularizations(&self) -> &FxHashSet<String> {
        &self.ignore_modularizations
    }

    /// Record that the merge module `merge_id` is connected to `feature`.
    pub fn connect_merge_feature<M: Into<String>, F: Into<String>>(
        &mut self,
        merge_id: M,
        feature: F,
    ) {
        let features = self.merge_features.entry(merge_id.into()).or_default();
        let feature = feature.into();

        if !features.contains(&feature) {
            features.push(feature);
        }
    }

    /// Every feature to which each merge module is connected,
    ///   by merge id.
    pub fn merge_features(&self) -> &BTreeMap<String, Vec<String>> {
        &self.merge_features
    }

    /// Guid appended to identifiers during modularization.
    ///
    /// Module identifiers take the form `Name.GUID`,
    ///   with the guid having underscores in place of hyphens.
    /// Only module outputs have a modularization guid.
    pub fn modularization_guid(&self) -> Option<&str> {
        if self.ty != OutputType::Module {
            return None;
        }

        self.tables
            .get("ModuleSignature")
            .and_then(|table| table.rows().first())
            .and_then(|row| row.get_str(0))
            .and_then(|id| id.rsplit_once('.'))
            .map(|(_, guid)| guid)
    }

    /// Check that no two rows of any table share a primary key.
    ///
    /// Each collision yields a pair of errors:
    ///   one locating the later row and one locating the first.
    pub fn validate_primary_keys(&self) -> Vec<LinkError> {
        let mut errors = Vec::new();

        for table in self.tables.iter() {
            if table.definition().primary_key_indexes().next().is_none() {
                continue;
            }

            let mut seen: FxHashMap<String, Option<&SourceLineNumberCollection>> =
                Default::default();

            for row in table.iter() {
                let key = row.primary_key();

                match seen.get(&key) {
                    Some(first) => {
                        errors.push(LinkError::DuplicatePrimaryKey {
                            table: table.name().into(),
                            key: key.clone(),
                            sources: row.sources().cloned(),
                        });
                        errors.push(LinkError::DuplicatePrimaryKeyLocation {
                            table: table.name().into(),
                            key,
                            sources: first.cloned(),
                        });
                    }
                    None => {
                        seen.insert(key, row.sources());
                    }
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::row::RowCounter;
    use crate::schema::TableDefinitionCollection;

    fn row(defs: &TableDefinitionCollection, table: &str, values: &[&str]) -> Row {
        let mut counter = RowCounter::new();
        let mut row = Row::new(defs.get(table).unwrap().clone(), counter.next());

        for (i, value) in values.iter().enumerate() {
            row.set(i, Some((*value).into())).unwrap();
        }

        row
    }

    #[test]
    fn add_row_stamps_section_id() {
        let defs = TableDefinitionCollection::builtin().unwrap();
        let mut sut = Output::new(OutputType::Product, "Prod", None);

        sut.add_row(row(&defs, "Property", &["A", "1"]), Some("FragA"));

        let added = &sut.tables().get("Property").unwrap().rows()[0];
        assert_eq!(Some("FragA"), added.section_id());
    }

    #[test]
    fn primary_key_collisions_name_both_rows() {
        let defs = TableDefinitionCollection::builtin().unwrap();
        let mut sut = Output::new(OutputType::Product, "Prod", None);

        let first = row(&defs, "Property", &["A", "1"])
            .with_sources(SourceLineNumberCollection::single("a.wxs", Some(1)));
        let second = row(&defs, "Property", &["A", "2"])
            .with_sources(SourceLineNumberCollection::single("b.wxs", Some(2)));

        sut.add_row(first, None);
        sut.add_row(second, None);
        sut.add_row(row(&defs, "Property", &["B", "3"]), None);

        let errors = sut.validate_primary_keys();
        assert_eq!(2, errors.len());

        match &errors[..] {
            [LinkError::DuplicatePrimaryKey { key, sources: Some(later), .. }, LinkError::DuplicatePrimaryKeyLocation { sources: Some(earlier), .. }] =>
            {
                assert_eq!("A", key);
                assert_eq!("b.wxs", later.first().unwrap().file());
                assert_eq!("a.wxs", earlier.first().unwrap().file());
            }
            other => panic!("unexpected errors: {other:?}"),
        }
    }

    #[test]
    fn modularization_guid_from_module_signature() {
        let defs = TableDefinitionCollection::builtin().unwrap();
        let mut sut = Output::new(OutputType::Module, "Mod", None);

        sut.add_row(
            row(&defs, "ModuleSignature", &["Mod.ABCD_1234", "0", "1.0"]),
            None,
        );

        assert_eq!(Some("ABCD_1234"), sut.modularization_guid());
    }

    #[test]
    fn merge_features_are_distinct() {
        let mut sut = Output::new(OutputType::Product, "Prod", None);

        sut.connect_merge_feature("Mm", "F1");
        sut.connect_merge_feature("Mm", "F2");
        sut.connect_merge_feature("Mm", "F1");

        assert_eq!(vec!["F1", "F2"], sut.merge_features()["Mm"]);
    }
}
