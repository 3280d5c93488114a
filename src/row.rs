// Rows of the relational representation
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

//! Rows,
//!   tables,
//!   and typed views over them.
//!
//! A [`Row`] is an ordered array of [`Field`]s matching a
//!   [`TableDefinition`].
//! Rows are numbered at construction by a [`RowCounter`] owned by the
//!   build session;
//!     that number is used to order rows deterministically
//!     (e.g. during file sequencing).
//!
//! Certain tables are given special treatment by the binder.
//! Rather than defining distinct row types,
//!   a row is tagged with a [`RowKind`] when it is created,
//!     looked up by table name,
//!     and typed views such as [`FileRow`] provide named accessors over
//!     fixed field indexes.
//! Views hold no storage of their own.

mod field;
mod table;
mod view;

pub use field::{Field, FieldData, FieldError, FieldErrorKind};
pub use table::{Table, TableCollection};
pub use view::{
    BBControlRow, BBControlRowMut, ControlRow, ControlRowMut, FileRow,
    FileRowMut, MediaRow, MediaRowMut, MergeRow, MergeRowMut, PropertyRow,
    PropertyRowMut, UpgradeRow, UpgradeRowMut,
};

use crate::schema::TableDefinition;
use crate::span::SourceLineNumberCollection;
use std::rc::Rc;

/// Number assigned to a row at construction.
pub type RowNumber = u64;

/// Source of [`RowNumber`]s.
///
/// Each build session owns exactly one counter;
///   numbers are monotonically increasing within that session.
#[derive(Debug, Default)]
pub struct RowCounter {
    next: RowNumber,
}

impl RowCounter {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn next(&mut self) -> RowNumber {
        let n = self.next;
        self.next += 1;
        n
    }
}

/// Kind of a row,
///   determining which typed view applies to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    Generic,
    File,
    Media,
    Merge,
    Control,
    BBControl,
    Property,
    Upgrade,
}

/// Tables whose rows receive a kind other than [`RowKind::Generic`].
const ROW_KINDS: &[(&str, RowKind)] = &[
    ("File", RowKind::File),
    ("Media", RowKind::Media),
    ("WixMerge", RowKind::Merge),
    ("Control", RowKind::Control),
    ("BBControl", RowKind::BBControl),
    ("Property", RowKind::Property),
    ("Upgrade", RowKind::Upgrade),
];

impl RowKind {
    pub fn for_table(name: &str) -> Self {
        ROW_KINDS
            .iter()
            .find(|(table, _)| *table == name)
            .map(|(_, kind)| *kind)
            .unwrap_or(RowKind::Generic)
    }
}

/// A record of a table.
#[derive(Debug, Clone)]
pub struct Row {
    definition: Rc<TableDefinition>,
    fields: Vec<Field>,
    number: RowNumber,
    sources: Option<SourceLineNumberCollection>,
    section_id: Option<String>,
    unreal: bool,
    kind: RowKind,
}

impl Row {
    /// New row with every field null.
    pub fn new(definition: Rc<TableDefinition>, number: RowNumber) -> Self {
        let fields = definition.columns().iter().cloned().map(Field::new).collect();

        Self {
            kind: RowKind::for_table(definition.name()),
            unreal: definition.is_unreal(),
            definition,
            fields,
            number,
            sources: None,
            section_id: None,
        }
    }

    pub fn with_sources(mut self, sources: SourceLineNumberCollection) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn definition(&self) -> &Rc<TableDefinition> {
        &self.definition
    }

    pub fn table_name(&self) -> &str {
        self.definition.name()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn number(&self) -> RowNumber {
        self.number
    }

    pub fn sources(&self) -> Option<&SourceLineNumberCollection> {
        self.sources.as_ref()
    }

    pub fn set_sources(&mut self, sources: Option<SourceLineNumberCollection>) {
        self.sources = sources;
    }

    /// Identifier of the section that contributed this row to the output.
    pub fn section_id(&self) -> Option<&str> {
        self.section_id.as_deref()
    }

    pub fn set_section_id(&mut self, id: Option<String>) {
        self.section_id = id;
    }

    pub fn is_unreal(&self) -> bool {
        self.unreal
    }

    pub fn kind(&self) -> RowKind {
        self.kind
    }

    /// Set the data of the field at `index`.
    ///
    /// Setting an index beyond the end of the row is a no-op,
    ///   since no column exists to validate against.
    pub fn set(
        &mut self,
        index: usize,
        data: Option<FieldData>,
    ) -> Result<(), FieldError> {
        match self.fields.get_mut(index) {
            Some(field) => field.set_data(data),
            None => Ok(()),
        }
    }

    pub fn get_str(&self, index: usize) -> Option<&str> {
        self.field(index).and_then(Field::as_str)
    }

    pub fn get_number(&self, index: usize) -> Option<i64> {
        self.field(index).and_then(Field::as_number)
    }

    /// Textual form of the field at `index`,
    ///   regardless of column type.
    pub fn get_text(&self, index: usize) -> Option<String> {
        self.field(index).and_then(Field::to_text)
    }

    /// Name of the symbol defined by this row,
    ///   if any of its columns participate in symbols.
    ///
    /// The name is the table name followed by the slash-delimited values
    ///   of the symbol columns:
    ///     `Component:CompX`,
    ///     `Class:{GUID}/LocalServer32/CompX`.
    pub fn symbol_name(&self) -> Option<String> {
        if !self.definition.has_symbol_columns() {
            return None;
        }

        let id = self.join_columns(|f| f.column().is_symbol());

        Some(format!("{}:{}", self.table_name(), id))
    }

    /// Slash-delimited values of the primary key columns.
    pub fn primary_key(&self) -> String {
        self.join_columns(|f| f.column().is_primary_key())
    }

    fn join_columns<P: Fn(&Field) -> bool>(&self, pred: P) -> String {
        self.fields
            .iter()
            .filter(|f| pred(f))
            .map(|f| f.to_text().unwrap_or_default())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Rows are equal if they belong to the same table and have the same
///   provenance and field values.
///
/// Row numbers are not compared,
///   since they are an artifact of the order in which rows were
///   constructed.
impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.table_name() == other.table_name()
            && self.fields == other.fields
            && self.sources == other.sources
            && self.section_id == other.section_id
    }
}

impl Eq for Row {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{ColumnDefinition, ColumnType};

    fn class_def() -> Rc<TableDefinition> {
        Rc::new(TableDefinition::new(
            "Class",
            vec![
                ColumnDefinition::new("CLSID", ColumnType::String, 38)
                    .primary_key()
                    .symbol(),
                ColumnDefinition::new("Context", ColumnType::String, 32)
                    .primary_key()
                    .symbol(),
                ColumnDefinition::new("Description", ColumnType::String, 0)
                    .nullable(),
            ],
            false,
        ))
    }

    #[test]
    fn counter_is_monotonic() {
        let mut sut = RowCounter::new();

        let a = sut.next();
        let b = sut.next();

        assert!(b > a);
    }

    #[test]
    fn symbol_name_joins_symbol_columns() {
        let mut row = Row::new(class_def(), 0);
        row.set(0, Some("{GUID}".into())).unwrap();
        row.set(1, Some("LocalServer32".into())).unwrap();
        row.set(2, Some("ignored".into())).unwrap();

        assert_eq!(
            Some("Class:{GUID}/LocalServer32".to_string()),
            row.symbol_name()
        );
        assert_eq!("{GUID}/LocalServer32", row.primary_key());
    }

    #[test]
    fn no_symbol_without_symbol_columns() {
        let def = Rc::new(TableDefinition::new(
            "Foo",
            vec![ColumnDefinition::new("A", ColumnType::String, 0)],
            false,
        ));

        assert_eq!(None, Row::new(def, 0).symbol_name());
    }

    #[test]
    fn kind_is_looked_up_by_table_name() {
        let def = |name: &str| Rc::new(TableDefinition::new(name, vec![], false));

        assert_eq!(RowKind::File, Row::new(def("File"), 0).kind());
        assert_eq!(RowKind::Merge, Row::new(def("WixMerge"), 0).kind());
        assert_eq!(RowKind::Generic, Row::new(def("Registry"), 0).kind());
    }

    #[test]
    fn equality_ignores_row_number() {
        let mut a = Row::new(class_def(), 1);
        let mut b = Row::new(class_def(), 2);

        a.set(0, Some("x".into())).unwrap();
        b.set(0, Some("x".into())).unwrap();
        assert_eq!(a, b);

        b.set_section_id(Some("Frag".into()));
        assert_ne!(a, b);
    }
}
