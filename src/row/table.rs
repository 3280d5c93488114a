// Tables of rows
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

use super::{Row, RowCounter};
use crate::schema::TableDefinition;
use std::collections::btree_map::{self, BTreeMap};
use std::rc::Rc;
use std::slice;

/// A [`TableDefinition`] together with its rows,
///   in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    definition: Rc<TableDefinition>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(definition: Rc<TableDefinition>) -> Self {
        Self {
            definition,
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Rc<TableDefinition> {
        &self.definition
    }

    /// Create a new row at the end of the table.
    ///
    /// The [`RowKind`](super::RowKind) of the row is determined by the
    ///   name of this table.
    pub fn create_row(&mut self, counter: &mut RowCounter) -> &mut Row {
        let row = Row::new(self.definition.clone(), counter.next());
        self.push(row)
    }

    /// Append an existing row.
    pub fn push(&mut self, row: Row) -> &mut Row {
        self.rows.push(row);

        // just pushed
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn retain<F: FnMut(&Row) -> bool>(&mut self, f: F) {
        self.rows.retain(f)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

/// Tables ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCollection {
    tables: BTreeMap<String, Table>,
}

impl TableCollection {
    pub fn new() -> Self {
        Default::default()
    }

    /// Retrieve the table of the given definition,
    ///   creating it if it does not yet exist.
    pub fn ensure_table(&mut self, definition: &Rc<TableDefinition>) -> &mut Table {
        self.tables
            .entry(definition.name().to_string())
            .or_insert_with(|| Table::new(definition.clone()))
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Table> {
        self.tables.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, Table> {
        self.tables.values()
    }

    pub fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, String, Table> {
        self.tables.values_mut()
    }

    /// Every row of every table,
    ///   tables in name order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.tables.values().flat_map(Table::iter)
    }
}

impl IntoIterator for TableCollection {
    type Item = Table;
    type IntoIter = btree_map::IntoValues<String, Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.into_values()
    }
}
