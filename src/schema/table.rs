// Table definitions
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

use super::ColumnDefinition;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Ordered set of columns defining a table.
///
/// Shared (read-only) by every row of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    name: String,
    unreal: bool,
    columns: Vec<Rc<ColumnDefinition>>,
}

impl TableDefinition {
    pub fn new<S: Into<String>>(
        name: S,
        columns: Vec<ColumnDefinition>,
        unreal: bool,
    ) -> Self {
        Self {
            name: name.into(),
            unreal,
            columns: columns.into_iter().map(Rc::new).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this table exists only as metadata and is never
    ///   materialized in the final database.
    pub fn is_unreal(&self) -> bool {
        self.unreal
    }

    pub fn columns(&self) -> &[Rc<ColumnDefinition>] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Rc<ColumnDefinition>> {
        self.columns.get(index)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Indexes of primary key columns,
    ///   in column order.
    pub fn primary_key_indexes(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_primary_key())
            .map(|(i, _)| i)
    }

    /// Whether rows of this table define symbols.
    pub fn has_symbol_columns(&self) -> bool {
        self.columns.iter().any(|c| c.is_symbol())
    }
}

/// Every known table definition,
///   by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDefinitionCollection {
    tables: BTreeMap<String, Rc<TableDefinition>>,
}

impl TableDefinitionCollection {
    pub fn new() -> Self {
        Default::default()
    }

    /// Add a definition,
    ///   returning it back if a table of the same name is already
    ///   defined.
    pub fn add(&mut self, def: TableDefinition) -> Result<(), TableDefinition> {
        if self.tables.contains_key(def.name()) {
            return Err(def);
        }

        self.tables.insert(def.name().to_string(), Rc::new(def));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Rc<TableDefinition>> {
        self.tables.get(name)
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

    /// Definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<TableDefinition>> {
        self.tables.values()
    }
}
