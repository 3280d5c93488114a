// Column definitions
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

//! Definition of a single column of a table.
//!
//! A [`ColumnDefinition`] is immutable once constructed and is shared by
//!   every [`Field`](crate::row::Field) occupying that column.

str_enum! {
    /// Semantic type of the data held by a column.
    pub enum ColumnType {
        String => "string",
        /// A string that may be substituted during localization.
        Localized => "localized",
        Number => "number",
        /// Binary data,
        ///   referenced by path until the database is committed.
        Object => "object",
        /// A number that may be substituted during localization.
        LocalizedNumber => "localizedNumber",
    }
}

str_enum! {
    /// How values of a column are rewritten when emitted into a merge
    ///   module.
    ///
    /// See [`crate::bind::modularize`].
    pub enum ColumnModularizeType {
        None => "none",
        /// The entire value is an identifier.
        Column => "column",
        /// A file key,
        ///   unless the value begins with a digit
        ///   (in which case it is a version and is left alone).
        CompanionFile => "companionFile",
        /// Identifiers embedded in a conditional expression.
        Condition => "condition",
        /// Depends on the `Event` column of the same `ControlEvent` row.
        ControlEventArgument => "controlEventArgument",
        /// The GUID is inserted before the file extension.
        Icon => "icon",
        /// Bracketed identifiers embedded in a formatted string.
        Property => "property",
        /// Each `;`-delimited token is an identifier.
        SemicolonDelimited => "semicolonDelimited",
    }
}

str_enum! {
    /// Validation category of a column.
    pub enum ColumnCategory {
        Text => "text",
        UpperCase => "upperCase",
        LowerCase => "lowerCase",
        Integer => "integer",
        DoubleInteger => "doubleInteger",
        TimeDate => "timeDate",
        Identifier => "identifier",
        Property => "property",
        Filename => "filename",
        WildCardFilename => "wildCardFilename",
        Path => "path",
        Paths => "paths",
        AnyPath => "anyPath",
        DefaultDir => "defaultDir",
        RegPath => "regPath",
        Formatted => "formatted",
        Template => "template",
        Condition => "condition",
        Guid => "guid",
        Version => "version",
        Language => "language",
        Binary => "binary",
        CustomSource => "customSource",
        Cabinet => "cabinet",
        Shortcut => "shortcut",
    }
}

/// Shape of one field slot of a table.
///
/// Columns are constructed using a builder-style API:
///
/// ```
/// use wixer::schema::{ColumnDefinition, ColumnModularizeType, ColumnType};
///
/// let col = ColumnDefinition::new("Component_", ColumnType::String, 72)
///     .primary_key()
///     .modularize(ColumnModularizeType::Column);
///
/// assert_eq!("s72", col.idt_type());
/// assert!(col.is_primary_key());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    name: String,
    ty: ColumnType,
    length: u32,
    primary_key: bool,
    nullable: bool,
    symbol: bool,
    unreal: bool,
    localizable: bool,
    modularize: ColumnModularizeType,
    min_value: Option<i64>,
    max_value: Option<i64>,
    key_table: Option<String>,
    key_column: Option<u32>,
    category: Option<ColumnCategory>,
    possibilities: Option<String>,
    description: Option<String>,
    escape_idt_characters: bool,
    use_cdata: bool,
}

impl ColumnDefinition {
    pub fn new<S: Into<String>>(name: S, ty: ColumnType, length: u32) -> Self {
        Self {
            name: name.into(),
            ty,
            length,
            primary_key: false,
            nullable: false,
            symbol: false,
            unreal: false,
            localizable: false,
            modularize: ColumnModularizeType::None,
            min_value: None,
            max_value: None,
            key_table: None,
            key_column: None,
            category: None,
            possibilities: None,
            description: None,
            escape_idt_characters: false,
            use_cdata: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Values of this column participate in the symbol name of the row.
    pub fn symbol(mut self) -> Self {
        self.symbol = true;
        self
    }

    /// This column exists only as metadata and is never emitted.
    pub fn unreal(mut self) -> Self {
        self.unreal = true;
        self
    }

    pub fn localizable(mut self) -> Self {
        self.localizable = true;
        self
    }

    pub fn modularize(mut self, ty: ColumnModularizeType) -> Self {
        self.modularize = ty;
        self
    }

    pub fn bounds(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    pub fn key(mut self, table: Option<String>, column: Option<u32>) -> Self {
        self.key_table = table;
        self.key_column = column;
        self
    }

    pub fn category(mut self, category: ColumnCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Semicolon-delimited set of permitted values.
    pub fn possibilities<S: Into<String>>(mut self, set: S) -> Self {
        self.possibilities = Some(set.into());
        self
    }

    pub fn description<S: Into<String>>(mut self, desc: S) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn escape_idt_characters(mut self) -> Self {
        self.escape_idt_characters = true;
        self
    }

    pub fn use_cdata(mut self) -> Self {
        self.use_cdata = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ColumnType {
        self.ty
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_symbol(&self) -> bool {
        self.symbol
    }

    pub fn is_unreal(&self) -> bool {
        self.unreal
    }

    pub fn is_localizable(&self) -> bool {
        self.localizable
    }

    pub fn modularize_type(&self) -> ColumnModularizeType {
        self.modularize
    }

    pub fn min_value(&self) -> Option<i64> {
        self.min_value
    }

    pub fn max_value(&self) -> Option<i64> {
        self.max_value
    }

    pub fn key_table(&self) -> Option<&str> {
        self.key_table.as_deref()
    }

    pub fn key_column(&self) -> Option<u32> {
        self.key_column
    }

    pub fn column_category(&self) -> Option<ColumnCategory> {
        self.category
    }

    pub fn possibilities_set(&self) -> Option<&str> {
        self.possibilities.as_deref()
    }

    pub fn desc(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn escapes_idt_characters(&self) -> bool {
        self.escape_idt_characters
    }

    pub fn uses_cdata(&self) -> bool {
        self.use_cdata
    }

    /// Whether values are numbers rather than strings.
    pub fn is_numeric(&self) -> bool {
        matches!(self.ty, ColumnType::Number | ColumnType::LocalizedNumber)
    }

    /// Whether `value` is one of the permitted [`Self::possibilities`],
    ///   or whether no such set was defined.
    pub fn permits(&self, value: &str) -> bool {
        match &self.possibilities {
            Some(set) => set.split(';').any(|p| p == value),
            None => true,
        }
    }

    /// Column type code of the IDT format.
    ///
    /// The type character is upper case for nullable columns.
    pub fn idt_type(&self) -> String {
        let c = match self.ty {
            ColumnType::Number | ColumnType::LocalizedNumber => 'i',
            ColumnType::String => 's',
            ColumnType::Localized => 'l',
            ColumnType::Object => 'v',
        };

        let c = if self.nullable { c.to_ascii_uppercase() } else { c };

        format!("{}{}", c, self.length)
    }
}
