// Fields of a row
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

use crate::diagnose::Diagnostic;
use crate::schema::ColumnDefinition;
use std::error::Error;
use std::fmt::{self, Display};
use std::rc::Rc;

/// Value held by a [`Field`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldData {
    String(String),
    Number(i64),
}

impl FieldData {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(_) => None,
        }
    }
}

impl Display for FieldData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => Display::fmt(n, f),
        }
    }
}

impl From<&str> for FieldData {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for FieldData {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FieldData {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// One slot of a [`Row`](super::Row).
///
/// Data are normalized according to the column type when set:
///   numeric columns always hold [`FieldData::Number`] and all other
///   columns hold [`FieldData::String`].
#[derive(Debug, Clone)]
pub struct Field {
    column: Rc<ColumnDefinition>,
    data: Option<FieldData>,
}

impl Field {
    pub fn new(column: Rc<ColumnDefinition>) -> Self {
        Self { column, data: None }
    }

    pub fn column(&self) -> &Rc<ColumnDefinition> {
        &self.column
    }

    pub fn data(&self) -> Option<&FieldData> {
        self.data.as_ref()
    }

    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.data.as_ref().and_then(FieldData::as_str)
    }

    pub fn as_number(&self) -> Option<i64> {
        self.data.as_ref().and_then(FieldData::as_number)
    }

    /// Textual form of the data,
    ///   regardless of column type.
    pub fn to_text(&self) -> Option<String> {
        self.data.as_ref().map(ToString::to_string)
    }

    /// Set the data of this field,
    ///   validating it against the column definition.
    ///
    /// The empty string is null,
    ///   as it is in the installer database.
    /// On error the previous data are retained.
    pub fn set_data(
        &mut self,
        data: Option<FieldData>,
    ) -> Result<(), FieldError> {
        self.data = match data {
            None => None,
            Some(FieldData::String(s)) if s.is_empty() => None,
            Some(data) => Some(self.validate(data)?),
        };

        Ok(())
    }

    fn validate(&self, data: FieldData) -> Result<FieldData, FieldError> {
        let col = &self.column;

        let data = match data {
            FieldData::String(s) if col.is_numeric() => {
                match s.trim().parse() {
                    Ok(n) => FieldData::Number(n),
                    Err(_) => {
                        return Err(self.error(s, FieldErrorKind::NotANumber))
                    }
                }
            }
            FieldData::Number(n) if !col.is_numeric() => {
                FieldData::String(n.to_string())
            }
            data => data,
        };

        if let FieldData::Number(n) = data {
            let below = col.min_value().map_or(false, |min| n < min);
            let above = col.max_value().map_or(false, |max| n > max);

            if below || above {
                return Err(self.error(
                    n.to_string(),
                    FieldErrorKind::OutOfRange(col.min_value(), col.max_value()),
                ));
            }
        }

        let text = data.to_string();
        if !col.permits(&text) {
            return Err(self.error(text, FieldErrorKind::NotPermitted));
        }

        Ok(data)
    }

    fn error(&self, value: String, kind: FieldErrorKind) -> FieldError {
        FieldError {
            column: self.column.name().into(),
            value,
            kind,
        }
    }
}

/// Fields are identical if they share a column name and their data are
///   equal.
impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.column.name() == other.column.name() && self.data == other.data
    }
}

impl Eq for Field {}

/// A value could not be stored in a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub column: String,
    pub value: String,
    pub kind: FieldErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorKind {
    /// A numeric column was given a value that does not parse as an
    ///   integer.
    NotANumber,
    /// Value outside of the column's `(min, max)` bounds.
    OutOfRange(Option<i64>, Option<i64>),
    /// Value is not a member of the column's set of possibilities.
    NotPermitted,
}

impl Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            column,
            value,
            kind,
        } = self;

        match kind {
            FieldErrorKind::NotANumber => write!(
                f,
                "column `{column}` requires a number but was given `{value}`"
            ),
            FieldErrorKind::OutOfRange(min, max) => {
                write!(f, "value `{value}` of column `{column}` is out of range")?;

                match (min, max) {
                    (Some(min), Some(max)) => write!(f, " [{min}, {max}]"),
                    (Some(min), None) => write!(f, " (minimum {min})"),
                    (None, Some(max)) => write!(f, " (maximum {max})"),
                    (None, None) => Ok(()),
                }
            }
            FieldErrorKind::NotPermitted => write!(
                f,
                "value `{value}` is not permitted in column `{column}`"
            ),
        }
    }
}

impl Error for FieldError {}

impl Diagnostic for FieldError {
    fn id(&self) -> u32 {
        21
    }

    fn resource(&self) -> &'static str {
        "IllegalFieldValue"
    }

    fn args(&self) -> Vec<String> {
        vec![self.value.clone(), self.column.clone()]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::ColumnType;

    fn field(col: ColumnDefinition) -> Field {
        Field::new(Rc::new(col))
    }

    #[test]
    fn number_column_parses_strings() {
        let mut sut = field(ColumnDefinition::new("n", ColumnType::Number, 4));

        sut.set_data(Some(" 42".into())).unwrap();
        assert_eq!(Some(42), sut.as_number());
    }

    #[test]
    fn number_column_rejects_garbage() {
        let mut sut = field(ColumnDefinition::new("n", ColumnType::Number, 4));
        sut.set_data(Some(5.into())).unwrap();

        let err = sut.set_data(Some("five".into())).unwrap_err();

        assert_eq!(FieldErrorKind::NotANumber, err.kind);
        // previous value retained
        assert_eq!(Some(5), sut.as_number());
    }

    #[test]
    fn string_column_stringifies_numbers() {
        let mut sut = field(ColumnDefinition::new("s", ColumnType::String, 0));

        sut.set_data(Some(12.into())).unwrap();
        assert_eq!(Some("12"), sut.as_str());
    }

    #[test]
    fn empty_string_is_null() {
        let mut sut = field(ColumnDefinition::new("s", ColumnType::String, 0));
        sut.set_data(Some("x".into())).unwrap();

        sut.set_data(Some("".into())).unwrap();
        assert!(sut.is_null());
    }

    #[test]
    fn bounds_are_enforced() {
        let mut sut = field(
            ColumnDefinition::new("n", ColumnType::Number, 2)
                .bounds(Some(1), Some(10)),
        );

        assert!(sut.set_data(Some(1.into())).is_ok());
        assert!(sut.set_data(Some(10.into())).is_ok());
        assert_eq!(
            FieldErrorKind::OutOfRange(Some(1), Some(10)),
            sut.set_data(Some(0.into())).unwrap_err().kind
        );
        assert!(sut.set_data(Some(11.into())).is_err());
    }

    #[test]
    fn possibilities_are_enforced() {
        let mut sut = field(
            ColumnDefinition::new("c", ColumnType::String, 0)
                .possibilities("low;high"),
        );

        assert!(sut.set_data(Some("low".into())).is_ok());
        assert_eq!(
            FieldErrorKind::NotPermitted,
            sut.set_data(Some("mid".into())).unwrap_err().kind
        );
    }

    #[test]
    fn identity_is_column_name_and_data() {
        let a = ColumnDefinition::new("a", ColumnType::String, 0);

        let mut x = field(a.clone());
        let mut y = field(a.description("different definition, same name"));
        x.set_data(Some("v".into())).unwrap();
        y.set_data(Some("v".into())).unwrap();

        assert_eq!(x, y);

        let mut z = field(ColumnDefinition::new("b", ColumnType::String, 0));
        z.set_data(Some("v".into())).unwrap();

        assert_ne!(x, z);
    }
}
