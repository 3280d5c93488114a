// Object file errors
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

//! Errors while processing object and library files.

use super::SectionError;
use crate::convert::UnknownVariant;
use crate::diagnose::Diagnostic;
use crate::row::FieldError;
use crate::span::SourceLineNumberCollection;
use crate::sym::ComplexReferenceError;
use crate::xir::{MissingAttr, XirError};
use std::error::Error;
use std::fmt::{self, Display};

/// Error during object or library processing.
///
/// Every one of these errors is fatal:
///   a malformed object file cannot be meaningfully linked.
/// Errors contain only owned values rather than references to original
///   data,
///     which drastically simplifies the reader and [`Result`] chaining.
#[derive(Debug)]
pub enum ObjError {
    Xml(XirError),
    MissingAttribute(MissingAttr),
    UnknownValue(UnknownVariant),
    /// The root element was neither `wixObject` nor `wixLibrary`.
    UnexpectedRoot(String),
    /// An element appeared where it is not permitted.
    UnexpectedElement { parent: String, ele: String },
    /// A numeric attribute did not parse.
    InvalidNumber { attr: String, value: String },
    /// The file was produced by an incompatible version of the toolset.
    VersionMismatch {
        kind: &'static str,
        found: Option<String>,
        expected: &'static str,
    },
    /// A `table` element named a table with no definition.
    UnknownTable(String),
    /// A tuple had a number of fields other than the number of columns
    ///   of its table.
    FieldCountMismatch {
        table: String,
        expected: usize,
        found: usize,
        sources: Option<SourceLineNumberCollection>,
    },
    /// A field value failed validation against its column.
    Field(FieldError, Option<SourceLineNumberCollection>),
    Section(SectionError),
    ComplexReference(ComplexReferenceError),
    UnexpectedEof,
}

impl Display for ObjError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ObjError::*;

        match self {
            Xml(e) => Display::fmt(e, f),
            MissingAttribute(e) => Display::fmt(e, f),
            UnknownValue(e) => Display::fmt(e, f),

            UnexpectedRoot(name) => write!(
                f,
                "expected `wixObject` or `wixLibrary` root element, \
                   found `{name}`"
            ),

            UnexpectedElement { parent, ele } => {
                write!(f, "unexpected element `{ele}` within `{parent}`")
            }

            InvalidNumber { attr, value } => {
                write!(f, "attribute `{attr}` is not a number: `{value}`")
            }

            VersionMismatch {
                kind,
                found,
                expected,
            } => write!(
                f,
                "{kind} file version `{}` is incompatible with the expected \
                   version `{expected}`; rebuild it with this toolset",
                found.as_deref().unwrap_or("(none)")
            ),

            UnknownTable(name) => {
                write!(f, "the table `{name}` has no definition")
            }

            FieldCountMismatch {
                table,
                expected,
                found,
                ..
            } => write!(
                f,
                "a row of table `{table}` has {found} fields, \
                   but the table has {expected} columns"
            ),

            Field(e, _) => Display::fmt(e, f),
            Section(e) => Display::fmt(e, f),
            ComplexReference(e) => Display::fmt(e, f),
            UnexpectedEof => write!(f, "unexpected end of file"),
        }
    }
}

impl Error for ObjError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Xml(e) => Some(e),
            _ => None,
        }
    }
}

impl Diagnostic for ObjError {
    fn id(&self) -> u32 {
        use ObjError::*;

        match self {
            VersionMismatch { .. } => 41,
            UnknownTable(_) => 57,
            FieldCountMismatch { .. } => 58,
            Field(..) => 21,
            _ => 104,
        }
    }

    fn resource(&self) -> &'static str {
        use ObjError::*;

        match self {
            VersionMismatch { .. } => "VersionMismatch",
            UnknownTable(_) => "UnknownTable",
            FieldCountMismatch { .. } => "UnexpectedColumnCount",
            Field(..) => "IllegalFieldValue",
            _ => "CorruptObject",
        }
    }

    fn args(&self) -> Vec<String> {
        vec![self.to_string()]
    }

    fn sources(&self) -> Option<&SourceLineNumberCollection> {
        match self {
            Self::FieldCountMismatch { sources, .. } => sources.as_ref(),
            Self::Field(_, sources) => sources.as_ref(),
            _ => None,
        }
    }
}

impl From<XirError> for ObjError {
    fn from(e: XirError) -> Self {
        Self::Xml(e)
    }
}

impl From<quick_xml::Error> for ObjError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.into())
    }
}

impl From<std::io::Error> for ObjError {
    fn from(e: std::io::Error) -> Self {
        Self::Xml(e.into())
    }
}

impl From<MissingAttr> for ObjError {
    fn from(e: MissingAttr) -> Self {
        Self::MissingAttribute(e)
    }
}

impl From<UnknownVariant> for ObjError {
    fn from(e: UnknownVariant) -> Self {
        Self::UnknownValue(e)
    }
}

impl From<SectionError> for ObjError {
    fn from(e: SectionError) -> Self {
        Self::Section(e)
    }
}

impl From<ComplexReferenceError> for ObjError {
    fn from(e: ComplexReferenceError) -> Self {
        Self::ComplexReference(e)
    }
}
