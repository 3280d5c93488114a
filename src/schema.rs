// Table definition schema
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

//! Schema of the relational representation.
//!
//! Every row produced by the compiler belongs to a table whose shape is
//!   described by a [`TableDefinition`]:
//!     an ordered sequence of [`ColumnDefinition`]s.
//! Definitions are loaded once from a `tableDefinitions` document and
//!   shared read-only thereafter.
//!
//! ```xml
//! <tableDefinitions>
//!   <tableDefinition name="Property">
//!     <columnDefinition name="Property" type="string" length="72"
//!                       primaryKey="yes" symbol="yes" modularize="column"
//!                       category="identifier" />
//!     <columnDefinition name="Value" type="localized" length="0"
//!                       category="text" />
//!   </tableDefinition>
//! </tableDefinitions>
//! ```
//!
//! The schema of every table used by the linker and binder is built in;
//!   see [`TableDefinitionCollection::builtin`].

mod column;
mod table;

pub use column::{
    ColumnCategory, ColumnDefinition, ColumnModularizeType, ColumnType,
};
pub use table::{TableDefinition, TableDefinitionCollection};

use crate::convert::UnknownVariant;
use crate::diagnose::Diagnostic;
use crate::xir::{self, Attrs, Event, MissingAttr, XirError};
use std::error::Error;
use std::fmt::{self, Display};
use std::io::BufRead;
use std::str::FromStr;

/// Schema of every table known to the toolset.
const BUILTIN_TABLES: &str = include_str!("schema/tables.xml");

impl TableDefinitionCollection {
    /// Load table definitions from a `tableDefinitions` document.
    pub fn load<B: BufRead>(src: B) -> Result<Self, SchemaError> {
        let mut reader = xir::reader(src);
        let mut buf = Vec::new();
        let mut defs = Self::new();
        let mut current: Option<(Attrs, Vec<ColumnDefinition>)> = None;

        loop {
            buf.clear();

            match reader.read_event_into(&mut buf)? {
                Event::Start(ele) => {
                    let attrs = Attrs::parse(&ele)?;

                    match attrs.element() {
                        "tableDefinitions" => (),
                        "tableDefinition" => {
                            attrs.require("name")?;
                            current = Some((attrs, Vec::new()));
                        }
                        "columnDefinition" => match current.as_mut() {
                            Some((_, cols)) => cols.push(parse_column(&attrs)?),
                            None => return Err(SchemaError::ColumnOutsideTable),
                        },
                        other => {
                            return Err(SchemaError::UnexpectedElement(
                                other.into(),
                            ))
                        }
                    }
                }

                Event::End(ele) if xir_is(&ele, "tableDefinition") => {
                    if let Some((attrs, cols)) = current.take() {
                        let name = attrs.require("name")?;
                        let def = TableDefinition::new(
                            name,
                            cols,
                            attrs.flag("unreal"),
                        );

                        defs.add(def).map_err(|def| {
                            SchemaError::DuplicateTable(def.name().into())
                        })?;
                    }
                }

                Event::Eof => break,
                _ => (),
            }
        }

        Ok(defs)
    }

    /// The schema built into the toolset.
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::load(BUILTIN_TABLES.as_bytes())
    }
}

fn xir_is(ele: &quick_xml::events::BytesEnd, name: &str) -> bool {
    ele.local_name().as_ref() == name.as_bytes()
}

fn parse_column(attrs: &Attrs) -> Result<ColumnDefinition, SchemaError> {
    let name = attrs.require("name")?;
    let ty: ColumnType = parse_enum(attrs.require("type")?)?;
    let length = match attrs.get("length") {
        Some(len) => parse_num(attrs, "length", len)?,
        None => 0,
    };

    let mut col = ColumnDefinition::new(name, ty, length);

    if attrs.flag("primaryKey") {
        col = col.primary_key();
    }
    if attrs.flag("nullable") {
        col = col.nullable();
    }
    if attrs.flag("symbol") {
        col = col.symbol();
    }
    if attrs.flag("unreal") {
        col = col.unreal();
    }
    if attrs.flag("localizable") {
        col = col.localizable();
    }
    if attrs.flag("escapeIdtCharacters") {
        col = col.escape_idt_characters();
    }
    if attrs.flag("useCData") {
        col = col.use_cdata();
    }

    if let Some(m) = attrs.get("modularize") {
        col = col.modularize(parse_enum(m)?);
    }

    if let Some(c) = attrs.get("category") {
        col = col.category(parse_enum(c)?);
    }

    let min = attrs
        .get("minValue")
        .map(|v| parse_num(attrs, "minValue", v))
        .transpose()?;
    let max = attrs
        .get("maxValue")
        .map(|v| parse_num(attrs, "maxValue", v))
        .transpose()?;
    col = col.bounds(min, max);

    let key_column = attrs
        .get("keyColumn")
        .map(|v| parse_num(attrs, "keyColumn", v))
        .transpose()?;
    col = col.key(attrs.get("keyTable").map(String::from), key_column);

    if let Some(set) = attrs.get("set") {
        col = col.possibilities(set);
    }

    if let Some(desc) = attrs.get("description") {
        col = col.description(desc);
    }

    Ok(col)
}

fn parse_enum<T: FromStr<Err = UnknownVariant>>(
    value: &str,
) -> Result<T, SchemaError> {
    value.parse().map_err(SchemaError::UnknownValue)
}

fn parse_num<T: FromStr>(
    attrs: &Attrs,
    attr: &str,
    value: &str,
) -> Result<T, SchemaError> {
    value.parse().map_err(|_| SchemaError::InvalidNumber {
        column: attrs.get("name").unwrap_or_default().into(),
        attr: attr.into(),
        value: value.into(),
    })
}

/// Error loading table definitions.
///
/// These are configuration errors and are always fatal.
#[derive(Debug)]
pub enum SchemaError {
    Xml(XirError),
    MissingAttribute(MissingAttr),
    UnknownValue(UnknownVariant),
    InvalidNumber {
        column: String,
        attr: String,
        value: String,
    },
    DuplicateTable(String),
    /// A `columnDefinition` appeared outside of a `tableDefinition`.
    ColumnOutsideTable,
    UnexpectedElement(String),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xml(e) => write!(f, "invalid table definitions: {e}"),
            Self::MissingAttribute(e) => Display::fmt(e, f),
            Self::UnknownValue(e) => Display::fmt(e, f),
            Self::InvalidNumber {
                column,
                attr,
                value,
            } => write!(
                f,
                "column `{column}` has invalid numeric `{attr}` value `{value}`"
            ),
            Self::DuplicateTable(name) => {
                write!(f, "table `{name}` is defined more than once")
            }
            Self::ColumnOutsideTable => {
                write!(f, "`columnDefinition` outside of a `tableDefinition`")
            }
            Self::UnexpectedElement(name) => {
                write!(f, "unexpected element `{name}` in table definitions")
            }
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Xml(e) => Some(e),
            _ => None,
        }
    }
}

impl Diagnostic for SchemaError {
    fn id(&self) -> u32 {
        1
    }

    fn resource(&self) -> &'static str {
        "InvalidTableDefinitions"
    }

    fn args(&self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl From<XirError> for SchemaError {
    fn from(e: XirError) -> Self {
        Self::Xml(e)
    }
}

impl From<quick_xml::Error> for SchemaError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.into())
    }
}

impl From<MissingAttr> for SchemaError {
    fn from(e: MissingAttr) -> Self {
        Self::MissingAttribute(e)
    }
}
