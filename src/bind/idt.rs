// IDT emission
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

//! Rendering of tables in the installer database text archive format.
//!
//! An IDT file begins with three header lines:
//!
//!   1. the names of the columns;
//!   2. the type code of each column
//!        (see [`ColumnDefinition::idt_type`]);
//!   3. the name of the table followed by the names of its primary key
//!        columns.
//!
//! Each row follows on its own line with fields delimited by tabs and
//!   null fields left empty.
//! Lines end in `\r\n`.
//! Within columns that escape IDT characters,
//!   tab,
//!   carriage return,
//!   and line feed are replaced by single control characters that the
//!   importer maps back.
//!
//! Unreal tables and unreal columns exist only for the benefit of the
//!   binder and are never emitted.

use super::modularize::Modularizer;
use crate::diagnose::Messages;
use crate::row::{Row, Table};
use crate::schema::ColumnDefinition;
use memchr::memchr3;
use std::borrow::Cow;
use std::rc::Rc;

const LINE_END: &str = "\r\n";

/// Render `table` in IDT format,
///   modularizing each row if a [`Modularizer`] is provided.
///
/// Yields [`None`] for unreal tables.
/// A row that cannot be modularized is reported as a warning and emitted
///   unmodularized.
pub fn table_to_idt(
    table: &Table,
    modularizer: Option<&Modularizer<'_>>,
    messages: &mut Messages,
) -> Option<String> {
    let def = table.definition();

    if def.is_unreal() {
        return None;
    }

    let real: Vec<(usize, &Rc<ColumnDefinition>)> = def
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, col)| !col.is_unreal())
        .collect();

    let mut out = String::new();

    push_line(&mut out, real.iter().map(|(_, col)| col.name().to_string()));
    push_line(&mut out, real.iter().map(|(_, col)| col.idt_type()));
    push_line(
        &mut out,
        std::iter::once(def.name().to_string()).chain(
            real.iter()
                .filter(|(_, col)| col.is_primary_key())
                .map(|(_, col)| col.name().to_string()),
        ),
    );

    for row in table.iter() {
        let text = match modularizer.map(|m| m.row_text(row)) {
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                messages.emit(&e);
                plain_text(row)
            }
            None => plain_text(row),
        };

        push_line(
            &mut out,
            real.iter().map(|(i, col)| {
                let value = text.get(*i).cloned().flatten().unwrap_or_default();

                if col.escapes_idt_characters() {
                    escape(&value).into_owned()
                } else {
                    value
                }
            }),
        );
    }

    Some(out)
}

fn plain_text(row: &Row) -> Vec<Option<String>> {
    row.fields().iter().map(|field| field.to_text()).collect()
}

fn push_line<I: Iterator<Item = String>>(out: &mut String, fields: I) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push('\t');
        }

        out.push_str(&field);
    }

    out.push_str(LINE_END);
}

/// Replace tab,
///   carriage return,
///   and line feed with their IDT escapes.
pub fn escape(value: &str) -> Cow<'_, str> {
    let bytes = value.as_bytes();

    let first = match memchr3(b'\t', b'\r', b'\n', bytes) {
        Some(i) => i,
        None => return Cow::Borrowed(value),
    };

    let mut escaped = String::with_capacity(value.len());
    escaped.push_str(&value[..first]);

    for c in value[first..].chars() {
        escaped.push(match c {
            '\t' => '\x10',
            '\r' => '\x11',
            '\n' => '\x19',
            c => c,
        });
    }

    Cow::Owned(escaped)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::diagnose::MessageOptions;
    use crate::row::{FieldData, RowCounter};
    use crate::schema::TableDefinitionCollection;
    use fxhash::FxHashSet;

    fn table(name: &str, rows: &[&[Option<FieldData>]]) -> Table {
        let defs = TableDefinitionCollection::builtin().unwrap();
        let mut counter = RowCounter::new();
        let mut table = Table::new(defs.get(name).unwrap().clone());

        for values in rows {
            let row = table.create_row(&mut counter);

            for (i, value) in values.iter().enumerate() {
                row.set(i, value.clone()).unwrap();
            }
        }

        table
    }

    #[test]
    fn escapes_only_when_needed() {
        assert!(matches!(escape("plain"), Cow::Borrowed("plain")));
        assert_eq!("a\x10b\x11\x19c", escape("a\tb\r\nc"));
    }

    #[test]
    fn renders_headers_and_rows() {
        let table = table(
            "Property",
            &[
                &[Some("ProductName".into()), Some("My\tApp".into())],
                &[Some("Empty".into()), None],
            ],
        );

        let idt = table_to_idt(&table, None, &mut Messages::default()).unwrap();

        assert_eq!(
            "Property\tValue\r\n\
             s72\tl0\r\n\
             Property\tProperty\r\n\
             ProductName\tMy\x10App\r\n\
             Empty\t\r\n",
            idt
        );
    }

    #[test]
    fn skips_unreal_columns_and_tables() {
        let media = table(
            "Media",
            &[&[
                Some(FieldData::Number(1)),
                Some(FieldData::Number(3)),
                None,
                Some("#product.cab".into()),
                None,
                None,
                Some("high".into()),
            ]],
        );

        let idt = table_to_idt(&media, None, &mut Messages::default()).unwrap();
        let lines: Vec<_> = idt.split("\r\n").collect();

        assert_eq!(
            "DiskId\tLastSequence\tDiskPrompt\tCabinet\tVolumeLabel\tSource",
            lines[0]
        );
        assert_eq!("1\t3\t\t#product.cab\t\t", lines[3]);

        let merge = table("WixMerge", &[]);
        assert_eq!(None, table_to_idt(&merge, None, &mut Messages::default()));
    }

    #[test]
    fn modularizes_rows() {
        let ignored = FxHashSet::default();
        let actions = FxHashSet::default();
        let modularizer = Modularizer::new("GUID", &ignored, &actions);

        let table = table(
            "Property",
            &[&[Some("MyProp".into()), Some("[INSTALLDIR]x".into())]],
        );

        let idt = table_to_idt(&table, Some(&modularizer), &mut Messages::default())
            .unwrap();

        assert!(idt.ends_with("MyProp.GUID\t[INSTALLDIR]x\r\n"));
    }

    #[test]
    fn modularization_failure_warns() {
        let ignored = FxHashSet::default();
        let actions = FxHashSet::default();
        let modularizer = Modularizer::new("GUID", &ignored, &actions);

        let table = table(
            "Component",
            &[&[
                Some("Comp".into()),
                None,
                Some("TARGETDIR".into()),
                Some(FieldData::Number(0)),
                Some("PROP = \"open".into()),
            ]],
        );

        let mut messages = Messages::buffered(MessageOptions::default());
        let idt = table_to_idt(&table, Some(&modularizer), &mut messages).unwrap();

        assert_eq!(1, messages.warning_count());
        assert!(idt.contains("Comp\t\tTARGETDIR\t0\tPROP = \"open\t\r\n"));
    }
}
