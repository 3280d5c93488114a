// Typed views over rows
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

//! Named accessors over the fixed field indexes of specialized tables.
//!
//! A view is constructed only for a row of the matching [`RowKind`];
//!   field indexes correspond to the column order of the built-in schema
//!   (`src/schema/tables.xml`).
//! Each view `FooRow` has a mutable counterpart `FooRowMut` providing a
//!   `set_` method for every getter.

use super::{FieldData, FieldError, Row, RowKind};
use paste::paste;

macro_rules! row_view {
    (
        $(#[$attr:meta])*
        $name:ident($kind:ident) {
            $(
                $(#[$fattr:meta])*
                $field:ident: $ty:ident @ $idx:literal,
            )+
        }
    ) => {
        paste! {
            $(#[$attr])*
            #[derive(Debug, Clone, Copy)]
            pub struct $name<'a>(&'a Row);

            impl<'a> $name<'a> {
                pub fn new(row: &'a Row) -> Option<Self> {
                    (row.kind() == RowKind::$kind).then(|| Self(row))
                }

                pub fn row(&self) -> &'a Row {
                    self.0
                }

                $(
                    $(#[$fattr])*
                    pub fn $field(&self) -> row_view!(@ty $ty, 'a) {
                        row_view!(@get $ty, self.0, $idx)
                    }
                )+
            }

            #[doc = "Mutable counterpart of [`" $name "`]."]
            #[derive(Debug)]
            pub struct [<$name Mut>]<'a>(&'a mut Row);

            impl<'a> [<$name Mut>]<'a> {
                pub fn new(row: &'a mut Row) -> Option<Self> {
                    (row.kind() == RowKind::$kind).then(|| Self(row))
                }

                pub fn view(&self) -> $name<'_> {
                    $name(&*self.0)
                }

                $(
                    pub fn [<set_ $field>](
                        &mut self,
                        value: Option<row_view!(@arg $ty)>,
                    ) -> Result<(), FieldError> {
                        self.0.set($idx, value.map(FieldData::from))
                    }
                )+
            }
        }
    };

    (@ty str, $lt:lifetime) => { Option<&$lt str> };
    (@ty int, $lt:lifetime) => { Option<i64> };
    (@arg str) => { &str };
    (@arg int) => { i64 };
    (@get str, $row:expr, $idx:literal) => { $row.get_str($idx) };
    (@get int, $row:expr, $idx:literal) => { $row.get_number($idx) };
}

row_view! {
    /// Row of the `File` table.
    FileRow(File) {
        file: str @ 0,
        component: str @ 1,
        file_name: str @ 2,
        file_size: int @ 3,
        version: str @ 4,
        language: str @ 5,
        attributes: int @ 6,
        sequence: int @ 7,
        /// Path of the file on the build machine.
        source: str @ 8,
        disk_id: int @ 9,
        /// `1` if authored as compressed,
        ///   `0` if authored as uncompressed,
        ///   and null if unspecified.
        compressed: int @ 10,
        patch_group: int @ 11,
    }
}

row_view! {
    /// Row of the `Media` table.
    MediaRow(Media) {
        disk_id: int @ 0,
        last_sequence: int @ 1,
        disk_prompt: str @ 2,
        cabinet: str @ 3,
        volume_label: str @ 4,
        source: str @ 5,
        compression_level: str @ 6,
        /// Layout directory overriding that of the bind.
        layout: str @ 7,
    }
}

impl<'a> MediaRow<'a> {
    /// Whether the cabinet is embedded as a stream of the database
    ///   rather than written alongside it.
    pub fn embeds_cabinet(&self) -> bool {
        self.cabinet().map_or(false, |cab| cab.starts_with('#'))
    }
}

row_view! {
    /// Row of the (unreal) `WixMerge` table,
    ///   describing a merge module to be merged into the output.
    MergeRow(Merge) {
        id: str @ 0,
        language: int @ 1,
        directory: str @ 2,
        source_file: str @ 3,
        disk_id: int @ 4,
        file_compression: int @ 5,
        configuration_data: str @ 6,
        /// Primary feature of the module.
        feature: str @ 7,
    }
}

row_view! {
    /// Row of the `Control` table.
    ControlRow(Control) {
        dialog: str @ 0,
        control: str @ 1,
        ty: str @ 2,
        x: int @ 3,
        y: int @ 4,
        width: int @ 5,
        height: int @ 6,
        attributes: int @ 7,
        property: str @ 8,
        text: str @ 9,
        next: str @ 10,
        help: str @ 11,
    }
}

row_view! {
    /// Row of the `BBControl` table.
    BBControlRow(BBControl) {
        billboard: str @ 0,
        bbcontrol: str @ 1,
        ty: str @ 2,
        x: int @ 3,
        y: int @ 4,
        width: int @ 5,
        height: int @ 6,
        attributes: int @ 7,
        text: str @ 8,
    }
}

row_view! {
    /// Row of the `Property` table.
    PropertyRow(Property) {
        property: str @ 0,
        value: str @ 1,
    }
}

row_view! {
    /// Row of the `Upgrade` table.
    UpgradeRow(Upgrade) {
        upgrade_code: str @ 0,
        version_min: str @ 1,
        version_max: str @ 2,
        language: str @ 3,
        attributes: int @ 4,
        remove: str @ 5,
        action_property: str @ 6,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::TableDefinitionCollection;

    fn row(table: &str) -> Row {
        let defs = TableDefinitionCollection::builtin().unwrap();
        Row::new(defs.get(table).unwrap().clone(), 0)
    }

    #[test]
    fn view_requires_matching_kind() {
        let file = row("File");
        let media = row("Media");

        assert!(FileRow::new(&file).is_some());
        assert!(FileRow::new(&media).is_none());
        assert!(MediaRow::new(&media).is_some());
    }

    #[test]
    fn setters_write_through_to_row() {
        let mut file = row("File");

        {
            let mut sut = FileRowMut::new(&mut file).unwrap();
            sut.set_file(Some("FileA")).unwrap();
            sut.set_sequence(Some(3)).unwrap();
            sut.set_disk_id(Some(2)).unwrap();
        }

        let view = FileRow::new(&file).unwrap();
        assert_eq!(Some("FileA"), view.file());
        assert_eq!(Some(3), view.sequence());
        assert_eq!(Some(2), view.disk_id());
        assert_eq!(None, view.patch_group());

        assert_eq!(Some("FileA"), file.get_str(0));
    }

    #[test]
    fn setter_validates() {
        let mut media = row("Media");
        let mut sut = MediaRowMut::new(&mut media).unwrap();

        // DiskId has a minimum of 1
        assert!(sut.set_disk_id(Some(0)).is_err());
        assert!(sut.set_compression_level(Some("extreme")).is_err());
        assert!(sut.set_compression_level(Some("mszip")).is_ok());
    }

    #[test]
    fn embedded_cabinet_detection() {
        let mut media = row("Media");
        let mut sut = MediaRowMut::new(&mut media).unwrap();

        sut.set_cabinet(Some("#product.cab")).unwrap();
        assert!(sut.view().embeds_cabinet());

        sut.set_cabinet(Some("product.cab")).unwrap();
        assert!(!sut.view().embeds_cabinet());
    }
}
