// File and media sequencing
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

//! Assignment of sequence numbers to files and of `LastSequence` to
//!   media.
//!
//! Every file destined for the package is described by a
//!   [`FileMediaInformation`],
//!     whether it was authored in the `File` table or extracted from a
//!     merge module.
//! Files are sequenced in the order
//!   (media, patch group, row number);
//!     files of a patch group other than `0` are deferred until after all
//!     others and then sequenced in ascending order of patch group,
//!       so that patches may append files without renumbering those of
//!       the original package.
//!
//! Module outputs have no media;
//!   their files are numbered by a flat counter in row order.

use super::error::BindError;
use crate::diagnose::Messages;
use crate::ld::{Output, OutputType};
use crate::row::{FileRow, FileRowMut, MediaRow, MediaRowMut, RowNumber};
use crate::span::SourceLineNumberCollection;
use fxhash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Compression of a file as authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCompression {
    /// Use the default of the package.
    NotSpecified,
    No,
    Yes,
}

impl FileCompression {
    /// Interpret the `Compressed` column of the `File` table.
    pub fn from_authored(value: Option<i64>) -> Self {
        match value {
            None => Self::NotSpecified,
            Some(0) => Self::No,
            Some(_) => Self::Yes,
        }
    }
}

/// A file to be placed into the package,
///   and everything needed to sequence and lay it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMediaInformation {
    /// Primary key of the file.
    pub file_id: String,

    /// Name of the file within its cabinet.
    ///
    /// This is the file id,
    ///   modularized in module outputs.
    pub token: String,

    /// Directory into which the file is installed.
    pub directory_id: Option<String>,

    /// Long name of the file.
    pub file_name: String,

    /// Disk id.
    pub media: i64,

    /// Resolved path on the build machine.
    pub source: Option<PathBuf>,

    /// Whether the file was extracted from a merge module rather than
    ///   authored in the `File` table.
    pub from_module: bool,

    pub sequence: Option<i64>,
    pub compression: FileCompression,
    pub patch_group: i64,
    pub row_number: RowNumber,
    pub sources: Option<SourceLineNumberCollection>,
}

impl FileMediaInformation {
    /// Describe an authored file.
    ///
    /// Yields [`None`] if the row has no primary key.
    pub fn from_row(
        file: FileRow<'_>,
        directories: &FxHashMap<&str, &str>,
    ) -> Option<Self> {
        let file_id = file.file()?.to_string();

        let directory_id = file
            .component()
            .and_then(|comp| directories.get(comp))
            .map(|dir| dir.to_string());

        Some(Self {
            token: file_id.clone(),
            file_id,
            directory_id,
            file_name: long_name(file.file_name().unwrap_or_default()).into(),
            media: file.disk_id().unwrap_or(1),
            source: file.source().map(PathBuf::from),
            from_module: false,
            sequence: None,
            compression: FileCompression::from_authored(file.compressed()),
            patch_group: file.patch_group().unwrap_or(0),
            row_number: file.row().number(),
            sources: file.row().sources().cloned(),
        })
    }

    /// Key by which files are sequenced.
    pub fn sort_key(&self) -> (i64, i64, RowNumber) {
        (self.media, self.patch_group, self.row_number)
    }
}

/// Long form of a `short|long` file or directory name.
pub fn long_name(name: &str) -> &str {
    match name.split_once('|') {
        Some((_, long)) => long,
        None => name,
    }
}

/// Describe every file of the `File` table of `output`.
///
/// In product outputs,
///   a file on a disk with no `Media` row is an error.
pub fn collect_files(
    output: &Output,
    messages: &mut Messages,
) -> Vec<FileMediaInformation> {
    let tables = output.tables();

    let directories: FxHashMap<&str, &str> = tables
        .get("Component")
        .map(|table| {
            table
                .iter()
                .filter_map(|row| Some((row.get_str(0)?, row.get_str(2)?)))
                .collect()
        })
        .unwrap_or_default();

    let files: Vec<_> = tables
        .get("File")
        .map(|table| {
            table
                .iter()
                .filter_map(FileRow::new)
                .filter_map(|file| FileMediaInformation::from_row(file, &directories))
                .collect()
        })
        .unwrap_or_default();

    if output.ty() == OutputType::Module {
        return files;
    }

    let disks: FxHashSet<i64> = tables
        .get("Media")
        .map(|table| {
            table
                .iter()
                .filter_map(MediaRow::new)
                .filter_map(|media| media.disk_id())
                .collect()
        })
        .unwrap_or_default();

    for file in files.iter().filter(|f| !disks.contains(&f.media)) {
        messages.emit(&BindError::MissingMedia {
            file: file.file_id.clone(),
            disk_id: file.media,
            sources: file.sources.clone(),
        });
    }

    files
}

/// Greatest sequence number assigned to the files of each disk.
pub type LastSequences = BTreeMap<i64, i64>;

/// Sequence `files` of a product output,
///   leaving them ordered by their new sequence numbers.
pub fn sequence_files(files: &mut [FileMediaInformation]) -> LastSequences {
    files.sort_by_key(FileMediaInformation::sort_key);

    let mut last = LastSequences::new();
    let mut deferred: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    let mut seq = 0;

    let mut assign = |file: &mut FileMediaInformation, last: &mut LastSequences| {
        seq += 1;
        file.sequence = Some(seq);

        let entry = last.entry(file.media).or_insert(seq);
        *entry = (*entry).max(seq);
    };

    for (index, file) in files.iter_mut().enumerate() {
        if file.patch_group > 0 {
            deferred.entry(file.patch_group).or_default().push(index);
            continue;
        }

        assign(file, &mut last);
    }

    for index in deferred.into_values().flatten() {
        assign(&mut files[index], &mut last);
    }

    files.sort_by_key(|file| file.sequence);
    last
}

/// Sequence `files` of a module output by a flat counter in row order,
///   modularizing each cabinet token with `guid`.
///
/// Tokens are left alone if the module has no guid.
pub fn sequence_module_files(files: &mut [FileMediaInformation], guid: Option<&str>) {
    files.sort_by_key(|file| file.row_number);

    for (seq, file) in (1..).zip(files.iter_mut()) {
        file.sequence = Some(seq);

        if let Some(guid) = guid {
            file.token = format!("{}.{}", file.file_id, guid);
        }
    }
}

/// Write assigned sequence numbers back to the `File` table and
///   `LastSequence` to the `Media` table.
///
/// A disk with no files of its own receives the `LastSequence` of the
///   preceding disk.
/// Files extracted from merge modules have no row in the `File` table
///   and are skipped.
pub fn apply_sequences(
    output: &mut Output,
    files: &[FileMediaInformation],
    last: &LastSequences,
    messages: &mut Messages,
) {
    let sequences: FxHashMap<&str, i64> = files
        .iter()
        .filter(|file| !file.from_module)
        .filter_map(|file| Some((file.file_id.as_str(), file.sequence?)))
        .collect();

    let tables = output.tables_mut();

    if let Some(table) = tables.get_mut("File") {
        for row in table.rows_mut() {
            let seq = row.get_str(0).and_then(|id| sequences.get(id)).copied();

            if let (Some(seq), Some(mut file)) = (seq, FileRowMut::new(row)) {
                if let Err(e) = file.set_sequence(Some(seq)) {
                    messages.emit(&e);
                }
            }
        }
    }

    if let Some(table) = tables.get_mut("Media") {
        let mut media: Vec<_> = table.rows_mut().iter_mut().collect();
        media.sort_by_key(|row| row.get_number(0));

        let mut running = 0;

        for row in media {
            if let Some(&seq) = row.get_number(0).and_then(|disk| last.get(&disk)) {
                running = seq;
            }

            if let Some(mut media) = MediaRowMut::new(row) {
                if let Err(e) = media.set_last_sequence(Some(running)) {
                    messages.emit(&e);
                }
            }
        }
    }
}
