// Output layout
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

//! Placement of files into cabinets or the uncompressed layout.
//!
//! Whether a file is compressed is decided by the output type,
//!   the compression authored for the file,
//!   and the default of the package
//!     (bit 2 of the word count summary property).
//! Module files and files authored as compressed always go into a
//!   cabinet.
//!
//! Uncompressed files are laid out in a directory tree mirroring the
//!   `Directory` table,
//!     rooted at the layout directory.

use super::error::BindError;
use super::media::{long_name, FileCompression, FileMediaInformation};
use super::transfer::FileTransfer;
use crate::diagnose::Messages;
use crate::global;
use crate::ld::{Output, OutputType};
use crate::row::{FileRowMut, MediaRow};
use crate::span::SourceLineNumberCollection;
use fxhash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};

/// `File.Attributes` bit marking a file uncompressed in a package
///   compressed by default.
pub const ATTR_NONCOMPRESSED: i64 = 0x2000;

/// `File.Attributes` bit marking a file compressed in a package
///   uncompressed by default.
pub const ATTR_COMPRESSED: i64 = 0x4000;

/// Name of the root directory of the source image.
const SOURCE_DIR: &str = "SourceDir";

/// Where the data of a file are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionBucket {
    Cabinet,
    Loose,
}

impl CompressionBucket {
    pub fn decide(
        ty: OutputType,
        compression: FileCompression,
        compressed_by_default: bool,
    ) -> Self {
        match (ty, compression) {
            (OutputType::Module, _) | (_, FileCompression::Yes) => Self::Cabinet,
            (_, FileCompression::No) => Self::Loose,
            (_, FileCompression::NotSpecified) if compressed_by_default => {
                Self::Cabinet
            }
            (_, FileCompression::NotSpecified) => Self::Loose,
        }
    }
}

/// Whether files of `output` are compressed by default.
pub fn compressed_by_default(output: &Output) -> bool {
    output
        .tables()
        .get("_SummaryInformation")
        .and_then(|table| {
            table.iter().find(|row| {
                row.get_number(0) == Some(global::SUMMARY_WORD_COUNT_PID.into())
            })
        })
        .and_then(|row| row.get_text(1))
        .and_then(|value| value.trim().parse::<i64>().ok())
        .map_or(false, |count| {
            count & i64::from(global::SUMMARY_WORD_COUNT_COMPRESSED) != 0
        })
}

/// Mark in `File.Attributes` every file whose bucket deviates from the
///   package default.
pub fn apply_compression_attributes(
    output: &mut Output,
    buckets: &FxHashMap<String, CompressionBucket>,
    compressed_by_default: bool,
    messages: &mut Messages,
) {
    let table = match output.tables_mut().get_mut("File") {
        Some(table) => table,
        None => return,
    };

    for row in table.rows_mut() {
        let bucket = match row.get_str(0).and_then(|id| buckets.get(id)) {
            Some(bucket) => *bucket,
            None => continue,
        };

        let attrs = row.get_number(6).unwrap_or(0)
            & !(ATTR_COMPRESSED | ATTR_NONCOMPRESSED);

        let attrs = match (bucket, compressed_by_default) {
            (CompressionBucket::Cabinet, false) => attrs | ATTR_COMPRESSED,
            (CompressionBucket::Loose, true) => attrs | ATTR_NONCOMPRESSED,
            _ => attrs,
        };

        if let Some(mut file) = FileRowMut::new(row) {
            if let Err(e) = file.set_attributes(Some(attrs)) {
                messages.emit(&e);
            }
        }
    }
}

/// Source-image relative paths of the directories of the `Directory`
///   table.
///
/// Resolved paths are memoized.
#[derive(Debug, Default)]
pub struct DirectoryResolver {
    /// Parent and source name of each directory.
    entries: FxHashMap<String, DirectoryEntry>,
    cache: FxHashMap<String, Vec<String>>,
}

#[derive(Debug)]
struct DirectoryEntry {
    parent: Option<String>,
    name: Option<String>,
    sources: Option<SourceLineNumberCollection>,
}

impl DirectoryResolver {
    pub fn new(output: &Output) -> Self {
        let entries = output
            .tables()
            .get("Directory")
            .map(|table| {
                table
                    .iter()
                    .filter_map(|row| {
                        let id = row.get_str(0)?.to_string();
                        let entry = DirectoryEntry {
                            parent: row.get_str(1).map(String::from),
                            name: row.get_str(2).and_then(source_name).map(String::from),
                            sources: row.sources().cloned(),
                        };

                        Some((id, entry))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            entries,
            cache: Default::default(),
        }
    }

    /// Path of the directory `id` relative to the root of the source
    ///   image.
    pub fn resolve(&mut self, id: &str) -> Result<PathBuf, BindError> {
        let mut segments = self.segments(id, &mut FxHashSet::default())?;

        if segments
            .first()
            .map_or(false, |first| first.eq_ignore_ascii_case(SOURCE_DIR))
        {
            segments.remove(0);
        }

        Ok(segments.iter().collect())
    }

    fn segments(
        &mut self,
        id: &str,
        visiting: &mut FxHashSet<String>,
    ) -> Result<Vec<String>, BindError> {
        if let Some(segments) = self.cache.get(id) {
            return Ok(segments.clone());
        }

        if !visiting.insert(id.to_string()) {
            return Err(BindError::DirectoryCycle(id.into()));
        }

        let (parent, name) = match self.entries.get(id) {
            Some(entry) => (entry.parent.clone(), entry.name.clone()),
            None => {
                return Err(BindError::MissingDirectory {
                    directory: id.into(),
                    sources: None,
                })
            }
        };

        let mut segments = match parent.as_deref() {
            Some(parent) if parent != id => {
                self.segments(parent, visiting).map_err(|e| match e {
                    BindError::MissingDirectory { directory, sources: None } => {
                        BindError::MissingDirectory {
                            directory,
                            sources: self
                                .entries
                                .get(id)
                                .and_then(|entry| entry.sources.clone()),
                        }
                    }
                    e => e,
                })?
            }
            _ => Vec::new(),
        };

        segments.extend(name);
        self.cache.insert(id.to_string(), segments.clone());

        Ok(segments)
    }
}

/// Source name of a `DefaultDir` value.
///
/// The value takes the form `target[:source]`,
///   each of which may be `short|long`.
/// A name of `.` contributes no path segment.
fn source_name(default_dir: &str) -> Option<&str> {
    let name = match default_dir.split_once(':') {
        Some((_, source)) => source,
        None => default_dir,
    };

    match long_name(name) {
        "." | "" => None,
        name => Some(name),
    }
}

/// Plan the transfer of every loose file into the layout.
///
/// Files of a disk whose `Media` row names a layout directory are placed
///   there instead of `layout_dir`.
/// Files extracted from merge modules are moved rather than copied.
pub fn loose_transfers(
    output: &Output,
    files: &[FileMediaInformation],
    buckets: &FxHashMap<String, CompressionBucket>,
    layout_dir: &Path,
    messages: &mut Messages,
) -> Vec<FileTransfer> {
    let mut resolver = DirectoryResolver::new(output);

    let media_layouts: FxHashMap<i64, PathBuf> = output
        .tables()
        .get("Media")
        .map(|table| {
            table
                .iter()
                .filter_map(MediaRow::new)
                .filter_map(|media| Some((media.disk_id()?, media.layout()?.into())))
                .collect()
        })
        .unwrap_or_default();

    let mut transfers = Vec::new();

    for file in files {
        if buckets.get(&file.file_id) != Some(&CompressionBucket::Loose) {
            continue;
        }

        let source = match &file.source {
            Some(source) => source,
            None => continue,
        };

        let dir = match file.directory_id.as_deref().map(|id| resolver.resolve(id)) {
            Some(Ok(dir)) => dir,
            Some(Err(e)) => {
                messages.emit(&e);
                continue;
            }
            None => PathBuf::new(),
        };

        let root = media_layouts
            .get(&file.media)
            .map(PathBuf::as_path)
            .unwrap_or(layout_dir);

        transfers.push(
            FileTransfer::new(
                source,
                root.join(dir).join(&file.file_name),
                file.from_module,
            )
            .with_sources(file.sources.clone()),
        );
    }

    transfers
}
