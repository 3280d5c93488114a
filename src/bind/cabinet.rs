// Cabinets
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

//! Grouping of compressed files into cabinets.
//!
//! Each disk of the `Media` table with compressed files yields one
//!   [`CabinetWorkItem`].
//! A cabinet whose name begins with `#` is embedded as a stream of the
//!   database rather than placed alongside it;
//!     the stream is named without the `#`.
//! Module outputs have no `Media` table and instead place every file in
//!   a single embedded cabinet named [`global::MODULE_CABINET_NAME`].
//!
//! The cabinet format itself is the concern of a [`CabinetArchiver`].
//! [`FolderArchiver`] stands in for a real archiver by writing each
//!   "cabinet" as a directory of files named by their tokens.

use super::error::BindError;
use super::layout::CompressionBucket;
use super::media::FileMediaInformation;
use crate::diagnose::Messages;
use crate::fs::FileOps;
use crate::global;
use crate::ld::{Output, OutputType};
use crate::row::MediaRow;
use fxhash::FxHashMap;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

str_enum! {
    /// Compression level of a cabinet.
    pub enum CompressionLevel {
        None => "none",
        Low => "low",
        Medium => "medium",
        High => "high",
        Mszip => "mszip",
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::Mszip
    }
}

/// A file stored in a cabinet under the name `token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CabinetFile {
    pub token: String,
    pub source: PathBuf,
}

/// Creates and extracts cabinet archives.
pub trait CabinetArchiver {
    /// Create the cabinet `cabinet` containing `files` in order.
    fn create_archive(
        &mut self,
        cabinet: &Path,
        files: &[CabinetFile],
        level: CompressionLevel,
    ) -> io::Result<()>;

    /// Extract every file of `cabinet` into `dest`,
    ///   yielding the path of each extracted file.
    ///
    /// Each file is named by its token.
    fn extract_archive(&mut self, cabinet: &Path, dest: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Stores "cabinets" as uncompressed directories.
pub struct FolderArchiver<F: FileOps> {
    fs: F,
}

impl<F: FileOps> FolderArchiver<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }
}

impl<F: FileOps> CabinetArchiver for FolderArchiver<F> {
    fn create_archive(
        &mut self,
        cabinet: &Path,
        files: &[CabinetFile],
        _level: CompressionLevel,
    ) -> io::Result<()> {
        if self.fs.exists(cabinet) {
            self.fs.remove_dir_all(cabinet)?;
        }

        self.fs.create_dir_all(cabinet)?;

        for file in files {
            self.fs.copy(&file.source, &cabinet.join(&file.token))?;
        }

        Ok(())
    }

    fn extract_archive(&mut self, cabinet: &Path, dest: &Path) -> io::Result<Vec<PathBuf>> {
        self.fs.create_dir_all(dest)?;

        self.fs
            .read_dir(cabinet)?
            .into_iter()
            .filter_map(|entry| {
                let name = entry.file_name()?.to_owned();
                Some((entry, dest.join(name)))
            })
            .map(|(entry, target)| {
                self.fs.copy(&entry, &target)?;
                Ok(target)
            })
            .collect()
    }
}

/// A cabinet to be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CabinetWorkItem {
    pub disk_id: i64,

    /// Name of the cabinet,
    ///   without any leading `#`.
    pub name: String,

    /// Whether the cabinet is a stream of the database.
    pub embedded: bool,

    pub level: CompressionLevel,

    /// Layout directory overriding that of the bind.
    pub layout: Option<PathBuf>,

    /// Files in sequence order.
    pub files: Vec<CabinetFile>,
}

/// Consulted before each cabinet is built,
///   permitting a cabinet built by an earlier bind to be reused.
pub trait CabinetResolver {
    /// Path of an existing cabinet equivalent to `item`,
    ///   if any.
    fn resolve_cabinet(&mut self, item: &CabinetWorkItem) -> Option<PathBuf>;
}

/// Group the compressed files of `files` into cabinets.
///
/// `files` must already be in sequence order.
/// A compressed file on a disk without a cabinet is an error.
pub fn plan_cabinets(
    output: &Output,
    files: &[FileMediaInformation],
    buckets: &FxHashMap<String, CompressionBucket>,
    default_level: CompressionLevel,
    messages: &mut Messages,
) -> Vec<CabinetWorkItem> {
    let compressed = files.iter().filter(|file| {
        file.source.is_some()
            && buckets.get(&file.file_id) == Some(&CompressionBucket::Cabinet)
    });

    let cab_file = |file: &FileMediaInformation| {
        file.source.clone().map(|source| CabinetFile {
            token: file.token.clone(),
            source,
        })
    };

    if output.ty() == OutputType::Module {
        let files: Vec<_> = compressed.filter_map(cab_file).collect();

        if files.is_empty() {
            return Vec::new();
        }

        return vec![CabinetWorkItem {
            disk_id: 1,
            name: global::MODULE_CABINET_NAME.into(),
            embedded: true,
            level: default_level,
            layout: None,
            files,
        }];
    }

    let mut items: BTreeMap<i64, CabinetWorkItem> = output
        .tables()
        .get("Media")
        .map(|table| {
            table
                .iter()
                .filter_map(MediaRow::new)
                .filter_map(|media| {
                    let disk_id = media.disk_id()?;
                    let cabinet = media.cabinet()?;

                    let level = media
                        .compression_level()
                        .and_then(|level| level.parse().ok())
                        .unwrap_or(default_level);

                    Some((
                        disk_id,
                        CabinetWorkItem {
                            disk_id,
                            name: cabinet.trim_start_matches('#').into(),
                            embedded: media.embeds_cabinet(),
                            level,
                            layout: media.layout().map(PathBuf::from),
                            files: Vec::new(),
                        },
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    for file in compressed {
        match (items.get_mut(&file.media), cab_file(file)) {
            (Some(item), Some(cab)) => item.files.push(cab),
            (None, _) => messages.emit(&BindError::ExpectedMediaCabinet {
                file: file.file_id.clone(),
                disk_id: file.media,
                sources: file.sources.clone(),
            }),
            (_, None) => (),
        }
    }

    items
        .into_values()
        .filter(|item| !item.files.is_empty())
        .collect()
}
