// Merge modules
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

//! Merging of merge modules into a product database.
//!
//! The merge itself is performed by a [`MergeModuleEngine`];
//!   the binder only sequences calls to it and interprets its failures.
//! Merging happens in two phases:
//!
//!   1. Before sequencing,
//!        the embedded cabinet of each module is extracted so that its
//!        files may be sequenced and laid out along with those of the
//!        product
//!        (see [`extract_modules`]).
//!   2. After the database has been committed,
//!        each module is merged into it and connected to the features
//!        that reference it
//!        (see [`merge_modules`]).
//!
//! The rows of the `WixMerge` table describing each module are unreal
//!   and never reach the database.

use super::cabinet::CabinetArchiver;
use super::error::BindError;
use super::media::{FileCompression, FileMediaInformation};
use crate::diagnose::Messages;
use crate::global;
use crate::ld::Output;
use crate::row::{MergeRow, RowNumber};
use crate::span::SourceLineNumberCollection;
use std::error::Error;
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

/// OS error codes indicating that an archive does not exist.
const ARCHIVE_ABSENT: &[i32] = &[2, 3];

/// Failure reported by a [`MergeModuleEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeError {
    /// Code of the underlying failure.
    pub code: i32,
    pub message: String,
}

impl MergeError {
    pub fn new<S: Into<String>>(code: i32, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Whether the failure indicates that an archive does not exist,
    ///   as opposed to having failed to extract.
    pub fn is_archive_absent(&self) -> bool {
        ARCHIVE_ABSENT.contains(&self.code)
    }
}

impl Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl Error for MergeError {}

/// A file contained in a merge module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFile {
    /// Modularized primary key of the file,
    ///   which is also its name within the module cabinet.
    pub file_id: String,

    /// Long name of the file.
    pub file_name: String,
}

/// Merges modules into an installer database.
pub trait MergeModuleEngine {
    fn open_database(&mut self, path: &Path) -> Result<(), MergeError>;

    fn open_module(&mut self, path: &Path, language: i64) -> Result<(), MergeError>;

    /// Merge the open module beneath `feature`,
    ///   redirecting its root directory to `directory`.
    fn merge(&mut self, feature: &str, directory: &str) -> Result<(), MergeError>;

    /// Connect the open module to an additional feature.
    fn connect(&mut self, feature: &str) -> Result<(), MergeError>;

    /// Write the embedded cabinet of the open module to `dest`.
    fn extract_cabinet(&mut self, dest: &Path) -> Result<(), MergeError>;

    /// Files of the open module.
    fn module_files(&mut self) -> Result<Vec<ModuleFile>, MergeError>;

    fn close_module(&mut self) -> Result<(), MergeError>;

    /// Close the database,
    ///   committing the merged modules if `commit`.
    fn close_database(&mut self, commit: bool) -> Result<(), MergeError>;
}

/// A merge module to be merged into the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeModule {
    pub id: String,
    pub language: i64,
    pub directory: String,
    pub source: PathBuf,
    pub disk_id: i64,
    pub compression: FileCompression,
    pub feature: Option<String>,
    pub row_number: RowNumber,
    pub sources: Option<SourceLineNumberCollection>,
}

impl MergeModule {
    pub fn from_row(merge: MergeRow<'_>) -> Option<Self> {
        Some(Self {
            id: merge.id()?.into(),
            language: merge.language().unwrap_or(0),
            directory: merge.directory()?.into(),
            source: merge.source_file()?.into(),
            disk_id: merge.disk_id().unwrap_or(1),
            compression: FileCompression::from_authored(merge.file_compression()),
            feature: merge.feature().map(String::from),
            row_number: merge.row().number(),
            sources: merge.row().sources().cloned(),
        })
    }
}

/// Every merge module of `output`.
pub fn collect_modules(output: &Output) -> Vec<MergeModule> {
    output
        .tables()
        .get("WixMerge")
        .map(|table| {
            table
                .iter()
                .filter_map(MergeRow::new)
                .filter_map(MergeModule::from_row)
                .collect()
        })
        .unwrap_or_default()
}

/// Extract the files of each module into `temp_dir` so that they may be
///   sequenced with the files of the product.
///
/// Each extracted file is installed into the directory of its module.
pub fn extract_modules<E, A>(
    engine: &mut E,
    archiver: &mut A,
    modules: &[MergeModule],
    temp_dir: &Path,
    messages: &mut Messages,
) -> Vec<FileMediaInformation>
where
    E: MergeModuleEngine + ?Sized,
    A: CabinetArchiver + ?Sized,
{
    let mut files = Vec::new();

    for module in modules {
        let module_dir = temp_dir.join(&module.id);

        match extract_module(engine, archiver, module, &module_dir) {
            Ok(extracted) => {
                messages.verbose(format!(
                    "extracted {} files from merge module `{}`",
                    extracted.len(),
                    module.id
                ));

                files.extend(extracted);
            }
            Err(e) => messages.emit(&e),
        }
    }

    files
}

fn extract_module<E, A>(
    engine: &mut E,
    archiver: &mut A,
    module: &MergeModule,
    module_dir: &Path,
) -> Result<Vec<FileMediaInformation>, BindError>
where
    E: MergeModuleEngine + ?Sized,
    A: CabinetArchiver + ?Sized,
{
    let failed = |error: MergeError| BindError::MergeFailed {
        module: module.id.clone(),
        error,
    };

    engine
        .open_module(&module.source, module.language)
        .map_err(failed)?;

    let cabinet = module_dir.join(global::MODULE_CABINET_NAME);
    let files_dir = module_dir.join("files");

    let result = engine
        .extract_cabinet(&cabinet)
        .map_err(|error| {
            if error.is_archive_absent() {
                BindError::ModuleCabinetMissing {
                    module: module.id.clone(),
                    path: cabinet.clone(),
                }
            } else {
                BindError::ModuleCabinetExtraction {
                    module: module.id.clone(),
                    path: cabinet.clone(),
                    error,
                }
            }
        })
        .and_then(|()| {
            archiver.extract_archive(&cabinet, &files_dir).map_err(|e| {
                BindError::ModuleCabinetExtraction {
                    module: module.id.clone(),
                    path: cabinet.clone(),
                    error: MergeError::new(e.raw_os_error().unwrap_or(-1), e.to_string()),
                }
            })
        })
        .and_then(|_| engine.module_files().map_err(failed));

    // the module must be closed even if extraction failed
    let closed = engine.close_module().map_err(failed);

    let module_files = result?;
    closed?;

    Ok(module_files
        .into_iter()
        .map(|file| FileMediaInformation {
            token: file.file_id.clone(),
            source: Some(files_dir.join(&file.file_id)),
            file_id: file.file_id,
            directory_id: Some(module.directory.clone()),
            file_name: file.file_name,
            media: module.disk_id,
            from_module: true,
            sequence: None,
            compression: module.compression,
            patch_group: 0,
            row_number: module.row_number,
            sources: module.sources.clone(),
        })
        .collect())
}

/// Merge each module into the committed database at `path`.
///
/// The database is committed only if no error has been encountered.
pub fn merge_modules<E: MergeModuleEngine + ?Sized>(
    engine: &mut E,
    output: &Output,
    modules: &[MergeModule],
    path: &Path,
    messages: &mut Messages,
) {
    if let Err(error) = engine.open_database(path) {
        messages.emit(&BindError::MergeFailed {
            module: output.entry_id().into(),
            error,
        });
        return;
    }

    for module in modules {
        if let Err(e) = merge_module(engine, output, module) {
            messages.emit(&e);
        }
    }

    let commit = !messages.encountered_error();

    if let Err(error) = engine.close_database(commit) {
        messages.emit(&BindError::MergeFailed {
            module: output.entry_id().into(),
            error,
        });
    }
}

fn merge_module<E: MergeModuleEngine + ?Sized>(
    engine: &mut E,
    output: &Output,
    module: &MergeModule,
) -> Result<(), BindError> {
    let failed = |error: MergeError| BindError::MergeFailed {
        module: module.id.clone(),
        error,
    };

    engine
        .open_module(&module.source, module.language)
        .map_err(failed)?;

    let primary = module
        .feature
        .clone()
        .or_else(|| {
            output
                .merge_features()
                .get(&module.id)
                .and_then(|features| features.first().cloned())
        })
        .unwrap_or_default();

    let result = engine
        .merge(&primary, &module.directory)
        .and_then(|()| {
            output
                .merge_features()
                .get(&module.id)
                .into_iter()
                .flatten()
                .filter(|feature| **feature != primary)
                .try_for_each(|feature| engine.connect(feature))
        })
        .map_err(failed);

    let closed = engine.close_module().map_err(failed);

    result?;
    closed
}
