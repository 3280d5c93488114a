// Binder errors
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

use super::merge::MergeError;
use super::resolve::ResolutionKind;
use crate::action::ActionError;
use crate::diagnose::{Diagnostic, Level};
use crate::span::SourceLineNumberCollection;
use std::error::Error;
use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;

/// Error during binding.
///
/// With the exception of [`Self::TempCleanup`],
///   every variant is an error that fails the build;
///     most are nonetheless recoverable in the sense that the binder
///     continues with the remaining files to report as many as possible.
#[derive(Debug)]
pub enum BindError {
    /// A source path could not be resolved.
    FileNotFound {
        source: String,
        kind: ResolutionKind,
        sources: Option<SourceLineNumberCollection>,
    },

    /// A file is assigned to a disk with no `Media` row.
    MissingMedia {
        file: String,
        disk_id: i64,
        sources: Option<SourceLineNumberCollection>,
    },

    /// A compressed file is assigned to a disk with no cabinet.
    ExpectedMediaCabinet {
        file: String,
        disk_id: i64,
        sources: Option<SourceLineNumberCollection>,
    },

    /// A directory is its own ancestor.
    DirectoryCycle(String),

    /// A directory names a parent that does not exist.
    MissingDirectory {
        directory: String,
        sources: Option<SourceLineNumberCollection>,
    },

    /// The embedded cabinet of a merge module does not exist.
    ModuleCabinetMissing { module: String, path: PathBuf },

    /// The embedded cabinet of a merge module exists but could not be
    ///   extracted.
    ModuleCabinetExtraction {
        module: String,
        path: PathBuf,
        error: MergeError,
    },

    /// A merge module could not be merged into the database.
    MergeFailed { module: String, error: MergeError },

    /// The output contains merge modules but no merge engine was provided.
    MergeEngineUnavailable {
        module: String,
        sources: Option<SourceLineNumberCollection>,
    },

    /// A cabinet could not be created.
    Cabinet(String, io::Error),

    /// The database could not be written.
    Database(PathBuf, io::Error),

    /// The temporary directory of the bind could not be created.
    TempDirectory(PathBuf, io::Error),

    /// The temporary directory could not be deleted.
    TempCleanup(PathBuf, io::Error),

    /// The built-in standard actions could not be loaded.
    Action(ActionError),
}

impl Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound { source, kind, .. } => write!(
                f,
                "The system cannot find the file '{source}' with type '{kind}'."
            ),

            Self::MissingMedia { file, disk_id, .. } => write!(
                f,
                "File '{file}' is assigned to disk {disk_id}, \
                   which has no Media row."
            ),

            Self::ExpectedMediaCabinet { file, disk_id, .. } => write!(
                f,
                "File '{file}' is compressed but disk {disk_id} has no \
                   cabinet."
            ),

            Self::DirectoryCycle(dir) => {
                write!(f, "Directory '{dir}' is its own ancestor.")
            }

            Self::MissingDirectory { directory, .. } => {
                write!(f, "Directory '{directory}' does not exist.")
            }

            Self::ModuleCabinetMissing { module, path } => write!(
                f,
                "Merge module '{module}' does not contain a cabinet \
                   (expected at '{}').",
                path.display()
            ),

            Self::ModuleCabinetExtraction {
                module,
                path,
                error,
            } => write!(
                f,
                "Failed to extract the cabinet of merge module '{module}' \
                   to '{}': {error}",
                path.display()
            ),

            Self::MergeFailed { module, error } => {
                write!(f, "Failed to merge module '{module}': {error}")
            }

            Self::MergeEngineUnavailable { module, .. } => write!(
                f,
                "Merge module '{module}' cannot be merged: \
                   no merge engine is available."
            ),

            Self::Cabinet(name, e) => {
                write!(f, "Failed to create cabinet '{name}': {e}")
            }

            Self::Database(path, e) => {
                write!(f, "Failed to write database '{}': {e}", path.display())
            }

            Self::TempDirectory(path, e) => write!(
                f,
                "Failed to create temporary directory '{}': {e}",
                path.display()
            ),

            Self::TempCleanup(path, e) => write!(
                f,
                "Failed to delete temporary directory '{}': {e}",
                path.display()
            ),

            Self::Action(e) => Display::fmt(e, f),
        }
    }
}

impl Error for BindError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ModuleCabinetExtraction { error, .. }
            | Self::MergeFailed { error, .. } => Some(error),
            Self::Cabinet(_, e)
            | Self::Database(_, e)
            | Self::TempDirectory(_, e)
            | Self::TempCleanup(_, e) => Some(e),
            Self::Action(e) => Some(e),
            _ => None,
        }
    }
}

impl Diagnostic for BindError {
    fn id(&self) -> u32 {
        match self {
            Self::FileNotFound { .. } => 103,
            Self::MissingMedia { .. } => 21,
            Self::ExpectedMediaCabinet { .. } => 180,
            Self::DirectoryCycle(_) => 163,
            Self::MissingDirectory { .. } => 164,
            Self::ModuleCabinetMissing { .. } => 102,
            Self::ModuleCabinetExtraction { .. } => 101,
            Self::MergeFailed { .. } => 110,
            Self::MergeEngineUnavailable { .. } => 111,
            Self::Cabinet(..) => 112,
            Self::Database(..) => 113,
            Self::TempDirectory(..) => 114,
            Self::TempCleanup(..) => 1011,
            Self::Action(e) => e.id(),
        }
    }

    fn resource(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "FileNotFound",
            Self::MissingMedia { .. } => "MissingMedia",
            Self::ExpectedMediaCabinet { .. } => "ExpectedMediaCabinet",
            Self::DirectoryCycle(_) => "DirectoryCycle",
            Self::MissingDirectory { .. } => "MissingDirectory",
            Self::ModuleCabinetMissing { .. } => "MergeModuleMissingCabinet",
            Self::ModuleCabinetExtraction { .. } => "CabExtractionFailed",
            Self::MergeFailed { .. } => "MergeFailed",
            Self::MergeEngineUnavailable { .. } => "MergeEngineUnavailable",
            Self::Cabinet(..) => "CabCreationFailed",
            Self::Database(..) => "DatabaseWriteFailed",
            Self::TempDirectory(..) => "TempDirectoryFailed",
            Self::TempCleanup(..) => "FailedToDeleteTempDir",
            Self::Action(e) => e.resource(),
        }
    }

    fn args(&self) -> Vec<String> {
        match self {
            Self::FileNotFound { source, kind, .. } => {
                vec![source.clone(), kind.to_string()]
            }
            Self::MissingMedia { file, disk_id, .. }
            | Self::ExpectedMediaCabinet { file, disk_id, .. } => {
                vec![file.clone(), disk_id.to_string()]
            }
            Self::DirectoryCycle(directory)
            | Self::MissingDirectory { directory, .. } => vec![directory.clone()],
            Self::ModuleCabinetMissing { module, path } => {
                vec![module.clone(), path.display().to_string()]
            }
            Self::ModuleCabinetExtraction { module, path, error } => vec![
                module.clone(),
                path.display().to_string(),
                error.code.to_string(),
            ],
            Self::MergeFailed { module, error } => {
                vec![module.clone(), error.code.to_string()]
            }
            Self::MergeEngineUnavailable { module, .. } => vec![module.clone()],
            Self::Cabinet(name, e) => vec![name.clone(), e.to_string()],
            Self::Database(path, e)
            | Self::TempDirectory(path, e)
            | Self::TempCleanup(path, e) => {
                vec![path.display().to_string(), e.to_string()]
            }
            Self::Action(e) => e.args(),
        }
    }

    fn level(&self) -> Level {
        match self {
            Self::TempCleanup(..) => Level::Warning,
            _ => Level::Error,
        }
    }

    fn sources(&self) -> Option<&SourceLineNumberCollection> {
        match self {
            Self::FileNotFound { sources, .. }
            | Self::MissingMedia { sources, .. }
            | Self::ExpectedMediaCabinet { sources, .. }
            | Self::MissingDirectory { sources, .. }
            | Self::MergeEngineUnavailable { sources, .. } => sources.as_ref(),
            _ => None,
        }
    }
}

impl From<ActionError> for BindError {
    fn from(e: ActionError) -> Self {
        Self::Action(e)
    }
}
