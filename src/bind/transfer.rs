// File transfers into the final layout
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

//! Staged copies and moves of files into their final locations.
//!
//! The binder never moves data as it goes;
//!   it instead records each movement as a [`FileTransfer`] and executes
//!   them all in one pass at the end of the bind,
//!     after it is known that no error has occurred.
//!
//! Each transfer is attempted,
//!   and upon failure is retried _at most once_ after attempting to
//!   correct the cause of the failure:
//!
//!   - If the destination directory does not exist,
//!       it is created.
//!   - If the destination exists and could not be overwritten,
//!       its read-only attribute is cleared and it is deleted;
//!         if it cannot be deleted then it is in use by another process
//!         and the transfer fails immediately.
//!   - Any other failure is fatal without retry.
//!
//! A failed transfer is reported and the remaining transfers proceed.

use crate::diagnose::{Diagnostic, Level, Messages};
use crate::fs::FileOps;
use crate::span::SourceLineNumberCollection;
use std::error::Error;
use std::fmt::{self, Display};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// OS error code of a rename across filesystems.
#[cfg(windows)]
const CROSS_DEVICE: i32 = 17;
#[cfg(not(windows))]
const CROSS_DEVICE: i32 = 18;

/// A pending copy or move of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    pub source: PathBuf,
    pub destination: PathBuf,

    /// Move rather than copy,
    ///   used for intermediate files that are no longer needed in their
    ///   original location.
    pub prefer_move: bool,

    pub sources: Option<SourceLineNumberCollection>,
}

impl FileTransfer {
    pub fn new<S: Into<PathBuf>, D: Into<PathBuf>>(
        source: S,
        destination: D,
        prefer_move: bool,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            prefer_move,
            sources: None,
        }
    }

    pub fn with_sources(mut self, sources: Option<SourceLineNumberCollection>) -> Self {
        self.sources = sources;
        self
    }

    /// Whether the transfer would copy a file onto itself.
    pub fn is_redundant(&self) -> bool {
        self.source == self.destination
    }
}

/// Failure of a [`FileTransfer`].
#[derive(Debug)]
pub enum TransferError {
    /// The transfer failed and could not be retried,
    ///   or failed again after its retry.
    Failed {
        transfer: FileTransfer,
        error: io::Error,
    },

    /// The destination could not be replaced because another process
    ///   holds it open.
    FileInUse {
        transfer: FileTransfer,
        error: io::Error,
    },

    /// The permissions of a transferred file could not be reset.
    AclReset { path: PathBuf, error: io::Error },
}

impl Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { transfer, error } => write!(
                f,
                "Failed to transfer '{}' to '{}': {error}",
                transfer.source.display(),
                transfer.destination.display(),
            ),
            Self::FileInUse { transfer, error } => write!(
                f,
                "The file '{}' cannot be replaced because it is in use \
                   by another process: {error}",
                transfer.destination.display(),
            ),
            Self::AclReset { path, error } => write!(
                f,
                "Unable to reset permissions of '{}': {error}",
                path.display()
            ),
        }
    }
}

impl Error for TransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Failed { error, .. }
            | Self::FileInUse { error, .. }
            | Self::AclReset { error, .. } => Some(error),
        }
    }
}

impl Diagnostic for TransferError {
    fn id(&self) -> u32 {
        match self {
            Self::Failed { .. } => 127,
            Self::FileInUse { .. } => 128,
            Self::AclReset { .. } => 1062,
        }
    }

    fn resource(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "FileTransferFailed",
            Self::FileInUse { .. } => "FileInUse",
            Self::AclReset { .. } => "UnableToResetAcls",
        }
    }

    fn args(&self) -> Vec<String> {
        match self {
            Self::Failed { transfer, error } => vec![
                transfer.source.display().to_string(),
                transfer.destination.display().to_string(),
                error.to_string(),
            ],
            Self::FileInUse { transfer, .. } => {
                vec![transfer.destination.display().to_string()]
            }
            Self::AclReset { path, error } => {
                vec![path.display().to_string(), error.to_string()]
            }
        }
    }

    fn level(&self) -> Level {
        match self {
            Self::AclReset { .. } => Level::Warning,
            _ => Level::Error,
        }
    }

    fn sources(&self) -> Option<&SourceLineNumberCollection> {
        match self {
            Self::Failed { transfer, .. } | Self::FileInUse { transfer, .. } => {
                transfer.sources.as_ref()
            }
            Self::AclReset { .. } => None,
        }
    }
}

/// Corrective action taken before the single retry of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    /// Create the destination directory.
    Mkdir,

    /// Clear the read-only attribute of the destination and delete it.
    Unlock {
        /// The first attempt was denied access.
        denied: bool,
    },
}

/// Executes [`FileTransfer`]s against a [`FileOps`].
pub struct Transferrer<'a, F: FileOps> {
    fs: &'a mut F,
    retry_delay: Duration,
}

impl<'a, F: FileOps> Transferrer<'a, F> {
    pub fn new(fs: &'a mut F, retry_delay: Duration) -> Self {
        Self { fs, retry_delay }
    }

    /// Execute every transfer,
    ///   reporting each failure,
    ///   and yield the destinations of those that succeeded.
    pub fn transfer_all(
        &mut self,
        transfers: &[FileTransfer],
        messages: &mut Messages,
    ) -> Vec<PathBuf> {
        let mut done = Vec::with_capacity(transfers.len());

        for transfer in transfers.iter().filter(|t| !t.is_redundant()) {
            match self.transfer(transfer) {
                Ok(()) => {
                    messages.verbose(format!(
                        "{} `{}` to `{}`",
                        if transfer.prefer_move { "moved" } else { "copied" },
                        transfer.source.display(),
                        transfer.destination.display(),
                    ));

                    done.push(transfer.destination.clone());
                }
                Err(e) => messages.emit(&e),
            }
        }

        done
    }

    /// Execute a single transfer,
    ///   retrying at most once.
    pub fn transfer(&mut self, transfer: &FileTransfer) -> Result<(), TransferError> {
        let first = match self.attempt(transfer) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        let failed = |error: io::Error| TransferError::Failed {
            transfer: transfer.clone(),
            error,
        };

        let recovery = match self.recovery_for(&first, transfer) {
            Some(recovery) => recovery,
            None => return Err(failed(first)),
        };

        match recovery {
            Recovery::Mkdir => {
                let parent = transfer.destination.parent().unwrap_or(Path::new(""));
                self.fs.create_dir_all(parent).map_err(failed)?;
            }

            Recovery::Unlock { .. } => {
                // failure to clear the attribute will surface on delete
                let _ = self.fs.clear_readonly(&transfer.destination);

                self.fs.remove_file(&transfer.destination).map_err(|error| {
                    TransferError::FileInUse {
                        transfer: transfer.clone(),
                        error,
                    }
                })?;
            }
        }

        thread::sleep(self.retry_delay);

        self.attempt(transfer).map_err(|error| match recovery {
            Recovery::Unlock { denied: true }
                if error.kind() == ErrorKind::PermissionDenied =>
            {
                TransferError::FileInUse {
                    transfer: transfer.clone(),
                    error,
                }
            }
            _ => failed(error),
        })
    }

    /// Reset the permissions of each transferred file,
    ///   warning on failure.
    pub fn reset_acls(&mut self, paths: &[PathBuf], messages: &mut Messages) {
        for path in paths {
            if let Err(error) = self.fs.reset_acl(path) {
                messages.emit(&TransferError::AclReset {
                    path: path.clone(),
                    error,
                });
            }
        }
    }

    fn recovery_for(&self, e: &io::Error, transfer: &FileTransfer) -> Option<Recovery> {
        let dest_exists = self.fs.exists(&transfer.destination);

        match e.kind() {
            ErrorKind::NotFound => {
                let parent_missing = transfer
                    .destination
                    .parent()
                    .map_or(false, |parent| !self.fs.exists(parent));

                parent_missing.then_some(Recovery::Mkdir)
            }

            ErrorKind::PermissionDenied => {
                dest_exists.then_some(Recovery::Unlock { denied: true })
            }

            ErrorKind::InvalidInput | ErrorKind::InvalidData | ErrorKind::Unsupported => {
                None
            }

            _ => dest_exists.then_some(Recovery::Unlock { denied: false }),
        }
    }

    fn attempt(&mut self, transfer: &FileTransfer) -> io::Result<()> {
        let FileTransfer {
            source,
            destination,
            ..
        } = transfer;

        if !transfer.prefer_move {
            return self.fs.copy(source, destination);
        }

        match self.fs.rename(source, destination) {
            Err(e) if e.raw_os_error() == Some(CROSS_DEVICE) => {
                self.fs.copy(source, destination)?;
                self.fs.remove_file(source)
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::diagnose::MessageOptions;
    use fxhash::{FxHashMap, FxHashSet};

    /// In-memory filesystem that can simulate files held open by another
    ///   process.
    #[derive(Default)]
    struct StubFs {
        files: FxHashMap<PathBuf, Vec<u8>>,
        dirs: FxHashSet<PathBuf>,
        readonly: FxHashSet<PathBuf>,
        locked: FxHashSet<PathBuf>,
        writes: usize,
    }

    impl StubFs {
        fn file(mut self, path: &str, data: &[u8]) -> Self {
            self.files.insert(path.into(), data.to_vec());
            self
        }

        fn dir(mut self, path: &str) -> Self {
            self.dirs.insert(path.into());
            self
        }

        fn readonly(mut self, path: &str) -> Self {
            self.readonly.insert(path.into());
            self
        }

        fn locked(mut self, path: &str) -> Self {
            self.locked.insert(path.into());
            self
        }

        fn write(&mut self, dest: &Path, data: Vec<u8>) -> io::Result<()> {
            self.writes += 1;

            let parent = dest.parent().unwrap_or(Path::new(""));
            if !self.dirs.contains(parent) {
                return Err(ErrorKind::NotFound.into());
            }

            if self.readonly.contains(dest) || self.locked.contains(dest) {
                return Err(ErrorKind::PermissionDenied.into());
            }

            self.files.insert(dest.into(), data);
            Ok(())
        }
    }

    impl FileOps for StubFs {
        fn copy(&mut self, src: &Path, dest: &Path) -> io::Result<()> {
            let data = self.files.get(src).cloned().ok_or(ErrorKind::NotFound)?;
            self.write(dest, data)
        }

        fn rename(&mut self, src: &Path, dest: &Path) -> io::Result<()> {
            self.copy(src, dest)?;
            self.files.remove(src);
            Ok(())
        }

        fn remove_file(&mut self, path: &Path) -> io::Result<()> {
            if self.locked.contains(path) {
                return Err(io::Error::new(ErrorKind::Other, "sharing violation"));
            }

            self.files.remove(path).map(|_| ()).ok_or(ErrorKind::NotFound.into())
        }

        fn remove_dir_all(&mut self, path: &Path) -> io::Result<()> {
            self.dirs.remove(path);
            Ok(())
        }

        fn create_dir_all(&mut self, path: &Path) -> io::Result<()> {
            self.dirs.insert(path.into());
            Ok(())
        }

        fn write_file(&mut self, path: &Path, contents: &[u8]) -> io::Result<()> {
            self.write(path, contents.to_vec())
        }

        fn read_dir(&self, _path: &Path) -> io::Result<Vec<PathBuf>> {
            Ok(vec![])
        }

        fn exists(&self, path: &Path) -> bool {
            self.files.contains_key(path) || self.dirs.contains(path)
        }

        fn file_size(&self, path: &Path) -> io::Result<u64> {
            self.files
                .get(path)
                .map(|data| data.len() as u64)
                .ok_or(ErrorKind::NotFound.into())
        }

        fn clear_readonly(&mut self, path: &Path) -> io::Result<()> {
            self.readonly.remove(path);
            Ok(())
        }

        fn reset_acl(&mut self, path: &Path) -> io::Result<()> {
            if self.exists(path) {
                Ok(())
            } else {
                Err(ErrorKind::NotFound.into())
            }
        }
    }

    fn transfer(fs: &mut StubFs, t: &FileTransfer) -> Result<(), TransferError> {
        Transferrer::new(fs, Duration::ZERO).transfer(t)
    }

    #[test]
    fn copies_into_existing_directory() {
        let mut fs = StubFs::default().file("src/a", b"a").dir("out");

        transfer(&mut fs, &FileTransfer::new("src/a", "out/a", false)).unwrap();

        assert_eq!(1, fs.writes);
        assert_eq!(Some(&b"a".to_vec()), fs.files.get(Path::new("out/a")));
        assert!(fs.files.contains_key(Path::new("src/a")));
    }

    #[test]
    fn move_removes_source() {
        let mut fs = StubFs::default().file("src/a", b"a").dir("out");

        transfer(&mut fs, &FileTransfer::new("src/a", "out/a", true)).unwrap();

        assert!(!fs.files.contains_key(Path::new("src/a")));
        assert!(fs.files.contains_key(Path::new("out/a")));
    }

    #[test]
    fn creates_missing_directory_and_retries_once() {
        let mut fs = StubFs::default().file("src/a", b"a");

        transfer(&mut fs, &FileTransfer::new("src/a", "out/a", false)).unwrap();

        assert_eq!(2, fs.writes);
        assert!(fs.dirs.contains(Path::new("out")));
    }

    #[test]
    fn replaces_readonly_destination() {
        let mut fs = StubFs::default()
            .file("src/a", b"new")
            .dir("out")
            .file("out/a", b"old")
            .readonly("out/a");

        transfer(&mut fs, &FileTransfer::new("src/a", "out/a", false)).unwrap();

        assert_eq!(2, fs.writes);
        assert_eq!(Some(&b"new".to_vec()), fs.files.get(Path::new("out/a")));
    }

    // A destination that is read-only and held open by another process is
    //   cleared and fails deletion;
    //     the transfer is not retried again and the content is untouched.
    #[test]
    fn locked_destination_is_file_in_use() {
        let mut fs = StubFs::default()
            .file("src/a", b"new")
            .dir("out")
            .file("out/a", b"old")
            .readonly("out/a")
            .locked("out/a");

        let result = transfer(&mut fs, &FileTransfer::new("src/a", "out/a", false));

        assert!(matches!(result, Err(TransferError::FileInUse { .. })));
        assert_eq!(1, fs.writes);
        assert!(!fs.readonly.contains(Path::new("out/a")));
        assert_eq!(Some(&b"old".to_vec()), fs.files.get(Path::new("out/a")));
    }

    #[test]
    fn missing_source_is_fatal_without_retry() {
        let mut fs = StubFs::default().dir("out");

        let result = transfer(&mut fs, &FileTransfer::new("src/a", "out/a", false));

        assert!(matches!(result, Err(TransferError::Failed { .. })));
        assert_eq!(0, fs.writes);
    }

    #[test]
    fn transfer_all_reports_and_continues() {
        let mut fs = StubFs::default().file("src/b", b"b").dir("out");
        let mut messages = Messages::buffered(MessageOptions::default());

        let done = Transferrer::new(&mut fs, Duration::ZERO).transfer_all(
            &[
                FileTransfer::new("src/a", "out/a", false),
                FileTransfer::new("src/b", "out/b", false),
            ],
            &mut messages,
        );

        assert_eq!(vec![PathBuf::from("out/b")], done);
        assert_eq!(1, messages.with_resource("FileTransferFailed").count());
    }

    #[test]
    fn acl_reset_failure_is_warning() {
        let mut fs = StubFs::default();
        let mut messages = Messages::buffered(MessageOptions::default());

        Transferrer::new(&mut fs, Duration::ZERO)
            .reset_acls(&[PathBuf::from("gone")], &mut messages);

        assert_eq!(1, messages.warning_count());
        assert!(!messages.encountered_error());
    }
}
