// Temporary files of a bind
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

use super::error::BindError;
use crate::diagnose::Messages;
use crate::fs::FileOps;
use crate::global;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Directory holding the intermediate files of a single bind.
#[derive(Debug)]
pub struct TempDirectory {
    path: PathBuf,
}

impl TempDirectory {
    /// Create the directory `path`.
    pub fn create<F: FileOps>(fs: &mut F, path: PathBuf) -> Result<Self, BindError> {
        match fs.create_dir_all(&path) {
            Ok(()) => Ok(Self { path }),
            Err(e) => Err(BindError::TempDirectory(path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join<P: AsRef<Path>>(&self, rel: P) -> PathBuf {
        self.path.join(rel)
    }

    /// Delete the directory and its contents.
    ///
    /// Deletion is attempted [`global::TEMP_CLEANUP_ATTEMPTS`] times;
    ///   read-only attributes are cleared throughout the tree after the
    ///   first failure.
    /// Failure to delete is a warning,
    ///   since the bind itself has completed.
    pub fn cleanup<F: FileOps>(
        self,
        fs: &mut F,
        retry_delay: Duration,
        messages: &mut Messages,
    ) -> bool {
        let mut attempt = 1;

        loop {
            let err = match fs.remove_dir_all(&self.path) {
                Ok(()) => return true,
                Err(e) => e,
            };

            if attempt >= global::TEMP_CLEANUP_ATTEMPTS {
                messages.emit(&BindError::TempCleanup(self.path, err));
                return false;
            }

            if attempt == 1 {
                clear_readonly_tree(fs, &self.path);
            }

            attempt += 1;
            thread::sleep(retry_delay);
        }
    }
}

/// Clear the read-only attribute of `path` and everything beneath it.
///
/// Failures are ignored so that as much of the tree as possible is
///   cleared.
fn clear_readonly_tree<F: FileOps>(fs: &mut F, path: &Path) {
    let _ = fs.clear_readonly(path);

    if let Ok(entries) = fs.read_dir(path) {
        for entry in entries {
            clear_readonly_tree(fs, &entry);
        }
    }
}
