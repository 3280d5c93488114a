// Source file resolution
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

//! Resolution of authored source paths to files on the build machine.
//!
//! A [`FileResolutionHandler`] may be provided to intercept resolution;
//!   otherwise a path is resolved as authored
//!   and then relative to each base path in turn.
//! Failure to resolve a file is recoverable:
//!   the caller reports it and continues with the remaining files.

use crate::fs::FileOps;
use std::path::{Path, PathBuf};

str_enum! {
    /// What a source path refers to.
    pub enum ResolutionKind {
        File => "File",
        Directory => "Directory",
        Binary => "Binary",
        Icon => "Icon",
        Module => "Module",
        DigitalCertificate => "DigitalCertificate",
    }
}

/// Hook to resolve source paths before the default search.
pub trait FileResolutionHandler {
    /// Resolve `source`,
    ///   or yield [`None`] to fall back to the default search.
    fn resolve(&mut self, source: &str, kind: ResolutionKind) -> Option<PathBuf>;
}

/// Resolves source paths against a list of base paths.
pub struct FileResolver<'a> {
    base_paths: &'a [PathBuf],
    handler: Option<&'a mut dyn FileResolutionHandler>,
}

impl<'a> FileResolver<'a> {
    pub fn new(
        base_paths: &'a [PathBuf],
        handler: Option<&'a mut dyn FileResolutionHandler>,
    ) -> Self {
        Self {
            base_paths,
            handler,
        }
    }

    /// Locate `source`,
    ///   yielding [`None`] if it does not exist.
    ///
    /// A path produced by the [`FileResolutionHandler`] is trusted and is
    ///   not checked for existence.
    pub fn resolve<F: FileOps>(
        &mut self,
        fs: &F,
        source: &str,
        kind: ResolutionKind,
    ) -> Option<PathBuf> {
        if let Some(handler) = self.handler.as_mut() {
            if let Some(path) = handler.resolve(source, kind) {
                return Some(path);
            }
        }

        let path = Path::new(source);

        if fs.exists(path) {
            return Some(path.to_path_buf());
        }

        if path.is_absolute() {
            return None;
        }

        self.base_paths
            .iter()
            .map(|base| base.join(path))
            .find(|candidate| fs.exists(candidate))
    }
}
