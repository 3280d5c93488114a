// Filesystem access for the linker and binder
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

//! Filesystem abstractions.
//!
//! Two distinct concerns are served here:
//!
//!   - [`InputFiles`] opens the inputs of the linker,
//!       recognizing when the same file is named more than once;
//!         and
//!   - [`FileOps`] provides the mutating operations performed while laying
//!       out a package,
//!         so that failures can be simulated in tests.
//!
//!
//! Inputs Are Loaded Once
//! ======================
//! An object or library may be named on the command line more than once,
//!   perhaps through different relative paths.
//! Loading it twice would define each of its symbols twice,
//!   so [`InputFiles`] yields [`Input::Visited`] for any path whose
//!   canonical form has already been opened.

use fxhash::FxHashSet;
use std::fs;
use std::io::{BufReader, Result};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Produces the identity of a path.
///
/// Two paths naming the same file must canonicalize to the same
///   [`PathBuf`].
pub trait Canonicalizer {
    fn canonicalize(path: &Path) -> Result<PathBuf>;
}

/// Canonicalize using the real filesystem,
///   resolving symlinks and relative components.
pub struct FsCanonicalizer;

impl Canonicalizer for FsCanonicalizer {
    fn canonicalize(path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path)
    }
}

/// Result of opening a linker input.
#[derive(Debug, PartialEq)]
pub enum Input<R> {
    /// The input had not yet been opened;
    ///   its canonical path is provided alongside the opened file.
    Unvisited(PathBuf, R),

    /// The input was opened previously and has not been opened again.
    Visited,
}

/// Opens each linker input at most once.
///
/// A path is recorded as visited only after it has been opened
///   successfully,
///     so that a failed open may be retried.
pub struct InputFiles<C: Canonicalizer = FsCanonicalizer> {
    visited: FxHashSet<PathBuf>,
    _canonicalizer: PhantomData<C>,
}

impl<C: Canonicalizer> Default for InputFiles<C> {
    fn default() -> Self {
        Self {
            visited: Default::default(),
            _canonicalizer: PhantomData,
        }
    }
}

impl<C: Canonicalizer> InputFiles<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` for buffered reading unless it was already visited.
    pub fn open(&mut self, path: &Path) -> Result<Input<BufReader<fs::File>>> {
        self.open_with(path, |cpath| fs::File::open(cpath).map(BufReader::new))
    }

    /// Open the canonical form of `path` using `open`,
    ///   unless it was already visited.
    pub fn open_with<R>(
        &mut self,
        path: &Path,
        open: impl FnOnce(&Path) -> Result<R>,
    ) -> Result<Input<R>> {
        let cpath = C::canonicalize(path)?;

        if self.visited.contains(&cpath) {
            return Ok(Input::Visited);
        }

        let file = open(&cpath)?;
        self.visited.insert(cpath.clone());

        Ok(Input::Unvisited(cpath, file))
    }

    /// Number of distinct inputs opened.
    pub fn visit_len(&self) -> usize {
        self.visited.len()
    }
}

/// Direct access to the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct VanillaFilesystem;

/// Mutating filesystem operations.
///
/// Every operation that moves data into the final layout goes through
///   this trait.
pub trait FileOps {
    fn copy(&mut self, src: &Path, dest: &Path) -> Result<()>;

    fn rename(&mut self, src: &Path, dest: &Path) -> Result<()>;

    fn remove_file(&mut self, path: &Path) -> Result<()>;

    fn remove_dir_all(&mut self, path: &Path) -> Result<()>;

    fn create_dir_all(&mut self, path: &Path) -> Result<()>;

    /// Create or truncate the file at `path` with the given contents.
    fn write_file(&mut self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Paths of the entries of the directory `path`,
    ///   sorted.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    fn exists(&self, path: &Path) -> bool;

    /// Size of the file at `path` in bytes.
    fn file_size(&self, path: &Path) -> Result<u64>;

    /// Clear the read-only attribute of `path` alone;
    ///   the contents of a directory are not visited.
    fn clear_readonly(&mut self, path: &Path) -> Result<()>;

    /// Restore the default permissions of a transferred file.
    fn reset_acl(&mut self, path: &Path) -> Result<()>;
}

impl FileOps for VanillaFilesystem {
    fn copy(&mut self, src: &Path, dest: &Path) -> Result<()> {
        fs::copy(src, dest).map(|_| ())
    }

    fn rename(&mut self, src: &Path, dest: &Path) -> Result<()> {
        fs::rename(src, dest)
    }

    fn remove_file(&mut self, path: &Path) -> Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_all(&mut self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)
    }

    fn create_dir_all(&mut self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
    }

    fn write_file(&mut self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>>>()?;

        entries.sort();
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        fs::metadata(path).map(|meta| meta.len())
    }

    fn clear_readonly(&mut self, path: &Path) -> Result<()> {
        let mut perms = fs::metadata(path)?.permissions();

        if perms.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Outside of Windows there is no inherited ACL to restore;
    ///   the file need only remain accessible.
    fn reset_acl(&mut self, path: &Path) -> Result<()> {
        fs::metadata(path).map(|_| ())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct SuffixCanonicalizer;

    impl Canonicalizer for SuffixCanonicalizer {
        fn canonicalize(path: &Path) -> Result<PathBuf> {
            Ok(path.join("canonical"))
        }
    }

    mod input_files {
        use super::*;
        use std::io;

        type Sut = InputFiles<SuffixCanonicalizer>;

        #[test]
        fn opens_canonical_path_once() {
            let mut sut = Sut::new();
            let path = Path::new("obj/product.wixobj");
            let expected = path.join("canonical");

            assert_eq!(
                Input::Unvisited(expected.clone(), expected.clone()),
                sut.open_with(path, |p| Ok(p.to_path_buf())).unwrap()
            );

            assert_eq!(
                Input::Visited,
                sut.open_with(path, |p| Ok(p.to_path_buf())).unwrap()
            );

            assert_eq!(1, sut.visit_len());
        }

        #[test]
        fn failed_open_is_not_visited() {
            let mut sut = Sut::new();
            let path = Path::new("missing.wixobj");

            assert!(sut
                .open_with(path, |_| Err::<(), _>(io::Error::from(
                    io::ErrorKind::NotFound
                )))
                .is_err());

            assert_eq!(0, sut.visit_len());
            assert_eq!(
                Input::Unvisited(path.join("canonical"), ()),
                sut.open_with(path, |_| Ok(())).unwrap()
            );
        }

        #[test]
        fn real_paths_through_different_names() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("a.wixobj");
            fs::write(&path, b"").unwrap();

            let mut sut = InputFiles::<FsCanonicalizer>::new();

            assert!(matches!(sut.open(&path), Ok(Input::Unvisited(..))));
            assert!(matches!(
                sut.open(&dir.path().join(".").join("a.wixobj")),
                Ok(Input::Visited)
            ));
        }
    }

    mod file_ops {
        use super::*;

        fn sut() -> VanillaFilesystem {
            VanillaFilesystem
        }

        #[test]
        fn copy_and_rename() {
            let dir = tempfile::tempdir().unwrap();
            let src = dir.path().join("a.txt");
            let copied = dir.path().join("b.txt");
            let moved = dir.path().join("c.txt");

            fs::write(&src, b"hello").unwrap();

            let mut sut = sut();
            sut.copy(&src, &copied).unwrap();
            sut.rename(&copied, &moved).unwrap();

            assert!(sut.exists(&src));
            assert!(!sut.exists(&copied));
            assert_eq!(5, sut.file_size(&moved).unwrap());
        }

        #[test]
        fn clear_readonly_of_file() {
            let dir = tempfile::tempdir().unwrap();
            let file = dir.path().join("ro.txt");

            fs::write(&file, b"x").unwrap();

            let mut perms = fs::metadata(&file).unwrap().permissions();
            perms.set_readonly(true);
            fs::set_permissions(&file, perms).unwrap();

            sut().clear_readonly(&file).unwrap();

            assert!(!fs::metadata(&file).unwrap().permissions().readonly());
        }

        #[test]
        fn write_and_list_directory() {
            let dir = tempfile::tempdir().unwrap();
            let mut sut = sut();

            sut.write_file(&dir.path().join("b"), b"2").unwrap();
            sut.write_file(&dir.path().join("a"), b"1").unwrap();

            assert_eq!(
                vec![dir.path().join("a"), dir.path().join("b")],
                sut.read_dir(dir.path()).unwrap()
            );
        }

        #[test]
        fn remove_missing_file_fails() {
            let dir = tempfile::tempdir().unwrap();

            assert!(sut().remove_file(&dir.path().join("missing")).is_err());
        }
    }
}
