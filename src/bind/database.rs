// Installer database sinks
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

//! Destination of the tables and streams of a bound output.
//!
//! The installer database format is the concern of a [`DatabaseSink`];
//!   the binder hands it one IDT archive per table and the path of each
//!   stream.
//! [`IdtDirectorySink`] writes the database as a directory of IDT files,
//!   which is suitable for inspection and for import by external tools.

use crate::fs::FileOps;
use std::io;
use std::path::{Path, PathBuf};

/// Directory of an [`IdtDirectorySink`] holding streams.
pub const STREAMS_DIR: &str = "_Streams";

/// Receives the contents of an installer database.
///
/// Nothing is required to be visible at the destination until
///   [`DatabaseSink::commit`].
pub trait DatabaseSink {
    /// Begin a new database at `path`,
    ///   replacing any that exists.
    fn create(&mut self, path: &Path, codepage: Option<i32>) -> io::Result<()>;

    /// Import a table in IDT format.
    fn import_idt(&mut self, table: &str, idt: &[u8]) -> io::Result<()>;

    /// Add the file at `source` as the stream `name`.
    fn add_stream(&mut self, name: &str, source: &Path) -> io::Result<()>;

    fn commit(&mut self) -> io::Result<()>;
}

/// Writes a database as a directory of IDT files.
pub struct IdtDirectorySink<F: FileOps> {
    fs: F,
    root: Option<PathBuf>,
}

impl<F: FileOps> IdtDirectorySink<F> {
    pub fn new(fs: F) -> Self {
        Self { fs, root: None }
    }

    fn root(&self) -> io::Result<&Path> {
        self.root.as_deref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "no database has been created")
        })
    }
}

impl<F: FileOps> DatabaseSink for IdtDirectorySink<F> {
    fn create(&mut self, path: &Path, codepage: Option<i32>) -> io::Result<()> {
        if self.fs.exists(path) {
            self.fs.remove_dir_all(path)?;
        }

        self.fs.create_dir_all(&path.join(STREAMS_DIR))?;

        if let Some(codepage) = codepage {
            self.fs.write_file(
                &path.join("_ForceCodepage.idt"),
                format!("\r\n\r\n{codepage}\t_ForceCodepage\r\n").as_bytes(),
            )?;
        }

        self.root = Some(path.to_path_buf());
        Ok(())
    }

    fn import_idt(&mut self, table: &str, idt: &[u8]) -> io::Result<()> {
        let dest = self.root()?.join(format!("{table}.idt"));
        self.fs.write_file(&dest, idt)
    }

    /// A directory is copied recursively.
    fn add_stream(&mut self, name: &str, source: &Path) -> io::Result<()> {
        let dest = self.root()?.join(STREAMS_DIR).join(name);
        copy_tree(&mut self.fs, source, &dest)
    }

    fn commit(&mut self) -> io::Result<()> {
        self.root().map(|_| ())?;
        self.root = None;
        Ok(())
    }
}

fn copy_tree<F: FileOps>(fs: &mut F, source: &Path, dest: &Path) -> io::Result<()> {
    let entries = match fs.read_dir(source) {
        Ok(entries) => entries,
        Err(_) => return fs.copy(source, dest),
    };

    fs.create_dir_all(dest)?;

    for entry in entries {
        if let Some(name) = entry.file_name() {
            copy_tree(fs, &entry, &dest.join(name))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fs::VanillaFilesystem;
    use std::fs;

    #[test]
    fn writes_tables_and_streams() {
        let root = tempfile::tempdir().unwrap();
        let db = root.path().join("product.msi");
        let stream = root.path().join("data.bin");
        fs::write(&stream, b"bin").unwrap();

        let mut sut = IdtDirectorySink::new(VanillaFilesystem);

        sut.create(&db, Some(1252)).unwrap();
        sut.import_idt("Property", b"idt").unwrap();
        sut.add_stream("Binary.Data", &stream).unwrap();
        sut.commit().unwrap();

        assert_eq!(b"idt".to_vec(), fs::read(db.join("Property.idt")).unwrap());
        assert_eq!(
            b"bin".to_vec(),
            fs::read(db.join(STREAMS_DIR).join("Binary.Data")).unwrap()
        );
        assert!(fs::read_to_string(db.join("_ForceCodepage.idt"))
            .unwrap()
            .contains("1252"));
    }

    #[test]
    fn directory_streams_are_copied_recursively() {
        let root = tempfile::tempdir().unwrap();
        let db = root.path().join("product.msi");
        let cab = root.path().join("product.cab");
        fs::create_dir(&cab).unwrap();
        fs::write(cab.join("FileA"), b"a").unwrap();

        let mut sut = IdtDirectorySink::new(VanillaFilesystem);

        sut.create(&db, None).unwrap();
        sut.add_stream("product.cab", &cab).unwrap();

        assert_eq!(
            b"a".to_vec(),
            fs::read(db.join(STREAMS_DIR).join("product.cab").join("FileA")).unwrap()
        );
    }

    #[test]
    fn create_replaces_existing_database() {
        let root = tempfile::tempdir().unwrap();
        let db = root.path().join("product.msi");

        let mut sut = IdtDirectorySink::new(VanillaFilesystem);

        sut.create(&db, None).unwrap();
        sut.import_idt("Stale", b"x").unwrap();
        sut.commit().unwrap();

        sut.create(&db, None).unwrap();
        sut.commit().unwrap();

        assert!(!db.join("Stale.idt").exists());
    }

    #[test]
    fn import_requires_create() {
        let mut sut = IdtDirectorySink::new(VanillaFilesystem);

        assert!(sut.import_idt("Property", b"").is_err());
    }
}
