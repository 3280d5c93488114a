// Windows Installer binder
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

//! The binder turns a linked [`Output`] into an installer database and
//!   its accompanying source image.
//!
//! Binding proceeds in stages:
//!
//!   1. A temporary directory is created to hold intermediate files.
//!   2. The source path of every file and stream is resolved
//!        (see [`FileResolver`]),
//!        and the size of each file is recorded in `File.FileSize`.
//!   3. The cabinets of merge modules are extracted so that their files
//!        may be sequenced with those of the output
//!        (see [`extract_modules`]).
//!   4. Files are sequenced across media
//!        (see [`sequence_files`])
//!        and placed either into a cabinet or the uncompressed layout.
//!   5. Each table is written to the database in IDT form,
//!        modularized if the output is a merge module.
//!   6. Cabinets are built and either embedded as streams of the database
//!        or laid out beside it.
//!   7. The database is committed and merge modules are merged into it.
//!   8. Uncompressed files and external cabinets are transferred into the
//!        layout.
//!   9. The temporary directory is deleted.
//!
//! Errors of stages 2 through 4 are collected so that as many as
//!   possible are reported at once;
//!     no stage that writes to the destination is run if any error has
//!     been encountered.
//! A failure to delete the temporary directory is only a warning.

mod cabinet;
mod database;
mod error;
mod idt;
mod layout;
mod media;
mod merge;
pub mod modularize;
mod resolve;
mod temp;
mod transfer;

pub use cabinet::{
    plan_cabinets, CabinetArchiver, CabinetFile, CabinetResolver, CabinetWorkItem,
    CompressionLevel, FolderArchiver,
};
pub use database::{DatabaseSink, IdtDirectorySink, STREAMS_DIR};
pub use error::BindError;
pub use idt::{escape, table_to_idt};
pub use layout::{
    apply_compression_attributes, compressed_by_default, loose_transfers,
    CompressionBucket, DirectoryResolver, ATTR_COMPRESSED, ATTR_NONCOMPRESSED,
};
pub use media::{
    apply_sequences, collect_files, long_name, sequence_files, sequence_module_files,
    FileCompression, FileMediaInformation, LastSequences,
};
pub use merge::{
    collect_modules, extract_modules, merge_modules, MergeError, MergeModule,
    MergeModuleEngine, ModuleFile,
};
pub use modularize::{ModularizeError, Modularizer};
pub use resolve::{FileResolutionHandler, FileResolver, ResolutionKind};
pub use temp::TempDirectory;
pub use transfer::{FileTransfer, TransferError, Transferrer};

use crate::action::ActionTable;
use crate::diagnose::Messages;
use crate::fs::FileOps;
use crate::global;
use crate::ld::{Output, OutputType};
use crate::row::{FileRowMut, FieldData};
use fxhash::{FxHashMap, FxHashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

/// Tables whose `Data` column names a file to be stored as a stream.
const STREAM_TABLES: &[(&str, ResolutionKind)] = &[
    ("Binary", ResolutionKind::Binary),
    ("Icon", ResolutionKind::Icon),
];

/// Options controlling a bind.
#[derive(Debug, Clone)]
pub struct BinderOptions {
    /// Do not reset the ACLs of files transferred into the layout.
    pub suppress_acl_reset: bool,

    /// Produce only the database,
    ///   without transferring uncompressed files or external cabinets.
    pub suppress_layout: bool,

    /// Leave the temporary directory in place after binding.
    pub keep_temp: bool,

    /// Compression level of cabinets whose media specify none.
    pub default_compression: CompressionLevel,

    /// Delay before retrying a failed file operation.
    pub retry_delay: Duration,

    /// Temporary directory;
    ///   a directory unique to the process is used if [`None`].
    pub temp_dir: Option<PathBuf>,

    /// Root of the layout;
    ///   the directory of the database is used if [`None`].
    pub layout_dir: Option<PathBuf>,

    /// Directories searched for relative source paths.
    pub base_paths: Vec<PathBuf>,
}

impl Default for BinderOptions {
    fn default() -> Self {
        Self {
            suppress_acl_reset: false,
            suppress_layout: false,
            keep_temp: false,
            default_compression: CompressionLevel::default(),
            retry_delay: global::RETRY_DELAY,
            temp_dir: None,
            layout_dir: None,
            base_paths: Vec::new(),
        }
    }
}

/// A file to be stored as a stream of the database.
#[derive(Debug)]
struct StreamSource {
    table: &'static str,
    key: String,
    path: PathBuf,
}

/// Binds an [`Output`] into an installer database.
///
/// The file system,
///   cabinet format,
///   and database format are each supplied by the caller;
///     merge modules can be merged only if a [`MergeModuleEngine`] is
///     provided.
pub struct Binder<'a, F, A, D>
where
    F: FileOps,
    A: CabinetArchiver,
    D: DatabaseSink,
{
    fs: F,
    archiver: A,
    sink: D,
    messages: &'a mut Messages,
    opts: BinderOptions,
    merge_engine: Option<Box<dyn MergeModuleEngine + 'a>>,
    resolution_handler: Option<Box<dyn FileResolutionHandler + 'a>>,
    cabinet_resolver: Option<Box<dyn CabinetResolver + 'a>>,
}

impl<'a, F, A, D> Binder<'a, F, A, D>
where
    F: FileOps,
    A: CabinetArchiver,
    D: DatabaseSink,
{
    pub fn new(
        fs: F,
        archiver: A,
        sink: D,
        messages: &'a mut Messages,
        opts: BinderOptions,
    ) -> Self {
        Self {
            fs,
            archiver,
            sink,
            messages,
            opts,
            merge_engine: None,
            resolution_handler: None,
            cabinet_resolver: None,
        }
    }

    pub fn with_merge_engine<E: MergeModuleEngine + 'a>(mut self, engine: E) -> Self {
        self.merge_engine = Some(Box::new(engine));
        self
    }

    pub fn with_file_resolution_handler<H: FileResolutionHandler + 'a>(
        mut self,
        handler: H,
    ) -> Self {
        self.resolution_handler = Some(Box::new(handler));
        self
    }

    pub fn with_cabinet_resolver<R: CabinetResolver + 'a>(mut self, resolver: R) -> Self {
        self.cabinet_resolver = Some(Box::new(resolver));
        self
    }

    /// Bind `output` into the database at `path`.
    ///
    /// `output` is updated with the sequence,
    ///   size,
    ///   and compression attributes of each file.
    /// Yields whether the bind completed without error;
    ///   diagnostics are emitted through [`Messages`].
    pub fn bind(&mut self, output: &mut Output, path: &Path) -> bool {
        let temp_path = self.opts.temp_dir.clone().unwrap_or_else(|| {
            env::temp_dir().join(format!("wixer-{}", process::id()))
        });

        let temp = match TempDirectory::create(&mut self.fs, temp_path) {
            Ok(temp) => temp,
            Err(e) => {
                self.messages.emit(&e);
                return false;
            }
        };

        self.messages
            .verbose(format!("binding `{}` in `{}`", path.display(), temp.path().display()));

        self.bind_in(output, path, &temp);

        if self.opts.keep_temp {
            self.messages
                .verbose(format!("keeping temporary files in `{}`", temp.path().display()));
        } else {
            temp.cleanup(&mut self.fs, self.opts.retry_delay, self.messages);
        }

        !self.messages.encountered_error()
    }

    fn bind_in(&mut self, output: &mut Output, path: &Path, temp: &TempDirectory) {
        let standard_actions: FxHashSet<String> = match ActionTable::standard() {
            Ok(table) => table.iter().map(|action| action.id().to_string()).collect(),
            Err(e) => {
                self.messages.emit(&BindError::from(e));
                return;
            }
        };

        self.resolve_files(output);
        let streams = self.resolve_streams(output);

        let mut modules = collect_modules(output);
        self.resolve_modules(&mut modules);

        let mut files = collect_files(output, self.messages);

        if !modules.is_empty() {
            match self.merge_engine.as_deref_mut() {
                Some(engine) => files.extend(extract_modules(
                    engine,
                    &mut self.archiver,
                    &modules,
                    &temp.join("modules"),
                    self.messages,
                )),
                None => modules.iter().for_each(|module| {
                    self.messages.emit(&BindError::MergeEngineUnavailable {
                        module: module.id.clone(),
                        sources: module.sources.clone(),
                    })
                }),
            }
        }

        let last_sequences = match output.ty() {
            OutputType::Module => {
                sequence_module_files(&mut files, output.modularization_guid());
                LastSequences::new()
            }
            _ => sequence_files(&mut files),
        };

        apply_sequences(output, &files, &last_sequences, self.messages);

        let compressed_default = compressed_by_default(output);
        let buckets: FxHashMap<String, CompressionBucket> = files
            .iter()
            .map(|file| {
                (
                    file.file_id.clone(),
                    CompressionBucket::decide(output.ty(), file.compression, compressed_default),
                )
            })
            .collect();

        apply_compression_attributes(output, &buckets, compressed_default, self.messages);

        let layout_dir = self.opts.layout_dir.clone().unwrap_or_else(|| {
            path.parent().map(Path::to_path_buf).unwrap_or_default()
        });

        let mut transfers = if self.opts.suppress_layout {
            Vec::new()
        } else {
            loose_transfers(output, &files, &buckets, &layout_dir, self.messages)
        };

        let cabinets = plan_cabinets(
            output,
            &files,
            &buckets,
            self.opts.default_compression,
            self.messages,
        );

        if self.messages.encountered_error() {
            self.messages
                .verbose("skipping database creation due to previous errors");
            return;
        }

        let guid = output.modularization_guid().map(String::from);
        let ignored = output.ignore_modularizations().clone();
        let modularizer = match (output.ty(), &guid) {
            (OutputType::Module, Some(guid)) => {
                Some(Modularizer::new(guid, &ignored, &standard_actions))
            }
            _ => None,
        };

        if let Err(e) = self.write_database(output, path, modularizer.as_ref(), &streams) {
            self.messages.emit(&e);
            return;
        }

        for item in cabinets {
            if let Some(transfer) = self.build_cabinet(&item, path, &layout_dir, temp) {
                transfers.push(transfer);
            }
        }

        if self.messages.encountered_error() {
            return;
        }

        if let Err(e) = self.sink.commit() {
            self.messages.emit(&BindError::Database(path.into(), e));
            return;
        }

        if !modules.is_empty() {
            if let Some(engine) = self.merge_engine.as_deref_mut() {
                merge_modules(engine, output, &modules, path, self.messages);
            }
        }

        if self.messages.encountered_error() {
            return;
        }

        let mut transferrer = Transferrer::new(&mut self.fs, self.opts.retry_delay);
        let done = transferrer.transfer_all(&transfers, self.messages);

        if !self.opts.suppress_acl_reset {
            transferrer.reset_acls(&done, self.messages);
        }
    }

    /// Resolve the source of every `File` row,
    ///   recording the resolved path and the size of the file.
    fn resolve_files(&mut self, output: &mut Output) {
        let table = match output.tables_mut().get_mut("File") {
            Some(table) => table,
            None => return,
        };

        let mut resolver = FileResolver::new(
            &self.opts.base_paths,
            self.resolution_handler
                .as_mut()
                .map(|handler| &mut **handler as &mut dyn FileResolutionHandler),
        );

        for row in table.rows_mut() {
            let sources = row.sources().cloned();

            let mut file = match FileRowMut::new(row) {
                Some(file) => file,
                None => continue,
            };

            let source = match file.view().source() {
                Some(source) => source.to_string(),
                None => continue,
            };

            let resolved = match resolver.resolve(&self.fs, &source, ResolutionKind::File) {
                Some(resolved) => resolved,
                None => {
                    self.messages.emit(&BindError::FileNotFound {
                        source,
                        kind: ResolutionKind::File,
                        sources,
                    });
                    continue;
                }
            };

            let size = self
                .fs
                .file_size(&resolved)
                .map(|size| i64::try_from(size).unwrap_or(i64::MAX));

            let result = file
                .set_source(Some(&*resolved.to_string_lossy()))
                .and_then(|()| match size {
                    Ok(size) => file.set_file_size(Some(size)),
                    Err(_) => Ok(()),
                });

            if let Err(e) = result {
                self.messages.emit(&e);
            }
        }
    }

    /// Resolve the data of every row of the stream tables,
    ///   replacing the data with the name of the stream that will hold
    ///   it.
    fn resolve_streams(&mut self, output: &mut Output) -> Vec<StreamSource> {
        let mut streams = Vec::new();

        let mut resolver = FileResolver::new(
            &self.opts.base_paths,
            self.resolution_handler
                .as_mut()
                .map(|handler| &mut **handler as &mut dyn FileResolutionHandler),
        );

        for &(table_name, kind) in STREAM_TABLES {
            let table = match output.tables_mut().get_mut(table_name) {
                Some(table) => table,
                None => continue,
            };

            for row in table.rows_mut() {
                let (key, source) = match (row.get_str(0), row.get_str(1)) {
                    (Some(key), Some(source)) => (key.to_string(), source.to_string()),
                    _ => continue,
                };

                match resolver.resolve(&self.fs, &source, kind) {
                    Some(path) => streams.push(StreamSource {
                        table: table_name,
                        key,
                        path,
                    }),
                    None => self.messages.emit(&BindError::FileNotFound {
                        source,
                        kind,
                        sources: row.sources().cloned(),
                    }),
                }
            }
        }

        streams
    }

    fn resolve_modules(&mut self, modules: &mut [MergeModule]) {
        let mut resolver = FileResolver::new(
            &self.opts.base_paths,
            self.resolution_handler
                .as_mut()
                .map(|handler| &mut **handler as &mut dyn FileResolutionHandler),
        );

        for module in modules.iter_mut() {
            let source = module.source.to_string_lossy().into_owned();

            match resolver.resolve(&self.fs, &source, ResolutionKind::Module) {
                Some(path) => module.source = path,
                None => self.messages.emit(&BindError::FileNotFound {
                    source,
                    kind: ResolutionKind::Module,
                    sources: module.sources.clone(),
                }),
            }
        }
    }

    /// Create the database at `path` and import every table and stream.
    ///
    /// Stream names are modularized along with the rows that reference
    ///   them.
    fn write_database(
        &mut self,
        output: &mut Output,
        path: &Path,
        modularizer: Option<&Modularizer<'_>>,
        streams: &[StreamSource],
    ) -> Result<(), BindError> {
        let db_err = |e| BindError::Database(path.into(), e);

        self.sink.create(path, output.codepage()).map_err(db_err)?;

        let stream_names: Vec<(String, &StreamSource)> = streams
            .iter()
            .map(|stream| (stream_name(output, modularizer, stream), stream))
            .collect();

        set_stream_data(output, &stream_names, self.messages);

        for table in output.tables().iter() {
            if let Some(idt) = table_to_idt(table, modularizer, self.messages) {
                self.sink
                    .import_idt(table.name(), idt.as_bytes())
                    .map_err(db_err)?;
            }
        }

        for (name, stream) in &stream_names {
            self.sink.add_stream(name, &stream.path).map_err(db_err)?;
        }

        Ok(())
    }

    /// Build or reuse the cabinet `item`,
    ///   yielding the transfer that places it in the layout if it is not
    ///   embedded.
    fn build_cabinet(
        &mut self,
        item: &CabinetWorkItem,
        path: &Path,
        layout_dir: &Path,
        temp: &TempDirectory,
    ) -> Option<FileTransfer> {
        let reused = self
            .cabinet_resolver
            .as_mut()
            .and_then(|resolver| resolver.resolve_cabinet(item));

        let cabinet = match reused {
            Some(existing) => {
                self.messages.verbose(format!(
                    "reusing cabinet `{}` for `{}`",
                    existing.display(),
                    item.name
                ));
                existing
            }
            None => {
                let built = temp.join("cabinets").join(&item.name);

                if let Err(e) =
                    self.archiver.create_archive(&built, &item.files, item.level)
                {
                    self.messages.emit(&BindError::Cabinet(item.name.clone(), e));
                    return None;
                }

                self.messages.verbose(format!(
                    "built cabinet `{}` with {} files",
                    item.name,
                    item.files.len()
                ));
                built
            }
        };

        if item.embedded {
            if let Err(e) = self.sink.add_stream(&item.name, &cabinet) {
                self.messages.emit(&BindError::Database(path.into(), e));
            }

            return None;
        }

        if self.opts.suppress_layout {
            return None;
        }

        let root = item.layout.as_deref().unwrap_or(layout_dir);
        let is_built = cabinet.starts_with(temp.path());

        Some(FileTransfer::new(cabinet, root.join(&item.name), is_built))
    }
}

/// Name of the stream holding the data of `stream`.
fn stream_name(
    output: &Output,
    modularizer: Option<&Modularizer<'_>>,
    stream: &StreamSource,
) -> String {
    let key = match (modularizer, output.tables().get(stream.table)) {
        (Some(modularizer), Some(table)) => table
            .definition()
            .column(0)
            .and_then(|col| modularizer.value(col.modularize_type(), &stream.key).ok())
            .map(|key| key.into_owned())
            .unwrap_or_else(|| stream.key.clone()),
        _ => stream.key.clone(),
    };

    format!("{}.{}", stream.table, key)
}

fn set_stream_data(
    output: &mut Output,
    streams: &[(String, &StreamSource)],
    messages: &mut Messages,
) {
    for (name, stream) in streams {
        let row = output
            .tables_mut()
            .get_mut(stream.table)
            .and_then(|table| {
                table
                    .rows_mut()
                    .iter_mut()
                    .find(|row| row.get_str(0) == Some(stream.key.as_str()))
            });

        if let Some(row) = row {
            if let Err(e) = row.set(1, Some(FieldData::from(name.as_str()))) {
                messages.emit(&e);
            }
        }
    }
}
