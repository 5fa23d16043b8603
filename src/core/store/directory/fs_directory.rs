// Copyright 2019 Zhizhesihai (Beijing) Technology Limited.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use core::store::directory::Directory;
use core::store::io::{FSIndexOutput, IndexInput, MmapIndexInput};
use core::store::IOContext;
use error::ErrorKind::IllegalState;
use error::Result;

/// Directory backed by a file system folder. Inputs are memory mapped.
pub struct FSDirectory {
    pub directory: PathBuf,
    pending_deletes: RwLock<BTreeSet<String>>,
    ops_since_last_delete: AtomicUsize,
}

impl FSDirectory {
    pub fn new<T: AsRef<Path> + ?Sized>(directory: &T) -> Result<FSDirectory> {
        let directory = directory.as_ref();
        if !Path::exists(directory) {
            fs::create_dir_all(directory)?;
        } else if !Path::is_dir(directory) {
            bail!(IllegalState(format!(
                "Path {:?} exists but is not directory",
                directory
            )))
        }

        Ok(FSDirectory {
            directory: From::from(directory),
            pending_deletes: RwLock::new(BTreeSet::new()),
            ops_since_last_delete: AtomicUsize::new(0),
        })
    }

    pub fn resolve(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    /// Tries to delete every pending file; those that still fail stay pending.
    fn delete_pending_files(pending_deletes: &mut BTreeSet<String>, dir: &PathBuf) {
        let mut deleted_set = BTreeSet::new();
        for name in pending_deletes.iter() {
            let path = dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => {
                    deleted_set.insert(name.clone());
                }
                Err(ref e) if e.kind() == ::std::io::ErrorKind::NotFound => {
                    deleted_set.insert(name.clone());
                }
                Err(e) => {
                    warn!("failed to delete {:?}, retrying later: {}", path, e);
                }
            }
        }
        for name in deleted_set {
            pending_deletes.remove(&name);
        }
    }

    fn maybe_delete_pending_files(&self) -> Result<()> {
        let mut delete_set = self.pending_deletes.write()?;
        if !delete_set.is_empty() {
            let count = self.ops_since_last_delete.fetch_add(1, Ordering::AcqRel);
            if count > delete_set.len() {
                self.ops_since_last_delete
                    .fetch_sub(count, Ordering::Release);
                Self::delete_pending_files(&mut delete_set, &self.directory);
            }
        }
        Ok(())
    }

    fn ensure_can_read(&self, name: &str) -> Result<()> {
        if self.pending_deletes.read()?.contains(name) {
            bail!(IllegalState(format!(
                "file {} is pending delete and cannot be opened for read",
                name
            )));
        }
        Ok(())
    }

    fn fsync(&self, path: &Path, is_dir: bool) -> Result<()> {
        // directories only open read-only, files need write access to sync
        let file = if is_dir {
            fs::File::open(path)?
        } else {
            fs::OpenOptions::new().append(true).open(path)?
        };
        file.sync_all()?;
        Ok(())
    }
}

impl Directory for FSDirectory {
    type IndexOutput = FSIndexOutput;

    fn list_all(&self) -> Result<Vec<String>> {
        let mut result = Vec::new();
        let pending = self.pending_deletes.read()?;
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if let Ok(filename) = entry.file_name().into_string() {
                if !pending.contains(&filename) {
                    result.push(filename);
                }
            }
        }
        result.sort();
        Ok(result)
    }

    fn file_exists(&self, name: &str) -> Result<bool> {
        if self.pending_deletes.read()?.contains(name) {
            return Ok(false);
        }
        Ok(self.resolve(name).is_file())
    }

    fn file_length(&self, name: &str) -> Result<i64> {
        if self.pending_deletes.read()?.contains(name) {
            bail!(IllegalState(format!("pending delete file {}", name)))
        };

        let path = self.resolve(name);
        let meta = fs::metadata(&path)?;
        if meta.is_dir() {
            bail!(IllegalState(format!(
                "file_length should not be called for directory: {}",
                path.display()
            )))
        } else {
            Ok(meta.len() as i64)
        }
    }

    fn create_output(&self, name: &str, context: &IOContext) -> Result<Self::IndexOutput> {
        // recreating a pending delete revives it
        self.pending_deletes.write()?.remove(name);
        self.maybe_delete_pending_files()?;
        let path = self.resolve(name);
        FSIndexOutput::new(name.to_string(), &path, context)
    }

    fn open_input(&self, name: &str, _ctx: &IOContext) -> Result<Box<dyn IndexInput>> {
        self.ensure_can_read(name)?;
        let path = self.resolve(name);
        Ok(Box::new(MmapIndexInput::new(name, path)?))
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        if self.pending_deletes.read()?.contains(name) {
            bail!(IllegalState(format!(
                "file {} is already pending delete",
                name
            )))
        };

        {
            let mut pending = self.pending_deletes.write()?;
            pending.insert(name.to_string());
            Self::delete_pending_files(&mut pending, &self.directory);
        }

        self.maybe_delete_pending_files()
    }

    fn sync(&self, names: &HashSet<String>) -> Result<()> {
        for name in names {
            let path = self.resolve(name);
            self.fsync(&path, false)?;
        }
        self.maybe_delete_pending_files()
    }

    fn sync_meta_data(&self) -> Result<()> {
        self.fsync(&self.directory, true)
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        if self.pending_deletes.read()?.contains(source) {
            bail!(IllegalState(format!(
                "file '{}' is pending delete and cannot be moved",
                source
            )));
        }
        self.pending_deletes.write()?.remove(dest);
        let source_path = self.resolve(source);
        let dest_path = self.resolve(dest);
        fs::rename(&source_path, &dest_path)?;
        self.maybe_delete_pending_files()
    }
}

impl fmt::Display for FSDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FSDirectory({})", self.directory.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::io::{DataInput, DataOutput, IndexOutput};
    use core::store::IO_CONTEXT_READ;
    use tempfile::TempDir;

    #[test]
    fn test_write_read_rename_delete() {
        let tmp = TempDir::new().unwrap();
        let dir = FSDirectory::new(tmp.path()).unwrap();
        {
            let mut out = dir.create_output("_0.tmp", &IOContext::Default).unwrap();
            out.write_int(3).unwrap();
            out.write_string("abc").unwrap();
            assert_eq!(out.file_pointer(), 8);
        }
        dir.rename("_0.tmp", "_0.fdt").unwrap();
        assert!(!dir.file_exists("_0.tmp").unwrap());
        assert!(dir.file_exists("_0.fdt").unwrap());
        assert_eq!(dir.file_length("_0.fdt").unwrap(), 8);

        let mut names = HashSet::new();
        names.insert("_0.fdt".to_string());
        dir.sync(&names).unwrap();
        dir.sync_meta_data().unwrap();

        {
            let mut input = dir.open_input("_0.fdt", &IO_CONTEXT_READ).unwrap();
            assert_eq!(input.read_int().unwrap(), 3);
            assert_eq!(input.read_string().unwrap(), "abc");
        }

        dir.delete_file("_0.fdt").unwrap();
        assert_eq!(dir.list_all().unwrap().len(), 0);
    }
}
