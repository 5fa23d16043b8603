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

use core::store::directory::Directory;
use core::store::io::IndexInput;
use core::store::IOContext;

use error::Result;

use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Mutex;

/// Records the names of all files created through it, so a failed writer
/// can remove exactly the files it produced.
pub struct TrackingDirectoryWrapper<D: Directory, T: Deref<Target = D>> {
    create_file_names: Mutex<HashSet<String>>,
    pub directory: T,
}

impl<D: Directory, T: Deref<Target = D>> TrackingDirectoryWrapper<D, T> {
    pub fn new(directory: T) -> TrackingDirectoryWrapper<D, T> {
        TrackingDirectoryWrapper {
            create_file_names: Mutex::new(HashSet::new()),
            directory,
        }
    }

    pub fn create_files(&self) -> Result<HashSet<String>> {
        Ok(self.create_file_names.lock()?.clone())
    }

    /// Deletes every tracked file, logging the ones that cannot be removed.
    pub fn delete_created_files(&self) -> Result<()> {
        let names = self.create_files()?;
        for name in &names {
            match self.directory.delete_file(name) {
                Ok(()) => {
                    self.create_file_names.lock()?.remove(name);
                }
                Err(e) => warn!("failed to delete partial file {} of {}: {}", name, self, e),
            }
        }
        Ok(())
    }
}

impl<D, T> Directory for TrackingDirectoryWrapper<D, T>
where
    D: Directory,
    T: Deref<Target = D> + Send + Sync,
{
    type IndexOutput = D::IndexOutput;

    fn list_all(&self) -> Result<Vec<String>> {
        self.directory.list_all()
    }

    fn file_exists(&self, name: &str) -> Result<bool> {
        self.directory.file_exists(name)
    }

    fn file_length(&self, name: &str) -> Result<i64> {
        self.directory.file_length(name)
    }

    fn create_output(&self, name: &str, ctx: &IOContext) -> Result<Self::IndexOutput> {
        let output = self.directory.create_output(name, ctx)?;
        self.create_file_names.lock()?.insert(name.to_string());
        Ok(output)
    }

    fn open_input(&self, name: &str, ctx: &IOContext) -> Result<Box<dyn IndexInput>> {
        self.directory.open_input(name, ctx)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.directory.delete_file(name)?;
        self.create_file_names.lock()?.remove(name);
        Ok(())
    }

    fn sync(&self, names: &HashSet<String>) -> Result<()> {
        self.directory.sync(names)
    }

    fn sync_meta_data(&self) -> Result<()> {
        self.directory.sync_meta_data()
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        self.directory.rename(source, dest)?;
        let mut names = self.create_file_names.lock()?;
        names.remove(source);
        names.insert(dest.to_string());
        Ok(())
    }
}

impl<D, T> fmt::Display for TrackingDirectoryWrapper<D, T>
where
    D: Directory,
    T: Deref<Target = D>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TrackingDirectoryWrapper({})", &*self.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::directory::RAMDirectory;
    use std::sync::Arc;

    #[test]
    fn test_delete_created_files() {
        let dir = Arc::new(RAMDirectory::new());
        drop(dir.create_output("keep", &IOContext::Default).unwrap());
        let tracking = TrackingDirectoryWrapper::new(Arc::clone(&dir));
        drop(tracking.create_output("_1.fdt", &IOContext::Default).unwrap());
        drop(tracking.create_output("_1.fdx", &IOContext::Default).unwrap());
        assert_eq!(tracking.create_files().unwrap().len(), 2);

        tracking.delete_created_files().unwrap();
        assert_eq!(dir.list_all().unwrap(), vec!["keep".to_string()]);
        assert!(tracking.create_files().unwrap().is_empty());
    }
}
