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

use std::collections::HashSet;
use std::fmt;

use core::store::io::{IndexInput, IndexOutput};
use core::store::IOContext;
use error::Result;

/// Flat namespace of write-once files.
pub trait Directory: fmt::Display + Send + Sync {
    type IndexOutput: IndexOutput;

    /// Returns the names of all files in the directory, sorted.
    fn list_all(&self) -> Result<Vec<String>>;

    fn file_exists(&self, name: &str) -> Result<bool> {
        Ok(self.list_all()?.iter().any(|n| n == name))
    }

    /// Returns the length of a file in the directory.
    fn file_length(&self, name: &str) -> Result<i64>;

    /// Creates a new, empty file in the directory with the given name.
    /// Returns a stream writing this file.
    fn create_output(&self, name: &str, context: &IOContext) -> Result<Self::IndexOutput>;

    fn open_input(&self, name: &str, ctx: &IOContext) -> Result<Box<dyn IndexInput>>;

    fn delete_file(&self, name: &str) -> Result<()>;

    /// Ensure that any writes to these files are moved to
    /// stable storage.
    ///
    /// NOTE: Clients may call this method for same files over
    /// and over again, so some impls might optimize for that.
    /// For other impls the operation can be a noop, for various
    /// reasons.
    fn sync(&self, name: &HashSet<String>) -> Result<()>;

    /// Ensure that directory metadata, such as recent file renames, are made durable.
    fn sync_meta_data(&self) -> Result<()>;

    fn rename(&self, source: &str, dest: &str) -> Result<()>;
}
