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

use core::index::{
    segment_file_name, FIELDS_EXTENSION, FIELDS_INDEX_EXTENSION, FIELD_INFOS_EXTENSION,
    FREQ_EXTENSION, PROX_EXTENSION, TERMS_EXTENSION, TERMS_INDEX_EXTENSION,
};
use core::store::directory::Directory;

use error::Result;

use std::fmt;

/// Information about a sealed segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub name: String,
    pub doc_count: i32,
    /// Whether any field of the segment indexes positions, i.e. whether it
    /// has a .prx file.
    pub has_prox: bool,
}

impl SegmentInfo {
    pub fn new(name: &str, doc_count: i32, has_prox: bool) -> SegmentInfo {
        SegmentInfo {
            name: name.to_string(),
            doc_count,
            has_prox,
        }
    }

    /// Names of all files of this segment.
    pub fn files(&self) -> Vec<String> {
        let mut extensions = vec![
            FIELD_INFOS_EXTENSION,
            TERMS_EXTENSION,
            TERMS_INDEX_EXTENSION,
            FREQ_EXTENSION,
        ];
        if self.has_prox {
            extensions.push(PROX_EXTENSION);
        }
        extensions.push(FIELDS_EXTENSION);
        extensions.push(FIELDS_INDEX_EXTENSION);
        extensions
            .into_iter()
            .map(|ext| segment_file_name(&self.name, "", ext))
            .collect()
    }

    /// Total size in bytes of the segment's files.
    pub fn size_in_bytes<D: Directory>(&self, directory: &D) -> Result<i64> {
        let mut size = 0;
        for file in self.files() {
            size += directory.file_length(&file)?;
        }
        Ok(size)
    }
}

impl fmt::Display for SegmentInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({} docs)", self.name, self.doc_count)
    }
}
