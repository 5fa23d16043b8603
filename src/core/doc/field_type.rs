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

use core::index::IndexOptions;

/// Describes how a field is stored and indexed.
#[derive(Clone, Default, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct FieldType {
    pub stored: bool,
    pub indexed: bool,
    pub tokenized: bool,
    pub store_term_vectors: bool,
    pub store_payloads: bool,
    pub index_options: IndexOptions,
}

impl FieldType {
    pub fn new(
        stored: bool,
        indexed: bool,
        tokenized: bool,
        index_options: IndexOptions,
    ) -> FieldType {
        FieldType {
            stored,
            indexed,
            tokenized,
            store_term_vectors: false,
            store_payloads: false,
            index_options,
        }
    }

    /// Stored, not indexed.
    pub fn stored_only() -> FieldType {
        FieldType::new(true, false, false, IndexOptions::default())
    }

    /// Indexed and split into tokens; optionally stored.
    pub fn text(stored: bool) -> FieldType {
        FieldType::new(stored, true, true, IndexOptions::DocsAndFreqsAndPositions)
    }

    /// Indexed verbatim as a single token; optionally stored.
    pub fn string(stored: bool) -> FieldType {
        FieldType::new(stored, true, false, IndexOptions::Docs)
    }

    pub fn with_payloads(mut self) -> FieldType {
        self.store_payloads = true;
        self
    }

    pub fn with_index_options(mut self, index_options: IndexOptions) -> FieldType {
        self.index_options = index_options;
        self
    }

    pub fn with_term_vectors(mut self) -> FieldType {
        self.store_term_vectors = true;
        self
    }
}
