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

/// Where the postings of one term live.
///
/// `freq_pointer` and `prox_pointer` are absolute here; on disk they are
/// stored as deltas from the previous term and accumulated while enumerating.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TermInfo {
    pub doc_freq: i32,
    pub freq_pointer: i64,
    pub prox_pointer: i64,
    /// Offset of the skip data from `freq_pointer`, only written when
    /// `doc_freq >= skip_interval`.
    pub skip_offset: i32,
}

impl TermInfo {
    pub fn new(doc_freq: i32, freq_pointer: i64, prox_pointer: i64, skip_offset: i32) -> TermInfo {
        TermInfo {
            doc_freq,
            freq_pointer,
            prox_pointer,
            skip_offset,
        }
    }
}
