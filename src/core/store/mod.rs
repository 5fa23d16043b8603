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

pub mod directory;
pub mod io;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct FlushInfo {
    pub num_docs: u32,
}

impl FlushInfo {
    pub fn new(num_docs: u32) -> Self {
        FlushInfo { num_docs }
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct MergeInfo {
    pub total_max_doc: u32,
    pub is_external: bool,
}

impl MergeInfo {
    pub fn new(total_max_doc: u32, is_external: bool) -> Self {
        MergeInfo {
            total_max_doc,
            is_external,
        }
    }
}

/// Hint passed to a `Directory` describing why a file is opened.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum IOContext {
    Read(bool),
    Default,
    Flush(FlushInfo),
    Merge(MergeInfo),
}

impl IOContext {
    pub fn is_merge(&self) -> bool {
        match self {
            IOContext::Merge(_) => true,
            _ => false,
        }
    }
}

pub const IO_CONTEXT_READONCE: IOContext = IOContext::Read(true);
pub const IO_CONTEXT_READ: IOContext = IOContext::Read(false);
