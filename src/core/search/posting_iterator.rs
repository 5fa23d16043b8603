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

use core::search::{DocIterator, Payload};
use error::Result;

pub trait PostingIterator: DocIterator {
    /// Returns term frequency in the current document, or 0 if the field was
    /// indexed with `IndexOptions::Docs` ("omitted"). Do not call this before
    /// `next()` is first called, nor after `next()` returns `NO_MORE_DOCS`.
    fn freq(&self) -> Result<i32>;

    /// Returns the next position, or -1 if positions were not indexed.
    /// Calling this more than `freq()` times is undefined.
    fn next_position(&mut self) -> Result<i32>;

    /// Returns the payload at the current position, or an empty payload if
    /// none was indexed.
    fn payload(&mut self) -> Result<Payload>;
}
