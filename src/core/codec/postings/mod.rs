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

mod term_info;

pub use self::term_info::*;

mod term_infos_writer;

pub use self::term_infos_writer::*;

mod term_infos_reader;

pub use self::term_infos_reader::*;

mod skip_writer;

pub use self::skip_writer::*;

mod skip_reader;

pub use self::skip_reader::*;

mod posting_writer;

pub use self::posting_writer::*;

mod posting_reader;

pub use self::posting_reader::*;

mod surrogate;

pub use self::surrogate::*;

mod terms_reader;

pub use self::terms_reader::*;

use core::util::string_util::utf8_cmp_as_utf16;
use core::util::BitsRef;

use error::ErrorKind::{IllegalArgument, IllegalState};
use error::Result;

use std::cmp::Ordering;

/// Legacy term dictionary: terms sorted by UTF-16 code units.
pub const TERMS_FORMAT_UTF16_ORDER: i32 = 1;
/// Terms sorted by their UTF-8 bytes, i.e. Unicode code points.
pub const TERMS_FORMAT_CODEPOINT_ORDER: i32 = 2;
pub const TERMS_FORMAT_CURRENT: i32 = TERMS_FORMAT_CODEPOINT_ORDER;

/// Format of the .frq and .prx files.
pub const POSTINGS_FORMAT_CURRENT: i32 = 1;

pub const DEFAULT_TERM_INDEX_INTERVAL: i32 = 128;
pub const DEFAULT_SKIP_INTERVAL: i32 = 16;
pub const DEFAULT_MAX_SKIP_LEVELS: i32 = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SeekStatus {
    /// The exact term was found.
    Found,
    /// A different term was found after the requested term.
    NotFound,
    /// The requested term is past the last term of the field.
    End,
}

/// The physical order of terms in a term dictionary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermOrder {
    Utf16,
    CodePoint,
}

impl Default for TermOrder {
    fn default() -> Self {
        TermOrder::CodePoint
    }
}

impl TermOrder {
    pub fn format(self) -> i32 {
        match self {
            TermOrder::Utf16 => TERMS_FORMAT_UTF16_ORDER,
            TermOrder::CodePoint => TERMS_FORMAT_CODEPOINT_ORDER,
        }
    }

    pub fn from_format(format: i32) -> Result<TermOrder> {
        match format {
            TERMS_FORMAT_UTF16_ORDER => Ok(TermOrder::Utf16),
            TERMS_FORMAT_CODEPOINT_ORDER => Ok(TermOrder::CodePoint),
            _ => bail!(IllegalArgument(format!("unknown terms format {}", format))),
        }
    }

    /// Compares two UTF-8 encoded terms under this order.
    pub fn compare(self, a: &[u8], b: &[u8]) -> Ordering {
        match self {
            TermOrder::Utf16 => utf8_cmp_as_utf16(a, b),
            TermOrder::CodePoint => a.cmp(b),
        }
    }

    /// Whether a dictionary in this order can seek by ordinal. Ordinals of a
    /// UTF-16 ordered dictionary don't match the code point order terms are
    /// returned in.
    pub fn supports_ord(self) -> bool {
        match self {
            TermOrder::Utf16 => false,
            TermOrder::CodePoint => true,
        }
    }
}

/// Tuning of the term dictionary and postings written for a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermsConfig {
    pub term_order: TermOrder,
    /// Every `index_interval`-th term goes to the in-memory terms index.
    pub index_interval: i32,
    /// Postings get a level-0 skip entry every `skip_interval` docs.
    pub skip_interval: i32,
    pub max_skip_levels: i32,
}

impl Default for TermsConfig {
    fn default() -> Self {
        TermsConfig {
            term_order: TermOrder::default(),
            index_interval: DEFAULT_TERM_INDEX_INTERVAL,
            skip_interval: DEFAULT_SKIP_INTERVAL,
            max_skip_levels: DEFAULT_MAX_SKIP_LEVELS,
        }
    }
}

impl TermsConfig {
    pub fn from_json(json: &str) -> Result<TermsConfig> {
        let config: TermsConfig = ::serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.index_interval < 1 {
            bail!(IllegalArgument(format!(
                "index_interval must be >= 1, got {}",
                self.index_interval
            )));
        }
        if self.skip_interval < 2 {
            bail!(IllegalArgument(format!(
                "skip_interval must be >= 2, got {}",
                self.skip_interval
            )));
        }
        if self.max_skip_levels < 1 {
            bail!(IllegalArgument(format!(
                "max_skip_levels must be >= 1, got {}",
                self.max_skip_levels
            )));
        }
        Ok(())
    }

    pub fn set_term_order(&mut self, term_order: TermOrder) -> &mut Self {
        self.term_order = term_order;
        self
    }

    pub fn set_index_interval(&mut self, index_interval: i32) -> Result<&mut Self> {
        if index_interval < 1 {
            bail!(IllegalArgument(format!(
                "index_interval must be >= 1, got {}",
                index_interval
            )));
        }
        self.index_interval = index_interval;
        Ok(self)
    }

    pub fn set_skip_interval(&mut self, skip_interval: i32) -> Result<&mut Self> {
        if skip_interval < 2 {
            bail!(IllegalArgument(format!(
                "skip_interval must be >= 2, got {}",
                skip_interval
            )));
        }
        self.skip_interval = skip_interval;
        Ok(self)
    }

    pub fn set_max_skip_levels(&mut self, max_skip_levels: i32) -> Result<&mut Self> {
        if max_skip_levels < 1 {
            bail!(IllegalArgument(format!(
                "max_skip_levels must be >= 1, got {}",
                max_skip_levels
            )));
        }
        self.max_skip_levels = max_skip_levels;
        Ok(self)
    }
}

/// Iterates the terms of one field and gives access to their postings.
pub trait TermIterator {
    /// Increments the iteration to the next term and returns it, or `None`
    /// at the end of the field.
    fn next(&mut self) -> Result<Option<Vec<u8>>>;

    /// Attempts to seek to the exact term, returning true if the term is
    /// found.
    fn seek_exact(&mut self, text: &[u8]) -> Result<bool> {
        Ok(self.seek_ceil(text)? == SeekStatus::Found)
    }

    /// Seeks to the specified term if it exists, or to the next (ceiling)
    /// term. Returns `SeekStatus` to indicate whether exact term was found,
    /// a different term was found, or the end of the field was hit.
    fn seek_ceil(&mut self, text: &[u8]) -> Result<SeekStatus>;

    /// Seeks to the term with the given ordinal within the field. Fails
    /// with `UnsupportedOperation` when `supports_ord()` is false.
    fn seek_exact_ord(&mut self, ord: i64) -> Result<SeekStatus>;

    /// Returns the current term. Fails when the iterator is not positioned.
    fn term(&self) -> Result<&[u8]>;

    /// Returns the ordinal of the current term within the field.
    fn ord(&self) -> Result<i64>;

    /// Returns the number of documents containing the current term.
    fn doc_freq(&self) -> Result<i32>;

    fn supports_ord(&self) -> bool;

    /// The order terms are returned in.
    fn term_order(&self) -> TermOrder;

    /// Docs (and freqs) of the current term, skipping the docs set in
    /// `deleted_docs`.
    fn docs(&self, deleted_docs: Option<BitsRef>) -> Result<SegmentPostingIterator>;

    /// Docs, freqs, positions and payloads of the current term, or `None` if
    /// the field doesn't index positions.
    fn docs_and_positions(
        &self,
        deleted_docs: Option<BitsRef>,
    ) -> Result<Option<SegmentPostingIterator>>;
}

pub(crate) fn unpositioned() -> ::error::Error {
    IllegalState("term iterator is not positioned on a term".into()).into()
}
