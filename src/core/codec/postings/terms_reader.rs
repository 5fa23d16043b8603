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

use std::sync::Arc;

use core::codec::field_infos::{FieldInfo, FieldInfos};
use core::codec::postings::{
    unpositioned, PostingsReader, RawTermCursor, SeekStatus, SegmentPostingIterator,
    SegmentTermEnum, SurrogateDance, TermInfosReader, TermIterator, TermOrder,
};
use core::store::directory::Directory;
use core::store::IOContext;
use core::util::BitsRef;

use error::ErrorKind::{IllegalArgument, UnsupportedOperation};
use error::Result;

/// Reads the terms and postings of a segment, field by field.
pub struct TermsReader {
    field_infos: Arc<FieldInfos>,
    dict: TermInfosReader,
    postings: Arc<PostingsReader>,
}

impl TermsReader {
    pub fn open<D: Directory>(
        directory: &D,
        segment: &str,
        field_infos: Arc<FieldInfos>,
        context: &IOContext,
    ) -> Result<TermsReader> {
        let dict = TermInfosReader::open(directory, segment, Arc::clone(&field_infos), context)?;
        let postings = PostingsReader::open(
            directory,
            segment,
            &field_infos,
            dict.index().skip_interval(),
            dict.index().max_skip_levels(),
            context,
        )?;
        Ok(TermsReader {
            field_infos,
            dict,
            postings: Arc::new(postings),
        })
    }

    /// The physical order of the dictionary. Enums always return terms in
    /// code point order.
    pub fn term_order(&self) -> TermOrder {
        self.dict.term_order()
    }

    pub fn supports_ord(&self) -> bool {
        self.dict.term_order().supports_ord()
    }

    /// Total number of terms over all fields.
    pub fn size(&self) -> i64 {
        self.dict.size()
    }

    /// Names of the indexed fields, sorted.
    pub fn fields(&self) -> Vec<String> {
        self.field_infos
            .indexed_fields()
            .iter()
            .map(|fi| fi.name.clone())
            .collect()
    }

    /// Returns an enum over the terms of `field`, or `None` if the field is
    /// unknown or not indexed.
    pub fn terms(&self, field: &str) -> Result<Option<TermsEnum>> {
        let info = match self.field_infos.field_info_arc(field) {
            Some(ref info) if info.is_indexed => Arc::clone(info),
            _ => return Ok(None),
        };
        let terms = match self.term_order() {
            TermOrder::CodePoint => {
                TermsEnum::CodePoint(FieldTermsEnum::new(self, info)?)
            }
            TermOrder::Utf16 => TermsEnum::Utf16(SurrogateTermsEnum::new(
                info,
                self.dict.terms()?,
                self.dict.terms()?,
                Arc::clone(&self.postings),
            )?),
        };
        Ok(Some(terms))
    }

    /// Number of docs containing the term, 0 if absent.
    pub fn doc_freq(&self, field: &str, term: &[u8]) -> Result<i32> {
        match self.field_infos.field_info_by_name(field) {
            Some(info) => Ok(self
                .dict
                .get(info.number, term)?
                .map_or(0, |ti| ti.doc_freq)),
            None => Ok(0),
        }
    }

    /// The next indexed field after `field` in dictionary order.
    fn next_field(&self, field: &FieldInfo) -> Option<u32> {
        self.field_infos
            .indexed_fields()
            .iter()
            .find(|fi| fi.name > field.name)
            .map(|fi| fi.number)
    }
}

/// Iterates the terms of one field, in code point order whatever the order
/// of the dictionary on disk.
pub enum TermsEnum {
    CodePoint(FieldTermsEnum),
    Utf16(SurrogateTermsEnum),
}

impl TermIterator for TermsEnum {
    fn next(&mut self) -> Result<Option<Vec<u8>>> {
        match *self {
            TermsEnum::CodePoint(ref mut t) => t.next(),
            TermsEnum::Utf16(ref mut t) => t.next(),
        }
    }

    fn seek_exact(&mut self, text: &[u8]) -> Result<bool> {
        match *self {
            TermsEnum::CodePoint(ref mut t) => t.seek_exact(text),
            TermsEnum::Utf16(ref mut t) => t.seek_exact(text),
        }
    }

    fn seek_ceil(&mut self, text: &[u8]) -> Result<SeekStatus> {
        match *self {
            TermsEnum::CodePoint(ref mut t) => t.seek_ceil(text),
            TermsEnum::Utf16(ref mut t) => t.seek_ceil(text),
        }
    }

    fn seek_exact_ord(&mut self, ord: i64) -> Result<SeekStatus> {
        match *self {
            TermsEnum::CodePoint(ref mut t) => t.seek_exact_ord(ord),
            TermsEnum::Utf16(ref mut t) => t.seek_exact_ord(ord),
        }
    }

    fn term(&self) -> Result<&[u8]> {
        match *self {
            TermsEnum::CodePoint(ref t) => t.term(),
            TermsEnum::Utf16(ref t) => t.term(),
        }
    }

    fn ord(&self) -> Result<i64> {
        match *self {
            TermsEnum::CodePoint(ref t) => t.ord(),
            TermsEnum::Utf16(ref t) => t.ord(),
        }
    }

    fn doc_freq(&self) -> Result<i32> {
        match *self {
            TermsEnum::CodePoint(ref t) => t.doc_freq(),
            TermsEnum::Utf16(ref t) => t.doc_freq(),
        }
    }

    fn supports_ord(&self) -> bool {
        match *self {
            TermsEnum::CodePoint(ref t) => t.supports_ord(),
            TermsEnum::Utf16(ref t) => t.supports_ord(),
        }
    }

    fn term_order(&self) -> TermOrder {
        match *self {
            TermsEnum::CodePoint(ref t) => t.term_order(),
            TermsEnum::Utf16(ref t) => t.term_order(),
        }
    }

    fn docs(&self, deleted_docs: Option<BitsRef>) -> Result<SegmentPostingIterator> {
        match *self {
            TermsEnum::CodePoint(ref t) => t.docs(deleted_docs),
            TermsEnum::Utf16(ref t) => t.docs(deleted_docs),
        }
    }

    fn docs_and_positions(
        &self,
        deleted_docs: Option<BitsRef>,
    ) -> Result<Option<SegmentPostingIterator>> {
        match *self {
            TermsEnum::CodePoint(ref t) => t.docs_and_positions(deleted_docs),
            TermsEnum::Utf16(ref t) => t.docs_and_positions(deleted_docs),
        }
    }
}

fn postings_of(
    postings: &PostingsReader,
    field: &FieldInfo,
    terms: &SegmentTermEnum,
    deleted_docs: Option<BitsRef>,
    with_positions: bool,
) -> Result<SegmentPostingIterator> {
    if terms.term_in_field(field.number).is_none() {
        return Err(unpositioned());
    }
    postings.postings(field, terms.term_info(), deleted_docs, with_positions)
}

/// Terms of a field in a code point ordered dictionary. The terms of a field
/// are contiguous, so ordinals are dictionary positions relative to the
/// first term of the field.
pub struct FieldTermsEnum {
    field: Arc<FieldInfo>,
    terms: SegmentTermEnum,
    postings: Arc<PostingsReader>,
    field_start: i64,
    num_terms: i64,
    /// -1 before the first term, `num_terms` after the last
    ord: i64,
}

impl FieldTermsEnum {
    fn new(reader: &TermsReader, field: Arc<FieldInfo>) -> Result<FieldTermsEnum> {
        let size = reader.dict.size();
        let mut terms = reader.dict.terms()?;
        let field_start = if terms.seek_ceil(field.number, &[])? {
            terms.position()
        } else {
            size
        };
        let field_end = match reader.next_field(&field) {
            Some(next) if terms.seek_ceil(next, &[])? => terms.position(),
            _ => size,
        };
        Ok(FieldTermsEnum {
            field,
            terms,
            postings: Arc::clone(&reader.postings),
            field_start,
            num_terms: (field_end - field_start).max(0),
            ord: -1,
        })
    }

    /// Number of terms of the field.
    pub fn num_terms(&self) -> i64 {
        self.num_terms
    }

    fn is_positioned(&self) -> bool {
        self.ord >= 0 && self.ord < self.num_terms
    }

    fn current(&self) -> Option<&[u8]> {
        if self.is_positioned() {
            self.terms.term_in_field(self.field.number)
        } else {
            None
        }
    }
}

impl TermIterator for FieldTermsEnum {
    fn next(&mut self) -> Result<Option<Vec<u8>>> {
        if self.ord + 1 >= self.num_terms {
            self.ord = self.num_terms;
            return Ok(None);
        }
        self.ord += 1;
        let position = self.field_start + self.ord;
        if self.terms.is_positioned() && self.terms.position() == position - 1 {
            self.terms.next()?;
        } else {
            self.terms.seek_position(position)?;
        }
        Ok(self.current().map(<[u8]>::to_vec))
    }

    fn seek_ceil(&mut self, text: &[u8]) -> Result<SeekStatus> {
        let number = self.field.number;
        if self.num_terms > 0
            && self.terms.seek_ceil(number, text)?
            && self.terms.field_number() == Some(number)
        {
            self.ord = self.terms.position() - self.field_start;
            if self.terms.term() == Some(text) {
                Ok(SeekStatus::Found)
            } else {
                Ok(SeekStatus::NotFound)
            }
        } else {
            self.ord = self.num_terms;
            Ok(SeekStatus::End)
        }
    }

    fn seek_exact_ord(&mut self, ord: i64) -> Result<SeekStatus> {
        if ord < 0 || ord >= self.num_terms {
            bail!(IllegalArgument(format!(
                "ord {} out of range, field {} has {} terms",
                ord, self.field.name, self.num_terms
            )));
        }
        self.terms.seek_position(self.field_start + ord)?;
        self.ord = ord;
        Ok(SeekStatus::Found)
    }

    fn term(&self) -> Result<&[u8]> {
        self.current().ok_or_else(unpositioned)
    }

    fn ord(&self) -> Result<i64> {
        if self.is_positioned() {
            Ok(self.ord)
        } else {
            Err(unpositioned())
        }
    }

    fn doc_freq(&self) -> Result<i32> {
        self.term()?;
        Ok(self.terms.doc_freq())
    }

    fn supports_ord(&self) -> bool {
        true
    }

    fn term_order(&self) -> TermOrder {
        TermOrder::CodePoint
    }

    fn docs(&self, deleted_docs: Option<BitsRef>) -> Result<SegmentPostingIterator> {
        self.term()?;
        postings_of(&self.postings, &self.field, &self.terms, deleted_docs, false)
    }

    fn docs_and_positions(
        &self,
        deleted_docs: Option<BitsRef>,
    ) -> Result<Option<SegmentPostingIterator>> {
        self.term()?;
        if !self.field.index_options.has_positions() {
            return Ok(None);
        }
        postings_of(&self.postings, &self.field, &self.terms, deleted_docs, true).map(Some)
    }
}

/// A main and a probe enum over the terms of one field.
struct DictCursor {
    field_number: u32,
    main: SegmentTermEnum,
    probe: SegmentTermEnum,
}

impl RawTermCursor for DictCursor {
    fn seek_main(&mut self, target: &[u8]) -> Result<Option<Vec<u8>>> {
        self.main.seek_ceil(self.field_number, target)?;
        Ok(self.main_term().map(<[u8]>::to_vec))
    }

    fn seek_probe(&mut self, target: &[u8]) -> Result<Option<Vec<u8>>> {
        self.probe.seek_ceil(self.field_number, target)?;
        Ok(self
            .probe
            .term_in_field(self.field_number)
            .map(<[u8]>::to_vec))
    }

    fn next_main(&mut self) -> Result<Option<Vec<u8>>> {
        self.main.next()?;
        Ok(self.main_term().map(<[u8]>::to_vec))
    }

    fn main_term(&self) -> Option<&[u8]> {
        self.main.term_in_field(self.field_number)
    }

    fn main_prefix_len(&self) -> usize {
        self.main.prefix_len()
    }
}

/// Terms of a field in a legacy UTF-16 ordered dictionary, returned in code
/// point order. Ordinals are not available.
pub struct SurrogateTermsEnum {
    field: Arc<FieldInfo>,
    cursor: DictCursor,
    dance: SurrogateDance,
    postings: Arc<PostingsReader>,
}

impl SurrogateTermsEnum {
    fn new(
        field: Arc<FieldInfo>,
        main: SegmentTermEnum,
        probe: SegmentTermEnum,
        postings: Arc<PostingsReader>,
    ) -> Result<SurrogateTermsEnum> {
        let mut cursor = DictCursor {
            field_number: field.number,
            main,
            probe,
        };
        let mut dance = SurrogateDance::new();
        dance.reset(&mut cursor)?;
        Ok(SurrogateTermsEnum {
            field,
            cursor,
            dance,
            postings,
        })
    }
}

impl TermIterator for SurrogateTermsEnum {
    fn next(&mut self) -> Result<Option<Vec<u8>>> {
        self.dance.next(&mut self.cursor)
    }

    fn seek_ceil(&mut self, text: &[u8]) -> Result<SeekStatus> {
        self.dance.seek_ceil(&mut self.cursor, text)
    }

    fn seek_exact_ord(&mut self, _ord: i64) -> Result<SeekStatus> {
        bail!(UnsupportedOperation(
            "UTF-16 ordered term dictionaries can't seek by ord".into()
        ))
    }

    fn term(&self) -> Result<&[u8]> {
        self.dance.current().ok_or_else(unpositioned)
    }

    fn ord(&self) -> Result<i64> {
        bail!(UnsupportedOperation(
            "UTF-16 ordered term dictionaries have no ords".into()
        ))
    }

    fn doc_freq(&self) -> Result<i32> {
        self.term()?;
        Ok(self.cursor.main.doc_freq())
    }

    fn supports_ord(&self) -> bool {
        false
    }

    fn term_order(&self) -> TermOrder {
        TermOrder::CodePoint
    }

    fn docs(&self, deleted_docs: Option<BitsRef>) -> Result<SegmentPostingIterator> {
        self.term()?;
        postings_of(
            &self.postings,
            &self.field,
            &self.cursor.main,
            deleted_docs,
            false,
        )
    }

    fn docs_and_positions(
        &self,
        deleted_docs: Option<BitsRef>,
    ) -> Result<Option<SegmentPostingIterator>> {
        self.term()?;
        if !self.field.index_options.has_positions() {
            return Ok(None);
        }
        postings_of(
            &self.postings,
            &self.field,
            &self.cursor.main,
            deleted_docs,
            true,
        )
        .map(Some)
    }
}
