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

use core::codec::codec_util;
use core::codec::field_infos::{FieldInfo, FieldInfos};
use core::codec::postings::{SkipListReader, TermInfo, POSTINGS_FORMAT_CURRENT};
use core::index::{segment_file_name, FREQ_EXTENSION, PROX_EXTENSION};
use core::search::{DocIterator, Payload, PostingIterator, NO_MORE_DOCS};
use core::store::directory::Directory;
use core::store::io::IndexInput;
use core::store::IOContext;
use core::util::{BitsRef, DocId};

use error::Result;

/// Opens the .frq and .prx files of a segment and hands out posting
/// iterators, each reading through its own clones of the inputs.
pub struct PostingsReader {
    freq_in: Box<dyn IndexInput>,
    prox_in: Option<Box<dyn IndexInput>>,
    skip_interval: i32,
    max_skip_levels: i32,
}

impl PostingsReader {
    pub fn open<D: Directory>(
        directory: &D,
        segment: &str,
        field_infos: &FieldInfos,
        skip_interval: i32,
        max_skip_levels: i32,
        context: &IOContext,
    ) -> Result<PostingsReader> {
        let freq_name = segment_file_name(segment, "", FREQ_EXTENSION);
        let mut freq_in = directory.open_input(&freq_name, context)?;
        codec_util::check_format(
            freq_in.as_mut(),
            &freq_name,
            POSTINGS_FORMAT_CURRENT,
            POSTINGS_FORMAT_CURRENT,
        )?;

        let prox_in = if field_infos.has_prox {
            let prox_name = segment_file_name(segment, "", PROX_EXTENSION);
            let mut prox_in = directory.open_input(&prox_name, context)?;
            codec_util::check_format(
                prox_in.as_mut(),
                &prox_name,
                POSTINGS_FORMAT_CURRENT,
                POSTINGS_FORMAT_CURRENT,
            )?;
            Some(prox_in)
        } else {
            None
        };

        Ok(PostingsReader {
            freq_in,
            prox_in,
            skip_interval,
            max_skip_levels,
        })
    }

    /// Returns the postings of the term described by `ti`. Positions are
    /// only decoded when `with_positions` is set and the field has them.
    pub fn postings(
        &self,
        field: &FieldInfo,
        ti: &TermInfo,
        deleted_docs: Option<BitsRef>,
        with_positions: bool,
    ) -> Result<SegmentPostingIterator> {
        let prox_in = match self.prox_in {
            Some(ref prox_in) if with_positions && field.index_options.has_positions() => {
                Some(prox_in.as_ref().clone()?)
            }
            _ => None,
        };
        SegmentPostingIterator::new(
            self.freq_in.as_ref().clone()?,
            prox_in,
            field,
            ti,
            deleted_docs,
            self.skip_interval,
            self.max_skip_levels,
        )
    }
}

/// Iterates the docs, freqs, positions and payloads of one term.
pub struct SegmentPostingIterator {
    freq_in: Box<dyn IndexInput>,
    prox_in: Option<Box<dyn IndexInput>>,
    deleted_docs: Option<BitsRef>,
    has_freqs: bool,
    stores_payloads: bool,

    skip_interval: i32,
    max_skip_levels: i32,
    skip_reader: Option<SkipListReader>,
    have_skipped: bool,
    freq_base_pointer: i64,
    prox_base_pointer: i64,
    skip_pointer: i64,

    df: i32,
    count: i32,
    /// doc id accumulator, also moved by skipping
    doc: DocId,
    doc_id: DocId,
    freq: i32,

    // position state
    lazy_skip_pointer: i64,
    lazy_skip_prox_count: i32,
    prox_count: i32,
    position: i32,
    payload_length: i32,
    need_to_load_payload: bool,
}

impl SegmentPostingIterator {
    fn new(
        mut freq_in: Box<dyn IndexInput>,
        prox_in: Option<Box<dyn IndexInput>>,
        field: &FieldInfo,
        ti: &TermInfo,
        deleted_docs: Option<BitsRef>,
        skip_interval: i32,
        max_skip_levels: i32,
    ) -> Result<SegmentPostingIterator> {
        freq_in.seek(ti.freq_pointer)?;
        let has_positions = prox_in.is_some();
        Ok(SegmentPostingIterator {
            freq_in,
            prox_in,
            deleted_docs,
            has_freqs: field.index_options.has_freqs(),
            stores_payloads: has_positions && field.has_store_payloads,
            skip_interval,
            max_skip_levels,
            skip_reader: None,
            have_skipped: false,
            freq_base_pointer: ti.freq_pointer,
            prox_base_pointer: ti.prox_pointer,
            skip_pointer: ti.freq_pointer + i64::from(ti.skip_offset),
            df: ti.doc_freq,
            count: 0,
            doc: 0,
            doc_id: -1,
            freq: 0,
            lazy_skip_pointer: if has_positions { ti.prox_pointer } else { -1 },
            lazy_skip_prox_count: 0,
            prox_count: 0,
            position: 0,
            payload_length: 0,
            need_to_load_payload: false,
        })
    }

    /// Number of documents containing the term, deleted ones included.
    pub fn doc_freq(&self) -> i32 {
        self.df
    }

    fn is_deleted(&self, doc: DocId) -> Result<bool> {
        match self.deleted_docs {
            Some(ref bits) => bits.get(doc as usize),
            None => Ok(false),
        }
    }

    /// Reads the next live doc, returns false once all `df` docs are read.
    fn read_next(&mut self) -> Result<bool> {
        // positions of the doc we are leaving were never read
        self.lazy_skip_prox_count += self.prox_count;
        self.prox_count = 0;
        loop {
            if self.count == self.df {
                return Ok(false);
            }
            let doc_code = self.freq_in.read_vint()?;
            if !self.has_freqs {
                self.doc += doc_code;
                self.freq = 0;
            } else {
                self.doc += ((doc_code as u32) >> 1) as i32;
                self.freq = if (doc_code & 1) != 0 {
                    1
                } else {
                    self.freq_in.read_vint()?
                };
            }
            self.count += 1;

            if !self.is_deleted(self.doc)? {
                break;
            }
            self.lazy_skip_prox_count += self.freq;
        }
        if self.prox_in.is_some() {
            self.prox_count = self.freq;
            self.position = 0;
        }
        Ok(true)
    }

    fn skip_to(&mut self, target: DocId) -> Result<()> {
        if target - self.skip_interval < self.doc || self.df < self.skip_interval {
            return Ok(());
        }
        if self.skip_reader.is_none() {
            let input = self.freq_in.as_ref().clone()?;
            self.skip_reader = Some(SkipListReader::new(
                input,
                self.max_skip_levels as usize,
                self.skip_interval,
            ));
        }
        let (new_count, freq_pointer, prox_pointer, payload_length, doc) = {
            let skip_pointer = self.skip_pointer;
            let freq_base_pointer = self.freq_base_pointer;
            let prox_base_pointer = self.prox_base_pointer;
            let df = self.df;
            let stores_payloads = self.stores_payloads;
            let have_skipped = self.have_skipped;
            let skip_reader = match self.skip_reader {
                Some(ref mut reader) => reader,
                None => return Ok(()),
            };
            if !have_skipped {
                skip_reader.init(
                    skip_pointer,
                    freq_base_pointer,
                    prox_base_pointer,
                    df,
                    stores_payloads,
                );
            }
            let new_count = skip_reader.skip_to(target)?;
            (
                new_count,
                skip_reader.freq_pointer(),
                skip_reader.prox_pointer(),
                skip_reader.payload_length(),
                skip_reader.doc(),
            )
        };
        self.have_skipped = true;

        if new_count > self.count {
            self.freq_in.seek(freq_pointer)?;
            if self.prox_in.is_some() {
                self.lazy_skip_pointer = prox_pointer;
                self.lazy_skip_prox_count = 0;
                self.prox_count = 0;
                self.payload_length = payload_length;
                self.need_to_load_payload = false;
            }
            self.doc = doc;
            self.count = new_count;
        }
        Ok(())
    }

    fn read_delta_position(&mut self) -> Result<i32> {
        let stores_payloads = self.stores_payloads;
        let prox_in = match self.prox_in {
            Some(ref mut prox_in) => prox_in,
            None => return Ok(0),
        };
        let mut delta = prox_in.read_vint()?;
        if stores_payloads {
            if (delta & 1) != 0 {
                self.payload_length = prox_in.read_vint()?;
            }
            delta = ((delta as u32) >> 1) as i32;
            self.need_to_load_payload = true;
        }
        Ok(delta)
    }

    fn skip_payload(&mut self) -> Result<()> {
        if self.need_to_load_payload && self.payload_length > 0 {
            if let Some(ref mut prox_in) = self.prox_in {
                let fp = prox_in.file_pointer();
                prox_in.seek(fp + i64::from(self.payload_length))?;
            }
        }
        self.need_to_load_payload = false;
        Ok(())
    }

    fn skip_positions(&mut self, n: i32) -> Result<()> {
        for _ in 0..n {
            self.read_delta_position()?;
            self.skip_payload()?;
        }
        Ok(())
    }

    /// Catches the .prx stream up with the current doc; positions of the
    /// docs passed over by `next()` and `advance()` are only read here.
    fn lazy_skip(&mut self) -> Result<()> {
        // we might have to skip the current payload if it was not read yet
        self.skip_payload()?;

        if self.lazy_skip_pointer != -1 {
            if let Some(ref mut prox_in) = self.prox_in {
                prox_in.seek(self.lazy_skip_pointer)?;
            }
            self.lazy_skip_pointer = -1;
        }
        if self.lazy_skip_prox_count != 0 {
            let n = self.lazy_skip_prox_count;
            self.skip_positions(n)?;
            self.lazy_skip_prox_count = 0;
        }
        Ok(())
    }
}

impl DocIterator for SegmentPostingIterator {
    fn doc_id(&self) -> DocId {
        self.doc_id
    }

    fn next(&mut self) -> Result<DocId> {
        self.doc_id = if self.read_next()? {
            self.doc
        } else {
            NO_MORE_DOCS
        };
        Ok(self.doc_id)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.skip_to(target)?;
        // done skipping, now just scan
        loop {
            if !self.read_next()? {
                self.doc_id = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            if self.doc >= target {
                self.doc_id = self.doc;
                return Ok(self.doc_id);
            }
        }
    }

    fn cost(&self) -> usize {
        self.df.max(0) as usize
    }
}

impl PostingIterator for SegmentPostingIterator {
    fn freq(&self) -> Result<i32> {
        Ok(self.freq)
    }

    fn next_position(&mut self) -> Result<i32> {
        if self.prox_in.is_none() {
            return Ok(-1);
        }
        self.lazy_skip()?;
        self.prox_count -= 1;
        let delta = self.read_delta_position()?;
        self.position += delta;
        Ok(self.position)
    }

    fn payload(&mut self) -> Result<Payload> {
        if !self.need_to_load_payload || self.payload_length <= 0 {
            self.need_to_load_payload = false;
            return Ok(Payload::new());
        }
        let mut payload = vec![0u8; self.payload_length as usize];
        if let Some(ref mut prox_in) = self.prox_in {
            prox_in.read_bytes(&mut payload, 0, self.payload_length as usize)?;
        }
        self.need_to_load_payload = false;
        Ok(payload)
    }
}
