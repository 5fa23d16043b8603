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
use core::codec::postings::{
    SkipListWriter, TermInfo, TermInfosWriter, TermsConfig, POSTINGS_FORMAT_CURRENT,
};
use core::index::{segment_file_name, IndexOptions, FREQ_EXTENSION, PROX_EXTENSION};
use core::store::directory::Directory;
use core::store::io::IndexOutput;
use core::store::IOContext;
use core::util::DocId;

use error::ErrorKind::{CorruptIndex, IllegalArgument, IllegalState};
use error::Result;

/// Per-field settings of the field currently being written.
struct FieldState {
    info: FieldInfo,
    index_options: IndexOptions,
    store_payloads: bool,
}

/// Writes the postings of a segment: doc deltas, freqs and skip data to the
/// .frq file, positions and payloads to the .prx file, and one term
/// dictionary entry per term.
///
/// Calls must nest as fields > terms > docs > positions:
///
/// ```text
/// start_field
///   start_term
///     start_doc, add_position*, finish_doc
///     ...
///   finish_term
/// finish
/// ```
pub struct PostingsWriter<O: IndexOutput> {
    terms: TermInfosWriter<O>,
    freq_out: O,
    prox_out: Option<O>,
    skip_writer: SkipListWriter,
    skip_interval: i32,

    field: Option<FieldState>,

    term: Option<Vec<u8>>,
    freq_start: i64,
    prox_start: i64,
    df: i32,
    last_doc: DocId,

    in_doc: bool,
    doc_freq: i32,
    positions_added: i32,
    last_position: i32,
    last_payload_length: i32,
}

impl<O: IndexOutput> PostingsWriter<O> {
    /// `total_docs` is the number of documents of the segment being written;
    /// it bounds the number of skip levels.
    pub fn new<D>(
        directory: &D,
        segment: &str,
        field_infos: &FieldInfos,
        total_docs: i32,
        config: &TermsConfig,
        context: &IOContext,
    ) -> Result<PostingsWriter<O>>
    where
        D: Directory<IndexOutput = O>,
    {
        let terms = TermInfosWriter::new(directory, segment, config, context)?;

        let freq_name = segment_file_name(segment, "", FREQ_EXTENSION);
        let mut freq_out = directory.create_output(&freq_name, context)?;
        codec_util::write_format(&mut freq_out, POSTINGS_FORMAT_CURRENT)?;

        let prox_out = if field_infos.has_prox {
            let prox_name = segment_file_name(segment, "", PROX_EXTENSION);
            let mut prox_out = directory.create_output(&prox_name, context)?;
            codec_util::write_format(&mut prox_out, POSTINGS_FORMAT_CURRENT)?;
            Some(prox_out)
        } else {
            None
        };

        Ok(PostingsWriter {
            terms,
            freq_out,
            prox_out,
            skip_writer: SkipListWriter::new(
                config.skip_interval,
                config.max_skip_levels,
                total_docs,
            ),
            skip_interval: config.skip_interval,
            field: None,
            term: None,
            freq_start: 0,
            prox_start: 0,
            df: 0,
            last_doc: 0,
            in_doc: false,
            doc_freq: 0,
            positions_added: 0,
            last_position: 0,
            last_payload_length: -1,
        })
    }

    fn prox_pointer(&self) -> i64 {
        self.prox_out.as_ref().map_or(0, |out| out.file_pointer())
    }

    /// Starts the terms of a new field. Fields must come in name order.
    pub fn start_field(&mut self, field: &FieldInfo) -> Result<()> {
        if self.term.is_some() {
            bail!(IllegalState(format!(
                "start_field({}) while a term is open",
                field.name
            )));
        }
        if !field.is_indexed {
            bail!(IllegalArgument(format!("field {} is not indexed", field.name)));
        }
        if field.index_options.has_positions() && self.prox_out.is_none() {
            bail!(IllegalArgument(format!(
                "field {} has positions but the segment has no .prx file",
                field.name
            )));
        }
        self.field = Some(FieldState {
            info: field.clone(),
            index_options: field.index_options,
            store_payloads: field.index_options.has_positions() && field.has_store_payloads,
        });
        Ok(())
    }

    pub fn start_term(&mut self, term: &[u8]) -> Result<()> {
        if self.field.is_none() {
            bail!(IllegalState("start_term called before start_field".into()));
        }
        if self.term.is_some() {
            bail!(IllegalState("start_term called while a term is open".into()));
        }
        self.term = Some(term.to_vec());
        self.freq_start = self.freq_out.file_pointer();
        self.prox_start = self.prox_pointer();
        self.df = 0;
        self.last_doc = 0;
        let prox_start = self.prox_start;
        self.skip_writer.reset_skip(self.freq_start, prox_start);
        Ok(())
    }

    /// Adds a document to the current term. Doc ids must be strictly
    /// increasing within a term.
    pub fn start_doc(&mut self, doc: DocId, freq: i32) -> Result<()> {
        if self.term.is_none() || self.in_doc {
            bail!(IllegalState("start_doc called outside of a term".into()));
        }
        let (index_options, store_payloads) = match self.field {
            Some(ref f) => (f.index_options, f.store_payloads),
            None => bail!(IllegalState("no current field".into())),
        };

        let delta = doc - self.last_doc;
        if doc < 0 || (self.df > 0 && delta <= 0) {
            bail!(CorruptIndex(format!(
                "docs out of order ({} <= {})",
                doc, self.last_doc
            )));
        }
        if index_options.has_freqs() && freq < 1 {
            bail!(IllegalArgument(format!("freq must be >= 1, got {}", freq)));
        }

        self.df += 1;
        if self.df % self.skip_interval == 0 {
            let freq_pointer = self.freq_out.file_pointer();
            let prox_pointer = self.prox_pointer();
            self.skip_writer.set_skip_data(
                self.last_doc,
                store_payloads,
                self.last_payload_length,
                freq_pointer,
                prox_pointer,
            );
            self.skip_writer.buffer_skip(self.df)?;
        }

        self.last_doc = doc;
        if !index_options.has_freqs() {
            self.freq_out.write_vint(delta)?;
        } else if freq == 1 {
            self.freq_out.write_vint((delta << 1) | 1)?;
        } else {
            self.freq_out.write_vint(delta << 1)?;
            self.freq_out.write_vint(freq)?;
        }

        self.in_doc = true;
        self.doc_freq = freq;
        self.positions_added = 0;
        Ok(())
    }

    /// Adds the next position of the current document, with an optional
    /// payload. Positions must not decrease.
    pub fn add_position(&mut self, position: i32, payload: Option<&[u8]>) -> Result<()> {
        if !self.in_doc {
            bail!(IllegalState("add_position called outside of a doc".into()));
        }
        let store_payloads = match self.field {
            Some(ref f) if f.index_options.has_positions() => f.store_payloads,
            _ => bail!(IllegalState("field doesn't index positions".into())),
        };
        if self.positions_added >= self.doc_freq {
            bail!(IllegalArgument(format!(
                "more than freq={} positions added",
                self.doc_freq
            )));
        }
        let delta = position - self.last_position;
        if position < 0 || delta < 0 {
            bail!(IllegalArgument(format!(
                "position {} is before the previous position {}",
                position, self.last_position
            )));
        }
        self.last_position = position;

        let out = match self.prox_out {
            Some(ref mut out) => out,
            None => bail!(IllegalState("no .prx output".into())),
        };
        if store_payloads {
            let payload = payload.unwrap_or(&[]);
            let payload_length = payload.len() as i32;
            if payload_length != self.last_payload_length {
                self.last_payload_length = payload_length;
                out.write_vint((delta << 1) | 1)?;
                out.write_vint(payload_length)?;
            } else {
                out.write_vint(delta << 1)?;
            }
            if payload_length > 0 {
                out.write_bytes(payload, 0, payload.len())?;
            }
        } else {
            out.write_vint(delta)?;
        }
        self.positions_added += 1;
        Ok(())
    }

    pub fn finish_doc(&mut self) -> Result<()> {
        if !self.in_doc {
            bail!(IllegalState("finish_doc called outside of a doc".into()));
        }
        let has_positions = self
            .field
            .as_ref()
            .map_or(false, |f| f.index_options.has_positions());
        if has_positions && self.positions_added != self.doc_freq {
            bail!(IllegalArgument(format!(
                "doc {} declared freq {} but {} positions were added",
                self.last_doc, self.doc_freq, self.positions_added
            )));
        }
        self.in_doc = false;
        self.last_position = 0;
        self.last_payload_length = -1;
        Ok(())
    }

    /// Writes the skip data and the dictionary entry of the current term.
    /// Terms without documents leave no trace. Returns the doc freq.
    pub fn finish_term(&mut self) -> Result<i32> {
        if self.in_doc {
            bail!(IllegalState("finish_term called inside a doc".into()));
        }
        let term = match self.term.take() {
            Some(term) => term,
            None => bail!(IllegalState("finish_term called without a term".into())),
        };
        if self.df == 0 {
            return Ok(0);
        }

        let skip_pointer = self.skip_writer.write_skip(&mut self.freq_out)?;
        let ti = TermInfo::new(
            self.df,
            self.freq_start,
            self.prox_start,
            (skip_pointer - self.freq_start) as i32,
        );
        match self.field {
            Some(ref f) => self.terms.add(&f.info, &term, &ti)?,
            None => bail!(IllegalState("no current field".into())),
        }
        Ok(self.df)
    }

    /// Number of terms written so far.
    pub fn num_terms(&self) -> i64 {
        self.terms.size()
    }

    pub fn finish(mut self) -> Result<()> {
        if self.term.is_some() {
            bail!(IllegalState("finish called while a term is open".into()));
        }
        self.freq_out.flush()?;
        if let Some(ref mut out) = self.prox_out {
            out.flush()?;
        }
        self.terms.finish()
    }
}
