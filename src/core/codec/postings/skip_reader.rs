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

use std::io::Read;
use std::sync::Arc;

use core::store::io::{ByteArrayDataInput, ByteArrayRef, DataInput, IndexInput};
use core::util::{log, DocId};

use error::ErrorKind::IllegalState;
use error::Result;

/// Reads the multi-level skip lists written by `SkipListWriter`.
///
/// The top level is buffered in memory, the lower levels are read through
/// clones of the .frq input.
pub struct SkipListReader {
    /// the maximum number of skip levels possible for this index
    max_number_of_skip_levels: usize,
    /// number of levels in this skip list
    number_of_skip_levels: usize,
    /// number of top levels to buffer in memory
    number_of_levels_to_buffer: usize,
    doc_count: i32,
    have_skipped: bool,

    /// skip stream for each level
    skip_stream: Vec<Option<Box<dyn IndexInput>>>,
    /// the start pointer of each skip level
    skip_pointer: Vec<i64>,
    /// skip interval of each level
    skip_interval: Vec<i64>,
    /// number of docs skipped per level
    num_skipped: Vec<i64>,
    /// doc id of current skip entry per level
    skip_doc: Vec<DocId>,
    /// doc id of last read skip entry with doc id <= target
    last_doc: DocId,
    /// child pointer of current skip entry per level
    child_pointer: Vec<i64>,
    /// child pointer of last read skip entry with doc id <= target
    last_child_pointer: i64,

    current_field_stores_payloads: bool,
    freq_pointer: Vec<i64>,
    prox_pointer: Vec<i64>,
    payload_length: Vec<i32>,

    last_freq_pointer: i64,
    last_prox_pointer: i64,
    last_payload_length: i32,
}

impl SkipListReader {
    pub fn new(
        skip_stream: Box<dyn IndexInput>,
        max_skip_levels: usize,
        skip_interval: i32,
    ) -> SkipListReader {
        debug_assert!(max_skip_levels > 0);
        let mut skip_intervals = Vec::with_capacity(max_skip_levels);
        let mut skip_streams = Vec::with_capacity(max_skip_levels);
        skip_intervals.push(i64::from(skip_interval));
        skip_streams.push(Some(skip_stream));
        for i in 1..max_skip_levels {
            // cache skip intervals
            let last_interval = skip_intervals[i - 1];
            skip_intervals.push(last_interval * i64::from(skip_interval));
            skip_streams.push(None);
        }

        SkipListReader {
            max_number_of_skip_levels: max_skip_levels,
            number_of_skip_levels: 0,
            number_of_levels_to_buffer: 1,
            doc_count: 0,
            have_skipped: false,
            skip_stream: skip_streams,
            skip_pointer: vec![0; max_skip_levels],
            skip_interval: skip_intervals,
            num_skipped: vec![0; max_skip_levels],
            skip_doc: vec![0; max_skip_levels],
            last_doc: 0,
            child_pointer: vec![0; max_skip_levels],
            last_child_pointer: 0,
            current_field_stores_payloads: false,
            freq_pointer: vec![0; max_skip_levels],
            prox_pointer: vec![0; max_skip_levels],
            payload_length: vec![0; max_skip_levels],
            last_freq_pointer: 0,
            last_prox_pointer: 0,
            last_payload_length: 0,
        }
    }

    /// Positions the reader on the skip list of a term. Nothing is read
    /// until the first `skip_to`.
    pub fn init(
        &mut self,
        skip_pointer: i64,
        freq_base_pointer: i64,
        prox_base_pointer: i64,
        df: i32,
        stores_payloads: bool,
    ) {
        self.skip_pointer[0] = skip_pointer;
        self.doc_count = df;
        for v in &mut self.skip_doc {
            *v = 0;
        }
        for v in &mut self.num_skipped {
            *v = 0;
        }
        for v in &mut self.child_pointer {
            *v = 0;
        }
        self.have_skipped = false;
        for stream in self.skip_stream.iter_mut().skip(1) {
            *stream = None;
        }

        self.current_field_stores_payloads = stores_payloads;
        self.last_freq_pointer = freq_base_pointer;
        self.last_prox_pointer = prox_base_pointer;
        for v in &mut self.freq_pointer {
            *v = freq_base_pointer;
        }
        for v in &mut self.prox_pointer {
            *v = prox_base_pointer;
        }
        for v in &mut self.payload_length {
            *v = 0;
        }
    }

    /// Returns the id of the doc to which the last call of `skip_to` has
    /// skipped.
    pub fn doc(&self) -> DocId {
        self.last_doc
    }

    /// The .frq file pointer of the doc `doc()` is the last doc before.
    pub fn freq_pointer(&self) -> i64 {
        self.last_freq_pointer
    }

    pub fn prox_pointer(&self) -> i64 {
        self.last_prox_pointer
    }

    pub fn payload_length(&self) -> i32 {
        self.last_payload_length
    }

    /// Skips entries to the first beyond the current whose document number
    /// is greater than or equal to `target`. Returns the number of documents
    /// of the posting list that precede the skip point.
    pub fn skip_to(&mut self, target: DocId) -> Result<i32> {
        if !self.have_skipped {
            self.load_skip_levels()?;
            self.have_skipped = true;
        }

        // walk up the levels until highest level is found that has a skip
        // for this target
        let mut level = 0usize;
        while level + 1 < self.number_of_skip_levels && target > self.skip_doc[level + 1] {
            level += 1;
        }

        loop {
            if target > self.skip_doc[level] {
                if !self.load_next_skip(level)? {
                    continue;
                }
            } else {
                // no more skips on this level, go down one level
                if level == 0 {
                    break;
                }
                if self.last_child_pointer > self.stream(level - 1)?.file_pointer() {
                    self.seek_child(level - 1)?;
                }
                level -= 1;
            }
        }

        Ok((self.num_skipped[0] - self.skip_interval[0] - 1) as i32)
    }

    fn stream(&mut self, level: usize) -> Result<&mut dyn IndexInput> {
        match self.skip_stream[level] {
            Some(ref mut stream) => Ok(stream.as_mut()),
            None => bail!(IllegalState(format!("skip level {} is not loaded", level))),
        }
    }

    fn load_next_skip(&mut self, level: usize) -> Result<bool> {
        // we have to skip, the target document is greater than the current
        // skip list entry
        self.set_last_skip_data(level);

        self.num_skipped[level] += self.skip_interval[level];
        if self.num_skipped[level] > i64::from(self.doc_count) {
            // this skip list is exhausted
            self.skip_doc[level] = DocId::max_value();
            if self.number_of_skip_levels > level {
                self.number_of_skip_levels = level;
            }
            return Ok(false);
        }

        // read next skip entry
        self.skip_doc[level] += self.read_skip_data(level)?;

        if level != 0 {
            // read the child pointer if we are not on the leaf level
            self.child_pointer[level] =
                self.stream(level)?.read_vlong()? + self.skip_pointer[level - 1];
        }
        Ok(true)
    }

    /// Seeks the skip entry on the given level
    fn seek_child(&mut self, level: usize) -> Result<()> {
        let last_child_pointer = self.last_child_pointer;
        self.stream(level)?.seek(last_child_pointer)?;
        self.num_skipped[level] = self.num_skipped[level + 1] - self.skip_interval[level + 1];
        self.skip_doc[level] = self.last_doc;
        if level > 0 {
            self.child_pointer[level] =
                self.stream(level)?.read_vlong()? + self.skip_pointer[level - 1];
        }

        self.freq_pointer[level] = self.last_freq_pointer;
        self.prox_pointer[level] = self.last_prox_pointer;
        self.payload_length[level] = self.last_payload_length;
        Ok(())
    }

    fn set_last_skip_data(&mut self, level: usize) {
        self.last_doc = self.skip_doc[level];
        self.last_child_pointer = self.child_pointer[level];
        self.last_freq_pointer = self.freq_pointer[level];
        self.last_prox_pointer = self.prox_pointer[level];
        self.last_payload_length = self.payload_length[level];
    }

    fn read_skip_data(&mut self, level: usize) -> Result<i32> {
        let stores_payloads = self.current_field_stores_payloads;
        let (delta, payload_length, freq_delta, prox_delta) = {
            let stream = self.stream(level)?;
            let mut delta = stream.read_vint()?;
            let mut payload_length = None;
            if stores_payloads {
                if (delta & 1) != 0 {
                    payload_length = Some(stream.read_vint()?);
                }
                delta = ((delta as u32) >> 1) as i32;
            }
            let freq_delta = stream.read_vint()?;
            let prox_delta = stream.read_vint()?;
            (delta, payload_length, freq_delta, prox_delta)
        };

        if let Some(length) = payload_length {
            self.payload_length[level] = length;
        }
        self.freq_pointer[level] += i64::from(freq_delta);
        self.prox_pointer[level] += i64::from(prox_delta);
        Ok(delta)
    }

    /// Loads the skip levels
    fn load_skip_levels(&mut self) -> Result<()> {
        self.number_of_skip_levels = if self.doc_count <= 0 {
            0
        } else {
            log(i64::from(self.doc_count), self.skip_interval[0] as i32) as usize
        };
        if self.number_of_skip_levels > self.max_number_of_skip_levels {
            self.number_of_skip_levels = self.max_number_of_skip_levels;
        }

        let skip_pointer = self.skip_pointer[0];
        self.stream(0)?.seek(skip_pointer)?;

        let mut to_buffer = self.number_of_levels_to_buffer;
        for i in (1..self.number_of_skip_levels).rev() {
            // the length of the current level
            let length = self.stream(0)?.read_vlong()?;

            // the start pointer of the current level
            self.skip_pointer[i] = self.stream(0)?.file_pointer();
            if to_buffer > 0 {
                // buffer this level
                let stream = self.stream(0)?;
                let pointer = stream.file_pointer();
                let mut data = vec![0u8; length as usize];
                stream.read_exact(&mut data)?;
                let buffer =
                    ByteArrayDataInput::with_base(ByteArrayRef::new(Arc::new(data)), pointer);
                self.skip_stream[i] = Some(Box::new(buffer));
                to_buffer -= 1;
            } else {
                // clone this stream, it is already at the start of the current level
                let stream = IndexInput::clone(self.stream(0)?)?;
                self.skip_stream[i] = Some(stream);

                // move base stream beyond the current level
                let base = self.stream(0)?;
                let fp = base.file_pointer();
                base.seek(fp + length)?;
            }
        }

        // use base stream for the lowest level
        self.skip_pointer[0] = self.stream(0)?.file_pointer();
        Ok(())
    }
}
