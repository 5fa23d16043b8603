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

use std::cmp::min;

use core::store::io::{DataOutput, IndexOutput, RAMOutputStream};
use core::util::{log, DocId};

use error::Result;

/// Writes multi-level skip lists for the postings of a term.
///
/// Level 0 gets an entry every `skip_interval` documents, level `i` every
/// `skip_interval^(i+1)` documents. Each entry of a level above 0 carries a
/// pointer to the matching entry of the level below.
///
/// Assume that docFreq = 35, skipInterval = 16
///
///  d d d d d d d d d d d d d d d d d d d d d d d d d d d d d d d d d d d
///                                ^                               ^
///                                (level 0 skip points)
///
/// An entry records the last document before the skip point, its payload
/// length when the field stores payloads, and the .frq and .prx file
/// pointers at the skip point.
pub struct SkipListWriter {
    last_skip_doc: Vec<DocId>,
    last_skip_payload_length: Vec<i32>,
    last_skip_freq_pointer: Vec<i64>,
    last_skip_prox_pointer: Vec<i64>,

    cur_doc: DocId,
    cur_store_payloads: bool,
    cur_payload_length: i32,
    cur_freq_pointer: i64,
    cur_prox_pointer: i64,

    /// number of levels in this skip list
    number_of_skip_levels: usize,
    /// the skip interval in the list with level = 0
    skip_interval: i32,
    /// for every skip level a different buffer is used
    skip_buffer: Vec<RAMOutputStream>,
}

impl SkipListWriter {
    /// `doc_count` bounds the doc freq of every term the writer will see,
    /// normally the number of documents in the segment.
    pub fn new(skip_interval: i32, max_skip_levels: i32, doc_count: i32) -> Self {
        debug_assert!(skip_interval > 1);
        let number_of_skip_levels = if doc_count <= 0 {
            0
        } else {
            min(log(doc_count as i64, skip_interval), max_skip_levels) as usize
        };

        SkipListWriter {
            last_skip_doc: vec![0; number_of_skip_levels],
            last_skip_payload_length: vec![-1; number_of_skip_levels],
            last_skip_freq_pointer: vec![0; number_of_skip_levels],
            last_skip_prox_pointer: vec![0; number_of_skip_levels],
            cur_doc: 0,
            cur_store_payloads: false,
            cur_payload_length: 0,
            cur_freq_pointer: 0,
            cur_prox_pointer: 0,
            number_of_skip_levels,
            skip_interval,
            skip_buffer: (0..number_of_skip_levels)
                .map(|_| RAMOutputStream::new(false))
                .collect(),
        }
    }

    pub fn number_of_skip_levels(&self) -> usize {
        self.number_of_skip_levels
    }

    /// Sets the values for the current skip data.
    pub fn set_skip_data(
        &mut self,
        doc: DocId,
        store_payloads: bool,
        payload_length: i32,
        freq_pointer: i64,
        prox_pointer: i64,
    ) {
        self.cur_doc = doc;
        self.cur_store_payloads = store_payloads;
        self.cur_payload_length = payload_length;
        self.cur_freq_pointer = freq_pointer;
        self.cur_prox_pointer = prox_pointer;
    }

    /// Starts the skip list of a new term whose postings begin at the given
    /// file pointers.
    pub fn reset_skip(&mut self, freq_pointer: i64, prox_pointer: i64) {
        for buf in &mut self.skip_buffer {
            buf.reset();
        }
        for v in &mut self.last_skip_doc {
            *v = 0;
        }
        for v in &mut self.last_skip_payload_length {
            // we don't have to write the first length in the skip list
            *v = -1;
        }
        for v in &mut self.last_skip_freq_pointer {
            *v = freq_pointer;
        }
        for v in &mut self.last_skip_prox_pointer {
            *v = prox_pointer;
        }
    }

    /// Writes the current skip data to the buffers. The current document
    /// frequency determines the max level the skip data is written to.
    pub fn buffer_skip(&mut self, df: i32) -> Result<()> {
        debug_assert_eq!(df % self.skip_interval, 0);
        let mut num_levels = 0;
        let mut df = df;
        while df % self.skip_interval == 0 && num_levels < self.number_of_skip_levels {
            num_levels += 1;
            df /= self.skip_interval;
        }

        let mut child_pointer = 0;
        for level in 0..num_levels {
            self.write_skip_data(level)?;

            let new_child_pointer = self.skip_buffer[level].file_pointer();
            if level != 0 {
                // store child pointers for all levels except the lowest
                self.skip_buffer[level].write_vlong(child_pointer)?;
            }

            // remember the child pointer for the next level
            child_pointer = new_child_pointer;
        }

        Ok(())
    }

    /// Writes the buffered skip lists to the given output and returns the
    /// file pointer the skip data starts at.
    pub fn write_skip(&self, output: &mut impl IndexOutput) -> Result<i64> {
        let skip_pointer = output.file_pointer();
        if self.skip_buffer.is_empty() {
            return Ok(skip_pointer);
        }

        for level in (1..self.number_of_skip_levels).rev() {
            let length = self.skip_buffer[level].file_pointer();
            if length > 0 {
                output.write_vlong(length)?;
                self.skip_buffer[level].write_to(output)?;
            }
        }
        self.skip_buffer[0].write_to(output)?;
        Ok(skip_pointer)
    }

    fn write_skip_data(&mut self, level: usize) -> Result<()> {
        let delta = self.cur_doc - self.last_skip_doc[level];
        let buffer = &mut self.skip_buffer[level];
        if self.cur_store_payloads {
            // the low bit flags a changed payload length
            if self.cur_payload_length == self.last_skip_payload_length[level] {
                buffer.write_vint(delta << 1)?;
            } else {
                buffer.write_vint((delta << 1) | 1)?;
                buffer.write_vint(self.cur_payload_length)?;
                self.last_skip_payload_length[level] = self.cur_payload_length;
            }
        } else {
            buffer.write_vint(delta)?;
        }
        buffer.write_vint((self.cur_freq_pointer - self.last_skip_freq_pointer[level]) as i32)?;
        buffer.write_vint((self.cur_prox_pointer - self.last_skip_prox_pointer[level]) as i32)?;

        self.last_skip_doc[level] = self.cur_doc;
        self.last_skip_freq_pointer[level] = self.cur_freq_pointer;
        self.last_skip_prox_pointer[level] = self.cur_prox_pointer;
        Ok(())
    }
}
