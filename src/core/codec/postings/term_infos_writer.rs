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

use std::cmp::Ordering;
use std::io::Write;

use core::codec::codec_util;
use core::codec::field_infos::FieldInfo;
use core::codec::postings::{TermInfo, TermOrder, TermsConfig};
use core::index::{segment_file_name, TERMS_EXTENSION, TERMS_INDEX_EXTENSION};
use core::store::directory::Directory;
use core::store::io::{DataOutput, IndexOutput};
use core::store::IOContext;
use core::util::string_util::bytes_difference;

use error::ErrorKind::IllegalArgument;
use error::Result;

/// Size of the header shared by .tis and .tii: format, index interval, skip
/// interval and max skip levels.
pub const TERMS_HEADER_LENGTH: i64 = 16;

/// One of the two entry streams of the term dictionary.
struct TermEntryOutput<O: IndexOutput> {
    output: O,
    is_index: bool,
    last_term: Vec<u8>,
    last_ti: TermInfo,
    size: i64,
    /// .tis pointer of the previous index entry, only used by the .tii
    last_index_pointer: i64,
}

impl<O: IndexOutput> TermEntryOutput<O> {
    fn new(mut output: O, is_index: bool, config: &TermsConfig) -> Result<Self> {
        codec_util::write_format(&mut output, config.term_order.format())?;
        output.write_int(config.index_interval)?;
        output.write_int(config.skip_interval)?;
        output.write_int(config.max_skip_levels)?;
        Ok(TermEntryOutput {
            output,
            is_index,
            last_term: Vec::new(),
            last_ti: TermInfo::default(),
            size: 0,
            last_index_pointer: 0,
        })
    }

    fn add(
        &mut self,
        field_number: u32,
        term: &[u8],
        ti: &TermInfo,
        skip_interval: i32,
        tis_pointer: i64,
    ) -> Result<()> {
        debug_assert!(ti.freq_pointer >= self.last_ti.freq_pointer);
        debug_assert!(ti.prox_pointer >= self.last_ti.prox_pointer);

        let start = bytes_difference(&self.last_term, term);
        let length = term.len() - start;
        self.output.write_vint(start as i32)?;
        self.output.write_vint(length as i32)?;
        self.output.write_bytes(term, start, length)?;
        self.output.write_vint(field_number as i32)?;

        self.output.write_vint(ti.doc_freq)?;
        self.output
            .write_vlong(ti.freq_pointer - self.last_ti.freq_pointer)?;
        self.output
            .write_vlong(ti.prox_pointer - self.last_ti.prox_pointer)?;
        if ti.doc_freq >= skip_interval {
            self.output.write_vint(ti.skip_offset)?;
        }

        if self.is_index {
            self.output.write_vlong(tis_pointer - self.last_index_pointer)?;
            self.last_index_pointer = tis_pointer;
        }

        self.last_term.clear();
        self.last_term.extend_from_slice(term);
        self.last_ti = *ti;
        self.size += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.output.write_long(self.size)?;
        self.output.flush()?;
        Ok(())
    }
}

/// Writes the term dictionary of a segment: every term to the .tis file and
/// every `index_interval`-th term to the .tii file.
///
/// Terms must be added sorted by field name, then by term under the
/// configured `TermOrder`.
pub struct TermInfosWriter<O: IndexOutput> {
    config: TermsConfig,
    tis: TermEntryOutput<O>,
    tii: TermEntryOutput<O>,
    last_field: Option<(String, u32)>,
    last_tis_field_number: u32,
}

impl<O: IndexOutput> TermInfosWriter<O> {
    pub fn new<D>(
        directory: &D,
        segment: &str,
        config: &TermsConfig,
        context: &IOContext,
    ) -> Result<TermInfosWriter<O>>
    where
        D: Directory<IndexOutput = O>,
    {
        config.validate()?;
        let tis_name = segment_file_name(segment, "", TERMS_EXTENSION);
        let tii_name = segment_file_name(segment, "", TERMS_INDEX_EXTENSION);
        let tis = TermEntryOutput::new(directory.create_output(&tis_name, context)?, false, config)?;
        let tii = TermEntryOutput::new(directory.create_output(&tii_name, context)?, true, config)?;
        Ok(TermInfosWriter {
            config: config.clone(),
            tis,
            tii,
            last_field: None,
            last_tis_field_number: 0,
        })
    }

    pub fn term_order(&self) -> TermOrder {
        self.config.term_order
    }

    /// Number of terms written so far.
    pub fn size(&self) -> i64 {
        self.tis.size
    }

    /// Adds a new term with the given `TermInfo`. Terms that don't come
    /// strictly after the previously added term are rejected.
    pub fn add(&mut self, field: &FieldInfo, term: &[u8], ti: &TermInfo) -> Result<()> {
        self.check_order(field, term)?;

        if self.tis.size % i64::from(self.config.index_interval) == 0 {
            // index entries hold the state preceding the entry they point
            // at; the first one is an empty marker before all terms
            let tis_pointer = self.tis.output.file_pointer();
            let last_term = self.tis.last_term.clone();
            let last_ti = self.tis.last_ti;
            self.tii.add(
                self.last_tis_field_number,
                &last_term,
                &last_ti,
                self.config.skip_interval,
                tis_pointer,
            )?;
        }

        self.tis
            .add(field.number, term, ti, self.config.skip_interval, 0)?;
        self.last_tis_field_number = field.number;
        Ok(())
    }

    fn check_order(&mut self, field: &FieldInfo, term: &[u8]) -> Result<()> {
        if let Some((ref name, number)) = self.last_field {
            match name.as_str().cmp(field.name.as_str()) {
                Ordering::Greater => bail!(IllegalArgument(format!(
                    "fields must be added in order: {} after {}",
                    field.name, name
                ))),
                Ordering::Equal => {
                    debug_assert_eq!(number, field.number);
                    if self.config.term_order.compare(&self.tis.last_term, term)
                        != Ordering::Less
                    {
                        bail!(IllegalArgument(format!(
                            "terms out of order for field {}: {:?} after {:?}",
                            field.name,
                            String::from_utf8_lossy(term),
                            String::from_utf8_lossy(&self.tis.last_term)
                        )));
                    }
                    return Ok(());
                }
                Ordering::Less => {}
            }
        }
        self.last_field = Some((field.name.clone(), field.number));
        Ok(())
    }

    /// Writes the term counts and closes both files.
    pub fn finish(self) -> Result<()> {
        self.tis.finish()?;
        self.tii.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::index::IndexOptions;
    use core::store::directory::RAMDirectory;
    use core::store::io::DataInput;
    use core::store::IO_CONTEXT_READ;

    use std::io::Read;

    fn field(name: &str, number: u32) -> FieldInfo {
        FieldInfo::new(
            name.to_string(),
            number,
            true,
            IndexOptions::DocsAndFreqsAndPositions,
            false,
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_out_of_order_terms() {
        let dir = RAMDirectory::new();
        let config = TermsConfig::default();
        let mut writer = TermInfosWriter::new(&dir, "_0", &config, &IOContext::Default).unwrap();
        let body = field("body", 0);
        let title = field("title", 1);
        let ti = TermInfo::new(1, 0, 0, 0);
        writer.add(&body, b"apple", &ti).unwrap();
        writer.add(&body, b"banana", &ti).unwrap();
        assert!(writer.add(&body, b"banana", &ti).is_err());
        assert!(writer.add(&body, b"aardvark", &ti).is_err());
        writer.add(&title, b"aardvark", &ti).unwrap();
        assert!(writer.add(&body, b"zebra", &ti).is_err());
    }

    #[test]
    fn test_layout() {
        let dir = RAMDirectory::new();
        let mut config = TermsConfig::default();
        config.set_index_interval(2).unwrap();
        let mut writer = TermInfosWriter::new(&dir, "_1", &config, &IOContext::Default).unwrap();
        let body = field("body", 3);
        writer.add(&body, b"ab", &TermInfo::new(1, 0, 0, 0)).unwrap();
        writer.add(&body, b"ac", &TermInfo::new(2, 5, 7, 0)).unwrap();
        writer.add(&body, b"b", &TermInfo::new(1, 9, 9, 0)).unwrap();
        assert_eq!(writer.size(), 3);
        writer.finish().unwrap();

        let mut tis = dir.open_input("_1.tis", &IO_CONTEXT_READ).unwrap();
        assert_eq!(tis.read_int().unwrap(), TermOrder::CodePoint.format());
        assert_eq!(tis.read_int().unwrap(), 2);
        assert_eq!(tis.read_int().unwrap(), 16);
        assert_eq!(tis.read_int().unwrap(), 10);
        // "ab": no prefix, suffix "ab", field 3, df 1, pointers 0
        let mut entry = [0u8; 8];
        tis.read_exact(&mut entry).unwrap();
        assert_eq!(entry, [0, 2, b'a', b'b', 3, 1, 0, 0]);
        // "ac": shares "a"
        let mut entry = [0u8; 7];
        tis.read_exact(&mut entry).unwrap();
        assert_eq!(entry, [1, 1, b'c', 3, 2, 5, 7]);
        let len = tis.len() as i64;
        tis.seek(len - 8).unwrap();
        assert_eq!(tis.read_long().unwrap(), 3);

        // marker entry plus the entry before "b"
        let mut tii = dir.open_input("_1.tii", &IO_CONTEXT_READ).unwrap();
        let len = tii.len() as i64;
        tii.seek(len - 8).unwrap();
        assert_eq!(tii.read_long().unwrap(), 2);
        tii.seek(TERMS_HEADER_LENGTH).unwrap();
        let mut marker = [0u8; 7];
        tii.read_exact(&mut marker).unwrap();
        assert_eq!(marker, [0, 0, 0, 0, 0, 0, TERMS_HEADER_LENGTH as u8]);
    }
}
