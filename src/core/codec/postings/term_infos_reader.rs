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
use std::sync::Arc;

use core::codec::codec_util;
use core::codec::field_infos::FieldInfos;
use core::codec::postings::{
    TermInfo, TermOrder, TERMS_FORMAT_CODEPOINT_ORDER, TERMS_FORMAT_UTF16_ORDER,
    TERMS_HEADER_LENGTH,
};
use core::index::{segment_file_name, TERMS_EXTENSION, TERMS_INDEX_EXTENSION};
use core::store::directory::Directory;
use core::store::io::{DataInput, IndexInput};
use core::store::IOContext;

use error::ErrorKind::{CorruptIndex, IllegalState};
use error::Result;

/// Decoding state of one term dictionary entry stream. Pointers are
/// accumulated from the deltas on disk.
#[derive(Debug, Clone, Default)]
struct TermEntry {
    field_number: u32,
    term: Vec<u8>,
    term_info: TermInfo,
    /// bytes shared with the previous entry
    prefix_len: usize,
}

impl TermEntry {
    fn read<I: DataInput + ?Sized>(&mut self, input: &mut I, skip_interval: i32) -> Result<()> {
        let start = input.read_vint()? as usize;
        let length = input.read_vint()? as usize;
        if start > self.term.len() {
            bail!(CorruptIndex(format!(
                "term prefix {} longer than previous term ({} bytes)",
                start,
                self.term.len()
            )));
        }
        self.term.truncate(start);
        self.term.resize(start + length, 0);
        input.read_bytes(&mut self.term, start, length)?;
        self.field_number = input.read_vint()? as u32;
        self.prefix_len = start;

        let ti = &mut self.term_info;
        ti.doc_freq = input.read_vint()?;
        ti.freq_pointer += input.read_vlong()?;
        ti.prox_pointer += input.read_vlong()?;
        ti.skip_offset = if ti.doc_freq >= skip_interval {
            input.read_vint()?
        } else {
            0
        };
        Ok(())
    }
}

/// The in-memory part of a term dictionary: header values of the .tis file
/// and the whole .tii index. Shared by every enum of the dictionary.
pub struct TermInfosIndex {
    term_order: TermOrder,
    index_interval: i32,
    skip_interval: i32,
    max_skip_levels: i32,
    size: i64,
    field_infos: Arc<FieldInfos>,
    /// rank of each field number when fields are sorted by name
    field_rank: Vec<u32>,
    index_fields: Vec<u32>,
    index_terms: Vec<Vec<u8>>,
    index_infos: Vec<TermInfo>,
    index_pointers: Vec<i64>,
}

impl TermInfosIndex {
    pub fn term_order(&self) -> TermOrder {
        self.term_order
    }

    pub fn index_interval(&self) -> i32 {
        self.index_interval
    }

    pub fn skip_interval(&self) -> i32 {
        self.skip_interval
    }

    pub fn max_skip_levels(&self) -> i32 {
        self.max_skip_levels
    }

    /// Total number of terms in the dictionary.
    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn field_infos(&self) -> &Arc<FieldInfos> {
        &self.field_infos
    }

    fn rank(&self, field_number: u32) -> Result<u32> {
        match self.field_rank.get(field_number as usize) {
            Some(&rank) if rank != u32::max_value() => Ok(rank),
            _ => bail!(CorruptIndex(format!(
                "term dictionary refers to unknown field {}",
                field_number
            ))),
        }
    }

    /// Compares two (field, term) pairs in dictionary order.
    pub fn compare(
        &self,
        field_a: u32,
        term_a: &[u8],
        field_b: u32,
        term_b: &[u8],
    ) -> Result<Ordering> {
        let ord = self.rank(field_a)?.cmp(&self.rank(field_b)?);
        Ok(ord.then_with(|| self.term_order.compare(term_a, term_b)))
    }

    /// Returns the offset of the greatest index entry which is less than or
    /// equal to the term. Entry 0 precedes every term.
    fn index_offset(&self, field_number: u32, term: &[u8]) -> Result<usize> {
        let mut lo = 1isize;
        let mut hi = self.index_terms.len() as isize - 1;
        while hi >= lo {
            let mid = (lo + hi) >> 1;
            let m = mid as usize;
            match self.compare(
                field_number,
                term,
                self.index_fields[m],
                &self.index_terms[m],
            )? {
                Ordering::Less => hi = mid - 1,
                Ordering::Greater => lo = mid + 1,
                Ordering::Equal => return Ok(m),
            }
        }
        Ok(hi.max(0) as usize)
    }
}

/// Enumerates the raw entries of the .tis file in on-disk order.
///
/// Before the first `next()` and after the last entry the enum is not
/// positioned and `term()` returns `None`.
pub struct SegmentTermEnum {
    index: Arc<TermInfosIndex>,
    input: Box<dyn IndexInput>,
    /// ordinal of the current entry in the whole dictionary, -1 before first
    position: i64,
    entry: TermEntry,
}

impl SegmentTermEnum {
    fn new(index: Arc<TermInfosIndex>, mut input: Box<dyn IndexInput>) -> Result<Self> {
        input.seek(TERMS_HEADER_LENGTH)?;
        Ok(SegmentTermEnum {
            index,
            input,
            position: -1,
            entry: TermEntry::default(),
        })
    }

    pub fn index(&self) -> &Arc<TermInfosIndex> {
        &self.index
    }

    pub fn is_positioned(&self) -> bool {
        self.position >= 0 && self.position < self.index.size
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn field_number(&self) -> Option<u32> {
        if self.is_positioned() {
            Some(self.entry.field_number)
        } else {
            None
        }
    }

    pub fn term(&self) -> Option<&[u8]> {
        if self.is_positioned() {
            Some(&self.entry.term)
        } else {
            None
        }
    }

    /// Returns the current term if it belongs to the given field.
    pub fn term_in_field(&self, field_number: u32) -> Option<&[u8]> {
        if self.field_number() == Some(field_number) {
            Some(&self.entry.term)
        } else {
            None
        }
    }

    pub fn term_info(&self) -> &TermInfo {
        &self.entry.term_info
    }

    pub fn doc_freq(&self) -> i32 {
        self.entry.term_info.doc_freq
    }

    /// Number of leading bytes the current term shares with the entry
    /// before it on disk.
    pub fn prefix_len(&self) -> usize {
        self.entry.prefix_len
    }

    /// Increments the enumeration to the next entry. Returns false at the
    /// end of the dictionary.
    pub fn next(&mut self) -> Result<bool> {
        if self.position >= self.index.size - 1 {
            self.position = self.index.size;
            return Ok(false);
        }
        self.entry
            .read(self.input.as_mut(), self.index.skip_interval)?;
        self.position += 1;
        Ok(true)
    }

    fn seek_index(&mut self, offset: usize) -> Result<()> {
        let index = Arc::clone(&self.index);
        self.input.seek(index.index_pointers[offset])?;
        self.position = offset as i64 * i64::from(index.index_interval) - 1;
        self.entry.field_number = index.index_fields[offset];
        self.entry.term.clear();
        self.entry
            .term
            .extend_from_slice(&index.index_terms[offset]);
        self.entry.term_info = index.index_infos[offset];
        self.entry.prefix_len = 0;
        Ok(())
    }

    fn compare_current(&self, field_number: u32, term: &[u8]) -> Result<Ordering> {
        self.index.compare(
            self.entry.field_number,
            &self.entry.term,
            field_number,
            term,
        )
    }

    /// Positions the enum on the first entry greater than or equal to
    /// (field, term). Returns false if there is no such entry.
    pub fn seek_ceil(&mut self, field_number: u32, term: &[u8]) -> Result<bool> {
        let index = Arc::clone(&self.index);
        let mut need_seek = true;
        if self.is_positioned() && self.compare_current(field_number, term)? != Ordering::Greater {
            // the target lies ahead, scan if it is within the current block
            let next_offset = ((self.position + 1) / i64::from(index.index_interval)) as usize + 1;
            if next_offset >= index.index_terms.len()
                || index.compare(
                    field_number,
                    term,
                    index.index_fields[next_offset],
                    &index.index_terms[next_offset],
                )? == Ordering::Less
            {
                need_seek = false;
            }
        }
        if need_seek {
            let offset = index.index_offset(field_number, term)?;
            self.seek_index(offset)?;
        }

        while !self.is_positioned() || self.compare_current(field_number, term)? == Ordering::Less
        {
            if !self.next()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Positions the enum on the entry with the given dictionary ordinal.
    pub fn seek_position(&mut self, position: i64) -> Result<bool> {
        if position < 0 || position >= self.index.size {
            self.position = self.index.size;
            return Ok(false);
        }
        let interval = i64::from(self.index.index_interval);
        let offset = position / interval;
        if !(self.is_positioned()
            && self.position <= position
            && (self.position + 1) / interval == offset)
        {
            self.seek_index(offset as usize)?;
        }
        while self.position < position {
            if !self.next()? {
                bail!(IllegalState(format!("term {} is past the dictionary end", position)));
            }
        }
        Ok(true)
    }
}

fn read_header(input: &mut dyn IndexInput, resource: &str) -> Result<(TermOrder, i32, i32, i32)> {
    let format = codec_util::check_format(
        input,
        resource,
        TERMS_FORMAT_UTF16_ORDER,
        TERMS_FORMAT_CODEPOINT_ORDER,
    )?;
    let index_interval = input.read_int()?;
    let skip_interval = input.read_int()?;
    let max_skip_levels = input.read_int()?;
    if index_interval < 1 || skip_interval < 2 || max_skip_levels < 1 {
        bail!(CorruptIndex(format!(
            "invalid term dictionary header in {}: index interval {}, skip interval {}, \
             max skip levels {}",
            resource, index_interval, skip_interval, max_skip_levels
        )));
    }
    Ok((
        TermOrder::from_format(format)?,
        index_interval,
        skip_interval,
        max_skip_levels,
    ))
}

fn read_size(input: &mut dyn IndexInput) -> Result<i64> {
    let len = input.len() as i64;
    if len < TERMS_HEADER_LENGTH + 8 {
        bail!(CorruptIndex(format!(
            "{} is too short for a term dictionary",
            input.name()
        )));
    }
    input.seek(len - 8)?;
    let size = input.read_long()?;
    input.seek(TERMS_HEADER_LENGTH)?;
    Ok(size)
}

/// Reads a segment's term dictionary. The .tii index is loaded into memory,
/// the .tis entries are read through clones of one input.
pub struct TermInfosReader {
    index: Arc<TermInfosIndex>,
    tis: Box<dyn IndexInput>,
}

impl TermInfosReader {
    pub fn open<D: Directory>(
        directory: &D,
        segment: &str,
        field_infos: Arc<FieldInfos>,
        context: &IOContext,
    ) -> Result<TermInfosReader> {
        let tis_name = segment_file_name(segment, "", TERMS_EXTENSION);
        let tii_name = segment_file_name(segment, "", TERMS_INDEX_EXTENSION);

        let mut tis = directory.open_input(&tis_name, context)?;
        let (term_order, index_interval, skip_interval, max_skip_levels) =
            read_header(tis.as_mut(), &tis_name)?;
        let size = read_size(tis.as_mut())?;

        let mut tii = directory.open_input(&tii_name, context)?;
        let (index_order, ..) = read_header(tii.as_mut(), &tii_name)?;
        if index_order != term_order {
            bail!(CorruptIndex(format!(
                "{} and {} disagree on the term order",
                tis_name, tii_name
            )));
        }
        let index_size = read_size(tii.as_mut())?;

        let max_number = field_infos.iter().map(|fi| fi.number).max();
        let mut field_rank = vec![u32::max_value(); max_number.map_or(0, |n| n as usize + 1)];
        let mut names: Vec<(&str, u32)> = field_infos
            .iter()
            .map(|fi| (fi.name.as_str(), fi.number))
            .collect();
        names.sort();
        for (rank, &(_, number)) in names.iter().enumerate() {
            field_rank[number as usize] = rank as u32;
        }

        let capacity = index_size.max(0) as usize;
        let mut index_fields = Vec::with_capacity(capacity);
        let mut index_terms = Vec::with_capacity(capacity);
        let mut index_infos = Vec::with_capacity(capacity);
        let mut index_pointers = Vec::with_capacity(capacity);
        let mut entry = TermEntry::default();
        let mut index_pointer = 0i64;
        for _ in 0..index_size {
            entry.read(tii.as_mut(), skip_interval)?;
            index_pointer += tii.read_vlong()?;
            index_fields.push(entry.field_number);
            index_terms.push(entry.term.clone());
            index_infos.push(entry.term_info);
            index_pointers.push(index_pointer);
        }
        if index_terms.is_empty() {
            bail!(CorruptIndex(format!("{} has no entries", tii_name)));
        }

        let index = TermInfosIndex {
            term_order,
            index_interval,
            skip_interval,
            max_skip_levels,
            size,
            field_infos,
            field_rank,
            index_fields,
            index_terms,
            index_infos,
            index_pointers,
        };
        // entry 0 is the marker before the first term
        for i in 1..index.index_fields.len() {
            index.rank(index.index_fields[i])?;
        }
        debug!(
            "opened term dictionary {} with {} terms, {} index entries, {:?} order",
            tis_name,
            size,
            index.index_terms.len(),
            term_order
        );

        Ok(TermInfosReader {
            index: Arc::new(index),
            tis,
        })
    }

    pub fn index(&self) -> &Arc<TermInfosIndex> {
        &self.index
    }

    pub fn term_order(&self) -> TermOrder {
        self.index.term_order
    }

    pub fn size(&self) -> i64 {
        self.index.size
    }

    /// Returns an enum positioned before the first term.
    pub fn terms(&self) -> Result<SegmentTermEnum> {
        SegmentTermEnum::new(Arc::clone(&self.index), self.tis.as_ref().clone()?)
    }

    /// Returns the `TermInfo` of the exact term, if present.
    pub fn get(&self, field_number: u32, term: &[u8]) -> Result<Option<TermInfo>> {
        let mut terms = self.terms()?;
        if terms.seek_ceil(field_number, term)?
            && terms.term_in_field(field_number) == Some(term)
        {
            Ok(Some(*terms.term_info()))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::codec::field_infos::{FieldInfo, FieldInfosBuilder};
    use core::codec::postings::{TermInfosWriter, TermsConfig};
    use core::index::IndexOptions;
    use core::store::directory::RAMDirectory;
    use core::store::IO_CONTEXT_READ;

    fn field_infos() -> Arc<FieldInfos> {
        let mut builder = FieldInfosBuilder::new();
        // numbering deliberately differs from name order
        builder
            .add("title", true, IndexOptions::DocsAndFreqsAndPositions, false, false)
            .unwrap();
        builder
            .add("body", true, IndexOptions::DocsAndFreqsAndPositions, false, false)
            .unwrap();
        Arc::new(builder.finish().unwrap())
    }

    fn body_terms() -> Vec<Vec<u8>> {
        (0..20).map(|i| format!("t{:02}", i * 2).into_bytes()).collect()
    }

    fn write(dir: &RAMDirectory, infos: &FieldInfos, index_interval: i32) {
        let mut config = TermsConfig::default();
        config
            .set_index_interval(index_interval)
            .unwrap()
            .set_skip_interval(4)
            .unwrap();
        let mut writer = TermInfosWriter::new(dir, "_0", &config, &IOContext::Default).unwrap();
        let body: &FieldInfo = infos.field_info_by_name("body").unwrap();
        let title: &FieldInfo = infos.field_info_by_name("title").unwrap();
        for (i, term) in body_terms().iter().enumerate() {
            let i = i as i32;
            let ti = TermInfo::new(i + 1, i64::from(i) * 10, i64::from(i) * 20, i * 3);
            writer.add(body, term, &ti).unwrap();
        }
        writer
            .add(title, b"alpha", &TermInfo::new(1, 300, 500, 0))
            .unwrap();
        writer
            .add(title, b"beta", &TermInfo::new(2, 310, 520, 0))
            .unwrap();
        writer.finish().unwrap();
    }

    fn open(index_interval: i32) -> TermInfosReader {
        let dir = RAMDirectory::new();
        let infos = field_infos();
        write(&dir, &infos, index_interval);
        TermInfosReader::open(&dir, "_0", infos, &IO_CONTEXT_READ).unwrap()
    }

    #[test]
    fn test_enumerate_all() {
        let reader = open(3);
        assert_eq!(reader.size(), 22);
        let mut terms = reader.terms().unwrap();
        assert!(terms.term().is_none());
        for (i, expected) in body_terms().iter().enumerate() {
            assert!(terms.next().unwrap());
            assert_eq!(terms.position(), i as i64);
            assert_eq!(terms.field_number(), Some(1));
            assert_eq!(terms.term().unwrap(), &expected[..]);
            let ti = terms.term_info();
            assert_eq!(ti.doc_freq, i as i32 + 1);
            assert_eq!(ti.freq_pointer, i as i64 * 10);
            assert_eq!(ti.prox_pointer, i as i64 * 20);
            // only written for terms at or above the skip interval
            let expected_skip = if i + 1 >= 4 { i as i32 * 3 } else { 0 };
            assert_eq!(ti.skip_offset, expected_skip);
        }
        assert!(terms.next().unwrap());
        assert_eq!(terms.term_in_field(0), Some(&b"alpha"[..]));
        assert!(terms.next().unwrap());
        assert_eq!(terms.term_info().freq_pointer, 310);
        assert!(!terms.next().unwrap());
        assert!(terms.term().is_none());
        assert!(!terms.next().unwrap());
    }

    #[test]
    fn test_get() {
        for &interval in &[1, 2, 3, 128] {
            let reader = open(interval);
            for (i, term) in body_terms().iter().enumerate() {
                let ti = reader.get(1, term).unwrap().unwrap();
                assert_eq!(ti.doc_freq, i as i32 + 1, "interval {}", interval);
            }
            assert_eq!(reader.get(0, b"beta").unwrap().unwrap().prox_pointer, 520);
            assert!(reader.get(1, b"t01").unwrap().is_none());
            assert!(reader.get(0, b"t00").unwrap().is_none());
            assert!(reader.get(0, b"zzz").unwrap().is_none());
        }
    }

    #[test]
    fn test_seek_ceil() {
        let reader = open(4);
        let mut terms = reader.terms().unwrap();
        assert!(terms.seek_ceil(1, b"t07").unwrap());
        assert_eq!(terms.term().unwrap(), b"t08");
        assert_eq!(terms.position(), 4);

        // forward within and across blocks, then backwards
        assert!(terms.seek_ceil(1, b"t09").unwrap());
        assert_eq!(terms.term().unwrap(), b"t10");
        assert!(terms.seek_ceil(1, b"t30").unwrap());
        assert_eq!(terms.term().unwrap(), b"t30");
        assert!(terms.seek_ceil(1, b"t02").unwrap());
        assert_eq!(terms.term().unwrap(), b"t02");

        // past the last body term lands on the next field
        assert!(terms.seek_ceil(1, b"u").unwrap());
        assert_eq!(terms.field_number(), Some(0));
        assert_eq!(terms.term().unwrap(), b"alpha");
        assert!(terms.seek_ceil(1, b"").unwrap());
        assert_eq!(terms.term().unwrap(), b"t00");
        assert!(!terms.seek_ceil(0, b"c").unwrap());
        assert!(terms.term().is_none());
    }

    #[test]
    fn test_seek_position() {
        let reader = open(3);
        let mut terms = reader.terms().unwrap();
        for &pos in &[7i64, 0, 21, 8, 2, 3, 20] {
            assert!(terms.seek_position(pos).unwrap());
            assert_eq!(terms.position(), pos);
            let mut expected = reader.terms().unwrap();
            for _ in 0..=pos {
                expected.next().unwrap();
            }
            assert_eq!(terms.term(), expected.term());
            assert_eq!(terms.term_info(), expected.term_info());
        }
        assert!(!terms.seek_position(22).unwrap());
        assert!(!terms.seek_position(-1).unwrap());
    }
}
