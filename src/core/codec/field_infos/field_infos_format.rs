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
use core::index::{segment_file_name, IndexOptions, FIELD_INFOS_EXTENSION};
use core::store::directory::Directory;
use core::store::io::{DataInput, DataOutput};
use core::store::IOContext;
use error::Result;

pub const FIELD_INFOS_FORMAT_CURRENT: i32 = 1;

const IS_INDEXED: u8 = 0x1;
const STORE_TERM_VECTOR: u8 = 0x2;
const STORE_PAYLOADS: u8 = 0x20;
const OMIT_TERM_FREQ_AND_POSITIONS: u8 = 0x40;
const OMIT_POSITIONS: u8 = 0x80;

fn field_bits(fi: &FieldInfo) -> u8 {
    let mut bits = 0u8;
    if fi.is_indexed {
        bits |= IS_INDEXED;
        if fi.has_store_term_vector {
            bits |= STORE_TERM_VECTOR;
        }
        if fi.has_store_payloads {
            bits |= STORE_PAYLOADS;
        }
        match fi.index_options {
            IndexOptions::Docs => bits |= OMIT_TERM_FREQ_AND_POSITIONS,
            IndexOptions::DocsAndFreqs => bits |= OMIT_POSITIONS,
            IndexOptions::DocsAndFreqsAndPositions => {}
        }
    }
    bits
}

/// Writes `<segment>.fnm`: format, field count, then name and flags per
/// field in field number order.
pub fn write_field_infos<D: Directory>(
    directory: &D,
    segment: &str,
    infos: &FieldInfos,
    context: &IOContext,
) -> Result<()> {
    let file_name = segment_file_name(segment, "", FIELD_INFOS_EXTENSION);
    let mut output = directory.create_output(&file_name, context)?;
    codec_util::write_format(&mut output, FIELD_INFOS_FORMAT_CURRENT)?;
    output.write_vint(infos.len() as i32)?;
    for fi in infos.iter() {
        output.write_string(&fi.name)?;
        output.write_byte(field_bits(fi))?;
    }
    Ok(())
}

pub fn read_field_infos<D: Directory>(
    directory: &D,
    segment: &str,
    context: &IOContext,
) -> Result<FieldInfos> {
    let file_name = segment_file_name(segment, "", FIELD_INFOS_EXTENSION);
    let mut input = directory.open_input(&file_name, context)?;
    codec_util::check_format(
        input.as_mut(),
        &file_name,
        FIELD_INFOS_FORMAT_CURRENT,
        FIELD_INFOS_FORMAT_CURRENT,
    )?;

    let size = input.read_vint()?;
    let mut infos = Vec::with_capacity(size.max(0) as usize);
    for number in 0..size {
        let name = input.read_string()?;
        let bits = input.read_byte()?;
        let is_indexed = (bits & IS_INDEXED) != 0;
        let index_options = if (bits & OMIT_TERM_FREQ_AND_POSITIONS) != 0 {
            IndexOptions::Docs
        } else if (bits & OMIT_POSITIONS) != 0 {
            IndexOptions::DocsAndFreqs
        } else {
            IndexOptions::DocsAndFreqsAndPositions
        };
        infos.push(FieldInfo::new(
            name,
            number as u32,
            is_indexed,
            index_options,
            (bits & STORE_PAYLOADS) != 0,
            (bits & STORE_TERM_VECTOR) != 0,
        )?);
    }
    FieldInfos::new(infos)
}
