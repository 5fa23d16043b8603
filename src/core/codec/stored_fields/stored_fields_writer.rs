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

use std::io::Write;

use core::codec::codec_util;
use core::codec::field_infos::{FieldInfo, FieldInfos};
use core::codec::stored_fields::{
    FIELDS_FORMAT_CURRENT, FIELDS_FORMAT_SIZE, FIELD_IS_BINARY, FIELD_IS_TOKENIZED,
    FIELD_NUMERIC_DOUBLE, FIELD_NUMERIC_FLOAT, FIELD_NUMERIC_INT, FIELD_NUMERIC_LONG,
};
use core::doc::Document;
use core::index::{segment_file_name, FIELDS_EXTENSION, FIELDS_INDEX_EXTENSION};
use core::store::directory::Directory;
use core::store::io::{DataOutput, IndexInput, IndexOutput, RAMOutputStream};
use core::store::IOContext;
use core::util::VariantValue;

use error::ErrorKind::{IllegalArgument, IllegalState, RuntimeError};
use error::Result;

/// Writes the `.fdt` and `.fdx` files of a segment.
///
/// A document is buffered in memory between `start_document` and
/// `finish_document`, the field count has to be known before its fields.
pub struct StoredFieldsWriter<O: IndexOutput> {
    fields_stream: O,
    index_stream: O,
    doc_buffer: RAMOutputStream,
    num_stored_fields: i32,
    in_doc: bool,
    num_docs: i32,
}

impl<O: IndexOutput> StoredFieldsWriter<O> {
    pub fn new<D>(directory: &D, segment: &str, context: &IOContext) -> Result<Self>
    where
        D: Directory<IndexOutput = O>,
    {
        let mut fields_stream =
            directory.create_output(&segment_file_name(segment, "", FIELDS_EXTENSION), context)?;
        codec_util::write_format(&mut fields_stream, FIELDS_FORMAT_CURRENT)?;
        let mut index_stream = directory.create_output(
            &segment_file_name(segment, "", FIELDS_INDEX_EXTENSION),
            context,
        )?;
        codec_util::write_format(&mut index_stream, FIELDS_FORMAT_CURRENT)?;

        Ok(StoredFieldsWriter {
            fields_stream,
            index_stream,
            doc_buffer: RAMOutputStream::new(false),
            num_stored_fields: 0,
            in_doc: false,
            num_docs: 0,
        })
    }

    /// Number of documents written so far.
    pub fn num_docs(&self) -> i32 {
        self.num_docs
    }

    pub fn start_document(&mut self) -> Result<()> {
        if self.in_doc {
            bail!(IllegalState("start_document called twice".into()));
        }
        self.doc_buffer.reset();
        self.num_stored_fields = 0;
        self.in_doc = true;
        Ok(())
    }

    pub fn write_field(
        &mut self,
        field: &FieldInfo,
        tokenized: bool,
        value: &VariantValue,
    ) -> Result<()> {
        if !self.in_doc {
            bail!(IllegalState("write_field called outside of a document".into()));
        }
        let out = &mut self.doc_buffer;
        out.write_vint(field.number as i32)?;

        let mut bits = if tokenized { FIELD_IS_TOKENIZED } else { 0 };
        match *value {
            VariantValue::Binary(_) => bits |= FIELD_IS_BINARY,
            VariantValue::Int(_) => bits |= FIELD_NUMERIC_INT,
            VariantValue::Long(_) => bits |= FIELD_NUMERIC_LONG,
            VariantValue::Float(_) => bits |= FIELD_NUMERIC_FLOAT,
            VariantValue::Double(_) => bits |= FIELD_NUMERIC_DOUBLE,
            VariantValue::VString(_) => {}
        }
        out.write_byte(bits)?;

        match *value {
            VariantValue::Binary(ref b) => {
                out.write_vint(b.len() as i32)?;
                out.write_bytes(b, 0, b.len())?;
            }
            VariantValue::VString(ref s) => out.write_string(s)?,
            VariantValue::Int(i) => out.write_int(i)?,
            VariantValue::Long(l) => out.write_long(l)?,
            VariantValue::Float(f) => out.write_int(f.to_bits() as i32)?,
            VariantValue::Double(d) => out.write_long(d.to_bits() as i64)?,
        }
        self.num_stored_fields += 1;
        Ok(())
    }

    pub fn finish_document(&mut self) -> Result<()> {
        if !self.in_doc {
            bail!(IllegalState("finish_document called outside of a document".into()));
        }
        let pointer = self.fields_stream.file_pointer();
        self.index_stream.write_long(pointer)?;
        self.fields_stream.write_vint(self.num_stored_fields)?;
        self.doc_buffer.write_to(&mut self.fields_stream)?;
        self.in_doc = false;
        self.num_docs += 1;
        Ok(())
    }

    /// Writes the stored fields of a loaded document, renumbering them by
    /// name into `field_infos`. Lazy fields are read here.
    pub fn add_document(&mut self, doc: &Document, field_infos: &FieldInfos) -> Result<()> {
        self.start_document()?;
        for field in &doc.fields {
            let info = match field_infos.field_info_by_name(&field.name) {
                Some(info) => info,
                None => bail!(IllegalArgument(format!(
                    "field '{}' is missing from the field infos",
                    field.name
                ))),
            };
            let value = field.value()?;
            self.write_field(info, field.tokenized, &value)?;
        }
        self.finish_document()
    }

    /// Copies already encoded documents from `stream`, which must be
    /// positioned at the first of them, `lengths` giving each document's
    /// byte length.
    pub fn add_raw_documents(&mut self, stream: &mut dyn IndexInput, lengths: &[i32]) -> Result<()> {
        if self.in_doc {
            bail!(IllegalState("add_raw_documents called inside a document".into()));
        }
        let mut position = self.fields_stream.file_pointer();
        let start = position;
        for &length in lengths {
            self.index_stream.write_long(position)?;
            position += i64::from(length);
        }
        self.fields_stream
            .copy_bytes(stream, (position - start) as usize)?;
        debug_assert_eq!(self.fields_stream.file_pointer(), position);
        self.num_docs += lengths.len() as i32;
        Ok(())
    }

    /// Verifies the index covers `num_docs` documents and flushes both
    /// files.
    pub fn finish(mut self, num_docs: i32) -> Result<()> {
        if self.in_doc {
            bail!(IllegalState("finish called inside a document".into()));
        }
        let expected = FIELDS_FORMAT_SIZE + i64::from(num_docs) * 8;
        let actual = self.index_stream.file_pointer();
        if actual != expected {
            bail!(RuntimeError(format!(
                "stored fields index holds {} bytes but {} docs need {}; \
                 the segment would be corrupt",
                actual, num_docs, expected
            )));
        }
        self.fields_stream.flush()?;
        self.index_stream.flush()?;
        Ok(())
    }
}
