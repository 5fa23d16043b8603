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

use core::codec::codec_util;
use core::codec::field_infos::FieldInfos;
use core::codec::stored_fields::{
    FieldSelector, FieldSelectorResult, FieldsStream, LazyField, FIELDS_FORMAT_CURRENT,
    FIELDS_FORMAT_MINIMUM, FIELDS_FORMAT_SIZE, FIELD_IS_BINARY, FIELD_IS_TOKENIZED,
    FIELD_NUMERIC_DOUBLE, FIELD_NUMERIC_FLOAT, FIELD_NUMERIC_INT, FIELD_NUMERIC_LONG,
    FIELD_NUMERIC_MASK,
};
use core::doc::{Document, FieldData, StoredField};
use core::index::{segment_file_name, FIELDS_EXTENSION, FIELDS_INDEX_EXTENSION};
use core::store::directory::Directory;
use core::store::io::{DataInput, IndexInput};
use core::store::IOContext;
use core::util::{DocId, VariantValue};

use error::ErrorKind::{CorruptIndex, IllegalArgument};
use error::Result;

/// Reads the stored fields of a segment.
///
/// The reader can be shared between threads: every `document` call and
/// every lazy field works on its own clones of the inputs.
pub struct StoredFieldsReader {
    segment: String,
    field_infos: Arc<FieldInfos>,
    fields_stream: Arc<FieldsStream>,
    index_stream: Box<dyn IndexInput>,
    format: i32,
    num_docs: i32,
}

impl StoredFieldsReader {
    pub fn open<D: Directory>(
        directory: &D,
        segment: &str,
        field_infos: Arc<FieldInfos>,
        context: &IOContext,
    ) -> Result<StoredFieldsReader> {
        let fields_name = segment_file_name(segment, "", FIELDS_EXTENSION);
        let index_name = segment_file_name(segment, "", FIELDS_INDEX_EXTENSION);

        let mut index_stream = directory.open_input(&index_name, context)?;
        let format = codec_util::check_format(
            index_stream.as_mut(),
            &index_name,
            FIELDS_FORMAT_MINIMUM,
            FIELDS_FORMAT_CURRENT,
        )?;
        let mut fields_input = directory.open_input(&fields_name, context)?;
        let data_format = codec_util::check_format(
            fields_input.as_mut(),
            &fields_name,
            FIELDS_FORMAT_MINIMUM,
            FIELDS_FORMAT_CURRENT,
        )?;
        if data_format != format {
            bail!(CorruptIndex(format!(
                "{} has format {} but {} has format {}",
                fields_name, data_format, index_name, format
            )));
        }

        let index_size = index_stream.len() as i64 - FIELDS_FORMAT_SIZE;
        if index_size < 0 || index_size % 8 != 0 {
            bail!(CorruptIndex(format!(
                "{} has {} bytes after its header, not a multiple of 8",
                index_name, index_size
            )));
        }
        let num_docs = (index_size / 8) as i32;
        debug!(
            "opened stored fields of segment {}: {} docs, format {}",
            segment, num_docs, format
        );

        Ok(StoredFieldsReader {
            segment: segment.to_string(),
            field_infos,
            fields_stream: Arc::new(FieldsStream::new(fields_input)),
            index_stream,
            format,
            num_docs,
        })
    }

    pub fn num_docs(&self) -> i32 {
        self.num_docs
    }

    pub fn format(&self) -> i32 {
        self.format
    }

    pub fn field_infos(&self) -> &Arc<FieldInfos> {
        &self.field_infos
    }

    /// Later `document` calls and lazy field reads fail with
    /// `AlreadyClosed`. Values already loaded stay readable.
    pub fn close(&self) {
        self.fields_stream.close();
    }

    pub fn is_closed(&self) -> bool {
        self.fields_stream.is_closed()
    }

    fn check_doc(&self, doc: DocId) -> Result<()> {
        if doc < 0 || doc >= self.num_docs {
            bail!(IllegalArgument(format!(
                "doc {} out of range, segment {} has {} docs",
                doc, self.segment, self.num_docs
            )));
        }
        Ok(())
    }

    fn doc_pointer(&self, index: &mut dyn IndexInput, doc: DocId) -> Result<i64> {
        index.seek(FIELDS_FORMAT_SIZE + i64::from(doc) * 8)?;
        index.read_long()
    }

    /// Loads the stored fields of `doc` as chosen by `selector`.
    pub fn document(&self, doc: DocId, selector: &dyn FieldSelector) -> Result<Document> {
        // fails once the reader is closed
        let mut fields = self.fields_stream.clone_input()?;
        self.check_doc(doc)?;
        let mut index = self.index_stream.as_ref().clone()?;
        let pointer = self.doc_pointer(index.as_mut(), doc)?;
        fields.seek(pointer)?;

        let num_fields = fields.read_vint()?;
        let mut document = Document::default();
        for _ in 0..num_fields {
            let number = fields.read_vint()? as u32;
            let info = match self.field_infos.field_info_by_number(number) {
                Some(info) => info,
                None => bail!(CorruptIndex(format!(
                    "doc {} of segment {} refers to unknown field {}",
                    doc, self.segment, number
                ))),
            };
            let bits = fields.read_byte()?;
            let tokenized = (bits & FIELD_IS_TOKENIZED) != 0;
            let binary = (bits & FIELD_IS_BINARY) != 0;
            let numeric = bits & FIELD_NUMERIC_MASK;

            let result = selector.accept(&info.name);
            let data = match result {
                FieldSelectorResult::Load | FieldSelectorResult::LoadAndBreak => {
                    FieldData::Value(read_value(fields.as_mut(), binary, numeric)?)
                }
                FieldSelectorResult::LazyLoad | FieldSelectorResult::Latent => {
                    if numeric != 0 {
                        FieldData::Value(read_numeric(fields.as_mut(), numeric)?)
                    } else {
                        let length = fields.read_vint()?;
                        let pointer = fields.file_pointer();
                        skip_bytes(fields.as_mut(), i64::from(length))?;
                        FieldData::Lazy(LazyField::new(
                            Arc::clone(&self.fields_stream),
                            pointer,
                            length as usize,
                            binary,
                            result == FieldSelectorResult::LazyLoad,
                        ))
                    }
                }
                FieldSelectorResult::Size | FieldSelectorResult::SizeAndBreak => {
                    FieldData::Size(read_size(fields.as_mut(), binary, numeric)?)
                }
                FieldSelectorResult::NoLoad => {
                    skip_field(fields.as_mut(), numeric)?;
                    continue;
                }
            };
            document.add(StoredField::new(&info.name, number, tokenized, data));

            if result == FieldSelectorResult::LoadAndBreak
                || result == FieldSelectorResult::SizeAndBreak
            {
                break;
            }
        }
        Ok(document)
    }

    /// Returns a clone of the `.fdt` input positioned at the first of
    /// `count` docs starting at `start`, and the byte length of each of
    /// them, for a raw copy into another segment.
    pub fn raw_docs(&self, start: DocId, count: usize) -> Result<(Box<dyn IndexInput>, Vec<i32>)> {
        let mut fields = self.fields_stream.clone_input()?;
        if count == 0 {
            return Ok((fields, Vec::new()));
        }
        self.check_doc(start)?;
        self.check_doc(start + count as i32 - 1)?;

        let mut index = self.index_stream.as_ref().clone()?;
        let start_pointer = self.doc_pointer(index.as_mut(), start)?;
        let mut lengths = Vec::with_capacity(count);
        let mut last = start_pointer;
        for i in 0..count {
            let doc = start + i as i32 + 1;
            let offset = if doc < self.num_docs {
                index.read_long()?
            } else {
                fields.len() as i64
            };
            if offset < last {
                bail!(CorruptIndex(format!(
                    "stored fields pointer of doc {} in segment {} goes backwards",
                    doc, self.segment
                )));
            }
            lengths.push((offset - last) as i32);
            last = offset;
        }
        fields.seek(start_pointer)?;
        Ok((fields, lengths))
    }
}

fn skip_bytes(input: &mut dyn IndexInput, count: i64) -> Result<()> {
    let fp = input.file_pointer();
    input.seek(fp + count)
}

fn numeric_width(numeric: u8) -> Result<i64> {
    match numeric {
        FIELD_NUMERIC_INT | FIELD_NUMERIC_FLOAT => Ok(4),
        FIELD_NUMERIC_LONG | FIELD_NUMERIC_DOUBLE => Ok(8),
        _ => bail!(CorruptIndex(format!("invalid numeric type {:#x}", numeric))),
    }
}

fn read_numeric(input: &mut dyn IndexInput, numeric: u8) -> Result<VariantValue> {
    Ok(match numeric {
        FIELD_NUMERIC_INT => VariantValue::Int(input.read_int()?),
        FIELD_NUMERIC_LONG => VariantValue::Long(input.read_long()?),
        FIELD_NUMERIC_FLOAT => VariantValue::Float(f32::from_bits(input.read_int()? as u32)),
        FIELD_NUMERIC_DOUBLE => VariantValue::Double(f64::from_bits(input.read_long()? as u64)),
        _ => bail!(CorruptIndex(format!("invalid numeric type {:#x}", numeric))),
    })
}

fn read_value(input: &mut dyn IndexInput, binary: bool, numeric: u8) -> Result<VariantValue> {
    if numeric != 0 {
        read_numeric(input, numeric)
    } else if binary {
        let length = input.read_vint()? as usize;
        let mut bytes = vec![0u8; length];
        input.read_bytes(&mut bytes, 0, length)?;
        Ok(VariantValue::Binary(bytes))
    } else {
        Ok(VariantValue::VString(input.read_string()?))
    }
}

/// Reads the size of the value and skips it. Strings count twice their
/// stored length.
fn read_size(input: &mut dyn IndexInput, binary: bool, numeric: u8) -> Result<i32> {
    if numeric != 0 {
        let width = numeric_width(numeric)?;
        skip_bytes(input, width)?;
        return Ok(width as i32);
    }
    let length = input.read_vint()?;
    skip_bytes(input, i64::from(length))?;
    Ok(if binary { length } else { length * 2 })
}

fn skip_field(input: &mut dyn IndexInput, numeric: u8) -> Result<()> {
    let count = if numeric != 0 {
        numeric_width(numeric)?
    } else {
        i64::from(input.read_vint()?)
    };
    skip_bytes(input, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::codec::field_infos::FieldInfosBuilder;
    use core::codec::stored_fields::{
        LoadAllFieldSelector, LoadFirstFieldSelector, SetBasedFieldSelector, StoredFieldsWriter,
    };
    use core::index::IndexOptions;
    use core::store::directory::RAMDirectory;
    use core::store::io::DataOutput;
    use core::store::IO_CONTEXT_READ;
    use error::ErrorKind;

    fn field_infos() -> Arc<FieldInfos> {
        let mut builder = FieldInfosBuilder::new();
        for name in &["title", "body", "blob", "count", "score"] {
            builder
                .add(name, false, IndexOptions::Docs, false, false)
                .unwrap();
        }
        Arc::new(builder.finish().unwrap())
    }

    fn values(i: i32) -> Vec<(&'static str, bool, VariantValue)> {
        vec![
            ("title", false, VariantValue::from(format!("title {}", i))),
            (
                "body",
                true,
                VariantValue::from(format!("body text of doc {} \u{1d11e}", i)),
            ),
            ("blob", false, VariantValue::Binary(vec![i as u8, 0, 255])),
            ("count", false, VariantValue::Long(i64::from(i) << 40)),
            ("score", false, VariantValue::Double(f64::from(i) / 3.0)),
        ]
    }

    fn write_docs(dir: &RAMDirectory, infos: &FieldInfos, num_docs: i32) {
        let mut writer = StoredFieldsWriter::new(dir, "_0", &IOContext::Default).unwrap();
        for i in 0..num_docs {
            writer.start_document().unwrap();
            for (name, tokenized, value) in values(i) {
                let info = infos.field_info_by_name(name).unwrap();
                writer.write_field(info, tokenized, &value).unwrap();
            }
            writer.finish_document().unwrap();
        }
        writer.finish(num_docs).unwrap();
    }

    fn open(num_docs: i32) -> (RAMDirectory, StoredFieldsReader) {
        let dir = RAMDirectory::new();
        let infos = field_infos();
        write_docs(&dir, &infos, num_docs);
        let reader = StoredFieldsReader::open(&dir, "_0", infos, &IO_CONTEXT_READ).unwrap();
        (dir, reader)
    }

    #[test]
    fn test_load_all() {
        let (_dir, reader) = open(5);
        assert_eq!(reader.num_docs(), 5);
        assert_eq!(reader.format(), FIELDS_FORMAT_CURRENT);
        for i in 0..5 {
            let doc = reader.document(i, &LoadAllFieldSelector).unwrap();
            assert_eq!(doc.len(), 5);
            for (field, (name, tokenized, value)) in doc.fields.iter().zip(values(i)) {
                assert_eq!(field.name(), name);
                assert_eq!(field.tokenized, tokenized);
                assert!(!field.is_lazy());
                assert_eq!(field.value().unwrap(), value);
            }
        }
        assert!(reader.document(5, &LoadAllFieldSelector).is_err());
        assert!(reader.document(-1, &LoadAllFieldSelector).is_err());
    }

    #[test]
    fn test_lazy_equals_eager() {
        let (_dir, reader) = open(3);
        let lazy = SetBasedFieldSelector::from_names(&[], &["title", "body", "blob", "count"]);
        for i in 0..3 {
            let eager = reader.document(i, &LoadAllFieldSelector).unwrap();
            let doc = reader.document(i, &lazy).unwrap();
            // score is in neither set
            assert_eq!(doc.len(), 4);
            assert!(doc.get("title").unwrap().is_lazy());
            assert!(doc.get("blob").unwrap().is_lazy());
            // numeric fields are always loaded eagerly
            assert!(!doc.get("count").unwrap().is_lazy());
            for field in &doc.fields {
                let expected = eager.get(&field.name).unwrap().value().unwrap();
                assert_eq!(field.value().unwrap(), expected);
                // a second read returns the cached value
                assert_eq!(field.value().unwrap(), expected);
            }
        }
    }

    #[test]
    fn test_concurrent_lazy_reads() {
        let (_dir, reader) = open(20);
        let selector = |name: &str| {
            if name == "body" {
                FieldSelectorResult::Latent
            } else {
                FieldSelectorResult::LazyLoad
            }
        };
        let docs: Vec<Document> = (0..20).map(|i| reader.document(i, &selector).unwrap()).collect();
        let docs = &docs;
        ::crossbeam::scope(|s| {
            for t in 0..4 {
                s.spawn(move |_| {
                    for round in 0..50 {
                        let i = (t * 7 + round) % 20;
                        let doc = &docs[i];
                        for (name, _, value) in values(i as i32) {
                            assert_eq!(doc.get(name).unwrap().value().unwrap(), value);
                        }
                    }
                });
            }
        })
        .unwrap();
    }

    #[test]
    fn test_size_and_break() {
        let (_dir, reader) = open(2);
        let selector = |name: &str| match name {
            "title" => FieldSelectorResult::Size,
            "body" => FieldSelectorResult::NoLoad,
            "blob" => FieldSelectorResult::Size,
            "count" => FieldSelectorResult::SizeAndBreak,
            _ => FieldSelectorResult::Load,
        };
        let doc = reader.document(1, &selector).unwrap();
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.get("title").unwrap().size(), Some(2 * "title 1".len() as i32));
        assert_eq!(doc.get("blob").unwrap().size(), Some(3));
        assert_eq!(doc.get("count").unwrap().size(), Some(8));
        assert!(doc.get("title").unwrap().value().is_err());
        assert!(doc.get("score").is_none());

        let first = reader.document(0, &LoadFirstFieldSelector).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first.fields[0].string_value().unwrap().unwrap(), "title 0");
    }

    #[test]
    fn test_closed_reader() {
        let (_dir, reader) = open(2);
        let lazy = SetBasedFieldSelector::from_names(&[], &["title", "body"]);
        let doc = reader.document(0, &lazy).unwrap();
        let title = doc.get("title").unwrap().value().unwrap();
        reader.close();
        assert!(reader.is_closed());

        // the cached value survives, unread lazy fields and new loads don't
        assert_eq!(doc.get("title").unwrap().value().unwrap(), title);
        match doc.get("body").unwrap().value() {
            Err(e) => match *e.kind() {
                ErrorKind::AlreadyClosed(_) => {}
                _ => panic!("unexpected error {}", e),
            },
            Ok(_) => panic!("read from a closed reader"),
        }
        assert!(reader.document(1, &LoadAllFieldSelector).is_err());
    }

    #[test]
    fn test_raw_docs_copy() {
        let (_dir, reader) = open(6);
        let target = RAMDirectory::new();
        let mut writer = StoredFieldsWriter::new(&target, "_1", &IOContext::Default).unwrap();
        let (mut stream, lengths) = reader.raw_docs(2, 4).unwrap();
        assert_eq!(lengths.len(), 4);
        writer.add_raw_documents(stream.as_mut(), &lengths).unwrap();
        assert_eq!(writer.num_docs(), 4);
        writer.finish(4).unwrap();

        let copy =
            StoredFieldsReader::open(&target, "_1", field_infos(), &IO_CONTEXT_READ).unwrap();
        assert_eq!(copy.num_docs(), 4);
        for i in 0..4 {
            let doc = copy.document(i, &LoadAllFieldSelector).unwrap();
            assert_eq!(
                doc.get("title").unwrap().string_value().unwrap().unwrap(),
                format!("title {}", i + 2)
            );
        }
    }

    #[test]
    fn test_finish_checks_doc_count() {
        let dir = RAMDirectory::new();
        let infos = field_infos();
        let mut writer = StoredFieldsWriter::new(&dir, "_0", &IOContext::Default).unwrap();
        writer.start_document().unwrap();
        writer
            .write_field(
                infos.field_info_by_name("title").unwrap(),
                false,
                &VariantValue::from("t"),
            )
            .unwrap();
        writer.finish_document().unwrap();
        assert!(writer.finish(2).is_err());
    }

    #[test]
    fn test_format_checks() {
        let dir = RAMDirectory::new();
        let mut fdx = dir.create_output("_0.fdx", &IOContext::Default).unwrap();
        fdx.write_int(FIELDS_FORMAT_CURRENT + 1).unwrap();
        drop(fdx);
        let mut fdt = dir.create_output("_0.fdt", &IOContext::Default).unwrap();
        fdt.write_int(FIELDS_FORMAT_CURRENT).unwrap();
        drop(fdt);
        match StoredFieldsReader::open(&dir, "_0", field_infos(), &IO_CONTEXT_READ) {
            Err(e) => match *e.kind() {
                ErrorKind::IndexFormatTooNew(_, v, min, max) => {
                    assert_eq!(v, FIELDS_FORMAT_CURRENT + 1);
                    assert_eq!(min, FIELDS_FORMAT_MINIMUM);
                    assert_eq!(max, FIELDS_FORMAT_CURRENT);
                }
                _ => panic!("unexpected error {}", e),
            },
            Ok(_) => panic!("opened a too new format"),
        }

        let mut fdx = dir.create_output("_0.fdx", &IOContext::Default).unwrap();
        fdx.write_int(FIELDS_FORMAT_MINIMUM - 1).unwrap();
        drop(fdx);
        match StoredFieldsReader::open(&dir, "_0", field_infos(), &IO_CONTEXT_READ) {
            Err(e) => assert!(e.is_format_error()),
            Ok(_) => panic!("opened a too old format"),
        }
    }
}
