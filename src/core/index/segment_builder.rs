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

use core::codec::field_infos::{write_field_infos, FieldInfos, FieldInfosBuilder};
use core::codec::postings::{PostingsWriter, TermsConfig};
use core::codec::stored_fields::StoredFieldsWriter;
use core::doc::{Field, Token};
use core::index::SegmentInfo;
use core::store::directory::{Directory, TrackingDirectoryWrapper};
use core::store::{FlushInfo, IOContext};
use core::util::{DocId, VariantValue};

use error::ErrorKind::IllegalArgument;
use error::Result;

use std::collections::{BTreeMap, HashMap};

/// Positions of a term in one document, each with its payload.
type DocPositions = Vec<(i32, Option<Vec<u8>>)>;
/// term -> doc -> positions
type FieldPostings = BTreeMap<Vec<u8>, BTreeMap<DocId, DocPositions>>;

struct StoredValue {
    field: String,
    tokenized: bool,
    value: VariantValue,
}

/// Buffers documents in memory and writes them out as one segment.
pub struct SegmentBuilder {
    name: String,
    config: TermsConfig,
    field_infos: FieldInfosBuilder,
    postings: BTreeMap<String, FieldPostings>,
    stored: Vec<Vec<StoredValue>>,
}

impl SegmentBuilder {
    pub fn new(name: &str, config: TermsConfig) -> Result<SegmentBuilder> {
        config.validate()?;
        Ok(SegmentBuilder {
            name: name.to_string(),
            config,
            field_infos: FieldInfosBuilder::new(),
            postings: BTreeMap::new(),
            stored: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_docs(&self) -> i32 {
        self.stored.len() as i32
    }

    /// Inverts and buffers one document, returning its doc id. Several
    /// instances of a field in a document continue the same position
    /// sequence. A rejected document leaves the buffered ones untouched.
    pub fn add_document(&mut self, fields: &[Field]) -> Result<DocId> {
        let doc = self.stored.len() as DocId;
        let mut last_positions: HashMap<&str, i32> = HashMap::new();
        let mut inverted: Vec<(&str, Token, i32)> = Vec::new();
        let mut stored = Vec::new();

        for field in fields {
            let field_type = field.field_type();
            if field_type.indexed {
                let position = last_positions.entry(field.name()).or_insert(-1);
                for token in field.tokens()? {
                    if token.position_increment < 0 {
                        bail!(IllegalArgument(format!(
                            "negative position increment {} in field '{}'",
                            token.position_increment,
                            field.name()
                        )));
                    }
                    // the first token may have increment 0
                    *position = (*position + token.position_increment).max(0);
                    inverted.push((field.name(), token, *position));
                }
            }
            if field_type.stored {
                match field.field_data() {
                    Some(value) => stored.push(StoredValue {
                        field: field.name().to_string(),
                        tokenized: field_type.tokenized,
                        value: value.clone(),
                    }),
                    None => bail!(IllegalArgument(format!(
                        "stored field '{}' has no value",
                        field.name()
                    ))),
                }
            }
        }

        for field in fields {
            let field_type = field.field_type();
            self.field_infos.add(
                field.name(),
                field_type.indexed,
                field_type.index_options,
                field_type.store_payloads,
                field_type.store_term_vectors,
            )?;
        }
        for (field, token, position) in inverted {
            self.postings
                .entry(field.to_string())
                .or_insert_with(BTreeMap::new)
                .entry(token.text.into_bytes())
                .or_insert_with(BTreeMap::new)
                .entry(doc)
                .or_insert_with(Vec::new)
                .push((position, token.payload));
        }
        self.stored.push(stored);
        Ok(doc)
    }

    /// Writes the buffered documents as segment `name` into `directory`.
    /// Nothing is left behind if writing fails.
    pub fn flush<D: Directory>(self, directory: &D) -> Result<SegmentInfo> {
        let tracking = TrackingDirectoryWrapper::new(directory);
        match self.write(&tracking) {
            Ok(info) => {
                debug!("flushed segment {}", info);
                Ok(info)
            }
            Err(e) => {
                tracking.delete_created_files()?;
                Err(e)
            }
        }
    }

    fn write<D: Directory>(&self, directory: &D) -> Result<SegmentInfo> {
        let num_docs = self.num_docs();
        let context = IOContext::Flush(FlushInfo::new(num_docs as u32));
        let field_infos = self.field_infos.finish()?;

        write_field_infos(directory, &self.name, &field_infos, &context)?;
        self.write_stored_fields(directory, &field_infos, &context)?;
        self.write_postings(directory, &field_infos, &context)?;

        Ok(SegmentInfo::new(&self.name, num_docs, field_infos.has_prox))
    }

    fn write_stored_fields<D: Directory>(
        &self,
        directory: &D,
        field_infos: &FieldInfos,
        context: &IOContext,
    ) -> Result<()> {
        let mut writer = StoredFieldsWriter::new(directory, &self.name, context)?;
        for doc in &self.stored {
            writer.start_document()?;
            for stored in doc {
                match field_infos.field_info_by_name(&stored.field) {
                    Some(info) => writer.write_field(info, stored.tokenized, &stored.value)?,
                    None => bail!(IllegalArgument(format!(
                        "field '{}' is missing from the field infos",
                        stored.field
                    ))),
                }
            }
            writer.finish_document()?;
        }
        writer.finish(self.num_docs())
    }

    fn write_postings<D: Directory>(
        &self,
        directory: &D,
        field_infos: &FieldInfos,
        context: &IOContext,
    ) -> Result<()> {
        let mut writer = PostingsWriter::new(
            directory,
            &self.name,
            field_infos,
            self.num_docs(),
            &self.config,
            context,
        )?;
        let term_order = self.config.term_order;

        // BTreeMap keys come out in field name order
        for (field, terms) in &self.postings {
            let info = match field_infos.field_info_by_name(field) {
                Some(info) if info.is_indexed => info,
                _ => continue,
            };
            let has_positions = info.index_options.has_positions();
            writer.start_field(info)?;

            let mut sorted: Vec<&Vec<u8>> = terms.keys().collect();
            sorted.sort_by(|a, b| term_order.compare(a, b));
            for term in sorted {
                writer.start_term(term)?;
                for (&doc, positions) in &terms[term] {
                    writer.start_doc(doc, positions.len() as i32)?;
                    if has_positions {
                        for &(position, ref payload) in positions {
                            writer.add_position(position, payload.as_ref().map(|p| &p[..]))?;
                        }
                    }
                    writer.finish_doc()?;
                }
                writer.finish_term()?;
            }
        }
        writer.finish()
    }
}
