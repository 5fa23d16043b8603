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

use core::codec::field_infos::{read_field_infos, FieldInfos};
use core::codec::postings::{TermsEnum, TermsReader};
use core::codec::stored_fields::{FieldSelector, StoredFieldsReader};
use core::doc::Document;
use core::index::SegmentInfo;
use core::store::directory::Directory;
use core::store::IOContext;
use core::util::{Bits, BitsRef, DocId, FixedBitSet};

use error::ErrorKind::IllegalArgument;
use error::Result;

use std::fmt;
use std::sync::Arc;

/// Read access to one sealed segment: its field infos, terms and postings,
/// stored fields, and the deletions the caller supplied.
///
/// All parts can be used from several threads at once; every iterator and
/// lazy field reads through its own clone of the underlying inputs.
pub struct SegmentReader {
    info: SegmentInfo,
    field_infos: Arc<FieldInfos>,
    terms: TermsReader,
    stored_fields: StoredFieldsReader,
    deleted_docs: Option<Arc<FixedBitSet>>,
}

impl SegmentReader {
    pub fn open<D: Directory>(
        directory: &D,
        info: &SegmentInfo,
        deleted_docs: Option<FixedBitSet>,
        context: &IOContext,
    ) -> Result<SegmentReader> {
        if let Some(ref deleted) = deleted_docs {
            if deleted.len() != info.doc_count as usize {
                bail!(IllegalArgument(format!(
                    "deletions cover {} docs but segment {} has {}",
                    deleted.len(),
                    info.name,
                    info.doc_count
                )));
            }
        }

        let field_infos = Arc::new(read_field_infos(directory, &info.name, context)?);
        let terms = TermsReader::open(directory, &info.name, Arc::clone(&field_infos), context)?;
        let stored_fields =
            StoredFieldsReader::open(directory, &info.name, Arc::clone(&field_infos), context)?;
        if stored_fields.num_docs() != info.doc_count {
            bail!(IllegalArgument(format!(
                "segment {} claims {} docs but its stored fields hold {}",
                info.name,
                info.doc_count,
                stored_fields.num_docs()
            )));
        }

        debug!(
            "opened segment {} with {} fields, {} terms",
            info,
            field_infos.len(),
            terms.size()
        );
        Ok(SegmentReader {
            info: info.clone(),
            field_infos,
            terms,
            stored_fields,
            deleted_docs: deleted_docs.map(Arc::new),
        })
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &SegmentInfo {
        &self.info
    }

    pub fn max_doc(&self) -> DocId {
        self.info.doc_count
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> i32 {
        self.max_doc() - self.num_deleted_docs()
    }

    pub fn num_deleted_docs(&self) -> i32 {
        self.deleted_docs
            .as_ref()
            .map_or(0, |d| d.cardinality() as i32)
    }

    pub fn has_deletions(&self) -> bool {
        self.num_deleted_docs() > 0
    }

    pub fn is_deleted(&self, doc: DocId) -> bool {
        self.deleted_docs
            .as_ref()
            .map_or(false, |d| d.get_bit(doc as usize))
    }

    /// The deletions as a mask for posting iterators, `None` when no doc is
    /// deleted.
    pub fn deleted_docs(&self) -> Option<BitsRef> {
        match self.deleted_docs {
            Some(ref d) if d.cardinality() > 0 => {
                let bits: BitsRef = Arc::clone(d) as Arc<dyn Bits>;
                Some(bits)
            }
            _ => None,
        }
    }

    pub fn field_infos(&self) -> &Arc<FieldInfos> {
        &self.field_infos
    }

    pub fn terms_reader(&self) -> &TermsReader {
        &self.terms
    }

    /// Names of the indexed fields, sorted.
    pub fn fields(&self) -> Vec<String> {
        self.terms.fields()
    }

    pub fn terms(&self, field: &str) -> Result<Option<TermsEnum>> {
        self.terms.terms(field)
    }

    pub fn doc_freq(&self, field: &str, term: &[u8]) -> Result<i32> {
        self.terms.doc_freq(field, term)
    }

    pub fn stored_fields(&self) -> &StoredFieldsReader {
        &self.stored_fields
    }

    /// Loads the stored fields of `doc`. Deleted docs can still be loaded.
    pub fn document(&self, doc: DocId, selector: &dyn FieldSelector) -> Result<Document> {
        self.stored_fields.document(doc, selector)
    }

    /// Closes the stored fields stream. Lazy fields still pending fail with
    /// `AlreadyClosed` afterwards.
    pub fn close(&self) {
        self.stored_fields.close();
    }
}

impl fmt::Display for SegmentReader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.info)?;
        if self.has_deletions() {
            write!(f, " -{} deleted", self.num_deleted_docs())?;
        }
        Ok(())
    }
}
