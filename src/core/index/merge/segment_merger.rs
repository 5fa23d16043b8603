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

use core::codec::field_infos::{write_field_infos, FieldInfo, FieldInfos, FieldInfosBuilder};
use core::codec::postings::{
    PostingsWriter, SegmentPostingIterator, TermIterator, TermOrder, TermsConfig, TermsEnum,
};
use core::codec::stored_fields::{LoadAllFieldSelector, StoredFieldsWriter, MAX_RAW_MERGE_DOCS};
use core::index::merge::{MergeProgress, MergeState};
use core::index::{SegmentInfo, SegmentReader};
use core::search::{DocIterator, PostingIterator, NO_MORE_DOCS};
use core::store::directory::{Directory, TrackingDirectoryWrapper};
use core::store::io::IndexOutput;
use core::store::{IOContext, MergeInfo};

use error::ErrorKind::{CorruptIndex, IllegalState, RuntimeError};
use error::Result;

use std::cmp::{self, Ordering};
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Combines two or more segments into a single new segment.
///
/// The new segment always uses the code point ordered term dictionary,
/// whatever the order of its sources. If the merge fails or is aborted,
/// every file written for the new segment is deleted again; the source
/// segments are only ever read.
pub struct SegmentMerger<'a, D: Directory + 'a> {
    directory: &'a D,
    segment: String,
    config: TermsConfig,
    merge_state: MergeState,
    progress: Arc<MergeProgress>,
    context: IOContext,
}

impl<'a, D: Directory + 'a> SegmentMerger<'a, D> {
    pub fn new(
        directory: &'a D,
        segment: &str,
        readers: Vec<Arc<SegmentReader>>,
        config: &TermsConfig,
        progress: Arc<MergeProgress>,
    ) -> SegmentMerger<'a, D> {
        let merge_state = MergeState::new(readers);
        let mut config = config.clone();
        config.set_term_order(TermOrder::CodePoint);
        let context = IOContext::Merge(MergeInfo::new(
            merge_state.merged_doc_count as u32,
            false,
        ));
        SegmentMerger {
            directory,
            segment: segment.to_string(),
            config,
            merge_state,
            progress,
            context,
        }
    }

    pub fn merge_state(&self) -> &MergeState {
        &self.merge_state
    }

    /// True if any merging should happen
    pub fn should_merge(&self) -> bool {
        self.merge_state.merged_doc_count > 0
    }

    /// Merges the readers into the directory passed to the constructor.
    pub fn merge(&self) -> Result<SegmentInfo> {
        if !self.should_merge() {
            bail!(IllegalState(format!(
                "merge into {} would result in a 0 document segment",
                self.segment
            )));
        }
        let tracking = TrackingDirectoryWrapper::new(self.directory);
        match self.merge_into(&tracking) {
            Ok(info) => Ok(info),
            Err(e) => {
                if e.is_merge_aborted() {
                    debug!("merge into {} aborted, removing partial files", self.segment);
                } else {
                    debug!("merge into {} failed, removing partial files", self.segment);
                }
                if let Err(cleanup) = tracking.delete_created_files() {
                    warn!(
                        "failed to remove partial files of {}: {}",
                        self.segment, cleanup
                    );
                }
                Err(e)
            }
        }
    }

    fn merge_into<DW: Directory>(&self, directory: &DW) -> Result<SegmentInfo> {
        self.progress.check_abort()?;
        let field_infos = self.merge_field_infos()?;
        write_field_infos(directory, &self.segment, &field_infos, &self.context)?;

        let num_merged = self.merge_fields(directory, &field_infos)?;
        if num_merged != self.merge_state.merged_doc_count {
            bail!(RuntimeError(format!(
                "merged {} stored docs into {} but expected {}",
                num_merged, self.segment, self.merge_state.merged_doc_count
            )));
        }
        let num_terms = self.merge_terms(directory, &field_infos)?;

        let info = SegmentInfo::new(&self.segment, num_merged, field_infos.has_prox);
        debug!(
            "merged {} segments into {} with {} terms",
            self.merge_state.readers.len(),
            info,
            num_terms
        );
        Ok(info)
    }

    /// Field infos of the merged segment, numbered in the order fields are
    /// first seen walking the segments.
    pub fn merge_field_infos(&self) -> Result<FieldInfos> {
        let mut builder = FieldInfosBuilder::new();
        for reader in &self.merge_state.readers {
            builder.add_infos(reader.field_infos())?;
        }
        builder.finish()
    }

    /// Merge stored fields from each of the segments into the new one.
    fn merge_fields<DW: Directory>(&self, directory: &DW, field_infos: &FieldInfos) -> Result<i32> {
        let mut writer = StoredFieldsWriter::new(directory, &self.segment, &self.context)?;
        let mut doc_count = 0;
        for reader in &self.merge_state.readers {
            let raw_copy =
                !reader.has_deletions() && reader.field_infos().numbering_matches(field_infos);
            doc_count += if raw_copy {
                self.copy_fields_raw(&mut writer, reader)?
            } else {
                self.copy_fields(&mut writer, reader, field_infos)?
            };
        }
        writer.finish(doc_count)?;
        Ok(doc_count)
    }

    /// Bulk copies the encoded documents of a segment without deletions.
    fn copy_fields_raw<O: IndexOutput>(
        &self,
        writer: &mut StoredFieldsWriter<O>,
        reader: &SegmentReader,
    ) -> Result<i32> {
        let max_doc = reader.max_doc();
        let mut doc = 0;
        while doc < max_doc {
            self.progress.check_abort()?;
            let count = cmp::min(MAX_RAW_MERGE_DOCS, (max_doc - doc) as usize);
            let (mut stream, lengths) = reader.stored_fields().raw_docs(doc, count)?;
            writer.add_raw_documents(stream.as_mut(), &lengths)?;
            doc += count as i32;
        }
        Ok(max_doc)
    }

    /// Re-encodes the live documents of a segment one by one.
    fn copy_fields<O: IndexOutput>(
        &self,
        writer: &mut StoredFieldsWriter<O>,
        reader: &SegmentReader,
        field_infos: &FieldInfos,
    ) -> Result<i32> {
        let mut copied = 0;
        for doc in 0..reader.max_doc() {
            if reader.is_deleted(doc) {
                continue;
            }
            if copied as usize % MAX_RAW_MERGE_DOCS == 0 {
                self.progress.check_abort()?;
            }
            let document = reader.document(doc, &LoadAllFieldSelector)?;
            writer.add_document(&document, field_infos)?;
            copied += 1;
        }
        Ok(copied)
    }

    /// Merges the postings of all indexed fields, in field name order.
    /// Returns the number of terms written.
    fn merge_terms<DW: Directory>(&self, directory: &DW, field_infos: &FieldInfos) -> Result<i64> {
        let mut writer = PostingsWriter::new(
            directory,
            &self.segment,
            field_infos,
            self.merge_state.merged_doc_count,
            &self.config,
            &self.context,
        )?;
        for field in field_infos.indexed_fields() {
            self.merge_field(&mut writer, &field)?;
        }
        let num_terms = writer.num_terms();
        writer.finish()?;
        Ok(num_terms)
    }

    fn merge_field<O: IndexOutput>(
        &self,
        writer: &mut PostingsWriter<O>,
        field: &FieldInfo,
    ) -> Result<()> {
        let mut queue = BinaryHeap::with_capacity(self.merge_state.readers.len());
        for (idx, reader) in self.merge_state.readers.iter().enumerate() {
            if let Some(mut terms) = reader.terms(&field.name)? {
                if let Some(term) = terms.next()? {
                    queue.push(SegmentTerms { term, idx, terms });
                }
            }
        }
        if queue.is_empty() {
            return Ok(());
        }

        writer.start_field(field)?;
        let mut matches: Vec<SegmentTerms> = Vec::with_capacity(queue.len());
        while let Some(top) = queue.pop() {
            self.progress.check_abort()?;
            matches.push(top);
            while queue
                .peek()
                .map_or(false, |next| next.term == matches[0].term)
            {
                if let Some(next) = queue.pop() {
                    matches.push(next);
                }
            }
            // segment order keeps the merged doc ids ascending
            matches.sort_by_key(|m| m.idx);

            writer.start_term(&matches[0].term)?;
            for m in &matches {
                self.append_postings(writer, field, m)?;
            }
            writer.finish_term()?;

            for mut m in matches.drain(..) {
                if let Some(term) = m.terms.next()? {
                    m.term = term;
                    queue.push(m);
                }
            }
        }
        Ok(())
    }

    /// Appends the live docs of one segment's current term, renumbered, to
    /// the term being written. Docs that were deleted leave no trace, so a
    /// term only found in deleted docs is dropped.
    fn append_postings<O: IndexOutput>(
        &self,
        writer: &mut PostingsWriter<O>,
        field: &FieldInfo,
        source: &SegmentTerms,
    ) -> Result<()> {
        let reader = &self.merge_state.readers[source.idx];
        let doc_map = &self.merge_state.doc_maps[source.idx];
        let has_freqs = field.index_options.has_freqs();
        let has_positions = field.index_options.has_positions();
        let mut postings: SegmentPostingIterator = if has_positions {
            match source.terms.docs_and_positions(reader.deleted_docs())? {
                Some(postings) => postings,
                None => bail!(CorruptIndex(format!(
                    "field {} of segment {} has no positions",
                    field.name,
                    reader.name()
                ))),
            }
        } else {
            source.terms.docs(reader.deleted_docs())?
        };

        loop {
            let doc = postings.next()?;
            if doc == NO_MORE_DOCS {
                break;
            }
            let new_doc = match doc_map.get(doc) {
                Some(new_doc) => new_doc,
                None => continue,
            };
            let freq = if has_freqs { postings.freq()? } else { 1 };
            writer.start_doc(new_doc, freq)?;
            if has_positions {
                for _ in 0..freq {
                    let position = postings.next_position()?;
                    if field.has_store_payloads {
                        let payload = postings.payload()?;
                        writer.add_position(position, Some(&payload[..]))?;
                    } else {
                        writer.add_position(position, None)?;
                    }
                }
            }
            writer.finish_doc()?;
        }
        Ok(())
    }
}

/// A segment's term enum positioned on `term`, ordered for the merge heap.
struct SegmentTerms {
    term: Vec<u8>,
    idx: usize,
    terms: TermsEnum,
}

impl Ord for SegmentTerms {
    // reversed: BinaryHeap pops the greatest element first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .term
            .cmp(&self.term)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for SegmentTerms {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SegmentTerms {
    fn eq(&self, other: &Self) -> bool {
        self.term == other.term && self.idx == other.idx
    }
}

impl Eq for SegmentTerms {}

#[cfg(test)]
mod tests {
    use super::*;
    use core::codec::postings::SeekStatus;
    use core::doc::{Field, FieldType, Token};
    use core::index::SegmentBuilder;
    use core::store::directory::RAMDirectory;
    use core::store::io::DataOutput;
    use core::store::IO_CONTEXT_READ;
    use core::util::{DocId, FixedBitSet, VariantValue};
    use error::ErrorKind;

    use rand::{thread_rng, Rng};
    use std::collections::HashSet;

    fn open(dir: &RAMDirectory, info: &SegmentInfo, deleted: &[usize]) -> Arc<SegmentReader> {
        let deletions = if deleted.is_empty() {
            None
        } else {
            let mut bits = FixedBitSet::new(info.doc_count as usize);
            for &d in deleted {
                bits.set(d);
            }
            Some(bits)
        };
        Arc::new(SegmentReader::open(dir, info, deletions, &IO_CONTEXT_READ).unwrap())
    }

    fn body_segment(dir: &RAMDirectory, name: &str, docs: &[&str]) -> SegmentInfo {
        let mut builder = SegmentBuilder::new(name, TermsConfig::default()).unwrap();
        for text in docs {
            builder
                .add_document(&[Field::new("body", FieldType::text(true), (*text).into())])
                .unwrap();
        }
        builder.flush(dir).unwrap()
    }

    fn merge(dir: &RAMDirectory, segment: &str, readers: Vec<Arc<SegmentReader>>) -> Result<SegmentInfo> {
        let merger = SegmentMerger::new(
            dir,
            segment,
            readers,
            &TermsConfig::default(),
            Arc::new(MergeProgress::new()),
        );
        merger.merge()
    }

    fn terms_of(reader: &SegmentReader, field: &str) -> Vec<String> {
        let mut terms = reader.terms(field).unwrap().unwrap();
        let mut result = Vec::new();
        while let Some(term) = terms.next().unwrap() {
            result.push(String::from_utf8(term).unwrap());
        }
        result
    }

    fn body(reader: &SegmentReader, doc: DocId) -> String {
        let doc = reader.document(doc, &LoadAllFieldSelector).unwrap();
        doc.get("body").unwrap().string_value().unwrap().unwrap()
    }

    #[test]
    fn test_merge_two_segments() {
        let dir = RAMDirectory::new();
        let first = body_segment(&dir, "_0", &["first test file"]);
        let second = body_segment(&dir, "_1", &["second test file"]);
        let readers = vec![open(&dir, &first, &[]), open(&dir, &second, &[])];

        let info = merge(&dir, "_2", readers).unwrap();
        assert_eq!(info.doc_count, 2);
        assert!(info.has_prox);

        let merged = open(&dir, &info, &[]);
        assert_eq!(body(&merged, 0), "first test file");
        assert_eq!(body(&merged, 1), "second test file");
        assert_eq!(
            terms_of(&merged, "body"),
            vec!["file", "first", "second", "test"]
        );

        let mut terms = merged.terms("body").unwrap().unwrap();
        assert!(terms.seek_exact(b"test").unwrap());
        assert_eq!(terms.doc_freq().unwrap(), 2);
        let mut docs = terms.docs_and_positions(None).unwrap().unwrap();
        assert_eq!(docs.next().unwrap(), 0);
        assert_eq!(docs.next_position().unwrap(), 1);
        assert_eq!(docs.next().unwrap(), 1);
        assert_eq!(docs.next_position().unwrap(), 1);
        assert_eq!(docs.next().unwrap(), NO_MORE_DOCS);

        // sources are untouched
        let source = open(&dir, &first, &[]);
        assert_eq!(body(&source, 0), "first test file");
    }

    #[test]
    fn test_merge_drops_deleted_docs() {
        let dir = RAMDirectory::new();
        let info = body_segment(
            &dir,
            "_0",
            &["alpha common", "beta common", "gamma common"],
        );
        let readers = vec![open(&dir, &info, &[1])];

        let merged_info = merge(&dir, "_1", readers).unwrap();
        assert_eq!(merged_info.doc_count, 2);
        let merged = open(&dir, &merged_info, &[]);
        assert_eq!(terms_of(&merged, "body"), vec!["alpha", "common", "gamma"]);
        assert_eq!(merged.doc_freq("body", b"beta").unwrap(), 0);
        assert_eq!(merged.doc_freq("body", b"common").unwrap(), 2);
        assert_eq!(body(&merged, 0), "alpha common");
        assert_eq!(body(&merged, 1), "gamma common");
    }

    #[test]
    fn test_merge_utf16_source() {
        let dir = RAMDirectory::new();
        let mut config = TermsConfig::default();
        config.set_term_order(TermOrder::Utf16);
        let mut builder = SegmentBuilder::new("_0", config).unwrap();
        for term in &["\u{fb94}mnopqr", "\u{29b05}abcdef"] {
            builder
                .add_document(&[Field::new("f", FieldType::string(false), (*term).into())])
                .unwrap();
        }
        let utf16 = builder.flush(&dir).unwrap();
        let mut builder = SegmentBuilder::new("_1", TermsConfig::default()).unwrap();
        builder
            .add_document(&[Field::new("f", FieldType::string(false), "\u{fb94}mnopqr".into())])
            .unwrap();
        let code_point = builder.flush(&dir).unwrap();

        let readers = vec![open(&dir, &utf16, &[]), open(&dir, &code_point, &[])];
        let merged = open(&dir, &merge(&dir, "_2", readers).unwrap(), &[]);
        assert_eq!(merged.terms_reader().term_order(), TermOrder::CodePoint);
        assert_eq!(
            terms_of(&merged, "f"),
            vec!["\u{fb94}mnopqr", "\u{29b05}abcdef"]
        );
        assert_eq!(merged.doc_freq("f", "\u{fb94}mnopqr".as_bytes()).unwrap(), 2);

        let mut terms = merged.terms("f").unwrap().unwrap();
        assert!(terms.supports_ord());
        assert_eq!(terms.seek_exact_ord(1).unwrap(), SeekStatus::Found);
        assert_eq!(terms.term().unwrap(), "\u{29b05}abcdef".as_bytes());
    }

    type RandomDoc = Vec<Field>;

    fn random_doc(rng: &mut impl Rng, doc: usize) -> RandomDoc {
        let words = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let mut tokens = Vec::new();
        for _ in 0..rng.gen_range(1, 12) {
            let word = words[rng.gen_range(0, words.len())];
            let mut token = if rng.gen_bool(0.3) {
                Token::with_payload(word, vec![rng.gen::<u8>(); rng.gen_range(1, 4)])
            } else {
                Token::new(word)
            };
            token.position_increment = rng.gen_range(0, 3);
            tokens.push(token);
        }
        vec![
            Field::new("id", FieldType::string(true), format!("id{}", doc).into()),
            Field::with_tokens("body", FieldType::text(false).with_payloads(), tokens, None),
            Field::new("n", FieldType::stored_only(), VariantValue::Int(doc as i32)),
        ]
    }

    /// Asserts two segments hold the same terms, postings and stored fields.
    fn assert_same_segment(expected: &SegmentReader, actual: &SegmentReader) {
        assert_eq!(expected.max_doc(), actual.max_doc());
        assert_eq!(expected.fields(), actual.fields());
        for field in expected.fields() {
            let mut e = expected.terms(&field).unwrap().unwrap();
            let mut a = actual.terms(&field).unwrap().unwrap();
            loop {
                let term = e.next().unwrap();
                assert_eq!(term, a.next().unwrap());
                if term.is_none() {
                    break;
                }
                assert_eq!(e.doc_freq().unwrap(), a.doc_freq().unwrap());
                let positions = e.docs_and_positions(None).unwrap();
                if let Some(mut ep) = positions {
                    let mut ap = a.docs_and_positions(None).unwrap().unwrap();
                    loop {
                        let doc = ep.next().unwrap();
                        assert_eq!(doc, ap.next().unwrap());
                        if doc == NO_MORE_DOCS {
                            break;
                        }
                        let freq = ep.freq().unwrap();
                        assert_eq!(freq, ap.freq().unwrap());
                        for _ in 0..freq {
                            assert_eq!(ep.next_position().unwrap(), ap.next_position().unwrap());
                            assert_eq!(ep.payload().unwrap(), ap.payload().unwrap());
                        }
                    }
                } else {
                    let mut ed = e.docs(None).unwrap();
                    let mut ad = a.docs(None).unwrap();
                    loop {
                        let doc = ed.next().unwrap();
                        assert_eq!(doc, ad.next().unwrap());
                        if doc == NO_MORE_DOCS {
                            break;
                        }
                    }
                }
            }
        }
        for doc in 0..expected.max_doc() {
            let e = expected.document(doc, &LoadAllFieldSelector).unwrap();
            let a = actual.document(doc, &LoadAllFieldSelector).unwrap();
            assert_eq!(e.len(), a.len());
            for (ef, af) in e.fields.iter().zip(a.fields.iter()) {
                assert_eq!(ef.name(), af.name());
                assert_eq!(ef.value().unwrap(), af.value().unwrap());
            }
        }
    }

    #[test]
    fn test_random_merge_matches_fresh_segment() {
        let mut rng = thread_rng();
        let dir = RAMDirectory::new();
        let mut readers = Vec::new();
        let mut survivors = Vec::new();
        let mut doc_id = 0;
        for seg in 0..3 {
            let name = format!("_{}", seg);
            let mut builder = SegmentBuilder::new(&name, TermsConfig::default()).unwrap();
            let num_docs = rng.gen_range(1, 60);
            let mut deleted = Vec::new();
            for doc in 0..num_docs {
                let fields = random_doc(&mut rng, doc_id);
                doc_id += 1;
                builder.add_document(&fields).unwrap();
                if seg != 1 && rng.gen_bool(0.2) {
                    deleted.push(doc);
                } else {
                    survivors.push(fields);
                }
            }
            let info = builder.flush(&dir).unwrap();
            readers.push(open(&dir, &info, &deleted));
        }
        if survivors.is_empty() {
            return;
        }

        let merged = open(&dir, &merge(&dir, "_m", readers).unwrap(), &[]);

        let mut builder = SegmentBuilder::new("_fresh", TermsConfig::default()).unwrap();
        for fields in &survivors {
            builder.add_document(fields).unwrap();
        }
        let fresh = open(&dir, &builder.flush(&dir).unwrap(), &[]);
        assert_same_segment(&fresh, &merged);
    }

    #[test]
    fn test_raw_copy_in_chunks() {
        let dir = RAMDirectory::new();
        let mut builder = SegmentBuilder::new("_0", TermsConfig::default()).unwrap();
        let num_docs = MAX_RAW_MERGE_DOCS + 10;
        for doc in 0..num_docs {
            builder
                .add_document(&[Field::new(
                    "id",
                    FieldType::string(true),
                    format!("{}", doc).into(),
                )])
                .unwrap();
        }
        let info = builder.flush(&dir).unwrap();
        let small = body_segment(&dir, "_1", &["tail"]);

        let readers = vec![open(&dir, &info, &[]), open(&dir, &small, &[])];
        let merged = open(&dir, &merge(&dir, "_2", readers).unwrap(), &[]);
        assert_eq!(merged.max_doc(), num_docs as i32 + 1);
        for &doc in &[0, MAX_RAW_MERGE_DOCS - 1, MAX_RAW_MERGE_DOCS, num_docs - 1] {
            let stored = merged.document(doc as DocId, &LoadAllFieldSelector).unwrap();
            assert_eq!(
                stored.get("id").unwrap().string_value().unwrap().unwrap(),
                format!("{}", doc)
            );
        }
        assert_eq!(body(&merged, num_docs as DocId), "tail");
        assert_eq!(merged.doc_freq("id", b"4200").unwrap(), 1);
    }

    #[test]
    fn test_renumbered_fields() {
        let dir = RAMDirectory::new();
        let mut builder = SegmentBuilder::new("_0", TermsConfig::default()).unwrap();
        builder
            .add_document(&[
                Field::new("a", FieldType::string(true), "a0".into()),
                Field::new("b", FieldType::stored_only(), "b0".into()),
            ])
            .unwrap();
        let first = builder.flush(&dir).unwrap();
        let mut builder = SegmentBuilder::new("_1", TermsConfig::default()).unwrap();
        builder
            .add_document(&[
                Field::new("b", FieldType::stored_only(), "b1".into()),
                Field::new("a", FieldType::string(true), "a1".into()),
            ])
            .unwrap();
        let second = builder.flush(&dir).unwrap();

        let readers = vec![open(&dir, &first, &[]), open(&dir, &second, &[])];
        let merged = open(&dir, &merge(&dir, "_2", readers).unwrap(), &[]);
        let infos = merged.field_infos();
        assert_eq!(infos.field_info_by_name("a").unwrap().number, 0);
        assert_eq!(infos.field_info_by_name("b").unwrap().number, 1);

        let doc = merged.document(1, &LoadAllFieldSelector).unwrap();
        assert_eq!(doc.get("a").unwrap().string_value().unwrap().unwrap(), "a1");
        assert_eq!(doc.get("b").unwrap().string_value().unwrap().unwrap(), "b1");
        assert_eq!(merged.doc_freq("a", b"a1").unwrap(), 1);
    }

    #[test]
    fn test_aborted_merge_removes_partial_files() {
        let dir = RAMDirectory::new();
        let first = body_segment(&dir, "_0", &["one"]);
        let second = body_segment(&dir, "_1", &["two"]);
        let before: HashSet<String> = dir.list_all().unwrap().into_iter().collect();

        let progress = Arc::new(MergeProgress::new());
        progress.set_abort();
        let merger = SegmentMerger::new(
            &dir,
            "_2",
            vec![open(&dir, &first, &[]), open(&dir, &second, &[])],
            &TermsConfig::default(),
            progress,
        );
        assert!(merger.merge().unwrap_err().is_merge_aborted());
        let after: HashSet<String> = dir.list_all().unwrap().into_iter().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_failed_postings_merge_removes_partial_files() {
        let dir = RAMDirectory::new();
        let first = body_segment(&dir, "_0", &["one two", "three"]);
        let second = body_segment(&dir, "_1", &["four"]);

        // keep only the format header of the first segment's postings
        let header = {
            let mut input = dir.open_input("_0.frq", &IO_CONTEXT_READ).unwrap();
            input.read_int().unwrap()
        };
        {
            let mut out = dir.create_output("_0.frq", &IOContext::Default).unwrap();
            out.write_int(header).unwrap();
        }
        let before: HashSet<String> = dir.list_all().unwrap().into_iter().collect();

        let readers = vec![open(&dir, &first, &[]), open(&dir, &second, &[])];
        let err = merge(&dir, "_2", readers).unwrap_err();
        match err.kind() {
            ErrorKind::UnexpectedEOF(_) => {}
            k => panic!("unexpected error {:?}", k),
        }

        let after: HashSet<String> = dir.list_all().unwrap().into_iter().collect();
        assert_eq!(before, after);
        for ext in &["fnm", "fdt", "fdx", "tis", "frq"] {
            assert!(!dir.file_exists(&format!("_2.{}", ext)).unwrap());
        }
    }

    #[test]
    fn test_empty_merge_rejected() {
        let dir = RAMDirectory::new();
        let info = body_segment(&dir, "_0", &["gone"]);
        assert!(merge(&dir, "_1", vec![open(&dir, &info, &[0])]).is_err());
        assert!(!dir.file_exists("_1.fdt").unwrap());
    }
}
