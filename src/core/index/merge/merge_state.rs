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

use core::index::SegmentReader;
use core::util::DocId;

use std::sync::Arc;

/// Maps the doc ids of one source segment to doc ids of the merged segment.
pub struct DocMap {
    base: DocId,
    /// New doc id relative to `base` per old doc id, -1 for deleted docs;
    /// `None` when the segment has no deletions.
    live: Option<Vec<DocId>>,
    max_doc: DocId,
}

impl DocMap {
    fn new(reader: &SegmentReader, base: DocId) -> DocMap {
        let max_doc = reader.max_doc();
        let live = if reader.has_deletions() {
            let mut map = Vec::with_capacity(max_doc as usize);
            let mut del = 0;
            for doc in 0..max_doc {
                if reader.is_deleted(doc) {
                    map.push(-1);
                    del += 1;
                } else {
                    map.push(doc - del);
                }
            }
            Some(map)
        } else {
            None
        };
        DocMap {
            base,
            live,
            max_doc,
        }
    }

    /// The merged doc id of `doc`, `None` if it is deleted.
    pub fn get(&self, doc: DocId) -> Option<DocId> {
        if doc < 0 || doc >= self.max_doc {
            return None;
        }
        match self.live {
            Some(ref map) => match map[doc as usize] {
                -1 => None,
                new_doc => Some(self.base + new_doc),
            },
            None => Some(self.base + doc),
        }
    }

    pub fn has_deletions(&self) -> bool {
        self.live.is_some()
    }
}

/// The source segments of a merge and how their docs are renumbered.
///
/// Surviving docs keep their relative order; the docs of segment 0 come
/// first, then those of segment 1, and so on.
pub struct MergeState {
    pub readers: Vec<Arc<SegmentReader>>,
    pub doc_maps: Vec<DocMap>,
    /// First merged doc id of each source segment.
    pub doc_base: Vec<DocId>,
    pub merged_doc_count: i32,
}

impl MergeState {
    pub fn new(readers: Vec<Arc<SegmentReader>>) -> MergeState {
        let mut doc_maps = Vec::with_capacity(readers.len());
        let mut doc_base = Vec::with_capacity(readers.len());
        let mut base = 0;
        for reader in &readers {
            doc_base.push(base);
            doc_maps.push(DocMap::new(reader, base));
            base += reader.num_docs();
        }
        MergeState {
            readers,
            doc_maps,
            doc_base,
            merged_doc_count: base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::codec::postings::TermsConfig;
    use core::doc::{Field, FieldType};
    use core::index::SegmentBuilder;
    use core::store::directory::RAMDirectory;
    use core::store::IO_CONTEXT_READ;
    use core::util::FixedBitSet;

    fn segment(dir: &RAMDirectory, name: &str, docs: usize, deleted: &[usize]) -> Arc<SegmentReader> {
        let mut builder = SegmentBuilder::new(name, TermsConfig::default()).unwrap();
        for i in 0..docs {
            let value = format!("doc{}", i);
            builder
                .add_document(&[Field::new("id", FieldType::string(true), value.into())])
                .unwrap();
        }
        let info = builder.flush(dir).unwrap();
        let deletions = if deleted.is_empty() {
            None
        } else {
            let mut bits = FixedBitSet::new(docs);
            for &d in deleted {
                bits.set(d);
            }
            Some(bits)
        };
        Arc::new(SegmentReader::open(dir, &info, deletions, &IO_CONTEXT_READ).unwrap())
    }

    #[test]
    fn test_doc_maps() {
        let dir = RAMDirectory::new();
        let readers = vec![
            segment(&dir, "_0", 3, &[]),
            segment(&dir, "_1", 4, &[0, 2]),
            segment(&dir, "_2", 2, &[]),
        ];
        let state = MergeState::new(readers);
        assert_eq!(state.merged_doc_count, 7);
        assert_eq!(state.doc_base, vec![0, 3, 5]);

        assert_eq!(state.doc_maps[0].get(2), Some(2));
        assert!(!state.doc_maps[0].has_deletions());
        let map = &state.doc_maps[1];
        assert!(map.has_deletions());
        let mapped: Vec<Option<DocId>> = (0..4).map(|d| map.get(d)).collect();
        assert_eq!(mapped, vec![None, Some(3), None, Some(4)]);
        assert_eq!(state.doc_maps[2].get(0), Some(5));
        assert_eq!(state.doc_maps[2].get(2), None);
    }
}
