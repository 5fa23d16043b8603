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

use core::codec::postings::TermsConfig;
use core::index::merge::{MergeProgress, MergeSource, MergeTask, OneMerge, SegmentMerger};
use core::index::{SegmentInfo, SegmentReader};
use core::store::directory::Directory;

use error::ErrorKind::{AlreadyClosed, IllegalArgument};
use error::Result;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// A queue of merges over segments of one directory.
///
/// A merged segment becomes visible in `committed()` only once its merge
/// succeeded and its files were synced.
pub struct MergeQueue<D: Directory> {
    directory: Arc<D>,
    config: TermsConfig,
    next_id: AtomicU32,
    closed: AtomicBool,
    pending: Mutex<VecDeque<OneMerge>>,
    running: Mutex<HashMap<u32, Arc<MergeProgress>>>,
    merged: Mutex<HashMap<u32, SegmentInfo>>,
    committed: Mutex<Vec<SegmentInfo>>,
}

impl<D: Directory> MergeQueue<D> {
    pub fn new(directory: Arc<D>, config: TermsConfig) -> MergeQueue<D> {
        MergeQueue {
            directory,
            config,
            next_id: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            pending: Mutex::new(VecDeque::new()),
            running: Mutex::new(HashMap::new()),
            merged: Mutex::new(HashMap::new()),
            committed: Mutex::new(Vec::new()),
        }
    }

    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    /// Queues a merge of `readers` into a new segment named `segment` and
    /// returns the merge id.
    pub fn register(&self, segment: &str, readers: Vec<Arc<SegmentReader>>) -> Result<u32> {
        if self.closed.load(Ordering::Acquire) {
            bail!(AlreadyClosed("merge queue is closed".into()));
        }
        if readers.is_empty() {
            bail!(IllegalArgument(format!(
                "merge into {} has no segments",
                segment
            )));
        }
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        let merge = OneMerge::new(id, segment, readers);
        debug!("registered {}", merge);
        self.pending.lock()?.push_back(merge);
        Ok(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn running_count(&self) -> usize {
        self.running.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// The segments produced by successful merges, in completion order.
    pub fn committed(&self) -> Result<Vec<SegmentInfo>> {
        Ok(self.committed.lock()?.clone())
    }

    /// Drops all pending merges and aborts the running ones. Later
    /// registrations fail.
    pub fn abort_all(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        let dropped = self.pending.lock()?.drain(..).count();
        let running = self.running.lock()?;
        for progress in running.values() {
            progress.set_abort();
        }
        debug!(
            "aborted {} running and dropped {} pending merges",
            running.len(),
            dropped
        );
        Ok(())
    }

    fn sync_segment(&self, info: &SegmentInfo) -> Result<()> {
        let files: HashSet<String> = info.files().into_iter().collect();
        if let Err(e) = self.directory.sync(&files) {
            for file in &files {
                if let Err(de) = self.directory.delete_file(file) {
                    warn!("failed to delete {} of unsynced segment: {}", file, de);
                }
            }
            return Err(e);
        }
        Ok(())
    }
}

impl<D: Directory + 'static> MergeSource for MergeQueue<D> {
    type Merge = OneMerge;

    fn next_merge(&self) -> Option<OneMerge> {
        self.pending.lock().ok().and_then(|mut p| p.pop_front())
    }

    fn has_pending_merges(&self) -> bool {
        self.pending_count() > 0
    }

    fn merge_init(&self, merge: &OneMerge) -> Result<()> {
        merge.progress().check_abort()?;
        self.running
            .lock()?
            .insert(merge.id(), Arc::clone(merge.progress()));
        if self.closed.load(Ordering::Acquire) {
            merge.abort();
        }
        Ok(())
    }

    fn merge(&self, merge: &OneMerge) -> Result<()> {
        let merger = SegmentMerger::new(
            self.directory.as_ref(),
            &merge.segment,
            merge.readers.clone(),
            &self.config,
            Arc::clone(merge.progress()),
        );
        let info = merger.merge()?;
        self.sync_segment(&info)?;
        self.merged.lock()?.insert(merge.id(), info);
        Ok(())
    }

    fn merge_finish(&self, merge: &OneMerge, success: bool) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&merge.id());
        }
        let info = self
            .merged
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&merge.id()));
        match info {
            Some(info) if success => {
                info!("{} done: {}", merge, info);
                if let Ok(mut committed) = self.committed.lock() {
                    committed.push(info);
                }
            }
            _ => debug!("{} finished without result", merge),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::codec::stored_fields::LoadAllFieldSelector;
    use core::doc::{Field, FieldType};
    use core::index::merge::{
        run_merge, ConcurrentMergeScheduler, MergeScheduler, MergeSchedulerConfig,
        SerialMergeScheduler,
    };
    use core::index::SegmentBuilder;
    use core::store::directory::RAMDirectory;
    use core::store::IO_CONTEXT_READ;

    fn segment(dir: &RAMDirectory, name: &str, text: &str) -> Arc<SegmentReader> {
        let mut builder = SegmentBuilder::new(name, TermsConfig::default()).unwrap();
        builder
            .add_document(&[Field::new("body", FieldType::text(true), text.into())])
            .unwrap();
        let info = builder.flush(dir).unwrap();
        Arc::new(SegmentReader::open(dir, &info, None, &IO_CONTEXT_READ).unwrap())
    }

    #[test]
    fn test_serial_merges_commit() {
        let dir = Arc::new(RAMDirectory::new());
        let queue = Arc::new(MergeQueue::new(Arc::clone(&dir), TermsConfig::default()));
        let readers: Vec<_> = (0..4)
            .map(|i| segment(&dir, &format!("_{}", i), &format!("doc {}", i)))
            .collect();
        queue.register("_4", readers[..2].to_vec()).unwrap();
        queue.register("_5", readers[2..].to_vec()).unwrap();
        assert!(queue.register("_6", vec![]).is_err());
        assert_eq!(queue.pending_count(), 2);

        SerialMergeScheduler.merge(&queue).unwrap();
        assert!(!queue.has_pending_merges());
        assert_eq!(queue.running_count(), 0);

        let committed = queue.committed().unwrap();
        assert_eq!(
            committed,
            vec![SegmentInfo::new("_4", 2, true), SegmentInfo::new("_5", 2, true)]
        );
        let merged = SegmentReader::open(dir.as_ref(), &committed[1], None, &IO_CONTEXT_READ)
            .unwrap();
        let doc = merged.document(1, &LoadAllFieldSelector).unwrap();
        assert_eq!(doc.get("body").unwrap().string_value().unwrap().unwrap(), "doc 3");
        assert_eq!(merged.doc_freq("body", b"doc").unwrap(), 2);
    }

    #[test]
    fn test_aborted_merge_is_not_committed() {
        let dir = Arc::new(RAMDirectory::new());
        let queue = MergeQueue::new(Arc::clone(&dir), TermsConfig::default());
        let readers = vec![segment(&dir, "_0", "a"), segment(&dir, "_1", "b")];
        queue.register("_2", readers).unwrap();

        let merge = queue.next_merge().unwrap();
        merge.abort();
        assert!(run_merge(&queue, &merge).unwrap_err().is_merge_aborted());
        assert!(queue.committed().unwrap().is_empty());
        assert!(!dir.file_exists("_2.fnm").unwrap());
    }

    #[test]
    fn test_abort_all() {
        let dir = Arc::new(RAMDirectory::new());
        let queue = MergeQueue::new(Arc::clone(&dir), TermsConfig::default());
        queue
            .register("_1", vec![segment(&dir, "_0", "a")])
            .unwrap();
        queue.abort_all().unwrap();
        assert_eq!(queue.pending_count(), 0);
        assert!(queue.register("_2", vec![segment(&dir, "_3", "b")]).is_err());
    }

    #[test]
    fn test_concurrent_merges_commit() {
        let dir = Arc::new(RAMDirectory::new());
        let queue = Arc::new(MergeQueue::new(Arc::clone(&dir), TermsConfig::default()));
        for m in 0..5 {
            let readers: Vec<_> = (0..3)
                .map(|i| {
                    let name = format!("_s{}_{}", m, i);
                    segment(&dir, &name, &format!("merge{} part{} shared", m, i))
                })
                .collect();
            queue.register(&format!("_m{}", m), readers).unwrap();
        }

        let cms = ConcurrentMergeScheduler::new(MergeSchedulerConfig::new(2, 1).unwrap()).unwrap();
        cms.merge(&queue).unwrap();
        assert!(cms.merge_thread_count() <= 2);
        cms.sync().unwrap();
        assert_eq!(cms.merge_thread_count(), 0);
        assert!(!cms.any_unhandled_exceptions());

        let mut committed = queue.committed().unwrap();
        committed.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(committed.len(), 5);
        for (m, info) in committed.iter().enumerate() {
            assert_eq!(info.name, format!("_m{}", m));
            let reader = SegmentReader::open(dir.as_ref(), info, None, &IO_CONTEXT_READ).unwrap();
            assert_eq!(reader.max_doc(), 3);
            assert_eq!(reader.doc_freq("body", b"shared").unwrap(), 3);
            let merge_term = format!("merge{}", m);
            assert_eq!(reader.doc_freq("body", merge_term.as_bytes()).unwrap(), 3);
        }
    }
}
