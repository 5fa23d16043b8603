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

use core::index::merge::MergeProgress;
use core::index::SegmentReader;

use error::Result;

use std::fmt;
use std::sync::Arc;

/// A unit of work for a merge scheduler.
pub trait MergeTask: fmt::Display + Send + Sync + 'static {
    fn id(&self) -> u32;

    /// Number of docs the merge will produce; schedulers run small merges
    /// first.
    fn total_doc_count(&self) -> i32;

    fn progress(&self) -> &Arc<MergeProgress>;
}

/// The queue of pending merges a scheduler pulls from. It decides which
/// segments to merge; a scheduler only decides when and on which thread.
pub trait MergeSource: Send + Sync + 'static {
    type Merge: MergeTask;

    /// Takes the next pending merge off the queue.
    fn next_merge(&self) -> Option<Self::Merge>;

    fn has_pending_merges(&self) -> bool;

    /// Prepares a merge right before it runs.
    fn merge_init(&self, merge: &Self::Merge) -> Result<()>;

    /// Does the merge.
    fn merge(&self, merge: &Self::Merge) -> Result<()>;

    /// Called after every merge that got through `merge_init`, successful
    /// or not.
    fn merge_finish(&self, merge: &Self::Merge, success: bool);
}

/// Runs one merge pulled from `source` through init, merge and finish.
pub fn run_merge<S: MergeSource + ?Sized>(source: &S, merge: &S::Merge) -> Result<()> {
    source.merge_init(merge)?;
    let res = source.merge(merge);
    source.merge_finish(merge, res.is_ok());
    res
}

/// Merges a list of segments into a new segment.
pub struct OneMerge {
    id: u32,
    pub readers: Vec<Arc<SegmentReader>>,
    /// Name of the segment the merge writes.
    pub segment: String,
    total_doc_count: i32,
    progress: Arc<MergeProgress>,
}

impl OneMerge {
    pub fn new(id: u32, segment: &str, readers: Vec<Arc<SegmentReader>>) -> OneMerge {
        let total_doc_count = readers.iter().map(|r| r.num_docs()).sum();
        OneMerge {
            id,
            readers,
            segment: segment.to_string(),
            total_doc_count,
            progress: Arc::new(MergeProgress::new()),
        }
    }

    pub fn abort(&self) {
        self.progress.set_abort();
    }
}

impl MergeTask for OneMerge {
    fn id(&self) -> u32 {
        self.id
    }

    fn total_doc_count(&self) -> i32 {
        self.total_doc_count
    }

    fn progress(&self) -> &Arc<MergeProgress> {
        &self.progress
    }
}

impl fmt::Display for OneMerge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "merge#{} [", self.id)?;
        for (i, reader) in self.readers.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", reader)?;
        }
        write!(f, "] into {}", self.segment)?;
        if self.progress.aborted() {
            write!(f, " [ABORTED]")?;
        }
        Ok(())
    }
}
