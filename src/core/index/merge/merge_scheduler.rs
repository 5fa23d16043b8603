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

use core::index::merge::{run_merge, MergeProgress, MergeSource, MergeTask};

use error::ErrorKind::{AlreadyClosed, IllegalArgument, IllegalState, RuntimeError};
use error::{Error, Result};

use num_cpus;

use std::cmp;
use std::mem;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Lowest logical merge thread priority.
pub const MIN_PRIORITY: i32 = 1;
/// Priority of a regular thread.
pub const NORM_PRIORITY: i32 = 5;
/// Highest logical merge thread priority.
pub const MAX_PRIORITY: i32 = 10;

/// How long a merge thread sleeps after a failed merge, so a persistent
/// failure (e.g. disk full) doesn't turn into a hot loop.
const MERGE_FAILURE_PAUSE: Duration = Duration::from_millis(250);

/// Longest single wait of a stalled producer before it rechecks.
const STALL_WAIT: Duration = Duration::from_millis(250);

/// Executes the merges a `MergeSource` has pending. The default is
/// `ConcurrentMergeScheduler`.
pub trait MergeScheduler: Send + Sync + Clone + 'static {
    /// Runs, or hands to merge threads, every merge `source` has pending.
    fn merge<S: MergeSource>(&self, source: &Arc<S>) -> Result<()>;

    /// Blocks until all merges started by this scheduler finished.
    fn sync(&self) -> Result<()>;

    fn close(&self) -> Result<()>;

    fn merging_thread_count(&self) -> Option<usize> {
        None
    }
}

/// Runs all merges on the calling thread, one at a time.
#[derive(Copy, Clone, Debug, Default)]
pub struct SerialMergeScheduler;

impl MergeScheduler for SerialMergeScheduler {
    fn merge<S: MergeSource>(&self, source: &Arc<S>) -> Result<()> {
        while let Some(merge) = source.next_merge() {
            run_merge(source.as_ref(), &merge)?;
        }
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Settings of a `ConcurrentMergeScheduler`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSchedulerConfig {
    /// Number of merges that may run at once; larger merges beyond this
    /// are paused.
    pub max_thread_count: usize,
    /// Number of merge threads that may exist at once. Beyond this, the
    /// thread asking for more merges blocks.
    pub max_merge_count: usize,
    /// Logical priority of the first running merge thread.
    pub merge_thread_priority: i32,
}

impl Default for MergeSchedulerConfig {
    fn default() -> Self {
        let max_thread_count = cmp::max(1, cmp::min(3, num_cpus::get() / 2));
        MergeSchedulerConfig {
            max_thread_count,
            max_merge_count: max_thread_count + 2,
            merge_thread_priority: NORM_PRIORITY + 1,
        }
    }
}

impl MergeSchedulerConfig {
    pub fn new(max_merge_count: usize, max_thread_count: usize) -> Result<Self> {
        let config = MergeSchedulerConfig {
            max_thread_count,
            max_merge_count,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: MergeSchedulerConfig = ::serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_thread_count < 1 {
            bail!(IllegalArgument("max_thread_count should be at least 1".into()));
        }
        if self.max_merge_count < self.max_thread_count {
            bail!(IllegalArgument(format!(
                "max_merge_count should be at least max_thread_count ({}), got {}",
                self.max_thread_count, self.max_merge_count
            )));
        }
        check_priority(self.merge_thread_priority)
    }
}

fn check_priority(priority: i32) -> Result<()> {
    if priority < MIN_PRIORITY || priority > MAX_PRIORITY {
        bail!(IllegalArgument(format!(
            "priority must be in range {} .. {} inclusive, got {}",
            MIN_PRIORITY, MAX_PRIORITY, priority
        )));
    }
    Ok(())
}

struct ThreadSentinel;

/// The merge a merge thread is currently working on.
struct RunningMerge {
    id: u32,
    total_doc_count: i32,
    progress: Arc<MergeProgress>,
}

impl RunningMerge {
    fn new<M: MergeTask>(merge: &M) -> RunningMerge {
        RunningMerge {
            id: merge.id(),
            total_doc_count: merge.total_doc_count(),
            progress: Arc::clone(merge.progress()),
        }
    }
}

struct MergeTaskInfo {
    merge: RunningMerge,
    thread_id: ThreadId,
    live_sentinel: Weak<ThreadSentinel>,
    priority: i32,
}

impl MergeTaskInfo {
    fn thread_alive(&self) -> bool {
        self.live_sentinel.upgrade().is_some()
    }

    fn is_active(&self) -> bool {
        self.thread_alive() && !self.merge.progress.aborted()
    }
}

/// A `MergeScheduler` that runs each merge using a separate thread.
///
/// At most `max_merge_count` merge threads exist at once; when more merges
/// are pending, the thread asking for merges blocks until a merge thread
/// finishes. Only the `max_thread_count` smallest merges actually run, the
/// larger ones are paused until one of the smaller merges completes.
///
/// A merge thread that finishes its merge takes the next pending merge
/// instead of exiting.
#[derive(Clone)]
pub struct ConcurrentMergeScheduler {
    inner: Arc<ConcurrentMergeSchedulerInner>,
}

struct ConcurrentMergeSchedulerInner {
    state: Mutex<SchedulerState>,
    cond: Condvar,
}

struct SchedulerState {
    config: MergeSchedulerConfig,
    merge_tasks: Vec<MergeTaskInfo>,
    handles: Vec<JoinHandle<()>>,
    merge_thread_count: usize,
    exceptions: Vec<Error>,
    suppress_exceptions: bool,
    closed: bool,
}

impl Default for ConcurrentMergeScheduler {
    fn default() -> Self {
        Self::with_config(MergeSchedulerConfig::default())
    }
}

impl ConcurrentMergeScheduler {
    pub fn new(config: MergeSchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: MergeSchedulerConfig) -> Self {
        let state = SchedulerState {
            config,
            merge_tasks: vec![],
            handles: vec![],
            merge_thread_count: 0,
            exceptions: vec![],
            suppress_exceptions: false,
            closed: false,
        };
        ConcurrentMergeScheduler {
            inner: Arc::new(ConcurrentMergeSchedulerInner {
                state: Mutex::new(state),
                cond: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> Result<MergeSchedulerConfig> {
        Ok(self.inner.state.lock()?.config.clone())
    }

    /// Replaces the settings, failing without change if they are invalid.
    pub fn set_config(&self, config: MergeSchedulerConfig) -> Result<()> {
        config.validate()?;
        let mut state = self.inner.state.lock()?;
        info!("merge scheduler settings changed to {:?}", config);
        state.config = config;
        state.update_merge_threads();
        self.inner.cond.notify_all();
        Ok(())
    }

    pub fn set_max_merges_and_threads(
        &self,
        max_merge_count: usize,
        max_thread_count: usize,
    ) -> Result<()> {
        let mut config = self.config()?;
        config.max_merge_count = max_merge_count;
        config.max_thread_count = max_thread_count;
        self.set_config(config)
    }

    pub fn set_merge_thread_priority(&self, priority: i32) -> Result<()> {
        check_priority(priority)?;
        let mut config = self.config()?;
        config.merge_thread_priority = priority;
        self.set_config(config)
    }

    /// Number of merge threads alive and not aborted.
    pub fn merge_thread_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .map(|s| s.active_count())
            .unwrap_or(0)
    }

    /// `(merge id, priority)` of every running (unpaused) merge, smallest
    /// merge last.
    pub fn merge_thread_priorities(&self) -> Result<Vec<(u32, i32)>> {
        let state = self.inner.state.lock()?;
        let mut tasks: Vec<&MergeTaskInfo> = state
            .merge_tasks
            .iter()
            .filter(|t| t.is_active() && !t.merge.progress.is_paused())
            .collect();
        tasks.sort_by(|a, b| b.merge.total_doc_count.cmp(&a.merge.total_doc_count));
        Ok(tasks.iter().map(|t| (t.merge.id, t.priority)).collect())
    }

    /// Ids of merges that are paused to keep the number of running merges
    /// within `max_thread_count`.
    pub fn paused_merges(&self) -> Result<Vec<u32>> {
        let state = self.inner.state.lock()?;
        Ok(state
            .merge_tasks
            .iter()
            .filter(|t| t.is_active() && t.merge.progress.is_paused())
            .map(|t| t.merge.id)
            .collect())
    }

    pub fn any_unhandled_exceptions(&self) -> bool {
        self.inner
            .state
            .lock()
            .map(|s| !s.exceptions.is_empty())
            .unwrap_or(true)
    }

    /// Takes the errors of failed merges recorded so far.
    pub fn take_exceptions(&self) -> Result<Vec<Error>> {
        let mut state = self.inner.state.lock()?;
        Ok(mem::replace(&mut state.exceptions, vec![]))
    }

    /// Stops recording merge errors, for tests that provoke them.
    pub fn set_suppress_exceptions(&self, suppress: bool) -> Result<()> {
        self.inner.state.lock()?.suppress_exceptions = suppress;
        Ok(())
    }

    fn is_merge_thread(state: &SchedulerState) -> bool {
        let thread_id = thread::current().id();
        state.merge_tasks.iter().any(|t| t.thread_id == thread_id)
    }

    /// Blocks while the maximum number of merge threads exist and merges
    /// are still pending. Returns false if the caller should not start a
    /// merge thread, i.e. it is itself a merge thread.
    fn maybe_stall<'a, S: MergeSource>(
        &self,
        source: &S,
        guard: MutexGuard<'a, SchedulerState>,
    ) -> Result<(bool, MutexGuard<'a, SchedulerState>)> {
        let mut guard = guard;
        let mut stall_start = None;
        while source.has_pending_merges() && guard.active_count() >= guard.config.max_merge_count {
            // Never stall a merge thread: it is no segment producer, and
            // blocking it would keep it from finishing its own merge.
            if Self::is_merge_thread(&guard) {
                return Ok((false, guard));
            }
            if stall_start.is_none() {
                debug!(
                    "too many merges ({} threads); stalling...",
                    guard.active_count()
                );
                stall_start = Some(Instant::now());
            }
            let (g, _) = self.inner.cond.wait_timeout(guard, STALL_WAIT)?;
            guard = g;
        }
        if let Some(start) = stall_start {
            debug!("stalled for {:?}", start.elapsed());
        }
        Ok((true, guard))
    }

    fn spawn_merge_thread<S: MergeSource>(
        &self,
        state: &mut SchedulerState,
        source: &Arc<S>,
        merge: S::Merge,
    ) -> Result<()> {
        let sentinel = Arc::new(ThreadSentinel);
        let live_sentinel = Arc::downgrade(&sentinel);
        let running = RunningMerge::new(&merge);
        let merge_thread = MergeThread {
            source: Arc::clone(source),
            scheduler: self.clone(),
            _live_sentinel: sentinel,
        };
        debug!("launching merge thread #{} for {}", state.merge_thread_count, merge);
        let handle = thread::Builder::new()
            .name(format!("flexdex merge thread #{}", state.merge_thread_count))
            .spawn(move || merge_thread.run(merge))?;
        state.merge_thread_count += 1;
        state.merge_tasks.push(MergeTaskInfo {
            merge: running,
            thread_id: handle.thread().id(),
            live_sentinel,
            priority: state.config.merge_thread_priority,
        });
        state.handles.push(handle);
        state.update_merge_threads();
        Ok(())
    }
}

impl SchedulerState {
    fn active_count(&self) -> usize {
        self.merge_tasks.iter().filter(|t| t.is_active()).count()
    }

    /// Pauses all but the `max_thread_count` smallest merges and raises the
    /// priority of each further running merge by one, smaller merges
    /// getting the higher priorities.
    fn update_merge_threads(&mut self) {
        self.merge_tasks.retain(|t| t.thread_alive());

        let mut active: Vec<&mut MergeTaskInfo> = self
            .merge_tasks
            .iter_mut()
            .filter(|t| !t.merge.progress.aborted())
            .collect();
        // larger merges first
        active.sort_by(|a, b| b.merge.total_doc_count.cmp(&a.merge.total_doc_count));

        let count = active.len();
        let max_thread_count = self.config.max_thread_count;
        let mut priority = self.config.merge_thread_priority;
        for (idx, task) in active.into_iter().enumerate() {
            let do_pause = idx + max_thread_count < count;
            if let Err(e) = task.merge.progress.set_pause(do_pause) {
                warn!("failed to update pause state of merge {}: {}", task.merge.id, e);
            }
            if !do_pause {
                task.priority = priority;
                priority = cmp::min(MAX_PRIORITY, priority + 1);
            }
        }
    }
}

impl MergeScheduler for ConcurrentMergeScheduler {
    fn merge<S: MergeSource>(&self, source: &Arc<S>) -> Result<()> {
        let mut guard = self.inner.state.lock()?;
        if guard.closed {
            bail!(AlreadyClosed("merge scheduler is closed".into()));
        }
        loop {
            let (valid, g) = self.maybe_stall(source.as_ref(), guard)?;
            guard = g;
            if !valid {
                return Ok(());
            }
            match source.next_merge() {
                Some(merge) => self.spawn_merge_thread(&mut guard, source, merge)?,
                None => return Ok(()),
            }
        }
    }

    /// Joins all merge threads, including those started while waiting.
    fn sync(&self) -> Result<()> {
        loop {
            let handles = {
                let mut state = self.inner.state.lock()?;
                if Self::is_merge_thread(&state) {
                    bail!(IllegalState("sync called from a merge thread".into()));
                }
                mem::replace(&mut state.handles, vec![])
            };
            if handles.is_empty() {
                return Ok(());
            }
            for handle in handles {
                let name = handle.thread().name().unwrap_or("merge thread").to_string();
                if handle.join().is_err() {
                    error!("{} panicked", name);
                    let mut state = self.inner.state.lock()?;
                    state
                        .exceptions
                        .push(RuntimeError(format!("{} panicked", name)).into());
                }
            }
        }
    }

    fn close(&self) -> Result<()> {
        self.sync()?;
        self.inner.state.lock()?.closed = true;
        Ok(())
    }

    fn merging_thread_count(&self) -> Option<usize> {
        Some(self.merge_thread_count())
    }
}

struct MergeThread<S: MergeSource> {
    source: Arc<S>,
    scheduler: ConcurrentMergeScheduler,
    // a sentinel object used by MergeTaskInfo to determine whether target thread is alive
    _live_sentinel: Arc<ThreadSentinel>,
}

impl<S: MergeSource> MergeThread<S> {
    fn run(&self, first: S::Merge) {
        let inner = &self.scheduler.inner;
        let thread_id = thread::current().id();
        let mut merge = first;
        loop {
            if let Err(e) = run_merge(self.source.as_ref(), &merge) {
                self.handle_merge_error(&merge, e);
                break;
            }
            // keep this thread busy with the next pending merge, if any
            let next = self.source.next_merge();
            let mut state = match inner.state.lock() {
                Ok(state) => state,
                Err(_) => return,
            };
            match next {
                Some(next) => {
                    debug!("merge thread continues with {}", next);
                    if let Some(task) = state
                        .merge_tasks
                        .iter_mut()
                        .find(|t| t.thread_id == thread_id)
                    {
                        task.merge = RunningMerge::new(&next);
                    }
                    state.update_merge_threads();
                    inner.cond.notify_all();
                    merge = next;
                }
                None => break,
            }
        }

        if let Ok(mut state) = inner.state.lock() {
            state.merge_tasks.retain(|t| t.thread_id != thread_id);
            state.update_merge_threads();
        }
        // In case we had stalled indexing, we can now wake up
        // and possibly unstall:
        inner.cond.notify_all();
    }

    fn handle_merge_error(&self, merge: &S::Merge, e: Error) {
        if e.is_merge_aborted() {
            // OK to ignore
            debug!("{} aborted", merge);
            return;
        }
        error!("{} failed: {}", merge, e);
        if let Ok(mut state) = self.scheduler.inner.state.lock() {
            if !state.suppress_exceptions {
                state.exceptions.push(e);
            }
        }
        // don't spin on a persistent failure
        thread::sleep(MERGE_FAILURE_PAUSE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::fmt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct TestMerge {
        id: u32,
        docs: i32,
        progress: Arc<MergeProgress>,
    }

    impl MergeTask for TestMerge {
        fn id(&self) -> u32 {
            self.id
        }

        fn total_doc_count(&self) -> i32 {
            self.docs
        }

        fn progress(&self) -> &Arc<MergeProgress> {
            &self.progress
        }
    }

    impl fmt::Display for TestMerge {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "test merge #{} ({} docs)", self.id, self.docs)
        }
    }

    /// Merges that take `steps` sleeps of 5ms, checking for pause and abort
    /// at every step, and hold at the last step while `gate` is closed.
    struct TestSource {
        pending: Mutex<VecDeque<TestMerge>>,
        steps: usize,
        gate: AtomicBool,
        fail: Vec<u32>,
        running: AtomicUsize,
        max_running: AtomicUsize,
        finished: Mutex<Vec<u32>>,
        started: Mutex<Vec<u32>>,
    }

    impl TestSource {
        fn new(docs: &[i32], steps: usize) -> Arc<TestSource> {
            let pending = docs
                .iter()
                .enumerate()
                .map(|(id, &docs)| TestMerge {
                    id: id as u32,
                    docs,
                    progress: Arc::new(MergeProgress::new()),
                })
                .collect();
            Arc::new(TestSource {
                pending: Mutex::new(pending),
                steps,
                gate: AtomicBool::new(true),
                fail: vec![],
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
                finished: Mutex::new(vec![]),
                started: Mutex::new(vec![]),
            })
        }

        fn finished(&self) -> Vec<u32> {
            self.finished.lock().unwrap().clone()
        }

        fn wait_started(&self, count: usize) {
            while self.started.lock().unwrap().len() < count {
                thread::sleep(Duration::from_millis(2));
            }
        }
    }

    impl MergeSource for TestSource {
        type Merge = TestMerge;

        fn next_merge(&self) -> Option<TestMerge> {
            self.pending.lock().unwrap().pop_front()
        }

        fn has_pending_merges(&self) -> bool {
            !self.pending.lock().unwrap().is_empty()
        }

        fn merge_init(&self, merge: &TestMerge) -> Result<()> {
            self.started.lock().unwrap().push(merge.id);
            Ok(())
        }

        fn merge(&self, merge: &TestMerge) -> Result<()> {
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            let mut step = 0;
            let res = loop {
                if let Err(e) = merge.progress.check_abort() {
                    break Err(e);
                }
                if step >= self.steps && self.gate.load(Ordering::SeqCst) {
                    break Ok(());
                }
                thread::sleep(Duration::from_millis(5));
                step += 1;
            };
            self.running.fetch_sub(1, Ordering::SeqCst);
            res?;
            if self.fail.contains(&merge.id) {
                bail!(RuntimeError(format!("merge {} hit a disk error", merge.id)));
            }
            Ok(())
        }

        fn merge_finish(&self, merge: &TestMerge, success: bool) {
            if success {
                self.finished.lock().unwrap().push(merge.id);
            }
        }
    }

    fn scheduler(max_merge_count: usize, max_thread_count: usize) -> ConcurrentMergeScheduler {
        ConcurrentMergeScheduler::new(
            MergeSchedulerConfig::new(max_merge_count, max_thread_count).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        let config = MergeSchedulerConfig::default();
        assert!(config.max_thread_count >= 1 && config.max_thread_count <= 3);
        assert_eq!(config.max_merge_count, config.max_thread_count + 2);
        assert_eq!(config.merge_thread_priority, NORM_PRIORITY + 1);
        assert!(config.validate().is_ok());

        assert!(MergeSchedulerConfig::new(1, 2).is_err());
        assert!(MergeSchedulerConfig::new(2, 0).is_err());
        let config = MergeSchedulerConfig::from_json(
            r#"{"max_thread_count": 2, "max_merge_count": 4, "merge_thread_priority": 3}"#,
        )
        .unwrap();
        assert_eq!(config.max_merge_count, 4);
        assert!(MergeSchedulerConfig::from_json(r#"{"merge_thread_priority": 11}"#).is_err());

        let cms = scheduler(3, 2);
        assert!(cms.set_merge_thread_priority(0).is_err());
        assert!(cms.set_max_merges_and_threads(1, 2).is_err());
        // rejected changes leave the settings alone
        assert_eq!(cms.config().unwrap(), MergeSchedulerConfig::new(3, 2).unwrap());
        cms.set_max_merges_and_threads(4, 4).unwrap();
        assert_eq!(cms.config().unwrap().max_thread_count, 4);
    }

    #[test]
    fn test_serial_scheduler() {
        let source = TestSource::new(&[10, 20, 30], 1);
        SerialMergeScheduler.merge(&source).unwrap();
        assert_eq!(source.finished(), vec![0, 1, 2]);
        assert_eq!(source.max_running.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_max_merge_count_blocks_producer() {
        let source = TestSource::new(&[100, 100, 100, 100, 100], 10);
        let cms = scheduler(2, 2);
        cms.merge(&source).unwrap();
        // every merge was taken, by the producer or by a merge thread
        assert!(!source.has_pending_merges());
        assert!(cms.merge_thread_count() <= 2);

        cms.sync().unwrap();
        assert_eq!(cms.merge_thread_count(), 0);
        let mut finished = source.finished();
        finished.sort();
        assert_eq!(finished, vec![0, 1, 2, 3, 4]);
        assert!(source.max_running.load(Ordering::SeqCst) <= 2);
        assert!(!cms.any_unhandled_exceptions());
    }

    #[test]
    fn test_producer_waits_for_free_merge_slot() {
        let source = TestSource::new(&[100, 100, 100, 100, 100], 1);
        source.gate.store(false, Ordering::SeqCst);
        let cms = scheduler(2, 2);
        let producer_done = Arc::new(AtomicBool::new(false));

        let producer = {
            let cms = cms.clone();
            let source = Arc::clone(&source);
            let producer_done = Arc::clone(&producer_done);
            thread::spawn(move || {
                cms.merge(&source).unwrap();
                producer_done.store(true, Ordering::SeqCst);
            })
        };

        source.wait_started(2);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(source.started.lock().unwrap().len(), 2);
        assert_eq!(source.pending.lock().unwrap().len(), 3);
        assert!(!producer_done.load(Ordering::SeqCst));
        assert_eq!(cms.merge_thread_count(), 2);

        source.gate.store(true, Ordering::SeqCst);
        producer.join().unwrap();
        assert!(producer_done.load(Ordering::SeqCst));
        cms.sync().unwrap();

        let mut finished = source.finished();
        finished.sort();
        assert_eq!(finished, vec![0, 1, 2, 3, 4]);
        assert!(source.max_running.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_larger_merges_are_paused() {
        let source = TestSource::new(&[1000, 10], 4);
        source.gate.store(false, Ordering::SeqCst);
        let cms = scheduler(3, 1);
        cms.merge(&source).unwrap();
        source.wait_started(2);

        assert_eq!(cms.paused_merges().unwrap(), vec![0]);
        assert_eq!(
            cms.merge_thread_priorities().unwrap(),
            vec![(1, NORM_PRIORITY + 1)]
        );

        source.gate.store(true, Ordering::SeqCst);
        cms.sync().unwrap();
        // the small merge ran while the large one was paused
        assert_eq!(source.finished(), vec![1, 0]);
        assert!(cms.paused_merges().unwrap().is_empty());
    }

    #[test]
    fn test_running_merge_priorities() {
        let source = TestSource::new(&[300, 200, 100], 1);
        source.gate.store(false, Ordering::SeqCst);
        let cms = scheduler(3, 3);
        cms.set_merge_thread_priority(MAX_PRIORITY - 1).unwrap();
        cms.merge(&source).unwrap();
        source.wait_started(3);

        assert_eq!(
            cms.merge_thread_priorities().unwrap(),
            vec![(0, MAX_PRIORITY - 1), (1, MAX_PRIORITY), (2, MAX_PRIORITY)]
        );
        source.gate.store(true, Ordering::SeqCst);
        cms.close().unwrap();
        assert!(cms.merge(&source).is_err());
    }

    #[test]
    fn test_failed_merges_are_recorded() {
        let mut source = TestSource::new(&[1, 2, 3], 1);
        Arc::get_mut(&mut source).unwrap().fail = vec![1];
        let cms = scheduler(1, 1);
        cms.merge(&source).unwrap();
        cms.sync().unwrap();
        // the failed merge stopped its thread; the rest is still pending
        // or done
        cms.merge(&source).unwrap();
        cms.sync().unwrap();

        assert!(cms.any_unhandled_exceptions());
        let exceptions = cms.take_exceptions().unwrap();
        assert_eq!(exceptions.len(), 1);
        assert!(!exceptions[0].is_merge_aborted());
        assert!(!cms.any_unhandled_exceptions());
        let mut finished = source.finished();
        finished.sort();
        assert_eq!(finished, vec![0, 2]);
    }

    #[test]
    fn test_aborted_and_suppressed_errors() {
        let mut source = TestSource::new(&[1, 2], 100);
        Arc::get_mut(&mut source).unwrap().fail = vec![1];
        let cms = scheduler(2, 2);
        cms.set_suppress_exceptions(true).unwrap();
        let abort = Arc::clone(&source.pending.lock().unwrap()[0].progress);
        cms.merge(&source).unwrap();
        abort.set_abort();
        cms.sync().unwrap();
        // merge 0 was aborted, merge 1 failed with errors suppressed
        assert!(!cms.any_unhandled_exceptions());
        assert!(source.finished().is_empty());
    }
}
