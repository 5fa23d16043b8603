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

use error::ErrorKind::MergeAborted;
use error::Result;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Longest single wait of a paused merge before it rechecks its state.
const MAX_PAUSE_WAIT: Duration = Duration::from_millis(250);

#[derive(Default)]
struct PauseState {
    paused: bool,
    total_paused: Duration,
}

/// Control block shared between a running merge and whoever owns it.
///
/// The merge calls `check_abort` at its loop boundaries; the owner can abort
/// the merge, or pause it, in which case the merge blocks inside its next
/// `check_abort` until it is resumed or aborted.
pub struct MergeProgress {
    abort: AtomicBool,
    lock: Mutex<PauseState>,
    cond: Condvar,
}

impl Default for MergeProgress {
    fn default() -> Self {
        MergeProgress {
            abort: AtomicBool::new(false),
            lock: Mutex::new(PauseState::default()),
            cond: Condvar::new(),
        }
    }
}

impl MergeProgress {
    pub fn new() -> Self {
        Default::default()
    }

    /// Fails with `MergeAborted` if the merge was aborted; blocks while the
    /// merge is paused.
    pub fn check_abort(&self) -> Result<()> {
        let mut state = self.lock.lock()?;
        loop {
            if self.aborted() {
                bail!(MergeAborted("merge is aborted".into()));
            }
            if !state.paused {
                return Ok(());
            }
            let start = Instant::now();
            let (guard, _) = self.cond.wait_timeout(state, MAX_PAUSE_WAIT)?;
            state = guard;
            state.total_paused += start.elapsed();
        }
    }

    pub fn set_abort(&self) {
        self.abort.store(true, Ordering::Release);
        // wake a paused merge so it sees the abort
        if let Ok(_guard) = self.lock.lock() {
            self.cond.notify_all();
        }
    }

    pub fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    pub fn set_pause(&self, paused: bool) -> Result<()> {
        let mut state = self.lock.lock()?;
        if state.paused != paused {
            state.paused = paused;
            self.cond.notify_all();
        }
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.lock.lock().map(|s| s.paused).unwrap_or(false)
    }

    /// Time the merge spent blocked while paused.
    pub fn paused_duration(&self) -> Duration {
        self.lock
            .lock()
            .map(|s| s.total_paused)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_abort() {
        let progress = MergeProgress::new();
        assert!(progress.check_abort().is_ok());
        progress.set_abort();
        assert!(progress.aborted());
        assert!(progress.check_abort().unwrap_err().is_merge_aborted());
    }

    #[test]
    fn test_pause_blocks_until_resumed() {
        let progress = Arc::new(MergeProgress::new());
        progress.set_pause(true).unwrap();
        assert!(progress.is_paused());

        let p = Arc::clone(&progress);
        let handle = thread::spawn(move || p.check_abort().is_ok());
        thread::sleep(Duration::from_millis(50));
        progress.set_pause(false).unwrap();
        assert!(handle.join().unwrap());
        assert!(progress.paused_duration() >= Duration::from_millis(40));
    }

    #[test]
    fn test_abort_wakes_paused_merge() {
        let progress = Arc::new(MergeProgress::new());
        progress.set_pause(true).unwrap();
        let p = Arc::clone(&progress);
        let handle = thread::spawn(move || p.check_abort());
        thread::sleep(Duration::from_millis(20));
        progress.set_abort();
        assert!(handle.join().unwrap().unwrap_err().is_merge_aborted());
    }
}
