//! Instrumentation counters shared by the supervisor, its actions and their
//! watchers.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::action::ActionState;

/// Live counters.  Cheap to update from any task.
#[derive(Debug, Default)]
pub struct SupervisorStats {
    started: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
    running: AtomicU64,
    peak_running: AtomicU64,
    live_watchers: AtomicU64,
    pose_ticks: AtomicU64,
    join_timeouts: AtomicU64,
}

/// A point-in-time copy of [`SupervisorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub started: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub failed: u64,
    pub running: u64,
    pub peak_running: u64,
    pub live_watchers: u64,
    pub pose_ticks: u64,
    pub join_timeouts: u64,
}

impl SupervisorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started: self.started.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            running: self.running.load(Ordering::SeqCst),
            peak_running: self.peak_running.load(Ordering::SeqCst),
            live_watchers: self.live_watchers.load(Ordering::SeqCst),
            pose_ticks: self.pose_ticks.load(Ordering::SeqCst),
            join_timeouts: self.join_timeouts.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn action_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    /// Count a terminal state.  Non-terminal states are ignored.
    pub(crate) fn action_finished(&self, state: &ActionState) {
        let counter = match state {
            ActionState::Completed => &self.completed,
            ActionState::Cancelled => &self.cancelled,
            ActionState::Failed(_) => &self.failed,
            ActionState::Created | ActionState::Running => return,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn pose_tick(&self) {
        self.pose_ticks.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn join_timeout(&self) {
        self.join_timeouts.fetch_add(1, Ordering::SeqCst);
    }

    /// Mark an action body as running until the guard drops.
    pub(crate) fn running_guard(&self) -> RunningGuard<'_> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(now, Ordering::SeqCst);
        RunningGuard { stats: self }
    }

    /// Mark a watcher task as alive until the guard drops.
    pub(crate) fn watcher_guard(&self) -> WatcherGuard<'_> {
        self.live_watchers.fetch_add(1, Ordering::SeqCst);
        WatcherGuard { stats: self }
    }
}

/// Decrements the running count on drop, including when the task is aborted.
pub(crate) struct RunningGuard<'a> {
    stats: &'a SupervisorStats,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.stats.running.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) struct WatcherGuard<'a> {
    stats: &'a SupervisorStats,
}

impl Drop for WatcherGuard<'_> {
    fn drop(&mut self) {
        self.stats.live_watchers.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_guard_tracks_peak() {
        let stats = SupervisorStats::new();
        {
            let _a = stats.running_guard();
            let _b = stats.running_guard();
            assert_eq!(stats.snapshot().running, 2);
        }
        let _c = stats.running_guard();
        let snap = stats.snapshot();
        assert_eq!(snap.running, 1);
        assert_eq!(snap.peak_running, 2);
    }

    #[test]
    fn terminal_states_are_counted_once() {
        let stats = SupervisorStats::new();
        stats.action_finished(&ActionState::Running);
        stats.action_finished(&ActionState::Completed);
        stats.action_finished(&ActionState::Cancelled);
        stats.action_finished(&ActionState::Failed("boom".into()));
        let snap = stats.snapshot();
        assert_eq!((snap.completed, snap.cancelled, snap.failed), (1, 1, 1));
    }

    #[test]
    fn watcher_guard_releases_on_drop() {
        let stats = SupervisorStats::new();
        let guard = stats.watcher_guard();
        assert_eq!(stats.snapshot().live_watchers, 1);
        drop(guard);
        assert_eq!(stats.snapshot().live_watchers, 0);
    }
}
