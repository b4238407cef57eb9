//! Cooperative periodic tasks driven by the host's tick.

use std::time::{Duration, Instant};

pub const AUTO_OPTIMIZATION_INTERVAL: Duration = Duration::from_secs(30);
pub const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
pub const PLAYER_TIMEOUT_INTERVAL: Duration = Duration::from_secs(10);
pub const INTEGRITY_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    MetricsCollection,
    AutoOptimization,
    SessionCleanup,
    PlayerTimeout,
    Integrity,
}

/// A task that becomes due once `interval` has passed since its last run.
///
/// A task that has never run is due on the first tick.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    pub interval: Duration,
    pub enabled: bool,
    last_run: Option<Instant>,
}

impl PeriodicTask {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            enabled: true,
            last_run: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.enabled
            && self
                .last_run
                .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }

    pub fn mark_run(&mut self, now: Instant) {
        self.last_run = Some(now);
    }

    pub fn reset(&mut self) {
        self.last_run = None;
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    tasks: Vec<(TaskKind, PeriodicTask)>,
}

impl Scheduler {
    pub fn new(metrics_interval: Duration) -> Self {
        Self {
            tasks: vec![
                (TaskKind::MetricsCollection, PeriodicTask::new(metrics_interval)),
                (TaskKind::AutoOptimization, PeriodicTask::new(AUTO_OPTIMIZATION_INTERVAL)),
                (TaskKind::SessionCleanup, PeriodicTask::new(SESSION_CLEANUP_INTERVAL)),
                (TaskKind::PlayerTimeout, PeriodicTask::new(PLAYER_TIMEOUT_INTERVAL)),
                (TaskKind::Integrity, PeriodicTask::new(INTEGRITY_INTERVAL)),
            ],
        }
    }

    /// Returns the due tasks in registration order and marks them as run.
    pub fn take_due(&mut self, now: Instant) -> Vec<TaskKind> {
        self.tasks
            .iter_mut()
            .filter(|(_, task)| task.is_due(now))
            .map(|(kind, task)| {
                task.mark_run(now);
                *kind
            })
            .collect()
    }

    pub fn task(&self, kind: TaskKind) -> Option<&PeriodicTask> {
        self.tasks.iter().find(|(k, _)| *k == kind).map(|(_, t)| t)
    }

    fn task_mut(&mut self, kind: TaskKind) -> Option<&mut PeriodicTask> {
        self.tasks.iter_mut().find(|(k, _)| *k == kind).map(|(_, t)| t)
    }

    pub fn set_enabled(&mut self, kind: TaskKind, enabled: bool) {
        if let Some(task) = self.task_mut(kind) {
            task.enabled = enabled;
            if enabled {
                task.reset();
            }
        }
    }

    pub fn is_enabled(&self, kind: TaskKind) -> bool {
        self.task(kind).is_some_and(|t| t.enabled)
    }

    pub fn set_interval(&mut self, kind: TaskKind, interval: Duration) {
        if let Some(task) = self.task_mut(kind) {
            task.interval = interval;
        }
    }

    /// Makes every task due on the next tick.
    pub fn reset_all(&mut self) {
        for (_, task) in &mut self.tasks {
            task.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_runs_everything() {
        let mut scheduler = Scheduler::new(Duration::from_secs(5));
        let due = scheduler.take_due(Instant::now());
        assert_eq!(due.len(), 5);
    }

    #[test]
    fn test_tasks_follow_their_intervals() {
        let mut scheduler = Scheduler::new(Duration::from_secs(5));
        let start = Instant::now();
        scheduler.take_due(start);

        assert!(scheduler.take_due(start + Duration::from_secs(1)).is_empty());
        assert_eq!(
            scheduler.take_due(start + Duration::from_secs(5)),
            vec![TaskKind::MetricsCollection]
        );
        assert_eq!(
            scheduler.take_due(start + Duration::from_secs(10)),
            vec![TaskKind::MetricsCollection, TaskKind::PlayerTimeout]
        );
    }

    #[test]
    fn test_disabled_tasks_never_run() {
        let mut scheduler = Scheduler::new(Duration::from_secs(5));
        scheduler.set_enabled(TaskKind::SessionCleanup, false);

        let due = scheduler.take_due(Instant::now());
        assert!(!due.contains(&TaskKind::SessionCleanup));
        assert!(!scheduler.is_enabled(TaskKind::SessionCleanup));

        scheduler.set_enabled(TaskKind::SessionCleanup, true);
        assert_eq!(scheduler.take_due(Instant::now()), vec![TaskKind::SessionCleanup]);
    }
}
