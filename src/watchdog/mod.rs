// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Soft watchdog: tracks liveness of the gateway's own async tasks (poller,
//! bus fan-out workers, adapter publishers) and reports a JSON status a
//! supervisor process can poll, without relying on process-level restarts.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use arrayvec::ArrayVec;
use serde::Serialize;

use crate::clock::now_ms;
use crate::constants::{MAX_WATCHDOG_NAME_LEN, MAX_WATCHDOG_TASKS, WATCHDOG_CHECK_INTERVAL};
use crate::error::GatewayError;
use crate::model::WatchdogTaskRecord;

#[derive(Debug, Serialize)]
pub struct WatchdogStatusReport {
    pub tasks: Vec<WatchdogTaskRecord>,
    pub generated_at_ms: u64,
    pub tasks_timeout: u64,
}

pub struct Watchdog {
    tasks: Mutex<ArrayVec<WatchdogTaskRecord, MAX_WATCHDOG_TASKS>>,
    tasks_timeout: AtomicU64,
}

impl Watchdog {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(ArrayVec::new()),
            tasks_timeout: AtomicU64::new(0),
        }
    }

    /// Registers a task with the given soft timeout. Re-registering an
    /// already-known name resets its record instead of erroring.
    pub async fn register(&self, name: &str, timeout_ms: u64) -> Result<(), GatewayError> {
        if name.len() > MAX_WATCHDOG_NAME_LEN {
            return Err(GatewayError::InvalidArgument(format!(
                "watchdog task name longer than {MAX_WATCHDOG_NAME_LEN} bytes: {name}"
            )));
        }
        let mut tasks = self.tasks.lock().await;
        if let Some(existing) = tasks.iter_mut().find(|t| t.name == name) {
            existing.timeout_ms = timeout_ms;
            existing.last_checkin_ms = now_ms();
            existing.missed_checkins = 0;
            existing.is_alive = true;
            return Ok(());
        }
        tasks
            .try_push(WatchdogTaskRecord {
                name: name.to_string(),
                timeout_ms,
                last_checkin_ms: now_ms(),
                missed_checkins: 0,
                is_alive: true,
            })
            .map_err(|_| GatewayError::NoMem("watchdog task table is full".to_string()))
    }

    /// Records a liveness check-in for `name`.
    pub async fn checkin(&self, name: &str) -> Result<(), GatewayError> {
        let mut tasks = self.tasks.lock().await;
        let record = tasks
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| GatewayError::NotFound(format!("unknown watchdog task: {name}")))?;
        record.last_checkin_ms = now_ms();
        record.missed_checkins = 0;
        record.is_alive = true;
        Ok(())
    }

    /// Sweeps every task once, marking any that have gone silent past their
    /// timeout as no longer alive. `tasks_timeout` only increments on the
    /// alive-to-dead transition, not on every sweep a dead task stays dead.
    pub async fn sweep(&self) {
        let now = now_ms();
        let mut tasks = self.tasks.lock().await;
        for task in tasks.iter_mut() {
            if now.saturating_sub(task.last_checkin_ms) > task.timeout_ms {
                task.missed_checkins += 1;
                if task.is_alive {
                    task.is_alive = false;
                    self.tasks_timeout.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Cumulative count of alive-to-dead transitions observed across all
    /// tasks since this watchdog was created.
    pub fn tasks_timeout(&self) -> u64 {
        self.tasks_timeout.load(Ordering::Relaxed)
    }

    pub async fn status_report(&self) -> WatchdogStatusReport {
        let tasks = self.tasks.lock().await;
        WatchdogStatusReport {
            tasks: tasks.iter().cloned().collect(),
            generated_at_ms: now_ms(),
            tasks_timeout: self.tasks_timeout(),
        }
    }

    /// Runs the periodic sweep until `cancel` fires. Intended to be spawned
    /// as its own task alongside the poller.
    pub async fn run_monitor(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(WATCHDOG_CHECK_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => self.sweep().await,
            }
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_freshly_registered_task_is_alive() {
        let watchdog = Watchdog::new();
        watchdog.register("poller", 5_000).await.unwrap();
        let report = watchdog.status_report().await;
        assert!(report.tasks[0].is_alive);
    }

    #[tokio::test]
    async fn sweeping_a_stale_task_marks_it_dead() {
        let watchdog = Watchdog::new();
        watchdog.register("poller", 0).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
        watchdog.sweep().await;
        let report = watchdog.status_report().await;
        assert!(!report.tasks[0].is_alive);
        assert_eq!(report.tasks[0].missed_checkins, 1);
    }

    #[tokio::test]
    async fn a_stale_sweep_increments_the_cumulative_timeout_counter_exactly_once() {
        let watchdog = Watchdog::new();
        watchdog.register("poller", 0).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
        watchdog.sweep().await;
        watchdog.sweep().await;
        assert_eq!(watchdog.tasks_timeout(), 1);
    }

    #[tokio::test]
    async fn a_checkin_revives_a_task_that_had_gone_stale() {
        let watchdog = Watchdog::new();
        watchdog.register("poller", 0).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
        watchdog.sweep().await;
        watchdog.checkin("poller").await.unwrap();
        let report = watchdog.status_report().await;
        assert!(report.tasks[0].is_alive);
    }

    #[tokio::test]
    async fn checkin_on_an_unknown_task_is_not_found() {
        let watchdog = Watchdog::new();
        assert!(matches!(
            watchdog.checkin("ghost").await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_an_overlong_task_name() {
        let watchdog = Watchdog::new();
        let name = "x".repeat(MAX_WATCHDOG_NAME_LEN + 1);
        assert!(matches!(
            watchdog.register(&name, 1_000).await,
            Err(GatewayError::InvalidArgument(_))
        ));
    }
}
