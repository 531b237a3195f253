// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Batches diagnostic entries out of the ring and persists them through a
//! pluggable backend, with retry/back-off on transient failures and two
//! independent flush triggers: a pending-entry threshold and an idle timer.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::constants::{
    FLUSH_IDLE_INTERVAL, FLUSH_PENDING_THRESHOLD, PERSISTER_BACKOFF_BASE, PERSISTER_MAX_ATTEMPTS,
};
use crate::error::GatewayError;
use crate::model::DiagnosticEntry;

use super::ring::DiagnosticRing;

/// Where flushed diagnostic batches end up. Implementations only need to
/// append; the persister owns retry and batching policy.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn save(&self, entries: &[DiagnosticEntry]) -> Result<(), GatewayError>;
}

/// Appends newline-delimited JSON records to a file. Simple, human
/// readable, and good enough for a local diagnostic trail; a production
/// deployment can swap in any other `PersistenceBackend`.
pub struct FileBackend {
    path: std::path::PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PersistenceBackend for FileBackend {
    async fn save(&self, entries: &[DiagnosticEntry]) -> Result<(), GatewayError> {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        for entry in entries {
            let line = serde_json::to_string(entry)
                .map_err(|e| GatewayError::IoFailure(format!("serialize diagnostic entry: {e}")))?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// Periodically flushes the diagnostic ring through a [`PersistenceBackend`],
/// retrying a failed save up to [`PERSISTER_MAX_ATTEMPTS`] times with
/// exponential back-off before giving up on that batch.
pub struct FlushManager {
    ring: Arc<DiagnosticRing>,
    backend: Arc<dyn PersistenceBackend>,
    pending: AtomicU32,
}

impl FlushManager {
    pub fn new(ring: Arc<DiagnosticRing>, backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            ring,
            backend,
            pending: AtomicU32::new(0),
        }
    }

    /// Call after every `DiagnosticRing::record` to track the pending-entry
    /// flush trigger.
    pub fn note_recorded(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    fn should_flush_on_count(&self) -> bool {
        self.pending.load(Ordering::Relaxed) >= FLUSH_PENDING_THRESHOLD
    }

    /// Drains the ring and persists the batch, retrying transient failures.
    /// A non-empty drain resets the pending counter regardless of the
    /// outcome — a batch that ultimately fails after all retries is logged
    /// and dropped rather than retried forever.
    pub async fn flush_now(&self) -> Result<usize, GatewayError> {
        let batch = self.ring.drain();
        self.pending.store(0, Ordering::Relaxed);
        if batch.is_empty() {
            return Ok(0);
        }

        let mut attempt = 0u32;
        loop {
            match self.backend.save(&batch).await {
                Ok(()) => return Ok(batch.len()),
                Err(e) => {
                    attempt += 1;
                    if attempt >= PERSISTER_MAX_ATTEMPTS {
                        return Err(e);
                    }
                    let backoff = PERSISTER_BACKOFF_BASE * attempt;
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Runs until `cancel` fires, flushing whenever the pending-count
    /// threshold is hit or the idle interval elapses, whichever comes first.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut idle_ticker = tokio::time::interval(FLUSH_IDLE_INTERVAL);
        let mut poll_ticker = tokio::time::interval(tokio::time::Duration::from_millis(500));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = self.flush_now().await;
                    return;
                }
                _ = idle_ticker.tick() => {
                    let _ = self.flush_now().await;
                }
                _ = poll_ticker.tick() => {
                    if self.should_flush_on_count() {
                        let _ = self.flush_now().await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiagnosticSource;
    use std::sync::Mutex;

    struct RecordingBackend {
        batches: Mutex<Vec<usize>>,
        fail_first_n: Mutex<u32>,
    }

    #[async_trait]
    impl PersistenceBackend for RecordingBackend {
        async fn save(&self, entries: &[DiagnosticEntry]) -> Result<(), GatewayError> {
            let mut remaining = self.fail_first_n.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(GatewayError::IoFailure("simulated failure".to_string()));
            }
            self.batches.lock().unwrap().push(entries.len());
            Ok(())
        }
    }

    #[tokio::test]
    async fn flushing_an_empty_ring_is_a_no_op() {
        let ring = Arc::new(DiagnosticRing::new());
        let backend = Arc::new(RecordingBackend {
            batches: Mutex::new(Vec::new()),
            fail_first_n: Mutex::new(0),
        });
        let manager = FlushManager::new(ring, backend.clone());
        assert_eq!(manager.flush_now().await.unwrap(), 0);
        assert!(backend.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn flush_retries_a_transient_failure_and_then_succeeds() {
        let ring = Arc::new(DiagnosticRing::new());
        ring.record(DiagnosticSource::Uart, b"diagnostic line");
        let backend = Arc::new(RecordingBackend {
            batches: Mutex::new(Vec::new()),
            fail_first_n: Mutex::new(1),
        });
        let manager = FlushManager::new(ring, backend.clone());
        assert_eq!(manager.flush_now().await.unwrap(), 1);
        assert_eq!(backend.batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn the_count_trigger_fires_only_once_the_pending_threshold_is_reached() {
        // spec.md §8 property 12: a burst of 9 appends must not trip the
        // count-based flush trigger; the 10th must.
        let ring = Arc::new(DiagnosticRing::new());
        let backend = Arc::new(RecordingBackend {
            batches: Mutex::new(Vec::new()),
            fail_first_n: Mutex::new(0),
        });
        let manager = FlushManager::new(ring, backend);
        for _ in 0..(FLUSH_PENDING_THRESHOLD - 1) {
            manager.note_recorded();
            assert!(!manager.should_flush_on_count());
        }
        manager.note_recorded();
        assert!(manager.should_flush_on_count());
    }

    #[tokio::test]
    async fn flush_gives_up_after_max_attempts() {
        let ring = Arc::new(DiagnosticRing::new());
        ring.record(DiagnosticSource::Uart, b"diagnostic line");
        let backend = Arc::new(RecordingBackend {
            batches: Mutex::new(Vec::new()),
            fail_first_n: Mutex::new(PERSISTER_MAX_ATTEMPTS),
        });
        let manager = FlushManager::new(ring, backend);
        assert!(manager.flush_now().await.is_err());
    }
}
