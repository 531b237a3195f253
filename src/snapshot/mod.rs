// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Holds the most recent [`LiveData`] and fans it out to synchronous
//! listeners. Listener tables are copied onto the stack and the lock
//! released before any listener runs, so a slow or misbehaving listener
//! cannot block a concurrent `update()` or a concurrent `subscribe()`.
//!
//! Registration returns a typed handle rather than requiring callers to
//! hand back the same `(fn, ctx)` pair to unregister: each `subscribe_*`
//! call creates one independent, addressable entry, so registering the
//! same callback twice yields two live subscriptions, not one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use arrayvec::ArrayVec;

use crate::constants::MAX_LISTENERS_PER_KIND;
use crate::error::GatewayError;
use crate::model::{Alarms, LiveData};

pub type LiveDataListener = Arc<dyn Fn(&LiveData) + Send + Sync>;
pub type AlarmListener = Arc<dyn Fn(&Alarms) + Send + Sync>;

/// An opaque handle returned by `subscribe_*`, used to unregister later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

struct Entry<T> {
    id: u64,
    listener: T,
}

/// The gateway's single point of truth for "what did the BMS last report".
pub struct SnapshotRegister {
    current: RwLock<Option<LiveData>>,
    live_data_listeners: Mutex<ArrayVec<Entry<LiveDataListener>, MAX_LISTENERS_PER_KIND>>,
    alarm_listeners: Mutex<ArrayVec<Entry<AlarmListener>, MAX_LISTENERS_PER_KIND>>,
    next_id: AtomicU64,
}

impl SnapshotRegister {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            live_data_listeners: Mutex::new(ArrayVec::new()),
            alarm_listeners: Mutex::new(ArrayVec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Replaces the current snapshot and fans the update out to every
    /// registered listener.
    pub fn update(&self, data: LiveData) {
        let alarms = data.alarms();
        {
            let mut guard = self.current.write().expect("snapshot lock poisoned");
            *guard = Some(data.clone());
        }
        self.notify_live_data(&data);
        self.notify_alarms(&alarms);
    }

    pub fn latest(&self) -> Option<LiveData> {
        self.current.read().expect("snapshot lock poisoned").clone()
    }

    /// Registers a live-data listener and returns a handle that unregisters
    /// it. If a snapshot already exists the listener is invoked immediately
    /// with it (exactly one synchronous callback) before this call returns,
    /// so a late subscriber doesn't have to wait for the next poll.
    pub fn subscribe_live_data(
        &self,
        listener: LiveDataListener,
    ) -> Result<ListenerHandle, GatewayError> {
        let id = self.allocate_id();
        {
            let mut guard = self
                .live_data_listeners
                .lock()
                .expect("listener lock poisoned");
            guard
                .try_push(Entry { id, listener: listener.clone() })
                .map_err(|_| {
                    GatewayError::NoMem("live-data listener table is full".to_string())
                })?;
        }
        if let Some(current) = self.latest() {
            listener(&current);
        }
        Ok(ListenerHandle(id))
    }

    /// Removes a previously registered live-data listener. A no-op if the
    /// handle is unknown (already unregistered, or from a different
    /// register).
    pub fn unsubscribe_live_data(&self, handle: ListenerHandle) {
        let mut guard = self
            .live_data_listeners
            .lock()
            .expect("listener lock poisoned");
        guard.retain(|e| e.id != handle.0);
    }

    pub fn subscribe_alarms(&self, listener: AlarmListener) -> Result<ListenerHandle, GatewayError> {
        let id = self.allocate_id();
        {
            let mut guard = self
                .alarm_listeners
                .lock()
                .expect("listener lock poisoned");
            guard
                .try_push(Entry { id, listener: listener.clone() })
                .map_err(|_| GatewayError::NoMem("alarm listener table is full".to_string()))?;
        }
        if let Some(current) = self.latest() {
            listener(&current.alarms());
        }
        Ok(ListenerHandle(id))
    }

    pub fn unsubscribe_alarms(&self, handle: ListenerHandle) {
        let mut guard = self.alarm_listeners.lock().expect("listener lock poisoned");
        guard.retain(|e| e.id != handle.0);
    }

    fn notify_live_data(&self, data: &LiveData) {
        let listeners: Vec<LiveDataListener> = {
            let guard = self
                .live_data_listeners
                .lock()
                .expect("listener lock poisoned");
            guard.iter().map(|e| e.listener.clone()).collect()
        };
        for listener in listeners {
            listener(data);
        }
    }

    fn notify_alarms(&self, alarms: &Alarms) {
        let listeners: Vec<AlarmListener> = {
            let guard = self.alarm_listeners.lock().expect("listener lock poisoned");
            guard.iter().map(|e| e.listener.clone()).collect()
        };
        for listener in listeners {
            listener(alarms);
        }
    }
}

impl Default for SnapshotRegister {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Limits, RegisterLog};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_live_data(pack_voltage_v: f32) -> LiveData {
        LiveData {
            timestamp_ms: 0,
            pack_voltage_v,
            pack_current_a: 0.0,
            cell_voltages_mv: [3700; 16],
            min_cell_mv: Some(3700),
            max_cell_mv: Some(3700),
            imbalance_mv: 0,
            state_of_charge_pct: 80.0,
            state_of_health_pct: 99.0,
            pack_temperature_min_c: 20.0,
            pack_temperature_max_c: 25.0,
            mosfet_temperature_c: 22.0,
            balancing_bits: 0,
            cell_balancing: [0; 16],
            status_code: 0,
            raw_alarm_bits: 0,
            raw_warning_bits: 0,
            charge_cutoff_voltage_v: 58.0,
            discharge_cutoff_voltage_v: 42.0,
            limits: Limits {
                max_charge_current_a: 10.0,
                max_discharge_current_a: 20.0,
                charge_overcurrent_limit_a: 15.0,
                discharge_overcurrent_limit_a: 25.0,
            },
            cycle_count: 1,
            uptime_s: 10,
            serial_number: "TB-0001".to_string(),
            register_log: RegisterLog::new(),
        }
    }

    #[test]
    fn a_listener_registered_after_an_update_is_replayed_exactly_once() {
        let register = SnapshotRegister::new();
        register.update(sample_live_data(48.0));

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let listener: LiveDataListener = Arc::new(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });
        register.subscribe_live_data(listener).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_listener_registered_before_any_update_is_not_replayed() {
        let register = SnapshotRegister::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let listener: LiveDataListener = Arc::new(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });
        register.subscribe_live_data(listener).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn registering_the_same_listener_twice_succeeds_both_times_as_independent_entries() {
        let register = SnapshotRegister::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let listener: LiveDataListener = Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        register.subscribe_live_data(listener.clone()).unwrap();
        register.subscribe_live_data(listener).unwrap();
        register.update(sample_live_data(48.0));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn after_one_unregister_the_callback_is_not_invoked() {
        let register = SnapshotRegister::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let listener: LiveDataListener = Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        let handle = register.subscribe_live_data(listener).unwrap();
        register.unsubscribe_live_data(handle);
        register.update(sample_live_data(48.0));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn two_registers_then_two_unregisters_leaves_no_callback_invoked() {
        let register = SnapshotRegister::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let listener: LiveDataListener = Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        let first = register.subscribe_live_data(listener.clone()).unwrap();
        let second = register.subscribe_live_data(listener).unwrap();
        register.unsubscribe_live_data(first);
        register.unsubscribe_live_data(second);
        register.update(sample_live_data(48.0));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn updates_notify_every_registered_listener() {
        let register = SnapshotRegister::new();
        let seen = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let seen_clone = seen.clone();
            register
                .subscribe_live_data(Arc::new(move |_| {
                    seen_clone.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }
        register.update(sample_live_data(50.0));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
