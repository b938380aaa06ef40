//! Periodic maintenance: importance decay, sketch aging and eviction.
//!
//! A dedicated thread wakes on a timer, runs one decay pass, and follows up
//! with an eviction pass when the engine is over capacity. Passes check the
//! shutdown flag between records so a stop request never waits for a full
//! sweep.

use super::{EngineState, MemoryCore};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Cap on the per-pass retention multiplier. Keeps decay strictly
/// monotonic: even a maximally hot, just-touched record loses a sliver of
/// importance every pass.
const MAX_RETENTION: f32 = 0.99;

impl MemoryCore {
    /// Runs one decay pass followed by an eviction pass if the engine is
    /// over capacity. This is what the maintenance timer invokes; it is
    /// public so embedders without a background thread can drive
    /// maintenance themselves.
    pub fn run_maintenance(&self) {
        self.decay_pass();
        if self.records.len() > self.config.engine.capacity {
            self.eviction_pass(false, None);
        }
    }

    /// Sweeps every record, scaling its importance down by a retention
    /// multiplier derived from its sketch hotness and idle time, then ages
    /// the sketch. Only breakthrough records are exempt; records that became
    /// shared through hot access keep decaying like any other. Importance
    /// never increases here and never drops below zero.
    pub fn decay_pass(&self) {
        self.decay_pass_at(Self::now_secs());
    }

    pub(crate) fn decay_pass_at(&self, now: u64) {
        self.set_state(EngineState::Decaying);

        let decay_rate = self.config.decay.decay_rate;
        let saturation = self.config.sketch.hotness_saturation.max(1) as f32;
        // Idle half-life: a record untouched for four intervals has its
        // hotness contribution halved.
        let half_life = (self.config.decay.interval_secs.max(1) * 4) as f32;

        let mut swept = 0usize;
        for mut record in self.records.iter_mut() {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::debug!(swept, "decay pass interrupted by shutdown");
                break;
            }
            if record.breakthrough {
                continue;
            }

            let hotness = (self.sketch.estimate(record.content_key()) as f32 / saturation).min(1.0);
            let idle = now.saturating_sub(record.last_accessed_at) as f32;
            let freshness = 0.5_f32.powf(idle / half_life);

            let retention =
                (decay_rate + (1.0 - decay_rate) * hotness * freshness).min(MAX_RETENTION);
            record.importance = (record.importance * retention).max(0.0);
            swept += 1;
        }

        // Halve the sketch so stale access counts fade alongside importance.
        self.sketch.age();
        self.decay_passes.fetch_add(1, Ordering::Relaxed);
        self.set_state(EngineState::Idle);
        tracing::debug!(swept, "decay pass complete");
    }

    /// Reclaims capacity by removing the lowest-importance records.
    ///
    /// Unshared records are always victimized first, in ascending importance
    /// order; shared records are touched only when no unshared record
    /// remains. With `force_at_least_one` the pass removes at least one
    /// record even under capacity, which is how a full deletable filter gets
    /// relieved mid-store. A store-triggered pass names its in-flight
    /// record in `protect`, since evicting it would free no filter slot and
    /// turn the store's success into a silent loss.
    ///
    /// A failed individual removal is logged and counted, never fatal to
    /// the pass.
    pub(crate) fn eviction_pass(&self, force_at_least_one: bool, protect: Option<u64>) {
        self.set_state(EngineState::Evicting);

        let capacity = self.config.engine.capacity;
        let mut victims = self.eviction_order(protect);
        let mut evicted = 0usize;

        while let Some(id) = victims.pop() {
            let over_capacity = self.records.len() > capacity;
            let forced = force_at_least_one && evicted == 0;
            if !over_capacity && !forced {
                break;
            }
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::debug!(evicted, "eviction pass interrupted by shutdown");
                break;
            }

            match self.remove_record(id) {
                Ok(()) => {
                    self.eviction_count.fetch_add(1, Ordering::Relaxed);
                    evicted += 1;
                    tracing::debug!(id, "record evicted");
                }
                Err(err) => {
                    // Likely forgotten concurrently; record it and move on.
                    self.maintenance_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(id, error = %err, "eviction of record failed");
                }
            }
        }

        self.set_state(EngineState::Idle);
        if evicted > 0 {
            tracing::info!(evicted, size = self.records.len(), "eviction pass complete");
        }
    }

    /// Victim ids ordered so that `pop` yields the next-best victim:
    /// unshared before shared, lower importance before higher. `protect`
    /// is excluded entirely.
    fn eviction_order(&self, protect: Option<u64>) -> Vec<u64> {
        let mut candidates: Vec<(bool, f32, u64)> = self
            .records
            .iter()
            .filter(|record| Some(record.id) != protect)
            .map(|record| (record.shared, record.importance, record.id))
            .collect();

        // Sort descending by (shared, importance) so pop() returns the
        // lowest-importance unshared record first.
        candidates.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.1.total_cmp(&a.1))
                .then_with(|| b.2.cmp(&a.2))
        });

        candidates.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Starts the background maintenance thread. The returned handle stops
    /// the thread on `stop` or on drop.
    #[must_use]
    pub fn spawn_maintenance(self: &Arc<Self>) -> MaintenanceHandle {
        self.shutdown.store(false, Ordering::Relaxed);
        let core = Arc::clone(self);
        let interval = Duration::from_secs(self.config.decay.interval_secs.max(1));
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let join = std::thread::Builder::new()
            .name("engram-maintenance".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => core.run_maintenance(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .expect("failed to spawn maintenance thread");

        tracing::info!(interval_secs = interval.as_secs(), "maintenance thread started");
        MaintenanceHandle {
            core: Arc::clone(self),
            stop_tx,
            join: Some(join),
        }
    }
}

/// Owner handle for the background maintenance thread.
pub struct MaintenanceHandle {
    core: Arc<MemoryCore>,
    stop_tx: Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Stops the maintenance thread, interrupting any pass in flight, and
    /// waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        self.core.shutdown.store(true, Ordering::Relaxed);
        let _ = self.stop_tx.send(());
        if join.join().is_err() {
            tracing::error!("maintenance thread panicked");
        } else {
            tracing::info!("maintenance thread stopped");
        }
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}
