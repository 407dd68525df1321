use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::DriverRecord;
use crate::models::rescue::{Rescue, RescueStatus};
use crate::models::returns::ReturnLog;

/// In-memory presence store: source of truth for driver, rescue, and returns
/// records. Writes to one driver go through that document's entry lock, so
/// concurrent writers are serialized per document and subscribers see updates
/// in write order. Last-writer-wins; no compare-and-swap.
pub struct PresenceStore {
    drivers: DashMap<Uuid, DriverRecord>,
    rescues: DashMap<Uuid, Rescue>,
    returns: DashMap<Uuid, ReturnLog>,
    subscribers: DashMap<Uuid, broadcast::Sender<DriverRecord>>,
    event_buffer_size: usize,
}

impl PresenceStore {
    pub fn new(event_buffer_size: usize) -> Self {
        Self {
            drivers: DashMap::new(),
            rescues: DashMap::new(),
            returns: DashMap::new(),
            subscribers: DashMap::new(),
            event_buffer_size,
        }
    }

    pub fn create_driver(&self, name: String, dsp_name: String) -> DriverRecord {
        let driver = DriverRecord::new(name, dsp_name);
        self.drivers.insert(driver.id, driver.clone());
        driver
    }

    pub fn get_driver(&self, id: Uuid) -> Option<DriverRecord> {
        self.drivers.get(&id).map(|entry| entry.value().clone())
    }

    pub fn list_drivers(&self) -> Vec<DriverRecord> {
        self.drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    pub fn on_duty_count(&self) -> usize {
        self.drivers
            .iter()
            .filter(|entry| entry.value().is_on_duty)
            .count()
    }

    /// Subscribe to one driver's record stream. Delivery is ordered per
    /// document; subscribers only receive snapshots published after the call,
    /// so callers wanting the current state should `get_driver` after
    /// subscribing.
    pub fn subscribe(&self, driver_id: Uuid) -> broadcast::Receiver<DriverRecord> {
        self.subscribers
            .entry(driver_id)
            .or_insert_with(|| broadcast::channel(self.event_buffer_size).0)
            .subscribe()
    }

    /// Apply a partial write to one driver record. The mutation runs under the
    /// document's entry lock; when it reports a change (`Ok(true)`) the record
    /// is stamped and the new snapshot fanned out to subscribers before the
    /// lock is released, which is what keeps delivery ordered.
    pub fn write_driver<F>(&self, driver_id: Uuid, mutate: F) -> Result<(DriverRecord, bool), AppError>
    where
        F: FnOnce(&mut DriverRecord) -> Result<bool, AppError>,
    {
        let mut entry = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {} not found", driver_id)))?;

        let changed = mutate(entry.value_mut())?;
        if changed {
            entry.updated_at = Utc::now();
            let snapshot = entry.value().clone();
            if let Some(tx) = self.subscribers.get(&driver_id) {
                let _ = tx.send(snapshot);
            }
        }

        Ok((entry.value().clone(), changed))
    }

    /// Create a `Dispatched` rescue. At most one active rescue is allowed per
    /// rescuer; a second dispatch while one is outstanding is rejected.
    /// Dispatches for one rescuer serialize through the rescuer's driver entry
    /// lock, so two concurrent dispatches cannot both pass the active-rescue
    /// check.
    pub fn create_rescue(
        &self,
        rescuer_id: Uuid,
        rescuee_name: String,
        rescue_address: String,
    ) -> Result<Rescue, AppError> {
        let _rescuer = self
            .drivers
            .get_mut(&rescuer_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {} not found", rescuer_id)))?;

        let already_dispatched = self.rescues.iter().any(|entry| {
            entry.rescuer_id == rescuer_id && entry.status == RescueStatus::Dispatched
        });
        if already_dispatched {
            return Err(AppError::Conflict(format!(
                "driver {} already has a dispatched rescue",
                rescuer_id
            )));
        }

        let rescue = Rescue {
            id: Uuid::new_v4(),
            rescuer_id,
            rescuee_name,
            rescue_address,
            status: RescueStatus::Dispatched,
            dispatched_at: Utc::now(),
            acknowledged_at: None,
        };
        self.rescues.insert(rescue.id, rescue.clone());
        Ok(rescue)
    }

    pub fn get_rescue(&self, id: Uuid) -> Option<Rescue> {
        self.rescues.get(&id).map(|entry| entry.value().clone())
    }

    /// Acknowledge a rescue: flips the rescue to `Acknowledged` and marks the
    /// rescuer's driver record `is_rescuing`, one causal unit from the caller's
    /// perspective (driver write first, then the rescue flip, so a failed
    /// driver write leaves the rescue `Dispatched`; cross-document ordering
    /// beyond that is not guaranteed). Acknowledging an already acknowledged
    /// rescue is a safe no-op.
    pub fn acknowledge_rescue(&self, rescue_id: Uuid, rescuer_id: Uuid) -> Result<Rescue, AppError> {
        let current = self
            .get_rescue(rescue_id)
            .ok_or_else(|| AppError::NotFound(format!("rescue {} not found", rescue_id)))?;

        if current.rescuer_id != rescuer_id {
            return Err(AppError::InvalidTransition(format!(
                "rescue {} is not addressed to driver {}",
                rescue_id, rescuer_id
            )));
        }

        if current.status == RescueStatus::Acknowledged {
            return Ok(current);
        }

        self.write_driver(rescuer_id, |rec| {
            if rec.is_rescuing {
                return Ok(false);
            }
            rec.is_rescuing = true;
            Ok(true)
        })?;

        let mut entry = self
            .rescues
            .get_mut(&rescue_id)
            .ok_or_else(|| AppError::NotFound(format!("rescue {} not found", rescue_id)))?;

        // re-check under the entry lock: a concurrent acknowledgement may have
        // flipped the record between the read above and here
        if entry.status != RescueStatus::Acknowledged {
            entry.status = RescueStatus::Acknowledged;
            entry.acknowledged_at = Some(Utc::now());
        }

        Ok(entry.value().clone())
    }

    pub fn rescues_for(&self, rescuer_id: Option<Uuid>, status: Option<RescueStatus>) -> Vec<Rescue> {
        let mut rescues: Vec<Rescue> = self
            .rescues
            .iter()
            .filter(|entry| rescuer_id.is_none_or(|id| entry.rescuer_id == id))
            .filter(|entry| status.is_none_or(|s| entry.status == s))
            .map(|entry| entry.value().clone())
            .collect();
        rescues.sort_by(|a, b| b.dispatched_at.cmp(&a.dispatched_at));
        rescues
    }

    pub fn rescue_count(&self) -> usize {
        self.rescues.len()
    }

    /// Append one completed-route summary. Append-only; nothing ever mutates
    /// or deletes a logged return.
    pub fn append_return(
        &self,
        driver_id: Uuid,
        dsp_name: String,
        return_count: u32,
        reasons: Vec<String>,
    ) -> Result<ReturnLog, AppError> {
        if !self.drivers.contains_key(&driver_id) {
            return Err(AppError::NotFound(format!("driver {} not found", driver_id)));
        }

        let log = ReturnLog {
            id: Uuid::new_v4(),
            driver_id,
            dsp_name,
            return_count,
            reasons,
            logged_at: Utc::now(),
        };
        self.returns.insert(log.id, log.clone());
        Ok(log)
    }

    /// Returns for one driver, newest first.
    pub fn returns_for(&self, driver_id: Uuid) -> Vec<ReturnLog> {
        let mut logs: Vec<ReturnLog> = self
            .returns
            .iter()
            .filter(|entry| entry.driver_id == driver_id)
            .map(|entry| entry.value().clone())
            .collect();
        logs.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));
        logs
    }

    pub fn return_count(&self) -> usize {
        self.returns.len()
    }
}
