//! In-memory repositories backing the router tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

use tracker::errors::{Error, Result};
use tracker::model::{
    Alert, AlertId, AlertStatus, AuditMeta, Device, DeviceId, DeviceProfile, MaintenanceEvent,
    OperationalState, Plan, PlanId, Reading,
};
use tracker::ports::{
    AlertRepository, CreateAlertInput, CreateDeviceInput, CreateMaintenanceInput,
    CreateReadingInput, DeviceRepository, MaintenanceRepository, PlanInput, PlanRepository,
    ReadingRepository, UpdateDeviceBasicInput,
};
use tracker::{build_state, rest, Repositories};

#[derive(Default)]
struct Tables {
    next_id: i64,
    devices: Vec<Device>,
    plans: Vec<Plan>,
    readings: Vec<Reading>,
    alerts: Vec<Alert>,
    events: Vec<MaintenanceEvent>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn live_device_mut(&mut self, id: DeviceId) -> Result<&mut Device> {
        self.devices
            .iter_mut()
            .find(|d| d.id == id && d.audit.deleted_at.is_none())
            .ok_or_else(|| Error::not_found(format!("device {} not found", id)))
    }

    fn plan_exists(&self, id: PlanId) -> bool {
        self.plans.iter().any(|p| p.id == id)
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            devices: Arc::new(self.clone()),
            plans: Arc::new(self.clone()),
            readings: Arc::new(self.clone()),
            alerts: Arc::new(self.clone()),
            maintenance: Arc::new(self.clone()),
        }
    }

    pub fn alerts_of(&self, device_id: DeviceId) -> Vec<Alert> {
        self.lock()
            .alerts
            .iter()
            .filter(|a| a.device_id == device_id)
            .cloned()
            .collect()
    }

    pub fn raw_device(&self, id: DeviceId) -> Option<Device> {
        self.lock().devices.iter().find(|d| d.id == id).cloned()
    }
}

/// Router over a fresh store with alert computation after ingestion enabled
pub fn create_test_router() -> (Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let state = build_state(store.repositories(), true, None);
    (rest::create_router(state), store)
}

#[async_trait]
impl DeviceRepository for InMemoryStore {
    async fn create(&self, input: CreateDeviceInput) -> Result<Device> {
        let mut t = self.lock();
        if t.devices
            .iter()
            .any(|d| d.serial_number == input.serial_number && d.audit.deleted_at.is_none())
        {
            return Err(Error::Conflict(format!(
                "serial number {} already exists",
                input.serial_number
            )));
        }
        if let Some(plan_id) = input.plan_id {
            if !t.plan_exists(plan_id) {
                return Err(Error::not_found(format!("plan {} not found", plan_id)));
            }
        }

        let now = Utc::now();
        let device = Device {
            id: t.next_id(),
            serial_number: input.serial_number,
            name: input.name,
            profile: DeviceProfile {
                model: input.model,
                manufacturer: input.manufacturer,
                year: input.year,
                commission_date: input.commission_date,
            },
            state: OperationalState {
                location: input.location,
                total_hours: input.total_hours,
                after_overhaul_hours: input.after_overhaul_hours,
                last_reading_at: None,
                last_service_at: None,
                expected_next_maintenance: None,
                avg_daily_hours: 0.0,
            },
            status: input.status,
            plan_id: input.plan_id,
            audit: AuditMeta {
                created_by: input.created_by.clone(),
                updated_by: input.created_by,
                deleted_by: None,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
        };
        t.devices.push(device.clone());
        Ok(device)
    }

    async fn get_by_id(&self, id: DeviceId) -> Result<Device> {
        self.lock().live_device_mut(id).map(|d| d.clone())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Device>> {
        let t = self.lock();
        Ok(page(
            t.devices.iter().filter(|d| d.audit.deleted_at.is_none()).cloned(),
            limit,
            offset,
        ))
    }

    async fn update_basic(&self, input: UpdateDeviceBasicInput) -> Result<Device> {
        let mut t = self.lock();
        let device = t.live_device_mut(input.id)?;
        device.name = input.name;
        device.status = input.status;
        if let Some(location) = input.location {
            device.state.location = Some(location);
        }
        device.audit.updated_by = input.updated_by;
        device.audit.updated_at = Utc::now();
        Ok(device.clone())
    }

    async fn update_plan(
        &self,
        id: DeviceId,
        plan_id: Option<PlanId>,
        updated_by: Option<String>,
    ) -> Result<Device> {
        let mut t = self.lock();
        if let Some(plan_id) = plan_id {
            if !t.plan_exists(plan_id) {
                return Err(Error::not_found(format!("plan {} not found", plan_id)));
            }
        }
        let device = t.live_device_mut(id)?;
        device.plan_id = plan_id;
        device.audit.updated_by = updated_by;
        device.audit.updated_at = Utc::now();
        Ok(device.clone())
    }

    async fn soft_delete(&self, id: DeviceId, deleted_by: Option<String>) -> Result<()> {
        let mut t = self.lock();
        let device = t.live_device_mut(id)?;
        device.audit.deleted_at = Some(Utc::now());
        device.audit.deleted_by = deleted_by;
        Ok(())
    }
}

#[async_trait]
impl PlanRepository for InMemoryStore {
    async fn create(&self, input: PlanInput) -> Result<Plan> {
        let mut t = self.lock();
        let now = Utc::now();
        let plan = Plan {
            id: t.next_id(),
            name: input.name,
            interval_hours: input.interval_hours,
            threshold_min: input.threshold_min,
            threshold_max: input.threshold_max,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        t.plans.push(plan.clone());
        Ok(plan)
    }

    async fn get_by_id(&self, id: PlanId) -> Result<Plan> {
        self.lock()
            .plans
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("plan {} not found", id)))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Plan>> {
        Ok(page(self.lock().plans.iter().cloned(), limit, offset))
    }

    async fn update(&self, id: PlanId, input: PlanInput) -> Result<Plan> {
        let mut t = self.lock();
        let plan = t
            .plans
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::not_found(format!("plan {} not found", id)))?;
        plan.name = input.name;
        plan.interval_hours = input.interval_hours;
        plan.threshold_min = input.threshold_min;
        plan.threshold_max = input.threshold_max;
        plan.description = input.description;
        plan.updated_at = Utc::now();
        Ok(plan.clone())
    }

    async fn delete(&self, id: PlanId) -> Result<()> {
        let mut t = self.lock();
        if t.devices.iter().any(|d| d.plan_id == Some(id)) {
            return Err(Error::Conflict(format!(
                "plan {} is still assigned to devices",
                id
            )));
        }
        let before = t.plans.len();
        t.plans.retain(|p| p.id != id);
        if t.plans.len() == before {
            return Err(Error::not_found(format!("plan {} not found", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl ReadingRepository for InMemoryStore {
    async fn create(&self, input: CreateReadingInput) -> Result<Reading> {
        let mut t = self.lock();
        let at = input.at.unwrap_or_else(Utc::now);
        let device = t.live_device_mut(input.device_id)?;
        if device.state.last_reading_at.map_or(true, |last| at > last) {
            device.state.last_reading_at = Some(at);
        }

        let reading = Reading {
            id: t.next_id(),
            device_id: input.device_id,
            at,
            value: input.value,
            location: input.location,
            operator_id: input.operator_id,
        };
        t.readings.push(reading.clone());
        Ok(reading)
    }

    async fn last_by_device(&self, device_id: DeviceId) -> Result<Option<Reading>> {
        Ok(self
            .lock()
            .readings
            .iter()
            .filter(|r| r.device_id == device_id)
            .max_by_key(|r| (r.at, r.id))
            .cloned())
    }

    async fn list_by_device(
        &self,
        device_id: DeviceId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Reading>> {
        let t = self.lock();
        let mut readings: Vec<Reading> = t
            .readings
            .iter()
            .filter(|r| r.device_id == device_id)
            .cloned()
            .collect();
        readings.sort_by_key(|r| std::cmp::Reverse((r.at, r.id)));
        Ok(page(readings.into_iter(), limit, offset))
    }
}

#[async_trait]
impl AlertRepository for InMemoryStore {
    async fn create(&self, input: CreateAlertInput) -> Result<Alert> {
        let mut t = self.lock();
        if !t.devices.iter().any(|d| d.id == input.device_id) {
            return Err(Error::not_found(format!(
                "device {} not found",
                input.device_id
            )));
        }
        let alert = Alert {
            id: t.next_id(),
            device_id: input.device_id,
            reading_id: input.reading_id,
            alert_type: input.alert_type,
            message: input.message,
            status: AlertStatus::Open,
            created_at: Utc::now(),
            serviced_at: None,
        };
        t.alerts.push(alert.clone());
        Ok(alert)
    }

    async fn get_open_by_device(&self, device_id: DeviceId) -> Result<Option<Alert>> {
        Ok(self
            .lock()
            .alerts
            .iter()
            .filter(|a| a.device_id == device_id && a.is_open())
            .max_by_key(|a| (a.created_at, a.id))
            .cloned())
    }

    async fn list_open_by_device(
        &self,
        device_id: DeviceId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Alert>> {
        let t = self.lock();
        let mut alerts: Vec<Alert> = t
            .alerts
            .iter()
            .filter(|a| a.device_id == device_id && a.is_open())
            .cloned()
            .collect();
        alerts.sort_by_key(|a| std::cmp::Reverse((a.created_at, a.id)));
        Ok(page(alerts.into_iter(), limit, offset))
    }

    async fn resolve(&self, id: AlertId, serviced_at: Option<DateTime<Utc>>) -> Result<Alert> {
        let mut t = self.lock();
        let alert = t
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::not_found(format!("alert {} not found", id)))?;
        alert.status = AlertStatus::Serviced;
        alert.serviced_at = Some(serviced_at.unwrap_or_else(Utc::now));
        Ok(alert.clone())
    }
}

#[async_trait]
impl MaintenanceRepository for InMemoryStore {
    async fn record(&self, input: CreateMaintenanceInput) -> Result<MaintenanceEvent> {
        let mut t = self.lock();
        let at = input.at.unwrap_or_else(Utc::now);
        let device = t.live_device_mut(input.device_id)?;
        device.state.after_overhaul_hours = 0;
        if device.state.last_service_at.map_or(true, |last| at > last) {
            device.state.last_service_at = Some(at);
        }

        let event = MaintenanceEvent {
            id: t.next_id(),
            device_id: input.device_id,
            at,
            interval_hours: input.interval_hours,
            notes: input.notes,
            performed_by: input.performed_by,
            cost: input.cost,
        };
        t.events.push(event.clone());
        Ok(event)
    }

    async fn list_by_device(
        &self,
        device_id: DeviceId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MaintenanceEvent>> {
        let t = self.lock();
        let mut events: Vec<MaintenanceEvent> = t
            .events
            .iter()
            .filter(|e| e.device_id == device_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| std::cmp::Reverse((e.at, e.id)));
        Ok(page(events.into_iter(), limit, offset))
    }
}
