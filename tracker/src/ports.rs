//! Persistence and side-effect contracts consumed by the use cases.

use crate::errors::Result;
use crate::model::{
    Alert, AlertId, Device, DeviceId, DeviceStatus, MaintenanceEvent, Plan, PlanId, Reading,
    ReadingId,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct CreateDeviceInput {
    pub serial_number: String,
    pub name: String,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub year: i32,
    pub commission_date: Option<NaiveDate>,
    pub status: DeviceStatus,
    pub location: Option<String>,
    pub total_hours: i32,
    pub after_overhaul_hours: i32,
    pub plan_id: Option<PlanId>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDeviceBasicInput {
    pub id: DeviceId,
    pub name: String,
    pub status: DeviceStatus,
    /// `None` keeps the stored location
    pub location: Option<String>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanInput {
    pub name: String,
    pub interval_hours: i32,
    pub threshold_min: Option<f64>,
    pub threshold_max: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateReadingInput {
    pub device_id: DeviceId,
    /// `None` lets the database stamp the row with `NOW()`
    pub at: Option<DateTime<Utc>>,
    pub value: f64,
    pub location: Option<String>,
    pub operator_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateAlertInput {
    pub device_id: DeviceId,
    pub reading_id: Option<ReadingId>,
    pub alert_type: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateMaintenanceInput {
    pub device_id: DeviceId,
    pub at: Option<DateTime<Utc>>,
    pub interval_hours: Option<i32>,
    pub notes: Option<String>,
    pub performed_by: Option<String>,
    pub cost: Option<f64>,
}

/// Device persistence. Soft-deleted rows are invisible to every method.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn create(&self, input: CreateDeviceInput) -> Result<Device>;

    /// Fails with `NotFound` for unknown or soft-deleted devices
    async fn get_by_id(&self, id: DeviceId) -> Result<Device>;

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Device>>;

    async fn update_basic(&self, input: UpdateDeviceBasicInput) -> Result<Device>;

    /// `plan_id = None` unassigns the current plan
    async fn update_plan(
        &self,
        id: DeviceId,
        plan_id: Option<PlanId>,
        updated_by: Option<String>,
    ) -> Result<Device>;

    async fn soft_delete(&self, id: DeviceId, deleted_by: Option<String>) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn create(&self, input: PlanInput) -> Result<Plan>;
    async fn get_by_id(&self, id: PlanId) -> Result<Plan>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Plan>>;
    async fn update(&self, id: PlanId, input: PlanInput) -> Result<Plan>;

    /// Fails with `Conflict` while devices still reference the plan
    async fn delete(&self, id: PlanId) -> Result<()>;
}

/// Readings are append-only.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReadingRepository: Send + Sync {
    /// Fails with `NotFound` when the device does not exist
    async fn create(&self, input: CreateReadingInput) -> Result<Reading>;

    /// Most recent reading by timestamp, then id
    async fn last_by_device(&self, device_id: DeviceId) -> Result<Option<Reading>>;

    async fn list_by_device(
        &self,
        device_id: DeviceId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Reading>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn create(&self, input: CreateAlertInput) -> Result<Alert>;

    /// Newest open alert of the device, if any
    async fn get_open_by_device(&self, device_id: DeviceId) -> Result<Option<Alert>>;

    async fn list_open_by_device(
        &self,
        device_id: DeviceId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Alert>>;

    /// Sets `status = serviced` and `serviced_at = COALESCE(serviced_at arg, NOW())`
    async fn resolve(&self, id: AlertId, serviced_at: Option<DateTime<Utc>>) -> Result<Alert>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MaintenanceRepository: Send + Sync {
    /// Inserts the event and resets the device's after-overhaul hours in one transaction
    async fn record(&self, input: CreateMaintenanceInput) -> Result<MaintenanceEvent>;

    async fn list_by_device(
        &self,
        device_id: DeviceId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MaintenanceEvent>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Best-effort delivery of newly created alerts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_alert(&self, alert: &Alert) -> Result<()>;
}
